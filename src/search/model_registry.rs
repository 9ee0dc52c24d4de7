use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{PickerError, Result};
use crate::search::embedding_engine::{Encoder, HashingEncoder, StaticModelEncoder};

const HF_TOKEN_ENV_VAR: &str = "HF_TOKEN";

/// How to build an encoder for a registered model name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelSpec {
    /// model2vec static embeddings, from a Hugging Face repo id or local directory.
    Model2vec {
        repo: String,
        #[serde(default)]
        normalize: Option<bool>,
        #[serde(default)]
        subfolder: Option<String>,
    },
    /// FNV-1a feature hashing, no model files required.
    Hashing { dimension: usize },
}

impl ModelSpec {
    pub fn model2vec(repo: &str) -> Self {
        ModelSpec::Model2vec {
            repo: repo.to_string(),
            normalize: None,
            subfolder: None,
        }
    }

    fn load(&self) -> anyhow::Result<Arc<dyn Encoder>> {
        match self {
            ModelSpec::Model2vec {
                repo,
                normalize,
                subfolder,
            } => {
                let token = std::env::var(HF_TOKEN_ENV_VAR).ok();
                let encoder = StaticModelEncoder::from_pretrained(
                    repo,
                    token.as_deref(),
                    *normalize,
                    subfolder.as_deref(),
                )?;
                Ok(Arc::new(encoder))
            }
            ModelSpec::Hashing { dimension } => Ok(Arc::new(HashingEncoder::new(*dimension)?)),
        }
    }
}

/// Models available out of the box.
pub fn default_model_specs() -> Vec<(String, ModelSpec)> {
    vec![
        ("potion-base-8M".to_string(), ModelSpec::model2vec("minishlab/potion-base-8M")),
        ("potion-base-32M".to_string(), ModelSpec::model2vec("minishlab/potion-base-32M")),
        ("hashing-256".to_string(), ModelSpec::Hashing { dimension: 256 }),
    ]
}

struct ModelEntry {
    spec: Option<ModelSpec>,
    encoder: OnceCell<Arc<dyn Encoder>>,
}

/// Resolves model names to encoders.
///
/// Spec-backed entries load on first use and are kept for the life of the
/// registry. A failed load is not remembered, the next `resolve` tries again.
#[derive(Default)]
pub struct ModelRegistry {
    models: HashMap<String, ModelEntry>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        for (name, spec) in default_model_specs() {
            registry.register_spec(name, spec);
        }
        registry
    }

    /// Registers a ready encoder, replacing any previous entry of that name.
    pub fn register(&mut self, name: impl Into<String>, encoder: Arc<dyn Encoder>) {
        self.models.insert(
            name.into(),
            ModelEntry {
                spec: None,
                encoder: OnceCell::with_value(encoder),
            },
        );
    }

    pub fn register_spec(&mut self, name: impl Into<String>, spec: ModelSpec) {
        self.models.insert(
            name.into(),
            ModelEntry {
                spec: Some(spec),
                encoder: OnceCell::new(),
            },
        );
    }

    pub fn resolve(&self, name: &str) -> Result<Arc<dyn Encoder>> {
        let entry = self
            .models
            .get(name)
            .ok_or_else(|| PickerError::UnknownModel(name.to_string()))?;

        let encoder = entry
            .encoder
            .get_or_try_init(|| match &entry.spec {
                Some(spec) => {
                    tracing::info!(model = name, ?spec, "loading embedding model");
                    spec.load()
                }
                None => Err(anyhow::anyhow!("no encoder or spec registered")),
            })
            .map_err(|e| PickerError::encoding(name, format!("{:#}", e)))?;

        Ok(Arc::clone(encoder))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.models.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.models.keys().cloned().collect();
        names.sort();
        names
    }
}
