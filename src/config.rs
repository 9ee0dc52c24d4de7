use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::cli::Cli;
use crate::keywords::{KeywordConfig, KeywordExtractor, RakeScorer};
use crate::picker::EmbedPicker;
use crate::search::{default_model_specs, ModelRegistry, ModelSpec};

/// Everything the service needs at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub data_root: PathBuf,
    pub models: Vec<(String, ModelSpec)>,
    pub keywords: KeywordConfig,
    pub log_level: String,
    pub log_json: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
            data_root: PathBuf::from(".."),
            models: default_model_specs(),
            keywords: KeywordConfig::default(),
            log_level: "info".to_string(),
            log_json: false,
        }
    }
}

impl AppConfig {
    pub fn from_cli(cli: Cli) -> Result<Self> {
        let mut models = default_model_specs();
        if let Some(path) = &cli.models {
            for (name, spec) in load_model_specs(path)? {
                models.retain(|(existing, _)| existing != &name);
                models.push((name, spec));
            }
        }

        Ok(Self {
            host: cli.host,
            port: cli.port,
            data_root: cli.data_root,
            models,
            keywords: KeywordConfig {
                max_keywords: cli.max_keywords,
            },
            log_level: cli.log_level,
            log_json: cli.log_json,
        })
    }

    /// Accepts an IPv4 or IPv6 literal (brackets optional) or a hostname.
    pub async fn socket_addr(&self) -> Result<SocketAddr> {
        let host = self.host.trim_start_matches('[').trim_end_matches(']');
        if let Ok(ip) = host.parse::<IpAddr>() {
            return Ok(SocketAddr::new(ip, self.port));
        }
        tokio::net::lookup_host((host, self.port))
            .await
            .with_context(|| format!("Failed to resolve bind host '{}'", self.host))?
            .next()
            .with_context(|| format!("Bind host '{}' resolved to no addresses", self.host))
    }

    pub fn build_registry(&self) -> ModelRegistry {
        let mut registry = ModelRegistry::new();
        for (name, spec) in &self.models {
            registry.register_spec(name.clone(), spec.clone());
        }
        registry
    }

    pub fn build_picker(&self) -> EmbedPicker {
        EmbedPicker::new(
            Arc::new(self.build_registry()),
            KeywordExtractor::new(RakeScorer::default(), self.keywords.clone()),
        )
    }
}

/// Reads a JSON object of model name to spec, e.g.
/// `{"mini": {"kind": "model2vec", "repo": "minishlab/potion-base-8M"}}`.
pub fn load_model_specs(path: &Path) -> Result<Vec<(String, ModelSpec)>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read models file at {:?}", path))?;
    let specs: BTreeMap<String, ModelSpec> = serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse models file at {:?}", path))?;
    Ok(specs.into_iter().collect())
}
