pub mod rake;

use serde::ser::{Serialize, SerializeTuple, Serializer};
use std::collections::HashMap;

pub use rake::{RakeConfig, RakeScorer, ENGLISH_STOPWORDS};

/// A keyword or phrase and its relevance within the source text.
#[derive(Debug, Clone, PartialEq)]
pub struct KeywordScore {
    pub phrase: String,
    pub score: f64,
}

// Serialized as a `[phrase, score]` pair.
impl Serialize for KeywordScore {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut tuple = serializer.serialize_tuple(2)?;
        tuple.serialize_element(&self.phrase)?;
        tuple.serialize_element(&self.score)?;
        tuple.end()
    }
}

/// Produces raw keyword candidates for a text. May return duplicates and
/// un-normalized phrases; must be deterministic.
pub trait KeywordScorer: Send + Sync {
    fn score(&self, text: &str) -> Vec<KeywordScore>;
}

#[derive(Debug, Clone, Default)]
pub struct KeywordConfig {
    /// Keep only the best `n` keywords when set.
    pub max_keywords: Option<usize>,
}

/// Lowercases and collapses whitespace.
pub fn normalize_phrase(phrase: &str) -> String {
    phrase
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

pub struct KeywordExtractor {
    scorer: Box<dyn KeywordScorer>,
    config: KeywordConfig,
}

impl Default for KeywordExtractor {
    fn default() -> Self {
        Self::new(RakeScorer::default(), KeywordConfig::default())
    }
}

impl KeywordExtractor {
    pub fn new(scorer: impl KeywordScorer + 'static, config: KeywordConfig) -> Self {
        Self {
            scorer: Box::new(scorer),
            config,
        }
    }

    /// Unique keywords, highest score first. Empty text yields no keywords.
    pub fn extract(&self, text: &str) -> Vec<KeywordScore> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        let mut keywords: Vec<KeywordScore> = Vec::new();
        let mut positions: HashMap<String, usize> = HashMap::new();

        for candidate in self.scorer.score(text) {
            let phrase = normalize_phrase(&candidate.phrase);
            if phrase.is_empty() || !candidate.score.is_finite() {
                continue;
            }
            match positions.get(&phrase) {
                Some(&pos) => {
                    if candidate.score > keywords[pos].score {
                        keywords[pos].score = candidate.score;
                    }
                }
                None => {
                    positions.insert(phrase.clone(), keywords.len());
                    keywords.push(KeywordScore {
                        phrase,
                        score: candidate.score,
                    });
                }
            }
        }

        // Stable: equal scores stay in order of first appearance.
        keywords.sort_by(|a, b| b.score.total_cmp(&a.score));
        if let Some(max) = self.config.max_keywords {
            keywords.truncate(max);
        }

        tracing::debug!(chars = text.len(), keywords = keywords.len(), "extracted keywords");
        keywords
    }
}
