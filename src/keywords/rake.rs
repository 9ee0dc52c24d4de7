//! Rapid Automatic Keyword Extraction.
//!
//! Candidate phrases are maximal runs of content words, split at punctuation
//! and stopwords. Each word scores `degree / frequency` over all candidates
//! and a phrase scores the sum of its words.

use std::collections::{HashMap, HashSet};

use super::{KeywordScore, KeywordScorer};

pub const ENGLISH_STOPWORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "all", "also", "am", "an", "and", "any",
    "are", "as", "at", "be", "because", "been", "before", "being", "below", "between", "both",
    "but", "by", "can", "could", "did", "do", "does", "doing", "down", "during", "each", "either",
    "else", "etc", "ever", "every", "few", "for", "from", "further", "get", "got", "had", "has",
    "have", "having", "he", "her", "here", "hers", "herself", "him", "himself", "his", "how",
    "however", "i", "if", "in", "into", "is", "it", "its", "itself", "just", "let", "like", "may",
    "me", "might", "more", "most", "must", "my", "myself", "need", "no", "nor", "not", "now", "of",
    "off", "on", "once", "only", "or", "other", "ought", "our", "ours", "ourselves", "out",
    "over", "own", "same", "shall", "she", "should", "so", "some", "such", "than", "that", "the",
    "their", "theirs", "them", "themselves", "then", "there", "these", "they", "this", "those",
    "through", "to", "too", "under", "until", "up", "upon", "us", "very", "was", "we", "were",
    "what", "when", "where", "whether", "which", "while", "who", "whom", "whose", "why", "will",
    "with", "within", "without", "would", "yet", "you", "your", "yours", "yourself",
    "yourselves",
];

#[derive(Debug, Clone)]
pub struct RakeConfig {
    pub stopwords: HashSet<String>,
    /// Candidates longer than this many words are discarded.
    pub max_words: usize,
    /// Words shorter than this many characters act as delimiters.
    pub min_chars: usize,
}

impl Default for RakeConfig {
    fn default() -> Self {
        Self {
            stopwords: ENGLISH_STOPWORDS.iter().map(|s| s.to_string()).collect(),
            max_words: 4,
            min_chars: 1,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RakeScorer {
    config: RakeConfig,
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '\'' || c == '-' || c == '\u{2019}'
}

impl RakeScorer {
    pub fn new(config: RakeConfig) -> Self {
        Self { config }
    }

    fn is_content_word(&self, word: &str) -> bool {
        word.chars().count() >= self.config.min_chars
            && !word.chars().all(|c| c.is_numeric())
            && !self.config.stopwords.contains(word)
    }

    /// Splits text into candidate phrases, in order of appearance.
    fn candidates(&self, text: &str) -> Vec<Vec<String>> {
        let lowered = text.to_lowercase();
        let mut phrases = Vec::new();
        let mut phrase: Vec<String> = Vec::new();
        let mut word = String::new();

        let mut flush_phrase = |phrase: &mut Vec<String>| {
            if !phrase.is_empty() && phrase.len() <= self.config.max_words {
                phrases.push(std::mem::take(phrase));
            }
            phrase.clear();
        };

        for c in lowered.chars().chain(std::iter::once('.')) {
            if is_word_char(c) {
                word.push(c);
                continue;
            }
            let token = word.trim_matches(|c: char| c == '\'' || c == '-' || c == '\u{2019}');
            if !token.is_empty() {
                if self.is_content_word(token) {
                    phrase.push(token.to_string());
                } else {
                    flush_phrase(&mut phrase);
                }
            }
            word.clear();
            if !c.is_whitespace() {
                flush_phrase(&mut phrase);
            }
        }
        phrases
    }
}

impl KeywordScorer for RakeScorer {
    fn score(&self, text: &str) -> Vec<KeywordScore> {
        let phrases = self.candidates(text);

        let mut frequency: HashMap<&str, f64> = HashMap::new();
        let mut degree: HashMap<&str, f64> = HashMap::new();
        for phrase in &phrases {
            for word in phrase {
                *frequency.entry(word.as_str()).or_default() += 1.0;
                *degree.entry(word.as_str()).or_default() += phrase.len() as f64;
            }
        }

        phrases
            .iter()
            .map(|phrase| {
                let score = phrase
                    .iter()
                    .map(|w| degree[w.as_str()] / frequency[w.as_str()])
                    .sum();
                KeywordScore {
                    phrase: phrase.join(" "),
                    score,
                }
            })
            .collect()
    }
}
