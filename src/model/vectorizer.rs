//! Text vectorization against a pre-built vocabulary.
//!
//! The vectorizer artifact (`vectorizer.json`) fixes the feature space the
//! classifier was trained on: an n-gram analyzer, a term-to-column
//! vocabulary, and optionally per-column idf weights. `transform` maps raw
//! query text into that space; it never invents columns, so unseen terms
//! simply contribute nothing.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use crate::error::{Result, ShieldError};

/// Tokenization strategy for n-gram extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Analyzer {
    /// Character n-grams over the raw text, whitespace included.
    Char,
    /// Word n-grams over alphanumeric tokens, joined by single spaces.
    Word,
}

/// Post-weighting normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Norm {
    /// Scale the vector to unit euclidean length.
    L2,
    /// Leave raw (idf-weighted) counts.
    None,
}

/// Sparse feature vector produced by [`Vectorizer::transform`].
///
/// Pairs of (column index, weight), sorted by column for determinism.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Features {
    pairs: Vec<(usize, f32)>,
}

impl Features {
    /// Iterate (column, weight) pairs in column order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, f32)> + '_ {
        self.pairs.iter().copied()
    }

    /// Number of non-zero columns.
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Whether no vocabulary term occurred in the input.
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

fn default_analyzer() -> Analyzer {
    Analyzer::Char
}

fn default_ngram_range() -> (usize, usize) {
    (1, 1)
}

fn default_lowercase() -> bool {
    true
}

fn default_norm() -> Norm {
    Norm::L2
}

/// A fixed, pre-trained text vectorizer.
#[derive(Debug, Clone, Deserialize)]
pub struct Vectorizer {
    #[serde(default = "default_analyzer")]
    pub(crate) analyzer: Analyzer,
    #[serde(default = "default_ngram_range")]
    pub(crate) ngram_range: (usize, usize),
    #[serde(default = "default_lowercase")]
    pub(crate) lowercase: bool,
    pub(crate) vocabulary: HashMap<String, usize>,
    #[serde(default)]
    pub(crate) idf: Option<Vec<f32>>,
    #[serde(default = "default_norm")]
    pub(crate) norm: Norm,
}

impl Vectorizer {
    /// Load and validate a vectorizer artifact from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            ShieldError::ModelUnavailable(format!(
                "failed to read vectorizer artifact {}: {e}",
                path.display()
            ))
        })?;
        Self::from_json(&content)
    }

    /// Parse and validate a vectorizer artifact from its JSON source.
    pub fn from_json(json: &str) -> Result<Self> {
        let vectorizer: Self = serde_json::from_str(json).map_err(|e| {
            ShieldError::ModelUnavailable(format!("invalid vectorizer artifact: {e}"))
        })?;
        vectorizer.validate()?;
        Ok(vectorizer)
    }

    fn validate(&self) -> Result<()> {
        let (lo, hi) = self.ngram_range;
        if lo == 0 || lo > hi {
            return Err(ShieldError::ModelUnavailable(format!(
                "invalid ngram_range ({lo}, {hi})"
            )));
        }
        if self.vocabulary.is_empty() {
            return Err(ShieldError::ModelUnavailable(
                "vectorizer vocabulary is empty".to_string(),
            ));
        }
        if let Some(idf) = &self.idf {
            if idf.len() != self.n_features() {
                return Err(ShieldError::ModelUnavailable(format!(
                    "idf length {} does not cover {} feature columns",
                    idf.len(),
                    self.n_features()
                )));
            }
        }
        Ok(())
    }

    /// Width of the feature space (highest vocabulary column + 1).
    pub fn n_features(&self) -> usize {
        self.vocabulary.values().max().map_or(0, |max| max + 1)
    }

    /// Transform text into the fixed feature space.
    ///
    /// Empty input yields an empty vector. Fails only when the artifact is
    /// internally inconsistent (an idf table that does not cover a
    /// vocabulary column), which validated artifacts rule out.
    pub fn transform(&self, text: &str) -> Result<Features> {
        let owned;
        let text = if self.lowercase {
            owned = text.to_lowercase();
            owned.as_str()
        } else {
            text
        };

        let mut counts: HashMap<usize, f32> = HashMap::new();
        let (lo, hi) = self.ngram_range;

        match self.analyzer {
            Analyzer::Char => {
                let chars: Vec<char> = text.chars().collect();
                for n in lo..=hi {
                    for window in chars.windows(n) {
                        let gram: String = window.iter().collect();
                        if let Some(&col) = self.vocabulary.get(gram.as_str()) {
                            *counts.entry(col).or_insert(0.0) += 1.0;
                        }
                    }
                }
            },
            Analyzer::Word => {
                let tokens: Vec<&str> = text
                    .split(|c: char| !c.is_alphanumeric())
                    .filter(|t| !t.is_empty())
                    .collect();
                for n in lo..=hi {
                    for window in tokens.windows(n) {
                        let gram = window.join(" ");
                        if let Some(&col) = self.vocabulary.get(gram.as_str()) {
                            *counts.entry(col).or_insert(0.0) += 1.0;
                        }
                    }
                }
            },
        }

        if let Some(idf) = &self.idf {
            for (col, value) in counts.iter_mut() {
                let Some(weight) = idf.get(*col) else {
                    return Err(ShieldError::Inference(format!(
                        "no idf weight for feature column {col}"
                    )));
                };
                *value *= weight;
            }
        }

        if self.norm == Norm::L2 {
            let length = counts.values().map(|v| v * v).sum::<f32>().sqrt();
            if length > 0.0 {
                for value in counts.values_mut() {
                    *value /= length;
                }
            }
        }

        let mut pairs: Vec<(usize, f32)> = counts.into_iter().collect();
        pairs.sort_unstable_by_key(|&(col, _)| col);
        Ok(Features { pairs })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word_vectorizer() -> Vectorizer {
        Vectorizer::from_json(
            r#"{
                "analyzer": "word",
                "ngram_range": [1, 1],
                "vocabulary": {"select": 0, "union": 1, "from": 2},
                "norm": "none"
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_word_counts() {
        let v = word_vectorizer();
        let features = v.transform("SELECT name FROM users UNION SELECT password").unwrap();

        let pairs: Vec<_> = features.iter().collect();
        assert_eq!(pairs, vec![(0, 2.0), (1, 1.0), (2, 1.0)]);
    }

    #[test]
    fn test_unknown_terms_contribute_nothing() {
        let v = word_vectorizer();
        let features = v.transform("completely unrelated words").unwrap();
        assert!(features.is_empty());
    }

    #[test]
    fn test_empty_input_is_valid() {
        let v = word_vectorizer();
        assert!(v.transform("").unwrap().is_empty());
        assert!(v.transform("   ").unwrap().is_empty());
    }

    #[test]
    fn test_char_ngrams_span_spaces() {
        let v = Vectorizer::from_json(
            r#"{
                "analyzer": "char",
                "ngram_range": [3, 3],
                "vocabulary": {"r 1": 0},
                "norm": "none"
            }"#,
        )
        .unwrap();

        // The gram crosses the word boundary in "or 1=1"
        let features = v.transform("or 1=1").unwrap();
        assert_eq!(features.iter().collect::<Vec<_>>(), vec![(0, 1.0)]);

        // Input shorter than the gram yields nothing
        assert!(v.transform("r").unwrap().is_empty());
    }

    #[test]
    fn test_lowercase_folding() {
        let v = word_vectorizer();
        let upper = v.transform("UNION").unwrap();
        let lower = v.transform("union").unwrap();
        assert_eq!(upper, lower);
        assert_eq!(upper.len(), 1);
    }

    #[test]
    fn test_idf_and_l2_norm() {
        let v = Vectorizer::from_json(
            r#"{
                "analyzer": "word",
                "ngram_range": [1, 1],
                "vocabulary": {"a": 0, "b": 1},
                "idf": [2.0, 1.0],
                "norm": "l2"
            }"#,
        )
        .unwrap();

        let features = v.transform("a b").unwrap();
        let pairs: Vec<_> = features.iter().collect();
        // weights (2, 1) scaled to unit length
        let norm = (pairs[0].1 * pairs[0].1 + pairs[1].1 * pairs[1].1).sqrt();
        assert!((norm - 1.0).abs() < 1e-6);
        assert!(pairs[0].1 > pairs[1].1);
    }

    #[test]
    fn test_bad_artifacts_rejected() {
        // ngram lower bound of zero
        let err = Vectorizer::from_json(
            r#"{"ngram_range": [0, 2], "vocabulary": {"a": 0}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, ShieldError::ModelUnavailable(_)));

        // idf shorter than the feature space
        let err = Vectorizer::from_json(
            r#"{"vocabulary": {"a": 0, "b": 5}, "idf": [1.0, 1.0]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, ShieldError::ModelUnavailable(_)));

        // empty vocabulary
        let err = Vectorizer::from_json(r#"{"vocabulary": {}}"#).unwrap_err();
        assert!(matches!(err, ShieldError::ModelUnavailable(_)));

        // not JSON at all
        let err = Vectorizer::from_json("{").unwrap_err();
        assert!(matches!(err, ShieldError::ModelUnavailable(_)));
    }

    #[test]
    fn test_word_bigrams() {
        let v = Vectorizer::from_json(
            r#"{
                "analyzer": "word",
                "ngram_range": [1, 2],
                "vocabulary": {"union": 0, "union select": 1, "select": 2},
                "norm": "none"
            }"#,
        )
        .unwrap();

        let features = v.transform("1 UNION SELECT password").unwrap();
        let pairs: Vec<_> = features.iter().collect();
        assert_eq!(pairs, vec![(0, 1.0), (1, 1.0), (2, 1.0)]);
    }
}
