use serde::{Deserialize, Serialize};

use crate::error::{Result, RetrievalError};

/// Vocabulary pruning parameters
///
/// A term is kept when it appears in at least `no_below` documents and in no
/// more than `no_above` (ratio) of the corpus. `keep_n` then caps the
/// vocabulary to the most frequent terms.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VocabularyConfig {
    pub no_below: usize,
    pub no_above: f64,
    pub keep_n: Option<usize>,
}

impl Default for VocabularyConfig {
    fn default() -> Self {
        Self {
            no_below: 5,
            no_above: 0.5,
            keep_n: Some(100_000),
        }
    }
}

impl VocabularyConfig {
    /// No pruning at all, every term of the corpus is kept
    pub fn unpruned() -> Self {
        Self {
            no_below: 1,
            no_above: 1.0,
            keep_n: None,
        }
    }

    pub fn with_no_below(mut self, no_below: usize) -> Self {
        self.no_below = no_below;
        self
    }

    pub fn with_no_above(mut self, no_above: f64) -> Self {
        self.no_above = no_above;
        self
    }

    pub fn with_keep_n(mut self, keep_n: Option<usize>) -> Self {
        self.keep_n = keep_n;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.no_above > 0.0 && self.no_above <= 1.0) {
            return Err(RetrievalError::invalid_config(format!(
                "no_above must be in (0, 1], got {}",
                self.no_above
            )));
        }
        Ok(())
    }
}

/// Per-call evaluation parameters shared by every retrieval model.
///
/// Each model reads only the fields it needs:
/// - Boolean: `relaxation_threshold`, `size`
/// - Extended boolean: `p`, `relevance_threshold`, `size`
/// - Vector: `size`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvalConfig {
    /// p-norm exponent
    pub p: f64,
    /// minimum extended boolean score to be retrieved
    pub relevance_threshold: f64,
    /// fraction of a clause that must match in the boolean model
    pub relaxation_threshold: f64,
    /// result cap, `None` is unlimited
    pub size: Option<usize>,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            p: 1.0,
            relevance_threshold: 0.5,
            relaxation_threshold: 1.0,
            size: None,
        }
    }
}

impl EvalConfig {
    pub fn with_p(mut self, p: f64) -> Self {
        self.p = p;
        self
    }

    pub fn with_relevance_threshold(mut self, threshold: f64) -> Self {
        self.relevance_threshold = threshold;
        self
    }

    pub fn with_relaxation_threshold(mut self, threshold: f64) -> Self {
        self.relaxation_threshold = threshold;
        self
    }

    pub fn with_size(mut self, size: Option<usize>) -> Self {
        self.size = size;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !self.p.is_finite() || self.p < 1.0 {
            return Err(RetrievalError::invalid_config(format!(
                "p must be a finite number >= 1, got {}",
                self.p
            )));
        }
        if !(0.0..=1.0).contains(&self.relevance_threshold) {
            return Err(RetrievalError::invalid_config(format!(
                "relevance_threshold must be in [0, 1], got {}",
                self.relevance_threshold
            )));
        }
        if !(0.0..=1.0).contains(&self.relaxation_threshold) {
            return Err(RetrievalError::invalid_config(format!(
                "relaxation_threshold must be in [0, 1], got {}",
                self.relaxation_threshold
            )));
        }
        Ok(())
    }
}

/// Recommendation re-ranker parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecommendConfig {
    /// result size of the similarity-only variant
    pub simple_limit: usize,
    /// result size of the genre weighted variant
    pub genre_limit: usize,
    /// how many of the most frequent genres take part in the weighting
    pub top_genres: usize,
}

impl Default for RecommendConfig {
    fn default() -> Self {
        Self {
            simple_limit: 5,
            genre_limit: 20,
            top_genres: 5,
        }
    }
}
