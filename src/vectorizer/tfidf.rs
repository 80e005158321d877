use std::fmt::Debug;
use std::hash::Hash;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::vectorizer::{
    corpus::Corpus,
    token::TokenFrequency,
    vocabulary::{document_frequencies, Vocabulary},
};

/// TF-IDF weighting strategy
///
/// Plug a different implementation into `WeightIndex::build_with_engine` to
/// change the weighting without touching the evaluators.
pub trait TFIDFEngine {
    /// IDF of a term
    /// # Arguments
    /// * `doc_freq` - number of documents containing the term
    /// * `doc_num` - corpus size
    fn idf(doc_freq: u64, doc_num: u64) -> f64;

    /// Un-normalized weight of a term inside one document
    /// # Arguments
    /// * `count` - raw occurrence count in the document
    /// * `idf` - IDF of the term
    #[inline]
    fn tf(count: u32, idf: f64) -> f64 {
        count as f64 * idf
    }
}

/// Default engine
/// smoothed IDF: `ln(1 + N / (df + 1))`
/// Never divides by zero and decreases monotonically with df.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultTFIDFEngine;

impl TFIDFEngine for DefaultTFIDFEngine {
    #[inline]
    fn idf(doc_freq: u64, doc_num: u64) -> f64 {
        (1.0 + doc_num as f64 / (doc_freq as f64 + 1.0)).ln()
    }
}

/// IDF of every vocabulary term
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IDFVector {
    #[serde(with = "indexmap::map::serde_seq")]
    pub idf: IndexMap<String, f64>,
    /// document count at computation time
    pub doc_num: u64,
}

impl IDFVector {
    /// `None` for terms outside the vocabulary
    #[inline]
    pub fn get(&self, term: &str) -> Option<f64> {
        self.idf.get(term).copied()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.idf.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.idf.is_empty()
    }

    /// IDF straight from the document frequencies stored in the vocabulary
    pub fn from_vocabulary<E: TFIDFEngine>(vocabulary: &Vocabulary) -> Self {
        let doc_num = vocabulary.doc_num();
        Self {
            idf: vocabulary
                .iter()
                .map(|(term, df)| (term.to_string(), E::idf(df, doc_num)))
                .collect(),
            doc_num,
        }
    }
}

/// Sparse, non-negative weight vector of one document (or query)
///
/// Terms that are not stored have weight 0.0.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TermWeights {
    #[serde(with = "indexmap::map::serde_seq")]
    weights: IndexMap<String, f64>,
}

impl TermWeights {
    pub fn new() -> Self {
        Self::default()
    }

    /// Weight of a term, 0.0 when absent
    #[inline]
    pub fn get(&self, term: &str) -> f64 {
        self.weights.get(term).copied().unwrap_or(0.0)
    }

    #[inline]
    pub fn contains(&self, term: &str) -> bool {
        self.weights.contains_key(term)
    }

    /// Set a weight, negative values are clamped to 0.0
    pub fn set(&mut self, term: &str, weight: f64) -> &mut Self {
        let weight = if weight.is_finite() { weight.max(0.0) } else { 0.0 };
        self.weights.insert(term.to_string(), weight);
        self
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.weights.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> + '_ {
        self.weights.iter().map(|(t, &w)| (t.as_str(), w))
    }

    /// Euclidean norm
    pub fn norm(&self) -> f64 {
        self.weights.values().map(|w| w * w).sum::<f64>().sqrt()
    }
}

impl<S> FromIterator<(S, f64)> for TermWeights
where
    S: AsRef<str>,
{
    fn from_iter<I: IntoIterator<Item = (S, f64)>>(iter: I) -> Self {
        let mut weights = TermWeights::new();
        for (term, w) in iter {
            weights.set(term.as_ref(), w);
        }
        weights
    }
}

/// IDF of every vocabulary term, document frequencies recounted from the corpus
///
/// # Arguments
/// * `corpus` - documents
/// * `vocabulary` - terms to compute the IDF for
///
/// # Returns
/// * `IDFVector` - `idf(t) = ln(1 + N / (df(t) + 1))` with the default engine
pub fn inverse_document_frequency<K, E>(corpus: &Corpus<K>, vocabulary: &Vocabulary) -> IDFVector
where
    K: Clone + Eq + Hash + Debug,
    E: TFIDFEngine,
{
    let doc_num = corpus.len() as u64;
    let df = document_frequencies(corpus);
    IDFVector {
        idf: vocabulary
            .terms()
            .map(|term| {
                let doc_freq = df.get(term).copied().unwrap_or(0);
                (term.to_string(), E::idf(doc_freq, doc_num))
            })
            .collect(),
        doc_num,
    }
}

/// Normalized TF-IDF weights of one document
///
/// `count(t) * idf(t)` divided by the largest such value in the document, so
/// every weight is in [0, 1]. Terms outside the vocabulary are left out
/// (implicit 0.0). A document without any vocabulary term gets an empty
/// vector rather than a division by zero.
pub fn normalized_term_frequency_with_idf<T, E>(tokens: &[T], idf: &IDFVector) -> TermWeights
where
    T: AsRef<str>,
    E: TFIDFEngine,
{
    let freq = TokenFrequency::from_tokens(tokens);
    let raw: Vec<(&str, f64)> = freq
        .iter()
        .filter_map(|(term, count)| idf.get(term).map(|w| (term, E::tf(count, w))))
        .collect();
    let max = raw.iter().map(|(_, w)| *w).fold(0.0_f64, f64::max);
    if max <= 0.0 {
        return TermWeights::new();
    }
    let mut weights = TermWeights::new();
    for (term, w) in raw {
        if w > 0.0 {
            weights.set(term, w / max);
        }
    }
    weights
}

/// Normalized TF-IDF weights of one document against a corpus and vocabulary
///
/// Recomputes the IDF on every call; use `WeightIndex` to weight a whole
/// corpus.
pub fn normalized_term_frequency<T, K, E>(
    tokens: &[T],
    corpus: &Corpus<K>,
    vocabulary: &Vocabulary,
) -> TermWeights
where
    T: AsRef<str>,
    K: Clone + Eq + Hash + Debug,
    E: TFIDFEngine,
{
    let idf = inverse_document_frequency::<K, E>(corpus, vocabulary);
    normalized_term_frequency_with_idf::<T, E>(tokens, &idf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VocabularyConfig;
    use crate::vectorizer::vocabulary::build_vocabulary;

    fn corpus() -> Corpus<String> {
        let mut corpus = Corpus::new();
        corpus.add_tokens("d1".to_string(), &["cat", "dog", "cat"]).unwrap();
        corpus.add_tokens("d2".to_string(), &["dog", "bird"]).unwrap();
        corpus.add_tokens("d3".to_string(), &["fish"]).unwrap();
        corpus
    }

    #[test]
    fn smoothed_idf_formula() {
        let c = corpus();
        let vocab = build_vocabulary(&c, &VocabularyConfig::unpruned());
        let idf = inverse_document_frequency::<_, DefaultTFIDFEngine>(&c, &vocab);
        let expected_dog = (1.0 + 3.0 / 3.0_f64).ln();
        let expected_cat = (1.0 + 3.0 / 2.0_f64).ln();
        assert!((idf.get("dog").unwrap() - expected_dog).abs() < 1e-12);
        assert!((idf.get("cat").unwrap() - expected_cat).abs() < 1e-12);
        assert_eq!(idf.get("unknown"), None);
        assert_eq!(IDFVector::from_vocabulary::<DefaultTFIDFEngine>(&vocab), idf);
    }

    #[test]
    fn idf_is_non_increasing_in_document_frequency() {
        let n = 50;
        let mut prev = f64::INFINITY;
        for df in 0..=n {
            let idf = DefaultTFIDFEngine::idf(df, n);
            assert!(idf <= prev, "idf grew at df={df}");
            assert!(idf.is_finite() && idf > 0.0);
            prev = idf;
        }
    }

    #[test]
    fn weights_are_normalized_to_the_document_maximum() {
        let c = corpus();
        let vocab = build_vocabulary(&c, &VocabularyConfig::unpruned());
        let weights = normalized_term_frequency::<_, _, DefaultTFIDFEngine>(&["cat", "dog", "cat"], &c, &vocab);
        // cat: 2 * ln(2.5) is the max
        assert!((weights.get("cat") - 1.0).abs() < 1e-12);
        let expected_dog = (2.0_f64).ln() / (2.0 * (2.5_f64).ln());
        assert!((weights.get("dog") - expected_dog).abs() < 1e-12);
        assert!(weights.iter().all(|(_, w)| (0.0..=1.0).contains(&w)));
    }

    #[test]
    fn terms_outside_vocabulary_weigh_zero() {
        let c = corpus();
        let vocab = build_vocabulary(&c, &VocabularyConfig::unpruned().with_no_below(2));
        let weights = normalized_term_frequency::<_, _, DefaultTFIDFEngine>(&["cat", "dog"], &c, &vocab);
        assert_eq!(weights.get("cat"), 0.0);
        assert!(!weights.contains("cat"));
        assert_eq!(weights.get("dog"), 1.0);
    }

    #[test]
    fn document_without_vocabulary_terms_is_empty() {
        let c = corpus();
        let vocab = build_vocabulary(&c, &VocabularyConfig::unpruned().with_no_below(2));
        let weights = normalized_term_frequency::<_, _, DefaultTFIDFEngine>(&["fish"], &c, &vocab);
        assert!(weights.is_empty());
        let none: [&str; 0] = [];
        assert!(normalized_term_frequency::<_, _, DefaultTFIDFEngine>(&none, &c, &vocab).is_empty());
    }
}
