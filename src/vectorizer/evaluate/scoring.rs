use std::fmt::{self, Debug, Display};
use std::hash::Hash;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::EvalConfig;
use crate::error::Result;
use crate::vectorizer::{
    corpus::Corpus,
    evaluate::{boolean, dnf::{query_to_dnf, DnfQuery}, extended, vector},
    index::WeightIndex,
    tfidf::TFIDFEngine,
};

/// Retrieval models
///
/// Closed set of models sharing one calling shape. Each variant owns its
/// scoring formula over the shared DNF and weight structures.
/// - Boolean: exact (or relaxed) clause matching, every hit scores 1.0
/// - ExtendedBoolean: p-norm fuzzy AND/OR over TF-IDF weights
/// - Vector: cosine similarity between query and document weight vectors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RetrievalModel {
    Boolean,
    ExtendedBoolean,
    Vector,
}

impl RetrievalModel {
    /// Evaluate a tokenized query
    ///
    /// Boolean models normalize the tokens to DNF first; the vector model
    /// weights them against the index IDF.
    ///
    /// # Errors
    /// `QueryParse` for a malformed boolean query, `InvalidConfig` for out of
    /// range parameters.
    pub fn evaluate<K, E, T>(
        &self,
        corpus: &Corpus<K>,
        index: &WeightIndex<K, E>,
        tokens: &[T],
        config: &EvalConfig,
    ) -> Result<Hits<K>>
    where
        K: Clone + Eq + Hash + Debug + Send + Sync,
        E: TFIDFEngine,
        T: AsRef<str>,
    {
        config.validate()?;
        let hits = match self {
            RetrievalModel::Boolean | RetrievalModel::ExtendedBoolean => {
                let dnf = query_to_dnf(tokens)?;
                self.evaluate_dnf(corpus, index, &dnf, config)?
            }
            RetrievalModel::Vector => {
                let query = index.query_vector(tokens);
                vector::evaluate(index, &query, config.size)
            }
        };
        debug!(model = ?self, hits = hits.len(), "query evaluated");
        Ok(hits)
    }

    /// Evaluate an already normalized query
    /// The vector model reads the positive literals as an unweighted term list.
    pub fn evaluate_dnf<K, E>(
        &self,
        corpus: &Corpus<K>,
        index: &WeightIndex<K, E>,
        dnf: &DnfQuery,
        config: &EvalConfig,
    ) -> Result<Hits<K>>
    where
        K: Clone + Eq + Hash + Debug + Send + Sync,
        E: TFIDFEngine,
    {
        config.validate()?;
        let hits = match self {
            RetrievalModel::Boolean => boolean::evaluate(corpus, dnf, config.relaxation_threshold, config.size),
            RetrievalModel::ExtendedBoolean => {
                extended::evaluate(index, dnf, config.p, config.relevance_threshold, config.size)
            }
            RetrievalModel::Vector => {
                let terms: Vec<&str> = dnf
                    .clauses()
                    .iter()
                    .flat_map(|c| c.literals().iter().filter(|l| !l.negated).map(|l| l.term.as_str()))
                    .collect();
                vector::evaluate(index, &index.query_vector(&terms), config.size)
            }
        };
        Ok(hits)
    }
}

/// One search result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HitEntry<K> {
    pub key: K,
    pub score: f64,
    /// document length in tokens
    pub doc_len: u64,
}

/// Structure to store search results
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct Hits<K> {
    pub list: Vec<HitEntry<K>>,
}

impl<K> Default for Hits<K> {
    fn default() -> Self {
        Hits { list: Vec::new() }
    }
}

impl<K> Hits<K> {
    pub fn new(list: Vec<HitEntry<K>>) -> Self {
        Hits { list }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Sort results by descending score
    /// NaN scores are dropped, ties keep their current order
    pub fn sort_by_score(&mut self) -> &mut Self {
        self.list.retain(|h| !h.score.is_nan());
        self.list.sort_by(|a, b| b.score.total_cmp(&a.score));
        self
    }

    /// Keep the first `size` results, no-op for `None`
    pub fn truncate(&mut self, size: Option<usize>) -> &mut Self {
        if let Some(size) = size {
            self.list.truncate(size);
        }
        self
    }

    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &HitEntry<K>> + '_ {
        self.list.iter()
    }

    /// Keys in result order
    pub fn keys(&self) -> Vec<&K> {
        self.list.iter().map(|h| &h.key).collect()
    }

    pub fn into_keys(self) -> Vec<K> {
        self.list.into_iter().map(|h| h.key).collect()
    }

    pub fn score_of(&self, key: &K) -> Option<f64>
    where
        K: PartialEq,
    {
        self.list.iter().find(|h| &h.key == key).map(|h| h.score)
    }
}

impl<K> Debug for Hits<K>
where
    K: Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if f.alternate() {
            writeln!(f, "Hits [")?;
            for hit in &self.list {
                writeln!(f, "    {:?}: {:.6} (len: {})", hit.key, hit.score, hit.doc_len)?;
            }
            write!(f, "]")
        } else {
            f.debug_list().entries(&self.list).finish()
        }
    }
}

impl<K> Display for Hits<K>
where
    K: Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (rank, hit) in self.list.iter().enumerate() {
            writeln!(f, "{:>4}. {:?}\t{:.6}\t(len: {})", rank + 1, hit.key, hit.score, hit.doc_len)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VocabularyConfig;
    use crate::error::RetrievalError;
    use crate::vectorizer::evaluate::query::split_query;

    fn hit(key: &str, score: f64) -> HitEntry<String> {
        HitEntry { key: key.to_string(), score, doc_len: 1 }
    }

    fn setup() -> (Corpus<String>, WeightIndex<String>) {
        let mut corpus = Corpus::new();
        corpus.add_tokens("D1".to_string(), &["cat", "dog"]).unwrap();
        corpus.add_tokens("D2".to_string(), &["dog", "bird"]).unwrap();
        corpus.add_tokens("D3".to_string(), &["fish"]).unwrap();
        let index = WeightIndex::build(&corpus, &VocabularyConfig::unpruned()).unwrap();
        (corpus, index)
    }

    #[test]
    fn sort_is_descending_and_stable() {
        let mut hits = Hits::new(vec![hit("a", 0.2), hit("b", 0.9), hit("c", 0.2), hit("d", f64::NAN)]);
        hits.sort_by_score();
        let keys: Vec<&str> = hits.iter().map(|h| h.key.as_str()).collect();
        assert_eq!(keys, vec!["b", "a", "c"]);
        hits.truncate(Some(1));
        assert_eq!(hits.into_keys(), vec!["b".to_string()]);
    }

    #[test]
    fn alternate_debug_lists_each_hit() {
        let hits = Hits::new(vec![hit("a", 0.5)]);
        let text = format!("{:#?}", hits);
        assert!(text.contains("\"a\": 0.500000 (len: 1)"));
    }

    #[test]
    fn every_model_runs_through_one_interface() {
        let (corpus, index) = setup();
        let tokens = split_query("cat AND dog");
        let cfg = EvalConfig::default();
        let boolean = RetrievalModel::Boolean.evaluate(&corpus, &index, &tokens, &cfg).unwrap();
        assert_eq!(boolean.into_keys(), vec!["D1".to_string()]);
        let extended = RetrievalModel::ExtendedBoolean.evaluate(&corpus, &index, &tokens, &cfg).unwrap();
        assert_eq!(extended.keys().first().map(|k| k.as_str()), Some("D1"));
        let vector = RetrievalModel::Vector.evaluate(&corpus, &index, &["cat", "dog"], &cfg).unwrap();
        assert_eq!(vector.len(), 3);
        assert_eq!(vector.list[0].key, "D1");
    }

    #[test]
    fn empty_query_returns_empty_hits_for_boolean_models() {
        let (corpus, index) = setup();
        let none: [&str; 0] = [];
        let cfg = EvalConfig::default();
        for model in [RetrievalModel::Boolean, RetrievalModel::ExtendedBoolean, RetrievalModel::Vector] {
            assert!(model.evaluate(&corpus, &index, &none, &cfg).unwrap().is_empty());
        }
    }

    #[test]
    fn malformed_query_and_bad_config_are_errors() {
        let (corpus, index) = setup();
        let cfg = EvalConfig::default();
        let err = RetrievalModel::Boolean.evaluate(&corpus, &index, &["cat", "AND"], &cfg).unwrap_err();
        assert!(matches!(err, RetrievalError::QueryParse(_)));
        let bad = EvalConfig::default().with_p(0.0);
        let err = RetrievalModel::ExtendedBoolean.evaluate(&corpus, &index, &["cat"], &bad).unwrap_err();
        assert!(matches!(err, RetrievalError::InvalidConfig(_)));
    }
}
