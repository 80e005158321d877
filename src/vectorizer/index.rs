use std::fmt::Debug;
use std::hash::Hash;
use std::marker::PhantomData;

use rayon::prelude::*;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::debug;

use crate::config::VocabularyConfig;
use crate::error::Result;
use crate::vectorizer::{
    corpus::Corpus,
    tfidf::{normalized_term_frequency_with_idf, DefaultTFIDFEngine, IDFVector, TFIDFEngine, TermWeights},
    vocabulary::{build_vocabulary, Vocabulary},
};

/// Weight vector of one document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentWeights<K> {
    pub key: K,
    pub weights: TermWeights,
    /// number of tokens of the document
    pub token_sum: u64,
}

/// Derived weighting data of one corpus snapshot
///
/// Holds the pruned vocabulary, its IDF and the normalized TF-IDF vector of
/// every document, in corpus order. Built once per corpus generation and
/// shared read-only between evaluations; `is_stale` tells when the corpus has
/// moved on.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound(serialize = "K: Serialize", deserialize = "K: DeserializeOwned"))]
pub struct WeightIndex<K = String, E = DefaultTFIDFEngine>
where
    E: TFIDFEngine,
{
    pub vocabulary: Vocabulary,
    pub idf: IDFVector,
    pub documents: Vec<DocumentWeights<K>>,
    /// corpus generation this index was built from
    pub generation: u64,
    pub config: VocabularyConfig,
    #[serde(skip)]
    _marker: PhantomData<fn() -> E>,
}

impl<K> WeightIndex<K, DefaultTFIDFEngine>
where
    K: Clone + Eq + Hash + Debug + Send + Sync,
{
    /// Build with the default TF-IDF engine
    pub fn build(corpus: &Corpus<K>, config: &VocabularyConfig) -> Result<Self> {
        Self::build_with_engine(corpus, config)
    }
}

impl<K, E> WeightIndex<K, E>
where
    K: Clone + Eq + Hash + Debug + Send + Sync,
    E: TFIDFEngine,
{
    /// Build the vocabulary, IDF and document weights of a corpus
    ///
    /// # Arguments
    /// * `corpus` - corpus snapshot
    /// * `config` - vocabulary pruning thresholds
    pub fn build_with_engine(corpus: &Corpus<K>, config: &VocabularyConfig) -> Result<Self> {
        config.validate()?;
        let vocabulary = build_vocabulary(corpus, config);
        let idf = IDFVector::from_vocabulary::<E>(&vocabulary);
        let docs: Vec<_> = corpus.documents().collect();
        let documents: Vec<DocumentWeights<K>> = docs
            .par_iter()
            .map(|doc| DocumentWeights {
                key: doc.key.clone(),
                weights: normalized_term_frequency_with_idf::<_, E>(&doc.tokens, &idf),
                token_sum: doc.tokens.len() as u64,
            })
            .collect();
        debug!(
            generation = corpus.generation(),
            documents = documents.len(),
            vocabulary = vocabulary.len(),
            "weight index built"
        );
        Ok(Self {
            vocabulary,
            idf,
            documents,
            generation: corpus.generation(),
            config: *config,
            _marker: PhantomData,
        })
    }

    /// Whether the corpus changed since this index was built
    pub fn is_stale(&self, corpus: &Corpus<K>) -> bool {
        self.generation != corpus.generation() || self.documents.len() != corpus.len()
    }

    pub fn get(&self, idx: usize) -> Option<&DocumentWeights<K>> {
        self.documents.get(idx)
    }

    pub fn weights_of(&self, key: &K) -> Option<&TermWeights> {
        self.documents.iter().find(|d| &d.key == key).map(|d| &d.weights)
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Weight query tokens the same way documents are weighted
    /// (normalized TF-IDF against this index's IDF). Terms outside the
    /// vocabulary are dropped.
    pub fn query_vector<T>(&self, tokens: &[T]) -> TermWeights
    where
        T: AsRef<str>,
    {
        normalized_term_frequency_with_idf::<_, E>(tokens, &self.idf)
    }
}

impl<K, E> WeightIndex<K, E>
where
    K: Clone + Eq + Hash + Debug + Send + Sync + Serialize + DeserializeOwned,
    E: TFIDFEngine,
{
    /// Encode the index as CBOR so a caller can cache it
    pub fn to_cbor(&self) -> Result<Vec<u8>> {
        Ok(serde_cbor::to_vec(self)?)
    }

    pub fn from_cbor(bytes: &[u8]) -> Result<Self> {
        Ok(serde_cbor::from_slice(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corpus() -> Corpus<String> {
        let mut corpus = Corpus::new();
        corpus.add_tokens("d1".to_string(), &["cat", "dog", "cat"]).unwrap();
        corpus.add_tokens("d2".to_string(), &["dog", "bird"]).unwrap();
        corpus.add_tokens("d3".to_string(), &[] as &[&str]).unwrap();
        corpus
    }

    #[test]
    fn builds_one_vector_per_document_in_corpus_order() {
        let c = corpus();
        let index = WeightIndex::build(&c, &VocabularyConfig::unpruned()).unwrap();
        assert_eq!(index.len(), 3);
        assert_eq!(index.get(0).map(|d| d.key.as_str()), Some("d1"));
        assert_eq!(index.get(0).map(|d| d.token_sum), Some(3));
        assert_eq!(index.weights_of(&"d1".to_string()).map(|w| w.get("cat")), Some(1.0));
        assert!(index.get(2).map(|d| d.weights.is_empty()).unwrap_or(false));
        for doc in &index.documents {
            assert!(doc.weights.iter().all(|(_, w)| (0.0..=1.0).contains(&w)));
        }
    }

    #[test]
    fn detects_stale_index() {
        let mut c = corpus();
        let index = WeightIndex::build(&c, &VocabularyConfig::unpruned()).unwrap();
        assert!(!index.is_stale(&c));
        c.add_tokens("d4".to_string(), &["fish"]).unwrap();
        assert!(index.is_stale(&c));
    }

    #[test]
    fn rejects_invalid_config() {
        let c = corpus();
        assert!(WeightIndex::build(&c, &VocabularyConfig::unpruned().with_no_above(2.0)).is_err());
    }

    #[test]
    fn query_vector_uses_index_idf() {
        let c = corpus();
        let index = WeightIndex::build(&c, &VocabularyConfig::unpruned()).unwrap();
        let q = index.query_vector(&["dog", "unknown"]);
        assert_eq!(q.get("dog"), 1.0);
        assert!(!q.contains("unknown"));
        // tokens are compared as given
        assert!(index.query_vector(&["DOG"]).is_empty());
        let none: [&str; 0] = [];
        assert!(index.query_vector(&none).is_empty());
    }

    #[test]
    fn cbor_snapshot_keeps_weights() {
        let c = corpus();
        let index = WeightIndex::build(&c, &VocabularyConfig::unpruned()).unwrap();
        let restored = WeightIndex::<String>::from_cbor(&index.to_cbor().unwrap()).unwrap();
        assert_eq!(restored.documents, index.documents);
        assert_eq!(restored.generation, index.generation);
        assert!(!restored.is_stale(&c));
    }
}
