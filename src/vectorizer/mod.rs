pub mod compute;
pub mod corpus;
pub mod evaluate;
pub mod index;
pub mod recommend;
pub mod tfidf;
pub mod token;
pub mod vocabulary;

use std::fmt::Debug;
use std::hash::Hash;
use std::marker::PhantomData;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard};

use tracing::{debug, warn};

use crate::config::{EvalConfig, RecommendConfig, VocabularyConfig};
use crate::error::Result;
use crate::vectorizer::{
    corpus::{Corpus, Document},
    evaluate::{
        dnf::{query_to_dnf, DnfQuery},
        scoring::{Hits, RetrievalModel},
    },
    index::WeightIndex,
    tfidf::{DefaultTFIDFEngine, TFIDFEngine},
};

/// Query context over one corpus
///
/// Owns the corpus and the weight index derived from it. Any number of
/// searches run in parallel; adding a document waits for in-flight searches
/// and the next search rebuilds the index for the new corpus generation.
pub struct Retriever<K = String, E = DefaultTFIDFEngine>
where
    K: Clone + Eq + Hash + Debug + Send + Sync,
    E: TFIDFEngine,
{
    corpus: RwLock<Corpus<K>>,
    /// index of the latest corpus generation a search has seen
    index_cache: RwLock<Option<Arc<WeightIndex<K, E>>>>,
    vocabulary_config: VocabularyConfig,
    recommend_config: RecommendConfig,
    _marker: PhantomData<fn() -> E>,
}

impl<K> Retriever<K, DefaultTFIDFEngine>
where
    K: Clone + Eq + Hash + Debug + Send + Sync,
{
    /// Empty retriever with the default engine
    pub fn new(vocabulary_config: VocabularyConfig) -> Result<Self> {
        Self::with_corpus(Corpus::new(), vocabulary_config)
    }
}

impl<K, E> Retriever<K, E>
where
    K: Clone + Eq + Hash + Debug + Send + Sync,
    E: TFIDFEngine,
{
    /// Wrap an existing corpus
    pub fn with_corpus(corpus: Corpus<K>, vocabulary_config: VocabularyConfig) -> Result<Self> {
        vocabulary_config.validate()?;
        Ok(Self {
            corpus: RwLock::new(corpus),
            index_cache: RwLock::new(None),
            vocabulary_config,
            recommend_config: RecommendConfig::default(),
            _marker: PhantomData,
        })
    }

    pub fn with_recommend_config(mut self, config: RecommendConfig) -> Self {
        self.recommend_config = config;
        self
    }

    pub fn vocabulary_config(&self) -> &VocabularyConfig {
        &self.vocabulary_config
    }

    // 読み取り側はpanicしたスレッドがいてもデータを使い続ける
    fn read_corpus(&self) -> RwLockReadGuard<'_, Corpus<K>> {
        self.corpus.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a document
    ///
    /// # Errors
    /// `DuplicateDocument` when the key is already stored
    pub fn add_document(&self, doc: Document<K>) -> Result<()> {
        let mut corpus = self.corpus.write().unwrap_or_else(PoisonError::into_inner);
        corpus.add_document(doc)?;
        debug!(documents = corpus.len(), generation = corpus.generation(), "document added");
        Ok(())
    }

    /// Add a document from its tokens only
    pub fn add_tokens<T>(&self, key: K, tokens: &[T]) -> Result<()>
    where
        T: AsRef<str>,
    {
        self.add_document(Document::new(key, tokens))
    }

    pub fn len(&self) -> usize {
        self.read_corpus().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read_corpus().is_empty()
    }

    pub fn contains(&self, key: &K) -> bool {
        self.read_corpus().contains(key)
    }

    /// Copy of the current corpus
    pub fn snapshot(&self) -> Corpus<K> {
        self.read_corpus().clone()
    }

    /// Weight index of the current corpus, rebuilt when the corpus changed
    pub fn index(&self) -> Result<Arc<WeightIndex<K, E>>> {
        let corpus = self.read_corpus();
        self.index_for(&corpus)
    }

    fn index_for(&self, corpus: &Corpus<K>) -> Result<Arc<WeightIndex<K, E>>> {
        if let Some(index) = self.index_cache.read().unwrap_or_else(PoisonError::into_inner).as_ref() {
            if !index.is_stale(corpus) {
                return Ok(Arc::clone(index));
            }
        }
        let index = Arc::new(WeightIndex::build_with_engine(corpus, &self.vocabulary_config)?);
        *self.index_cache.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(&index));
        debug!(generation = index.generation, "index cache refreshed");
        Ok(index)
    }

    /// Run a tokenized query under one retrieval model
    ///
    /// # Arguments
    /// * `model` - retrieval model
    /// * `tokens` - query tokens; boolean models read operators from them
    /// * `config` - evaluation parameters
    ///
    /// # Errors
    /// `QueryParse` for malformed boolean grammar, `InvalidConfig` for out of
    /// range parameters
    pub fn search<T>(&self, model: RetrievalModel, tokens: &[T], config: &EvalConfig) -> Result<Hits<K>>
    where
        T: AsRef<str>,
    {
        match model {
            RetrievalModel::Boolean | RetrievalModel::ExtendedBoolean => {
                config.validate()?;
                // 正規化はロックの外で
                let dnf = query_to_dnf(tokens)?;
                self.search_dnf(model, &dnf, config)
            }
            RetrievalModel::Vector => {
                let corpus = self.read_corpus();
                let index = self.index_for(&corpus)?;
                model.evaluate(&corpus, &index, tokens, config)
            }
        }
    }

    /// Run an already normalized query
    pub fn search_dnf(&self, model: RetrievalModel, dnf: &DnfQuery, config: &EvalConfig) -> Result<Hits<K>> {
        let corpus = self.read_corpus();
        let index = self.index_for(&corpus)?;
        model.evaluate_dnf(&corpus, &index, dnf, config)
    }

    /// `search`, with every failure logged and turned into an empty result
    pub fn search_or_empty<T>(&self, model: RetrievalModel, tokens: &[T], config: &EvalConfig) -> Hits<K>
    where
        T: AsRef<str>,
    {
        match self.search(model, tokens, config) {
            Ok(hits) => hits,
            Err(err) => {
                warn!(error = %err, ?model, "search failed, returning no hits");
                Hits::empty()
            }
        }
    }

    /// Documents similar to an already retrieved set, see `recommend::recommend`
    pub fn recommend(&self, retrieved: &[K]) -> Hits<K> {
        let corpus = self.read_corpus();
        recommend::recommend(&corpus, retrieved, &self.recommend_config)
    }
}

impl<K, E> Debug for Retriever<K, E>
where
    K: Clone + Eq + Hash + Debug + Send + Sync,
    E: TFIDFEngine,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let corpus = self.read_corpus();
        f.debug_struct("Retriever")
            .field("documents", &corpus.len())
            .field("generation", &corpus.generation())
            .field("vocabulary_config", &self.vocabulary_config)
            .field("recommend_config", &self.recommend_config)
            .finish()
    }
}
