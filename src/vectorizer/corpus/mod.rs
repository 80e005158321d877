use std::hash::Hash;
use std::fmt::Debug;

use indexmap::IndexMap;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::error::{Result, RetrievalError};

/// A tokenized document
///
/// `tokens` is the normalized term sequence produced by an external tokenizer.
/// `title` and `genres` are optional metadata only used by the recommender.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document<K> {
    pub key: K,
    pub tokens: Vec<String>,
    pub title: Option<String>,
    pub genres: Option<Vec<String>>,
}

impl<K> Document<K> {
    pub fn new<T>(key: K, tokens: &[T]) -> Self
    where
        T: AsRef<str>,
    {
        Self {
            key,
            tokens: tokens.iter().map(|t| t.as_ref().to_string()).collect(),
            title: None,
            genres: None,
        }
    }

    pub fn with_title<S: Into<String>>(mut self, title: S) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_genres<T>(mut self, genres: &[T]) -> Self
    where
        T: AsRef<str>,
    {
        self.genres = Some(genres.iter().map(|g| g.as_ref().to_string()).collect());
        self
    }

    /// number of tokens
    #[inline]
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

/// Append-only document collection
///
/// Enumeration follows insertion order. Every insert bumps the generation
/// number, which derived data (vocabulary, IDF, weights) uses to detect
/// staleness.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound(
    serialize = "K: Serialize + Eq + Hash",
    deserialize = "K: DeserializeOwned + Eq + Hash"
))]
pub struct Corpus<K = String>
where
    K: Eq + Hash,
{
    documents: IndexMap<K, Document<K>>,
    generation: u64,
}

impl<K> Default for Corpus<K>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self {
            documents: IndexMap::new(),
            generation: 0,
        }
    }
}

impl<K> Corpus<K>
where
    K: Clone + Eq + Hash + Debug,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a document
    /// Keys are unique, re-adding a key is an error since documents are immutable
    pub fn add_document(&mut self, doc: Document<K>) -> Result<()> {
        if self.documents.contains_key(&doc.key) {
            return Err(RetrievalError::DuplicateDocument(format!("{:?}", doc.key)));
        }
        self.documents.insert(doc.key.clone(), doc);
        self.generation += 1;
        Ok(())
    }

    /// Shorthand for `add_document(Document::new(key, tokens))`
    pub fn add_tokens<T>(&mut self, key: K, tokens: &[T]) -> Result<()>
    where
        T: AsRef<str>,
    {
        self.add_document(Document::new(key, tokens))
    }

    pub fn get(&self, key: &K) -> Option<&Document<K>> {
        self.documents.get(key)
    }

    pub fn get_index(&self, idx: usize) -> Option<&Document<K>> {
        self.documents.get_index(idx).map(|(_, doc)| doc)
    }

    pub fn index_of(&self, key: &K) -> Option<usize> {
        self.documents.get_index_of(key)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.documents.contains_key(key)
    }

    /// Documents in insertion order
    pub fn documents(&self) -> impl ExactSizeIterator<Item = &Document<K>> + '_ {
        self.documents.values()
    }

    pub fn keys(&self) -> impl ExactSizeIterator<Item = &K> + '_ {
        self.documents.keys()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Changes on every insert
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl<K> Corpus<K>
where
    K: Clone + Eq + Hash + Debug + Serialize + DeserializeOwned,
{
    /// Encode a snapshot of the corpus as CBOR
    pub fn to_cbor(&self) -> Result<Vec<u8>> {
        Ok(serde_cbor::to_vec(self)?)
    }

    pub fn from_cbor(bytes: &[u8]) -> Result<Self> {
        Ok(serde_cbor::from_slice(bytes)?)
    }
}
