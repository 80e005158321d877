/// This crate is a Document Retrieval Engine over TF-IDF weights.
/// It evaluates boolean, extended boolean (p-norm) and vector space queries
/// against a tokenized corpus.
pub mod config;
pub mod error;
pub mod metrics;
pub mod vectorizer;

/// Retriever
/// The top-level struct of this crate.
/// It owns a corpus and the weight index derived from it, and runs queries
/// under any retrieval model.
///
/// Internally, it holds:
/// - The corpus behind a read/write lock
/// - A weight index cache keyed by the corpus generation
/// - Vocabulary and recommendation parameters
///
/// `Retriever<K, E>` has the following generic parameters:
/// - `K`: Document key type (e.g., String, usize)
/// - `E`: TF-IDF calculation engine type (e.g., DefaultTFIDFEngine)
///
/// # Thread Safety
/// Searches take a shared lock and run concurrently.
/// Adding a document takes the exclusive lock, so it never overlaps a search.
pub use vectorizer::Retriever;

/// Corpus
/// Append-only, insertion ordered collection of tokenized documents.
/// Every insert bumps a generation number that derived data uses to detect
/// staleness.
///
/// # Serialization
/// Supported, `to_cbor` / `from_cbor` give a CBOR snapshot.
pub use vectorizer::corpus::{Corpus, Document};

/// Token Frequency structure
/// A struct for counting token occurrences within a document.
/// It manages:
/// - The count of occurrences of each token
/// - The total number of tokens in the document
///
/// Used as base data for TF (Term Frequency) calculation.
pub use vectorizer::token::TokenFrequency;

/// TF IDF Calculation Engine Trait
/// A trait that defines the behavior of a TF-IDF calculation engine.
///
/// By implementing this trait, you can plug different weighting strategies
/// into `WeightIndex` and `Retriever`.
/// A default implementation, `DefaultTFIDFEngine`, uses the smoothed IDF
/// `ln(1 + N / (df + 1))`.
pub use vectorizer::tfidf::{DefaultTFIDFEngine, TFIDFEngine, TermWeights};

/// Weight Index
/// Vocabulary, IDF and normalized TF-IDF vector of every document of one
/// corpus generation.
///
/// # Serialization
/// Supported, the engine type is not stored.
pub use vectorizer::index::WeightIndex;

/// Retrieval Models
/// The `RetrievalModel` enum is the closed set of models sharing one
/// evaluation interface.
///
/// Currently, the following models are supported:
/// - Boolean: exact or relaxed clause matching
/// - ExtendedBoolean: p-norm fuzzy AND/OR over TF-IDF weights
/// - Vector: cosine similarity ranking
pub use vectorizer::evaluate::scoring::RetrievalModel;

/// Search Hits and Hit Entry structures
/// Data structures for managing search results.
/// - `Hits`: holds a list of search results and provides features such as sorting by score
/// - `HitEntry`: represents a single result entry, containing the document key and score
pub use vectorizer::evaluate::scoring::{HitEntry, Hits};

/// Boolean query in disjunctive normal form
/// `query_to_dnf` normalizes a token sequence, `dnf_to_clauses` reads a
/// rendered DNF back.
pub use vectorizer::evaluate::dnf::{dnf_to_clauses, query_to_dnf, Clause, DnfQuery, Literal};

/// Per-call parameters
pub use config::{EvalConfig, RecommendConfig, VocabularyConfig};

pub use error::{Complexity, QueryParseError, Result, RetrievalError};
