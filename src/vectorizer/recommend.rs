use std::fmt::Debug;
use std::hash::Hash;
use std::sync::LazyLock;

use ahash::AHashSet;
use indexmap::IndexMap;
use rayon::prelude::*;
use tracing::debug;

use crate::config::RecommendConfig;
use crate::vectorizer::{
    compute::compare::{Compare, DefaultCompare},
    corpus::{Corpus, Document},
    evaluate::scoring::{HitEntry, Hits},
    tfidf::TFIDFEngine,
    token::TokenFrequency,
};

/// IDF used for recommendation vectors
/// `ln((1 + N) / (1 + df)) + 1`, every term keeps a positive weight
#[derive(Debug, Clone, Copy, Default)]
pub struct SmoothIDFEngine;

impl TFIDFEngine for SmoothIDFEngine {
    #[inline]
    fn idf(doc_freq: u64, doc_num: u64) -> f64 {
        ((1.0 + doc_num as f64) / (1.0 + doc_freq as f64)).ln() + 1.0
    }
}

/// Text a document is compared by
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimilaritySource {
    /// every document has a title
    Title,
    /// content tokens
    Content,
}

impl SimilaritySource {
    pub fn detect<K>(corpus: &Corpus<K>) -> Self
    where
        K: Clone + Eq + Hash + Debug,
    {
        if !corpus.is_empty() && corpus.documents().all(|d| d.title.is_some()) {
            SimilaritySource::Title
        } else {
            SimilaritySource::Content
        }
    }
}

/// English function words that carry no title similarity
static STOP_WORDS: LazyLock<AHashSet<&'static str>> = LazyLock::new(|| {
    [
        "a", "about", "above", "after", "again", "against", "all", "almost", "alone", "along",
        "already", "also", "although", "always", "am", "among", "amongst", "an", "and", "another",
        "any", "anyhow", "anyone", "anything", "anyway", "anywhere", "are", "around", "as", "at",
        "be", "became", "because", "become", "becomes", "been", "before", "behind", "being",
        "below", "beside", "besides", "between", "beyond", "both", "but", "by", "can", "cannot",
        "could", "did", "do", "does", "done", "down", "during", "each", "either", "else",
        "elsewhere", "enough", "etc", "even", "ever", "every", "everyone", "everything",
        "everywhere", "except", "few", "for", "from", "further", "had", "has", "have", "he",
        "hence", "her", "here", "hers", "herself", "him", "himself", "his", "how", "however", "i",
        "ie", "if", "in", "indeed", "into", "is", "it", "its", "itself", "just", "last", "least",
        "less", "many", "may", "me", "meanwhile", "might", "mine", "more", "moreover", "most",
        "mostly", "much", "must", "my", "myself", "neither", "never", "nevertheless", "next", "no",
        "nobody", "none", "nor", "not", "nothing", "now", "nowhere", "of", "off", "often", "on",
        "once", "only", "onto", "or", "other", "others", "otherwise", "our", "ours", "ourselves",
        "out", "over", "own", "per", "perhaps", "rather", "same", "seem", "seemed", "seems",
        "several", "she", "should", "since", "so", "some", "somehow", "someone", "something",
        "sometime", "sometimes", "somewhere", "still", "such", "than", "that", "the", "their",
        "them", "themselves", "then", "thence", "there", "thereafter", "thereby", "therefore",
        "these", "they", "this", "those", "though", "through", "throughout", "thru", "thus", "to",
        "together", "too", "toward", "towards", "under", "until", "up", "upon", "us", "very",
        "via", "was", "we", "well", "were", "what", "whatever", "when", "whence", "whenever",
        "where", "whereas", "whether", "which", "while", "who", "whoever", "whole", "whom",
        "whose", "why", "will", "with", "within", "without", "would", "yet", "you", "your",
        "yours", "yourself", "yourselves",
    ]
    .into_iter()
    .collect()
});

/// Lowercased word runs of a title
/// Single-character words and English stop words are dropped.
pub fn title_terms(title: &str) -> Vec<String> {
    title
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|w| w.chars().nth(1).is_some())
        .map(|w| w.to_lowercase())
        .filter(|w| !STOP_WORDS.contains(w.as_str()))
        .collect()
}

fn source_terms<K>(doc: &Document<K>, source: SimilaritySource) -> Vec<String> {
    match (source, &doc.title) {
        (SimilaritySource::Title, Some(title)) => title_terms(title),
        _ => doc.tokens.clone(),
    }
}

/// L2 normalized TF-IDF vectors of every document, as `(term index, weight)`
/// pairs sorted by index so `DefaultCompare` can merge-join them.
pub fn similarity_vectors<K, E>(corpus: &Corpus<K>, source: SimilaritySource) -> Vec<Vec<(usize, f64)>>
where
    K: Clone + Eq + Hash + Debug + Send + Sync,
    E: TFIDFEngine,
{
    let docs: Vec<&Document<K>> = corpus.documents().collect();
    let freqs: Vec<TokenFrequency> = docs
        .par_iter()
        .map(|doc| TokenFrequency::from_tokens(&source_terms(doc, source)))
        .collect();

    // term -> document frequency, first-seen order gives the index
    let mut df: IndexMap<&str, u64> = IndexMap::new();
    for freq in &freqs {
        for (term, _) in freq.iter() {
            *df.entry(term).or_insert(0) += 1;
        }
    }
    let doc_num = freqs.len() as u64;
    let idf: Vec<f64> = df.values().map(|&d| E::idf(d, doc_num)).collect();

    freqs
        .par_iter()
        .map(|freq| {
            let mut vec: Vec<(usize, f64)> = freq
                .iter()
                .filter_map(|(term, count)| df.get_index_of(term).map(|idx| (idx, E::tf(count, idf[idx]))))
                .collect();
            vec.sort_unstable_by_key(|(idx, _)| *idx);
            let norm = vec.iter().map(|(_, w)| w * w).sum::<f64>().sqrt();
            if norm > 0.0 {
                vec.iter_mut().for_each(|(_, w)| *w /= norm);
            }
            vec
        })
        .collect()
}

/// Corpus count of each genre, first-seen order
pub fn genre_counts<K>(corpus: &Corpus<K>) -> IndexMap<String, u64>
where
    K: Clone + Eq + Hash + Debug,
{
    let mut counts: IndexMap<String, u64> = IndexMap::new();
    for doc in corpus.documents() {
        for genre in doc.genres.iter().flatten() {
            *counts.entry(genre.clone()).or_insert(0) += 1;
        }
    }
    counts
}

/// The `n` most frequent genres with their counts, ties by first appearance
pub fn top_genres<K>(corpus: &Corpus<K>, n: usize) -> IndexMap<String, u64>
where
    K: Clone + Eq + Hash + Debug,
{
    let mut counts: Vec<(String, u64)> = genre_counts(corpus).into_iter().collect();
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts.truncate(n);
    counts.into_iter().collect()
}

/// Whether every document carries at least one genre
pub fn has_genres<K>(corpus: &Corpus<K>) -> bool
where
    K: Clone + Eq + Hash + Debug,
{
    !corpus.is_empty() && corpus.documents().all(|d| d.genres.as_ref().is_some_and(|g| !g.is_empty()))
}

/// Similarities of every candidate to the retrieved documents
struct Candidates<'a, K>
where
    K: Eq + Hash,
{
    corpus: &'a Corpus<K>,
    /// per candidate corpus index, similarity to each retrieved document
    sims: Vec<(usize, Vec<f64>)>,
}

impl<'a, K> Candidates<'a, K>
where
    K: Clone + Eq + Hash + Debug + Send + Sync,
{
    /// `None` when no retrieved key is in the corpus
    fn collect(corpus: &'a Corpus<K>, retrieved: &[K]) -> Option<Self> {
        let mut seen = AHashSet::new();
        let retrieved_idx: Vec<usize> = retrieved
            .iter()
            .filter_map(|key| corpus.index_of(key))
            .filter(|idx| seen.insert(*idx))
            .collect();
        if retrieved_idx.is_empty() {
            debug!(retrieved = retrieved.len(), "no retrieved document in corpus, nothing to recommend");
            return None;
        }
        let source = SimilaritySource::detect(corpus);
        let vectors = similarity_vectors::<K, SmoothIDFEngine>(corpus, source);
        let sims: Vec<(usize, Vec<f64>)> = (0..vectors.len())
            .into_par_iter()
            .filter(|idx| !seen.contains(idx))
            .map(|idx| {
                let row = retrieved_idx
                    .iter()
                    .map(|&r| {
                        let (a, b) = (vectors[idx].iter().copied(), vectors[r].iter().copied());
                        <DefaultCompare as Compare<f64>>::cosine_similarity(a, b)
                    })
                    .collect();
                (idx, row)
            })
            .collect();
        debug!(?source, retrieved = retrieved_idx.len(), candidates = sims.len(), "recommendation candidates");
        Some(Self { corpus, sims })
    }

    fn into_hits(self, scores: impl Iterator<Item = (usize, f64)>, limit: usize) -> Hits<K> {
        let list: Vec<HitEntry<K>> = scores
            .filter(|(_, score)| *score > 0.0)
            .filter_map(|(idx, score)| {
                self.corpus.get_index(idx).map(|doc| HitEntry {
                    key: doc.key.clone(),
                    score,
                    doc_len: doc.len() as u64,
                })
            })
            .collect();
        let mut hits = Hits::new(list);
        hits.sort_by_score().truncate(Some(limit));
        hits
    }
}

/// Similarity only re-ranking
///
/// Each document outside `retrieved` scores the sum of its cosine similarity
/// to every retrieved document; the best `simple_limit` are returned.
pub fn recommend_simple<K>(corpus: &Corpus<K>, retrieved: &[K], config: &RecommendConfig) -> Hits<K>
where
    K: Clone + Eq + Hash + Debug + Send + Sync,
{
    let Some(candidates) = Candidates::collect(corpus, retrieved) else {
        return Hits::empty();
    };
    let scores: Vec<(usize, f64)> = candidates
        .sims
        .iter()
        .map(|(idx, row)| (*idx, row.iter().sum::<f64>()))
        .collect();
    candidates.into_hits(scores.into_iter(), config.simple_limit)
}

/// Genre weighted re-ranking
///
/// Average similarity to the retrieved documents, multiplied by the corpus
/// count of each of the document's genres among the `top_genres` most
/// frequent ones, summed. Documents without a top genre drop out. Returns the
/// best `genre_limit`.
pub fn recommend_by_genre<K>(corpus: &Corpus<K>, retrieved: &[K], config: &RecommendConfig) -> Hits<K>
where
    K: Clone + Eq + Hash + Debug + Send + Sync,
{
    let Some(candidates) = Candidates::collect(corpus, retrieved) else {
        return Hits::empty();
    };
    let top = top_genres(corpus, config.top_genres);
    let scores: Vec<(usize, f64)> = candidates
        .sims
        .iter()
        .map(|(idx, row)| {
            let avg = row.iter().sum::<f64>() / row.len() as f64;
            let weight: u64 = corpus
                .get_index(*idx)
                .and_then(|doc| doc.genres.as_ref())
                .map(|genres| {
                    let unique: AHashSet<&str> = genres.iter().map(|g| g.as_str()).collect();
                    unique.iter().filter_map(|g| top.get(*g)).sum()
                })
                .unwrap_or(0);
            (*idx, avg * weight as f64)
        })
        .collect();
    candidates.into_hits(scores.into_iter(), config.genre_limit)
}

/// Propose documents similar to an already retrieved set
///
/// Uses the genre weighted ranking when every document carries genres and
/// falls back to similarity only otherwise. Never fails: missing metadata,
/// unknown keys or an empty retrieval just shrink the result.
///
/// # Arguments
/// * `corpus` - every document
/// * `retrieved` - keys already shown to the user, excluded from the result
/// * `config` - result sizes
pub fn recommend<K>(corpus: &Corpus<K>, retrieved: &[K], config: &RecommendConfig) -> Hits<K>
where
    K: Clone + Eq + Hash + Debug + Send + Sync,
{
    if has_genres(corpus) {
        recommend_by_genre(corpus, retrieved, config)
    } else {
        debug!("genres missing, similarity only recommendation");
        recommend_simple(corpus, retrieved, config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn titled() -> Corpus<String> {
        let mut corpus = Corpus::new();
        let docs = [
            ("m1", "Space Wars: The Return", &["action", "scifi"][..]),
            ("m2", "Space Wars II", &["action", "scifi"][..]),
            ("m3", "Return of the Space Cat", &["comedy"][..]),
            ("m4", "Garden Diaries", &["drama"][..]),
            ("m5", "Wars of the Roses", &["drama", "history"][..]),
        ];
        for (key, title, genres) in docs {
            let doc = Document::new(key.to_string(), &["x"]).with_title(title).with_genres(genres);
            corpus.add_document(doc).unwrap();
        }
        corpus
    }

    #[test]
    fn smooth_idf_is_positive_and_decreasing() {
        assert!((SmoothIDFEngine::idf(4, 4) - 1.0).abs() < 1e-12);
        assert!(SmoothIDFEngine::idf(1, 4) > SmoothIDFEngine::idf(2, 4));
    }

    #[test]
    fn splits_titles_into_terms() {
        assert_eq!(title_terms("Space Wars: The Return!"), vec!["space", "wars", "return"]);
        assert_eq!(title_terms("A Boy and His Dog_2"), vec!["boy", "dog_2"]);
        assert!(title_terms(" -- ").is_empty());
        assert!(title_terms("Of The X").is_empty());
    }

    #[test]
    fn title_source_needs_every_title() {
        let mut corpus = titled();
        assert_eq!(SimilaritySource::detect(&corpus), SimilaritySource::Title);
        corpus.add_tokens("m6".to_string(), &["space"]).unwrap();
        assert_eq!(SimilaritySource::detect(&corpus), SimilaritySource::Content);
    }

    #[test]
    fn vectors_are_unit_length() {
        let corpus = titled();
        for vec in similarity_vectors::<_, SmoothIDFEngine>(&corpus, SimilaritySource::Title) {
            let norm = vec.iter().map(|(_, w)| w * w).sum::<f64>().sqrt();
            assert!((norm - 1.0).abs() < 1e-9);
            assert!(vec.windows(2).all(|w| w[0].0 < w[1].0));
        }
    }

    #[test]
    fn simple_variant_ranks_by_summed_similarity() {
        let corpus = titled();
        let hits = recommend_simple(&corpus, &["m1".to_string()], &RecommendConfig::default());
        // m4 shares no title term with m1
        assert_eq!(hits.into_keys(), vec!["m3", "m2", "m5"]);
        let one = RecommendConfig { simple_limit: 1, ..RecommendConfig::default() };
        assert_eq!(recommend_simple(&corpus, &["m1".to_string()], &one).len(), 1);
    }

    #[test]
    fn shared_stop_words_are_not_similarity() {
        let mut corpus = Corpus::new();
        for (key, title) in [("m1", "The Matrix"), ("m2", "The Godfather"), ("m3", "Matrix Reloaded")] {
            corpus.add_document(Document::new(key.to_string(), &["x"]).with_title(title)).unwrap();
        }
        let vectors = similarity_vectors::<_, SmoothIDFEngine>(&corpus, SimilaritySource::Title);
        let (a, b) = (vectors[0].iter().copied(), vectors[1].iter().copied());
        assert_eq!(<DefaultCompare as Compare<f64>>::cosine_similarity(a, b), 0.0);
        let hits = recommend_simple(&corpus, &["m1".to_string()], &RecommendConfig::default());
        assert_eq!(hits.into_keys(), vec!["m3"]);
    }

    #[test]
    fn genre_variant_weights_by_popular_genres() {
        let corpus = titled();
        let config = RecommendConfig { top_genres: 2, ..RecommendConfig::default() };
        let top = top_genres(&corpus, 2);
        assert_eq!(top.keys().collect::<Vec<_>>(), vec!["action", "scifi"]);
        let hits = recommend_by_genre(&corpus, &["m1".to_string()], &config);
        // only m2 has a top genre
        assert_eq!(hits.into_keys(), vec!["m2"]);
    }

    #[test]
    fn dispatches_on_metadata() {
        let corpus = titled();
        let retrieved = ["m3".to_string()];
        let cfg = RecommendConfig::default();
        assert_eq!(recommend(&corpus, &retrieved, &cfg), recommend_by_genre(&corpus, &retrieved, &cfg));

        let mut plain = Corpus::new();
        plain.add_tokens("a".to_string(), &["cat", "dog"]).unwrap();
        plain.add_tokens("b".to_string(), &["dog", "bird"]).unwrap();
        plain.add_tokens("c".to_string(), &["fish"]).unwrap();
        let hits = recommend(&plain, &["a".to_string()], &cfg);
        assert_eq!(hits.into_keys(), vec!["b"]);
    }

    #[test]
    fn degenerate_retrievals_give_nothing() {
        let corpus = titled();
        let cfg = RecommendConfig::default();
        assert!(recommend(&corpus, &[], &cfg).is_empty());
        assert!(recommend(&corpus, &["missing".to_string()], &cfg).is_empty());
        let all: Vec<String> = corpus.keys().cloned().collect();
        assert!(recommend(&corpus, &all, &cfg).is_empty());
    }
}
