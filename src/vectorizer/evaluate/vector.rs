use std::fmt::Debug;
use std::hash::Hash;

use rayon::prelude::*;
use tracing::debug;

use crate::vectorizer::{
    compute::compare::cosine_similarity,
    evaluate::scoring::{HitEntry, Hits},
    index::WeightIndex,
    tfidf::{TFIDFEngine, TermWeights},
};

/// Vector space model
///
/// Cosine similarity of every document against the query vector, sorted
/// descending with ties in corpus order. Documents with a zero vector score
/// 0.0 and stay in the result. An empty query returns no hits.
///
/// # Arguments
/// * `index` - document weights
/// * `query` - query weights, usually from `WeightIndex::query_vector`
/// * `size` - result cap
pub fn evaluate<K, E>(index: &WeightIndex<K, E>, query: &TermWeights, size: Option<usize>) -> Hits<K>
where
    K: Clone + Eq + Hash + Debug + Send + Sync,
    E: TFIDFEngine,
{
    if query.is_empty() {
        debug!("empty query vector");
        return Hits::empty();
    }
    let list: Vec<HitEntry<K>> = index
        .documents
        .par_iter()
        .map(|doc| HitEntry {
            key: doc.key.clone(),
            score: cosine_similarity(&doc.weights, query),
            doc_len: doc.token_sum,
        })
        .collect();
    let mut hits = Hits::new(list);
    hits.sort_by_score().truncate(size);
    debug!(scanned = index.len(), kept = hits.len(), "vector evaluation");
    hits
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VocabularyConfig;
    use crate::vectorizer::corpus::Corpus;

    fn index() -> WeightIndex<String> {
        let mut corpus = Corpus::new();
        corpus.add_tokens("D1".to_string(), &["cat", "dog"]).unwrap();
        corpus.add_tokens("D2".to_string(), &["dog", "bird"]).unwrap();
        corpus.add_tokens("D3".to_string(), &["fish"]).unwrap();
        WeightIndex::build(&corpus, &VocabularyConfig::unpruned()).unwrap()
    }

    #[test]
    fn ranks_every_document_by_cosine() {
        let index = index();
        let hits = evaluate(&index, &index.query_vector(&["dog", "bird"]), None);
        assert_eq!(hits.into_keys(), vec!["D2", "D1", "D3"]);
        let hits = evaluate(&index, &index.query_vector(&["bird"]), None);
        assert_eq!(hits.score_of(&"D3".to_string()), Some(0.0));
        assert_eq!(hits.keys()[0], "D2");
    }

    #[test]
    fn identical_vector_scores_one() {
        let index = index();
        let d1 = index.weights_of(&"D1".to_string()).cloned().unwrap();
        let hits = evaluate(&index, &d1, Some(1));
        assert_eq!(hits.len(), 1);
        assert!((hits.list[0].score - 1.0).abs() < 1e-12);
    }

    #[test]
    fn ties_keep_corpus_order() {
        let index = index();
        // unknown terms only: every score is 0
        let mut query = TermWeights::new();
        query.set("zebra", 1.0);
        assert_eq!(evaluate(&index, &query, None).into_keys(), vec!["D1", "D2", "D3"]);
    }

    #[test]
    fn empty_query_returns_nothing() {
        let index = index();
        assert!(evaluate(&index, &TermWeights::new(), None).is_empty());
    }
}
