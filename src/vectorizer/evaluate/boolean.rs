use std::fmt::Debug;
use std::hash::Hash;

use ahash::AHashSet;
use rayon::prelude::*;
use tracing::debug;

use crate::vectorizer::{
    corpus::{Corpus, Document},
    evaluate::{
        dnf::{Clause, DnfQuery},
        scoring::{HitEntry, Hits},
    },
};

/// Guards `k * threshold` against float noise such as 3 * 0.7 = 2.1000000000000001
const ROUNDING_EPS: f64 = 1e-9;

/// Number of literals a clause of `k` literals must satisfy
///
/// `ceil(k * threshold)`, at least 1 for a non-empty clause, at most `k`.
/// Threshold 1.0 is an exact conjunctive match.
#[inline]
pub fn required_matches(k: usize, relaxation_threshold: f64) -> usize {
    if k == 0 {
        return 0;
    }
    let raw = (k as f64 * relaxation_threshold - ROUNDING_EPS).ceil();
    (raw.max(1.0) as usize).min(k)
}

/// Whether a clause holds for a document token set
#[inline]
pub fn clause_matches(clause: &Clause, tokens: &AHashSet<&str>, relaxation_threshold: f64) -> bool {
    let required = required_matches(clause.len(), relaxation_threshold);
    let matched = clause
        .literals()
        .iter()
        .filter(|lit| lit.is_satisfied_by(tokens.contains(lit.term.as_str())))
        .count();
    matched >= required
}

/// Whether any clause of the query holds for a document
pub fn is_document_relevant<K>(doc: &Document<K>, dnf: &DnfQuery, relaxation_threshold: f64) -> bool {
    if dnf.is_empty() {
        return false;
    }
    let tokens: AHashSet<&str> = doc.tokens.iter().map(|t| t.as_str()).collect();
    dnf.clauses()
        .iter()
        .any(|clause| clause_matches(clause, &tokens, relaxation_threshold))
}

/// Boolean model
///
/// Matching documents in corpus order, each with score 1.0. With `size` the
/// sequence is cut to its first `size` entries, it is never re-sorted.
/// An empty DNF matches nothing.
///
/// # Arguments
/// * `corpus` - documents to match
/// * `dnf` - normalized query
/// * `relaxation_threshold` - fraction of each clause that must match
/// * `size` - result cap
pub fn evaluate<K>(corpus: &Corpus<K>, dnf: &DnfQuery, relaxation_threshold: f64, size: Option<usize>) -> Hits<K>
where
    K: Clone + Eq + Hash + Debug + Send + Sync,
{
    if dnf.is_empty() {
        return Hits::empty();
    }
    let docs: Vec<&Document<K>> = corpus.documents().collect();
    // collect() on an indexed parallel iterator keeps corpus order
    let list: Vec<HitEntry<K>> = docs
        .par_iter()
        .filter(|doc| is_document_relevant(doc, dnf, relaxation_threshold))
        .map(|doc| HitEntry {
            key: doc.key.clone(),
            score: 1.0,
            doc_len: doc.len() as u64,
        })
        .collect();
    let mut hits = Hits::new(list);
    debug!(
        scanned = docs.len(),
        matched = hits.len(),
        relaxation_threshold,
        "boolean evaluation"
    );
    hits.truncate(size);
    hits
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vectorizer::evaluate::dnf::query_to_dnf;
    use crate::vectorizer::evaluate::query::split_query;

    fn corpus() -> Corpus<String> {
        let mut corpus = Corpus::new();
        corpus.add_tokens("D1".to_string(), &["cat", "dog"]).unwrap();
        corpus.add_tokens("D2".to_string(), &["dog", "bird"]).unwrap();
        corpus.add_tokens("D3".to_string(), &["fish"]).unwrap();
        corpus
    }

    fn keys(hits: Hits<String>) -> Vec<String> {
        hits.into_keys()
    }

    fn dnf(query: &str) -> DnfQuery {
        query_to_dnf(&split_query(query)).unwrap()
    }

    #[test]
    fn rounding_rule() {
        assert_eq!(required_matches(2, 1.0), 2);
        assert_eq!(required_matches(2, 0.5), 1);
        assert_eq!(required_matches(3, 0.5), 2);
        assert_eq!(required_matches(10, 0.7), 7);
        assert_eq!(required_matches(3, 0.0), 1);
        assert_eq!(required_matches(0, 1.0), 0);
    }

    #[test]
    fn strict_and_relaxed_conjunction() {
        let c = corpus();
        let q = dnf("cat AND dog");
        assert_eq!(keys(evaluate(&c, &q, 1.0, None)), vec!["D1"]);
        assert_eq!(keys(evaluate(&c, &q, 0.5, None)), vec!["D1", "D2"]);
    }

    #[test]
    fn disjunction_and_negation() {
        let c = corpus();
        assert_eq!(keys(evaluate(&c, &dnf("cat OR fish"), 1.0, None)), vec!["D1", "D3"]);
        assert_eq!(keys(evaluate(&c, &dnf("dog AND NOT cat"), 1.0, None)), vec!["D2"]);
        assert_eq!(keys(evaluate(&c, &dnf("NOT dog"), 1.0, None)), vec!["D3"]);
    }

    #[test]
    fn size_truncates_without_resorting() {
        let c = corpus();
        let q = dnf("dog OR fish");
        assert_eq!(keys(evaluate(&c, &q, 1.0, Some(2))), vec!["D1", "D2"]);
        assert_eq!(keys(evaluate(&c, &q, 1.0, Some(10))), vec!["D1", "D2", "D3"]);
    }

    #[test]
    fn empty_and_constant_queries() {
        let c = corpus();
        assert!(evaluate(&c, &DnfQuery::empty(), 1.0, None).is_empty());
        assert!(evaluate(&c, &dnf("cat AND NOT cat"), 1.0, None).is_empty());
        assert_eq!(evaluate(&c, &dnf("cat OR NOT cat"), 1.0, None).len(), 3);
    }

    #[test]
    fn exact_match_means_every_literal_of_some_clause() {
        let c = corpus();
        let q = dnf("(cat AND dog) OR (bird AND fish) OR dog");
        let hits = keys(evaluate(&c, &q, 1.0, None));
        for doc in c.documents() {
            let expected = q.clauses().iter().any(|cl| cl.terms().all(|t| doc.tokens.iter().any(|x| x == t)));
            assert_eq!(hits.contains(&doc.key), expected, "{}", doc.key);
        }
    }

    #[test]
    fn lowering_the_threshold_only_grows_the_result() {
        let c = corpus();
        let queries = ["cat AND dog AND bird", "(cat AND fish) OR (dog AND bird AND fish)", "NOT cat AND dog"];
        for query in queries {
            let q = dnf(query);
            let mut previous: Vec<String> = Vec::new();
            for step in (0..=10).rev() {
                let t = step as f64 / 10.0;
                let current = keys(evaluate(&c, &q, t, None));
                assert!(previous.iter().all(|k| current.contains(k)), "{query} at {t}");
                previous = current;
            }
        }
    }
}
