use std::fmt::Debug;
use std::hash::Hash;

use num::Float;
use rayon::prelude::*;
use tracing::debug;

use crate::vectorizer::{
    evaluate::{
        dnf::{Clause, DnfQuery},
        scoring::{HitEntry, Hits},
    },
    index::WeightIndex,
    tfidf::{TFIDFEngine, TermWeights},
};

/// p-norm fuzzy AND
/// `1 - (mean((1 - w_i)^p))^(1/p)`
///
/// p = 1 is one minus the mean distance from 1, large p approaches min.
/// An empty weight list is the neutral element 1.
#[inline]
pub fn and_similarity<N>(weights: &[N], p: N) -> N
where
    N: Float,
{
    if weights.is_empty() {
        return N::one();
    }
    let n = N::from(weights.len()).unwrap_or_else(N::one);
    let sum = weights
        .iter()
        .fold(N::zero(), |acc, &w| acc + (N::one() - w).max(N::zero()).powf(p));
    let sim = N::one() - (sum / n).powf(N::one() / p);
    sim.max(N::zero()).min(N::one())
}

/// p-norm fuzzy OR
/// `(mean(w_i^p))^(1/p)`
///
/// Large p approaches max. An empty weight list is the neutral element 0.
#[inline]
pub fn or_similarity<N>(weights: &[N], p: N) -> N
where
    N: Float,
{
    if weights.is_empty() {
        return N::zero();
    }
    let n = N::from(weights.len()).unwrap_or_else(N::one);
    let sum = weights
        .iter()
        .fold(N::zero(), |acc, &w| acc + w.max(N::zero()).powf(p));
    let sim = (sum / n).powf(N::one() / p);
    sim.max(N::zero()).min(N::one())
}

/// Fuzzy AND over the literals of one clause
/// a missing term has weight 0, a negated literal uses `1 - w`
#[inline]
fn clause_similarity(weights: &TermWeights, clause: &Clause, p: f64) -> f64 {
    let literal_weights: Vec<f64> = clause
        .literals()
        .iter()
        .map(|lit| {
            let w = weights.get(&lit.term);
            if lit.negated { 1.0 - w } else { w }
        })
        .collect();
    and_similarity(&literal_weights, p)
}

/// Relevance of one document to a DNF query, in [0, 1]
///
/// # Arguments
/// * `weights` - normalized term weights of the document
/// * `dnf` - normalized query
/// * `p` - norm exponent, >= 1
pub fn score_document(weights: &TermWeights, dnf: &DnfQuery, p: f64) -> f64 {
    let clause_scores: Vec<f64> = dnf
        .clauses()
        .iter()
        .map(|clause| clause_similarity(weights, clause, p))
        .collect();
    or_similarity(&clause_scores, p)
}

/// Extended boolean model
///
/// Scores every document with a non-empty weight vector, keeps those at or
/// above `relevance_threshold` and ranks them by descending score. Ties keep
/// corpus order.
pub fn evaluate<K, E>(
    index: &WeightIndex<K, E>,
    dnf: &DnfQuery,
    p: f64,
    relevance_threshold: f64,
    size: Option<usize>,
) -> Hits<K>
where
    K: Clone + Eq + Hash + Debug + Send + Sync,
    E: TFIDFEngine,
{
    if dnf.is_empty() {
        return Hits::empty();
    }
    let scored: Vec<Option<HitEntry<K>>> = index
        .documents
        .par_iter()
        .map(|doc| {
            // 重みが空の文書はスコアリング対象外
            if doc.weights.is_empty() {
                return None;
            }
            Some(HitEntry {
                key: doc.key.clone(),
                score: score_document(&doc.weights, dnf, p),
                doc_len: doc.token_sum,
            })
        })
        .collect();
    let scanned = scored.iter().filter(|h| h.is_some()).count();
    let list: Vec<HitEntry<K>> = scored
        .into_iter()
        .flatten()
        .filter(|h| h.score >= relevance_threshold)
        .collect();
    let mut hits = Hits::new(list);
    hits.sort_by_score().truncate(size);
    debug!(scanned, kept = hits.len(), p, relevance_threshold, "extended boolean evaluation");
    hits
}
