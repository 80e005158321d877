//! Retrieval quality measures over ranked key lists
//!
//! Every ratio with a zero denominator is 0.0.

use std::hash::Hash;

use ahash::AHashSet;
use serde::{Deserialize, Serialize};

#[inline]
fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

fn hit_count<K>(retrieved: &[K], relevant: &[K]) -> usize
where
    K: Eq + Hash,
{
    let relevant: AHashSet<&K> = relevant.iter().collect();
    let retrieved: AHashSet<&K> = retrieved.iter().collect();
    retrieved.intersection(&relevant).count()
}

/// Relevant share of the retrieved list
pub fn precision<K>(retrieved: &[K], relevant: &[K]) -> f64
where
    K: Eq + Hash,
{
    ratio(hit_count(retrieved, relevant), retrieved.len())
}

/// Retrieved share of the relevant set
pub fn recall<K>(retrieved: &[K], relevant: &[K]) -> f64
where
    K: Eq + Hash,
{
    ratio(hit_count(retrieved, relevant), relevant.len())
}

/// F-beta measure
/// `(1 + β²) P R / (β² P + R)`
pub fn f_beta<K>(retrieved: &[K], relevant: &[K], beta: f64) -> f64
where
    K: Eq + Hash,
{
    let p = precision(retrieved, relevant);
    let r = recall(retrieved, relevant);
    let b2 = beta * beta;
    let den = b2 * p + r;
    if den == 0.0 {
        0.0
    } else {
        (1.0 + b2) * p * r / den
    }
}

pub fn f1<K>(retrieved: &[K], relevant: &[K]) -> f64
where
    K: Eq + Hash,
{
    f_beta(retrieved, relevant, 1.0)
}

/// Precision of the first `r` retrieved keys
///
/// The list must be in rank order.
pub fn r_precision<K>(retrieved: &[K], relevant: &[K], r: usize) -> f64
where
    K: Eq + Hash,
{
    precision(&retrieved[..r.min(retrieved.len())], relevant)
}

/// Non-relevant share of the retrieved list against every non-relevant key
/// `fp / (fp + tn)`
///
/// # Arguments
/// * `all` - every key of the corpus
pub fn fallout<K>(retrieved: &[K], relevant: &[K], all: &[K]) -> f64
where
    K: Eq + Hash,
{
    let relevant: AHashSet<&K> = relevant.iter().collect();
    let retrieved: AHashSet<&K> = retrieved.iter().collect();
    let fp = retrieved.difference(&relevant).count();
    let tn = all
        .iter()
        .collect::<AHashSet<&K>>()
        .iter()
        .filter(|k| !retrieved.contains(*k) && !relevant.contains(*k))
        .count();
    ratio(fp, fp + tn)
}

/// Measures of one query
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    /// precision at R, R being the number of relevant keys
    pub r_precision: f64,
    pub fallout: f64,
}

/// Every measure of one query at once
///
/// # Arguments
/// * `retrieved` - result keys in rank order
/// * `relevant` - judged relevant keys
/// * `all` - every key of the corpus
pub fn evaluate<K>(retrieved: &[K], relevant: &[K], all: &[K]) -> Evaluation
where
    K: Eq + Hash,
{
    Evaluation {
        precision: precision(retrieved, relevant),
        recall: recall(retrieved, relevant),
        f1: f1(retrieved, relevant),
        r_precision: r_precision(retrieved, relevant, relevant.len()),
        fallout: fallout(retrieved, relevant, all),
    }
}
