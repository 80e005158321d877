use num::Float;
use std::cmp::Ordering;

use crate::vectorizer::tfidf::TermWeights;

/// Similarity measures over sparse vectors given as `(index, value)` pairs
/// sorted by ascending index.
pub trait Compare<N>
where
    N: Float,
{
    /// コサイン類似度
    /// cos(θ) = Σ(a_i * b_i) / (||a|| * ||b||)
    /// 0 when either norm is 0
    fn cosine_similarity(vec: impl Iterator<Item = (usize, N)>, other: impl Iterator<Item = (usize, N)>) -> N;
}

#[derive(Debug)]
pub struct DefaultCompare;

impl<N> Compare<N> for DefaultCompare
where
    N: Float,
{
    #[inline]
    fn cosine_similarity(vec: impl Iterator<Item = (usize, N)>, other: impl Iterator<Item = (usize, N)>) -> N {
        let mut a_it = vec.fuse();
        let mut b_it = other.fuse();
        let mut a_next = a_it.next();
        let mut b_next = b_it.next();
        let mut norm_a = N::zero();
        let mut norm_b = N::zero();
        let mut dot = N::zero();
        while let (Some((ia, va)), Some((ib, vb))) = (a_next, b_next) {
            match ia.cmp(&ib) {
                Ordering::Equal => {
                    norm_a = norm_a + va * va;
                    norm_b = norm_b + vb * vb;
                    dot = dot + va * vb;
                    a_next = a_it.next();
                    b_next = b_it.next();
                }
                Ordering::Less => {
                    norm_a = norm_a + va * va;
                    a_next = a_it.next();
                }
                Ordering::Greater => {
                    norm_b = norm_b + vb * vb;
                    b_next = b_it.next();
                }
            }
        }
        // 残り
        while let Some((_, va)) = a_next {
            norm_a = norm_a + va * va;
            a_next = a_it.next();
        }
        while let Some((_, vb)) = b_next {
            norm_b = norm_b + vb * vb;
            b_next = b_it.next();
        }
        if norm_a == N::zero() || norm_b == N::zero() {
            N::zero()
        } else {
            dot / (norm_a.sqrt() * norm_b.sqrt())
        }
    }
}

/// Cosine similarity between two term-keyed weight vectors
///
/// Symmetric. Returns 0.0 when either vector has zero norm, never NaN.
pub fn cosine_similarity(a: &TermWeights, b: &TermWeights) -> f64 {
    let (small, large) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    let mut products: Vec<(&str, f64)> = small
        .iter()
        .filter(|(term, _)| large.contains(term))
        .map(|(term, w)| (term, w * large.get(term)))
        .collect();
    // fixed summation order keeps cos(a, b) == cos(b, a) bit for bit
    products.sort_unstable_by(|x, y| x.0.cmp(y.0));
    let dot: f64 = products.iter().map(|(_, p)| p).sum();
    let norm = a.norm() * b.norm();
    if norm == 0.0 {
        return 0.0;
    }
    // rounding can push cos(a, a) a hair above 1
    (dot / norm).min(1.0)
}
