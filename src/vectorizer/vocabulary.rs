use std::fmt::Debug;
use std::hash::Hash;

use ahash::{AHashSet, RandomState};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::VocabularyConfig;
use crate::vectorizer::corpus::Corpus;

/// Pruned corpus vocabulary
///
/// Terms keep the order in which they are first seen while enumerating the
/// corpus, so rebuilding from the same corpus gives the same vocabulary.
/// Each term carries its document frequency.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Vocabulary {
    #[serde(with = "indexmap::map::serde_seq")]
    terms: IndexMap<String, u64>,
    doc_num: u64,
}

impl Vocabulary {
    #[inline]
    pub fn contains(&self, term: &str) -> bool {
        self.terms.contains_key(term)
    }

    /// Document frequency of a vocabulary term, `None` when pruned or unknown
    #[inline]
    pub fn doc_freq(&self, term: &str) -> Option<u64> {
        self.terms.get(term).copied()
    }

    /// Number of documents the vocabulary was built from
    #[inline]
    pub fn doc_num(&self) -> u64 {
        self.doc_num
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.terms.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn terms(&self) -> impl Iterator<Item = &str> + '_ {
        self.terms.keys().map(|s| s.as_str())
    }

    /// (term, document frequency) pairs
    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> + '_ {
        self.terms.iter().map(|(t, &df)| (t.as_str(), df))
    }
}

/// Count in how many documents each term appears
///
/// # Returns
/// * `IndexMap<String, u64>` - term to document frequency, first-seen order
pub fn document_frequencies<K>(corpus: &Corpus<K>) -> IndexMap<String, u64, RandomState>
where
    K: Clone + Eq + Hash + Debug,
{
    let mut df: IndexMap<String, u64, RandomState> = IndexMap::with_hasher(RandomState::new());
    for doc in corpus.documents() {
        let mut seen: AHashSet<&str> = AHashSet::with_capacity(doc.tokens.len());
        for token in &doc.tokens {
            if !seen.insert(token.as_str()) {
                continue;
            }
            if let Some(count) = df.get_mut(token.as_str()) {
                *count += 1;
            } else {
                df.insert(token.clone(), 1);
            }
        }
    }
    df
}

/// Build the pruned vocabulary of a corpus
///
/// A term survives when `df >= no_below` and `df / N <= no_above`.
/// When `keep_n` is set only the `keep_n` most frequent survivors stay
/// (ties broken by first-seen order).
///
/// # Arguments
/// * `corpus` - documents to count
/// * `config` - pruning thresholds
pub fn build_vocabulary<K>(corpus: &Corpus<K>, config: &VocabularyConfig) -> Vocabulary
where
    K: Clone + Eq + Hash + Debug,
{
    let doc_num = corpus.len() as u64;
    let df = document_frequencies(corpus);
    let total_terms = df.len();

    let mut kept: Vec<(usize, String, u64)> = df
        .into_iter()
        .enumerate()
        .filter(|(_, (_, count))| {
            let ratio = if doc_num == 0 { 0.0 } else { *count as f64 / doc_num as f64 };
            *count >= config.no_below as u64 && ratio <= config.no_above
        })
        .map(|(pos, (term, count))| (pos, term, count))
        .collect();

    if let Some(keep_n) = config.keep_n {
        if kept.len() > keep_n {
            kept.sort_by(|a, b| b.2.cmp(&a.2).then_with(|| a.0.cmp(&b.0)));
            kept.truncate(keep_n);
            kept.sort_by_key(|(pos, _, _)| *pos);
        }
    }

    let terms: IndexMap<String, u64> = kept.into_iter().map(|(_, term, count)| (term, count)).collect();
    debug!(
        documents = doc_num,
        distinct_terms = total_terms,
        kept = terms.len(),
        "vocabulary built"
    );
    Vocabulary { terms, doc_num }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corpus() -> Corpus<String> {
        let mut corpus = Corpus::new();
        corpus.add_tokens("d1".to_string(), &["common", "rare", "common"]).unwrap();
        corpus.add_tokens("d2".to_string(), &["common", "mid"]).unwrap();
        corpus.add_tokens("d3".to_string(), &["common", "mid"]).unwrap();
        corpus.add_tokens("d4".to_string(), &["other"]).unwrap();
        corpus
    }

    #[test]
    fn document_frequency_counts_documents_not_occurrences() {
        let df = document_frequencies(&corpus());
        assert_eq!(df.get("common"), Some(&3));
        assert_eq!(df.get("rare"), Some(&1));
        assert_eq!(df.get("mid"), Some(&2));
    }

    #[test]
    fn unpruned_keeps_everything_in_first_seen_order() {
        let vocab = build_vocabulary(&corpus(), &VocabularyConfig::unpruned());
        assert_eq!(vocab.terms().collect::<Vec<_>>(), vec!["common", "rare", "mid", "other"]);
        assert_eq!(vocab.doc_num(), 4);
    }

    #[test]
    fn prunes_by_no_below_and_no_above() {
        let cfg = VocabularyConfig::unpruned().with_no_below(2).with_no_above(0.5);
        let vocab = build_vocabulary(&corpus(), &cfg);
        // common: 3/4 > 0.5, rare/other: df 1 < 2
        assert_eq!(vocab.terms().collect::<Vec<_>>(), vec!["mid"]);
        assert_eq!(vocab.doc_freq("mid"), Some(2));
        assert_eq!(vocab.doc_freq("common"), None);
    }

    #[test]
    fn keep_n_keeps_most_frequent() {
        let cfg = VocabularyConfig::unpruned().with_keep_n(Some(2));
        let vocab = build_vocabulary(&corpus(), &cfg);
        assert_eq!(vocab.terms().collect::<Vec<_>>(), vec!["common", "mid"]);
    }

    #[test]
    fn rebuild_is_deterministic() {
        let c = corpus();
        let cfg = VocabularyConfig::unpruned();
        assert_eq!(build_vocabulary(&c, &cfg), build_vocabulary(&c, &cfg));
    }

    #[test]
    fn empty_corpus_gives_empty_vocabulary() {
        let vocab = build_vocabulary(&Corpus::<String>::new(), &VocabularyConfig::default());
        assert!(vocab.is_empty());
    }
}
