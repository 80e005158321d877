use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// TokenFrequency
/// Occurrence counts of the tokens of one document (or one query).
/// Tokens keep their first-seen order, which keeps every derived vector
/// deterministic.
///
/// # Examples
/// ```
/// use tf_idf_retriever::TokenFrequency;
/// let mut freq = TokenFrequency::new();
/// freq.add_tokens(&["cat", "dog", "cat"]);
/// assert_eq!(freq.token_count("cat"), 2);
/// assert_eq!(freq.token_num(), 2);
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct TokenFrequency {
    #[serde(with = "indexmap::map::serde_seq")]
    token_count: IndexMap<String, u32>,
    total_token_count: u64,
}

/// Adding tokens
impl TokenFrequency {
    pub fn new() -> Self {
        TokenFrequency {
            token_count: IndexMap::new(),
            total_token_count: 0,
        }
    }

    /// Count every token of a sequence
    pub fn from_tokens<T>(tokens: &[T]) -> Self
    where
        T: AsRef<str>,
    {
        let mut freq = Self::new();
        freq.add_tokens(tokens);
        freq
    }

    /// Add one occurrence of a token
    ///
    /// # Arguments
    /// * `token` - token to add
    #[inline]
    pub fn add_token(&mut self, token: &str) -> &mut Self {
        // 既存tokenはallocしない
        if let Some(count) = self.token_count.get_mut(token) {
            *count += 1;
        } else {
            self.token_count.insert(token.to_string(), 1);
        }
        self.total_token_count += 1;
        self
    }

    /// Add one occurrence of each token
    ///
    /// # Arguments
    /// * `tokens` - slice of tokens
    #[inline]
    pub fn add_tokens<T>(&mut self, tokens: &[T]) -> &mut Self
    where
        T: AsRef<str>,
    {
        for token in tokens {
            self.add_token(token.as_ref());
        }
        self
    }

    #[inline]
    pub fn clear(&mut self) {
        self.token_count.clear();
        self.total_token_count = 0;
    }
}

/// Read access
impl TokenFrequency {
    /// Occurrence count of a token
    ///
    /// # Returns
    /// * `u32` - count, 0 when the token never occurred
    #[inline]
    pub fn token_count(&self, token: &str) -> u32 {
        self.token_count.get(token).copied().unwrap_or(0)
    }

    /// Sum of all counts
    #[inline]
    pub fn token_total_count(&self) -> u64 {
        self.total_token_count
    }

    /// Number of distinct tokens
    #[inline]
    pub fn token_num(&self) -> usize {
        self.token_count.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.token_count.is_empty()
    }

    /// Count of the most frequent token, 0 when empty
    #[inline]
    pub fn most_frequent_token_count(&self) -> u32 {
        self.token_count.values().copied().max().unwrap_or(0)
    }

    /// (token, count) pairs in first-seen order
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> + '_ {
        self.token_count.iter().map(|(token, &count)| (token.as_str(), count))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_and_totals() {
        let mut freq = TokenFrequency::new();
        freq.add_tokens(&["a", "b", "a", "c", "a"]);
        assert_eq!(freq.token_count("a"), 3);
        assert_eq!(freq.token_count("z"), 0);
        assert_eq!(freq.token_total_count(), 5);
        assert_eq!(freq.token_num(), 3);
        assert_eq!(freq.most_frequent_token_count(), 3);
    }

    #[test]
    fn keeps_first_seen_order() {
        let freq = TokenFrequency::from_tokens(&["z", "a", "z", "m"]);
        let order: Vec<(&str, u32)> = freq.iter().collect();
        assert_eq!(order, vec![("z", 2), ("a", 1), ("m", 1)]);
    }

    #[test]
    fn empty_frequency() {
        let mut freq = TokenFrequency::from_tokens(&["x"]);
        freq.clear();
        assert!(freq.is_empty());
        assert_eq!(freq.most_frequent_token_count(), 0);
        assert_eq!(freq.token_total_count(), 0);
    }
}
