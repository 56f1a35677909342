//! Token extraction for derived indexes
//!
//! Pipeline: analyzer (UAX#29 words → strip possessives → keep word
//!           characters → lowercase → remove stopwords)
//!           → n-gram tuples → occurrence counts
//!
//! Tuples of order `n` are `n` consecutive base tokens joined with `_`.
//! Strings produced by different orders are the same key: their counts are
//! summed into one entry.

use derivex_core::Analyzer;
use rustc_hash::FxHashMap;
use unicode_segmentation::UnicodeSegmentation;

/// Separator between the base tokens of an n-gram tuple.
pub const TUPLE_SEPARATOR: &str = "_";

/// Standard English stopwords (Lucene's default set).
const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "but", "by", "for", "if", "in", "into", "is", "it",
    "no", "not", "of", "on", "or", "such", "that", "the", "their", "then", "there", "these",
    "they", "this", "to", "was", "will", "with",
];

#[inline]
fn is_stopword(token: &str) -> bool {
    STOPWORDS.contains(&token)
}

/// Strip English possessive suffix (`'s` / `\u{2019}s`).
#[inline]
fn strip_possessive(word: &str) -> &str {
    word.strip_suffix("'s")
        .or_else(|| word.strip_suffix("\u{2019}s"))
        .unwrap_or(word)
}

/// Default word-level analyzer.
///
/// 1. UAX#29 word boundaries (`unicode_words`)
/// 2. Strip English possessives (`'s`)
/// 3. Keep alphanumerics and `_`, so `snake_case` words stay whole
/// 4. Lowercase
/// 5. Remove stopwords
///
/// ```
/// use derivex_core::Analyzer;
/// use derivex_engine::tokenizer::StandardAnalyzer;
///
/// let tokens = StandardAnalyzer.analyze("The Quick Brown Fox's den");
/// assert_eq!(tokens, vec!["quick", "brown", "fox", "den"]);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardAnalyzer;

impl Analyzer for StandardAnalyzer {
    fn analyze(&self, text: &str) -> Vec<String> {
        text.unicode_words()
            .map(strip_possessive)
            .map(|w| {
                w.chars()
                    .filter(|c| c.is_alphanumeric() || *c == '_')
                    .collect::<String>()
            })
            .map(|w| w.to_lowercase())
            .filter(|s| !s.is_empty() && !is_stopword(s))
            .collect()
    }
}

/// Insertion-ordered `token -> occurrence count` mapping.
///
/// Iteration yields tokens in the order they were first seen.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenCounts {
    entries: Vec<(String, u32)>,
    index: FxHashMap<String, usize>,
}

impl TokenCounts {
    /// Empty mapping.
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one more occurrence of `token`.
    pub fn add(&mut self, token: String) {
        self.add_count(token, 1);
    }

    /// Add `count` occurrences of `token`.
    pub fn add_count(&mut self, token: String, count: u32) {
        match self.index.get(&token) {
            Some(&i) => {
                let slot = &mut self.entries[i].1;
                *slot = slot.saturating_add(count);
            }
            None => {
                self.index.insert(token.clone(), self.entries.len());
                self.entries.push((token, count));
            }
        }
    }

    /// Occurrence count of `token`, if present.
    pub fn get(&self, token: &str) -> Option<u32> {
        self.index.get(token).map(|&i| self.entries[i].1)
    }

    /// Number of distinct tokens.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no token was extracted.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of all occurrence counts.
    pub fn total(&self) -> u64 {
        self.entries.iter().map(|(_, c)| u64::from(*c)).sum()
    }

    /// Distinct tokens with their counts, in first-seen order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> + '_ {
        self.entries.iter().map(|(t, c)| (t.as_str(), *c))
    }
}

impl IntoIterator for TokenCounts {
    type Item = (String, u32);
    type IntoIter = std::vec::IntoIter<(String, u32)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// Every n-gram tuple of order 1 through `max_tuple`, in emission order.
///
/// All unigrams in document order, then all bigrams, and so on. A sequence
/// of `L` tokens contributes `max(L - n + 1, 0)` tuples of order `n`.
/// `max_tuple` values of 0 and 1 both yield the unigrams.
pub fn tuples(tokens: &[String], max_tuple: usize) -> Vec<String> {
    let max_tuple = max_tuple.max(1);
    let mut out = Vec::new();
    for n in 1..=max_tuple {
        if n > tokens.len() {
            break;
        }
        out.extend(tokens.windows(n).map(|window| window.join(TUPLE_SEPARATOR)));
    }
    out
}

/// Extract token counts from `text`.
///
/// Deterministic and free of side effects: the result depends only on the
/// analyzer's output for `text` and on `max_tuple`.
pub fn extract(analyzer: &dyn Analyzer, text: &str, max_tuple: usize) -> TokenCounts {
    let base = analyzer.analyze(text);
    let mut counts = TokenCounts::new();
    if max_tuple <= 1 {
        for token in base {
            counts.add(token);
        }
    } else {
        for tuple in tuples(&base, max_tuple) {
            counts.add(tuple);
        }
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn whitespace(text: &str) -> Vec<String> {
        text.split_whitespace().map(str::to_string).collect()
    }

    fn words(n: usize) -> String {
        (0..n)
            .map(|i| format!("w{}", i))
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[test]
    fn test_analyzer_basic() {
        assert_eq!(StandardAnalyzer.analyze("Hello, World!"), vec!["hello", "world"]);
    }

    #[test]
    fn test_analyzer_stopwords() {
        assert_eq!(
            StandardAnalyzer.analyze("I am a test of the system"),
            vec!["i", "am", "test", "system"]
        );
    }

    #[test]
    fn test_analyzer_keeps_underscores_and_single_chars() {
        assert_eq!(
            StandardAnalyzer.analyze("in_url_1 In_URL_1_and_2, x 7"),
            vec!["in_url_1", "in_url_1_and_2", "x", "7"]
        );
    }

    #[test]
    fn test_analyzer_possessive_and_contraction() {
        assert_eq!(
            StandardAnalyzer.analyze("John\u{2019}s book don't"),
            vec!["john", "book", "dont"]
        );
    }

    #[test]
    fn test_analyzer_no_stemming() {
        assert_eq!(
            StandardAnalyzer.analyze("running runners"),
            vec!["running", "runners"]
        );
    }

    #[test]
    fn test_analyzer_empty() {
        assert!(StandardAnalyzer.analyze("").is_empty());
        assert!(StandardAnalyzer.analyze("...---...").is_empty());
    }

    #[test]
    fn test_unigram_count_matches_base_tokens() {
        let text = "apple banana apple cherry banana apple";
        let counts = extract(&whitespace, text, 1);
        assert_eq!(counts.total(), 6);
        assert_eq!(counts.len(), 3);
        assert_eq!(counts.get("apple"), Some(3));
        assert_eq!(counts.get("banana"), Some(2));
        assert_eq!(counts.get("cherry"), Some(1));
        let order: Vec<&str> = counts.iter().map(|(t, _)| t).collect();
        assert_eq!(order, vec!["apple", "banana", "cherry"]);
    }

    #[test]
    fn test_ten_tokens_three_orders() {
        let counts = extract(&whitespace, &words(10), 3);
        assert_eq!(counts.len(), 27);

        let keys: Vec<&str> = counts.iter().map(|(t, _)| t).collect();
        let unigrams: Vec<String> = (0..10).map(|i| format!("w{}", i)).collect();
        let bigrams: Vec<String> = (0..9).map(|i| format!("w{}_w{}", i, i + 1)).collect();
        let trigrams: Vec<String> = (0..8)
            .map(|i| format!("w{}_w{}_w{}", i, i + 1, i + 2))
            .collect();
        let expected: Vec<&str> = unigrams
            .iter()
            .chain(bigrams.iter())
            .chain(trigrams.iter())
            .map(String::as_str)
            .collect();
        assert_eq!(keys, expected);
        assert!(counts.iter().all(|(_, c)| c == 1));
    }

    #[test]
    fn test_max_tuple_longer_than_document() {
        let counts = extract(&whitespace, "a b", 5);
        let keys: Vec<&str> = counts.iter().map(|(t, _)| t).collect();
        assert_eq!(keys, vec!["a", "b", "a_b"]);
    }

    #[test]
    fn test_max_tuple_zero_behaves_like_one() {
        assert_eq!(extract(&whitespace, "x y x", 0), extract(&whitespace, "x y x", 1));
    }

    #[test]
    fn test_cross_order_collisions_merge() {
        // The bigram "new_york" and the unigram "new_york" are one key
        let counts = extract(&whitespace, "new york new_york", 2);
        assert_eq!(counts.get("new_york"), Some(2));
        assert_eq!(counts.get("york_new_york"), Some(1));
    }

    #[test]
    fn test_tuples_order_counts() {
        let tokens: Vec<String> = ["a", "b", "c", "d"].iter().map(|s| s.to_string()).collect();
        let out = tuples(&tokens, 4);
        assert_eq!(out.len(), 4 + 3 + 2 + 1);
        assert_eq!(out[4], "a_b");
        assert_eq!(out[9], "a_b_c_d");
        assert!(tuples(&[], 3).is_empty());
    }

    #[test]
    fn test_extract_is_deterministic() {
        let text = "the cat sat on the mat with the other cat";
        assert_eq!(
            extract(&StandardAnalyzer, text, 3),
            extract(&StandardAnalyzer, text, 3)
        );
    }

    #[test]
    fn test_token_counts_saturate() {
        let mut counts = TokenCounts::new();
        counts.add_count("x".into(), u32::MAX);
        counts.add("x".into());
        assert_eq!(counts.get("x"), Some(u32::MAX));
    }
}
