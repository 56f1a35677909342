//! Capability traits consumed by the build pipeline

/// Word-level analyzer.
///
/// Turns raw text into the ordered sequence of normalized base tokens
/// (lowercased words with stop-words removed). The tokenizer builds n-gram
/// keys on top of whatever an analyzer returns, so implementations must be
/// deterministic and must not depend on thread-local or global state.
pub trait Analyzer: Send + Sync {
    /// Normalize `text` into base tokens, preserving document order.
    fn analyze(&self, text: &str) -> Vec<String>;
}

impl<F> Analyzer for F
where
    F: Fn(&str) -> Vec<String> + Send + Sync,
{
    fn analyze(&self, text: &str) -> Vec<String> {
        self(text)
    }
}
