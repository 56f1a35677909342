//! Per-token category-occurrence counter.
//!
//! Training input for a naive-Bayes text classifier: for every token, how
//! often it was seen inside the category and how often outside.
//!
//! # Overflow policy
//!
//! Observation deltas travel through spill files as `i16`. A document
//! contributing more than `i16::MAX` occurrences of one token is clamped to
//! `i16::MAX`. Aggregates are widened to `i64` and merged with saturating
//! addition, so totals stick at `i64::MAX` instead of wrapping.

use crate::schema::{IndexSchema, Payload};
use crate::tokenizer::{extract, StandardAnalyzer};
use derivex_core::{Analyzer, BuilderConfig, CounterMode, DocumentError, LabeledDocument};
use derivex_durability::{CounterDelta, CounterDeltaCodec};
use std::fmt;
use std::sync::Arc;

/// Category counters of one token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct CategoryCounts {
    /// Count inside the category
    pub in_category: i64,
    /// Count outside the category
    pub out_of_category: i64,
}

impl CategoryCounts {
    /// Create counts.
    pub fn new(in_category: i64, out_of_category: i64) -> Self {
        CategoryCounts {
            in_category,
            out_of_category,
        }
    }

    /// Add one observation delta, saturating at the `i64` bounds.
    pub fn add(&mut self, delta: CounterDelta) {
        self.in_category = self.in_category.saturating_add(i64::from(delta.in_category));
        self.out_of_category = self
            .out_of_category
            .saturating_add(i64::from(delta.out_of_category));
    }

    /// Both sides together, saturating.
    pub fn total(&self) -> i64 {
        self.in_category.saturating_add(self.out_of_category)
    }
}

impl From<CounterDelta> for CategoryCounts {
    fn from(delta: CounterDelta) -> Self {
        CategoryCounts::new(
            i64::from(delta.in_category),
            i64::from(delta.out_of_category),
        )
    }
}

/// Category-occurrence counter schema.
#[derive(Clone)]
pub struct TokenCounter {
    analyzer: Arc<dyn Analyzer>,
    max_tuple: usize,
    mode: CounterMode,
}

impl TokenCounter {
    /// Counter using the [`StandardAnalyzer`], counting documents.
    pub fn new(max_tuple: usize) -> Self {
        Self::with_analyzer(StandardAnalyzer, max_tuple)
    }

    /// Counter using a caller-supplied analyzer, counting documents.
    pub fn with_analyzer(analyzer: impl Analyzer + 'static, max_tuple: usize) -> Self {
        TokenCounter {
            analyzer: Arc::new(analyzer),
            max_tuple,
            mode: CounterMode::Documents,
        }
    }

    /// Counter configured from a builder config.
    pub fn from_config(config: &BuilderConfig) -> Self {
        Self::new(config.max_tuple).with_mode(config.counter.mode)
    }

    /// Set the counting mode (builder pattern).
    pub fn with_mode(mut self, mode: CounterMode) -> Self {
        self.mode = mode;
        self
    }

    /// Counting mode.
    pub fn mode(&self) -> CounterMode {
        self.mode
    }
}

impl fmt::Debug for TokenCounter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCounter")
            .field("max_tuple", &self.max_tuple)
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

impl IndexSchema for TokenCounter {
    type Input = LabeledDocument;
    type Codec = CounterDeltaCodec;
    type Aggregate = CategoryCounts;

    const KIND: &'static str = "token_counter";

    fn observe(
        &self,
        input: &LabeledDocument,
    ) -> Result<Vec<(String, Payload<Self>)>, DocumentError> {
        let counts = extract(self.analyzer.as_ref(), &input.document.text, self.max_tuple);
        Ok(counts
            .into_iter()
            .map(|(token, occurrences)| {
                let amount = match self.mode {
                    CounterMode::Documents => 1,
                    CounterMode::Occurrences => occurrences,
                };
                (token, CounterDelta::from_count(input.in_category, amount))
            })
            .collect())
    }

    fn seed(payload: CounterDelta) -> CategoryCounts {
        CategoryCounts::from(payload)
    }

    fn merge(aggregate: &mut CategoryCounts, payload: CounterDelta) {
        aggregate.add(payload);
    }

    fn format_values(aggregate: &CategoryCounts) -> Vec<String> {
        vec![
            aggregate.in_category.to_string(),
            aggregate.out_of_category.to_string(),
        ]
    }

    fn parse_values(values: Vec<String>) -> Result<CategoryCounts, String> {
        match values.as_slice() {
            [cat, non_cat] => {
                let cat = cat
                    .parse::<i64>()
                    .map_err(|e| format!("bad in-category count '{}': {}", cat, e))?;
                let non_cat = non_cat
                    .parse::<i64>()
                    .map_err(|e| format!("bad out-of-category count '{}': {}", non_cat, e))?;
                Ok(CategoryCounts::new(cat, non_cat))
            }
            other => Err(format!("expected 2 counts, found {}", other.len())),
        }
    }
}
