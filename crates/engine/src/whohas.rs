//! "Which documents contain token T" index.
//!
//! Every distinct token of a document yields one observation carrying the
//! singleton set `{document id}`. Equal keys merge by set union, so the
//! published entry for a token lists every document containing it.
//!
//! An aggregate grows with the number of documents sharing its key. Very
//! common tokens therefore hold large sets in memory during the reduce pass,
//! even though the pass is otherwise O(one key).

use crate::schema::{IndexSchema, Payload};
use crate::tokenizer::{extract, StandardAnalyzer};
use derivex_core::{Analyzer, BuilderConfig, Document, DocumentError};
use derivex_durability::UrlSetCodec;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// Inverted document-membership schema.
#[derive(Clone)]
pub struct WhoHas {
    analyzer: Arc<dyn Analyzer>,
    max_tuple: usize,
}

impl WhoHas {
    /// Schema using the [`StandardAnalyzer`].
    pub fn new(max_tuple: usize) -> Self {
        Self::with_analyzer(StandardAnalyzer, max_tuple)
    }

    /// Schema using a caller-supplied analyzer.
    pub fn with_analyzer(analyzer: impl Analyzer + 'static, max_tuple: usize) -> Self {
        WhoHas {
            analyzer: Arc::new(analyzer),
            max_tuple,
        }
    }

    /// Schema configured from a builder config.
    pub fn from_config(config: &BuilderConfig) -> Self {
        Self::new(config.max_tuple)
    }

    /// Longest n-gram emitted.
    pub fn max_tuple(&self) -> usize {
        self.max_tuple
    }
}

impl fmt::Debug for WhoHas {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WhoHas")
            .field("max_tuple", &self.max_tuple)
            .finish_non_exhaustive()
    }
}

impl IndexSchema for WhoHas {
    type Input = Document;
    type Codec = UrlSetCodec;
    type Aggregate = BTreeSet<String>;

    const KIND: &'static str = "who_has";

    fn observe(&self, doc: &Document) -> Result<Vec<(String, Payload<Self>)>, DocumentError> {
        if doc.id.is_empty() {
            return Err(DocumentError::new("", "document has an empty id"));
        }
        let counts = extract(self.analyzer.as_ref(), &doc.text, self.max_tuple);
        Ok(counts
            .into_iter()
            .map(|(token, _)| (token, BTreeSet::from([doc.id.clone()])))
            .collect())
    }

    fn seed(payload: BTreeSet<String>) -> BTreeSet<String> {
        payload
    }

    fn merge(aggregate: &mut BTreeSet<String>, payload: BTreeSet<String>) {
        aggregate.extend(payload);
    }

    fn format_values(aggregate: &BTreeSet<String>) -> Vec<String> {
        aggregate.iter().cloned().collect()
    }

    fn parse_values(values: Vec<String>) -> Result<BTreeSet<String>, String> {
        Ok(values.into_iter().collect())
    }
}
