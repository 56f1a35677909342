//! Derived-index engine for derivex
//!
//! This crate turns a corpus into a published, point-queryable index:
//! - Tokenizer: analyzer output → counted n-gram keys
//! - Schemas: WhoHas (token → documents) and TokenCounter (token → category counts)
//! - Reduce: fold a sorted spill into one entry per key
//! - Compacted format: the published sorted text file
//! - Lookup: binary search over the mapped file, plus a shared reader handle
//! - Builder: reset → spill → sort → reduce → publish
//!
//! ```no_run
//! use derivex_core::{BuilderConfig, Document};
//! use derivex_engine::IndexBuilder;
//!
//! # fn main() -> derivex_core::Result<()> {
//! let mut builder = IndexBuilder::who_has(BuilderConfig::new("/var/lib/derivex", "who_has"))?;
//! builder.rebuild(vec![Ok(Document::new("https://example.com/", "hello world"))])?;
//! assert!(builder.lookup("hello")?.is_some());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod builder;
pub mod compacted;
pub mod corpus;
pub mod handle;
pub mod lookup;
pub mod reduce;
pub mod schema;
pub mod token_counter;
pub mod tokenizer;
pub mod whohas;

pub use builder::{IndexBuilder, RebuildStats};
pub use compacted::{CompactedStats, CompactedWriter};
pub use corpus::{DirectoryCorpus, Labeled};
pub use handle::ReaderHandle;
pub use lookup::{Entries, IndexReader};
pub use reduce::{reduce, ReduceStats};
pub use schema::{IndexSchema, Payload};
pub use token_counter::{CategoryCounts, TokenCounter};
pub use tokenizer::{extract, tuples, StandardAnalyzer, TokenCounts};
pub use whohas::WhoHas;
