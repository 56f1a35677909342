//! derivex - out-of-core builder for derived, key-sorted indexes
//!
//! A rebuild turns a corpus into a compact, randomly queryable index without
//! holding the corpus or the index in memory:
//!
//! ```text
//! tokenize → spill (key, payload) → external sort → reduce-by-key → publish
//! ```
//!
//! The published file is sorted text searched in place by binary search.
//! Two index kinds ship with the crate:
//! - [`WhoHas`]: token → set of documents containing it
//! - [`TokenCounter`]: token → in/out-of-category occurrence counts
//!
//! # Quick Start
//!
//! ```no_run
//! use derivex::{BuilderConfig, DirectoryCorpus, IndexBuilder};
//! use std::path::Path;
//!
//! # fn main() -> derivex::Result<()> {
//! let config = BuilderConfig::new("/var/lib/derivex", "who_has").with_max_tuple(2);
//! let mut builder = IndexBuilder::who_has(config)?;
//! builder.rebuild(DirectoryCorpus::open(Path::new("/srv/pages"))?)?;
//!
//! if let Some(urls) = builder.lookup("solar_panel")? {
//!     println!("{} documents", urls.len());
//! }
//! # Ok(())
//! # }
//! ```

pub use derivex_core::{
    Analyzer, BuilderConfig, CounterConfig, CounterMode, Document, DocumentError, Error,
    LabeledDocument, Result, SortConfig, Timestamp, CONFIG_FILE_NAME,
};
pub use derivex_durability::{ExternalSorter, InMemorySorter, KeyComparator, SortStats, Sorter};
pub use derivex_engine::{
    extract, CategoryCounts, DirectoryCorpus, IndexBuilder, IndexReader, IndexSchema, Labeled,
    RebuildStats, ReaderHandle, StandardAnalyzer, TokenCounter, TokenCounts, WhoHas,
};

/// Lower-level building blocks.
pub mod pipeline {
    pub use derivex_durability::{
        byte_order, AtomicFile, CodecError, CounterDelta, CounterDeltaCodec, PayloadCodec,
        Record, RecordReader, SpillWriter, UrlSetCodec,
    };
    pub use derivex_engine::compacted;
    pub use derivex_engine::{reduce, CompactedWriter, ReduceStats};
}
