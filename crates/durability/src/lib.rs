//! Durability layer for derivex
//!
//! This crate handles everything a rebuild writes to disk before the result
//! is published:
//!
//! - Record format: length-prefixed, CRC-checked spill records
//! - Payload codecs: typed encoding for each builder's observation payload
//! - Spill writer and record reader with bounded memory
//! - Sort strategies: external chunk-sort-and-merge, in-memory for tests
//! - Atomic publication: temp file + fsync + rename

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod codec;
pub mod format;
pub mod publish;
pub mod sort;
pub mod spill;

pub use codec::{CodecError, CounterDelta, CounterDeltaCodec, PayloadCodec, Record, UrlSetCodec};
pub use format::{RawRecord, SpillHeader};
pub use publish::{remove_if_exists, temp_path, AtomicFile};
pub use sort::{byte_order, ExternalSorter, InMemorySorter, KeyComparator, SortStats, Sorter};
pub use spill::{RecordReader, SpillSummary, SpillWriter};
