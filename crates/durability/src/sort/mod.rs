//! Sort strategies for spill files.
//!
//! The build pipeline never sorts records itself: it hands a spill file and
//! a key comparator to a [`Sorter`]. Production wires the bounded-memory
//! [`ExternalSorter`]; tests may inject the [`InMemorySorter`].
//!
//! Contract for every implementation:
//! - the output holds the same multiset of records as the input
//! - records are ordered non-decreasing by key under the comparator
//! - the output header carries the input's schema tag
//! - read/write failures surface as [`derivex_core::Error::Io`]
//!
//! Order among records with equal keys is unspecified.

pub mod external;
pub mod memory;

pub use external::ExternalSorter;
pub use memory::InMemorySorter;

use derivex_core::Result;
use std::cmp::Ordering;
use std::path::Path;

/// Total order over record keys, compared as raw UTF-8 bytes.
pub type KeyComparator = fn(&[u8], &[u8]) -> Ordering;

/// Lexicographic byte order, the order published indexes use.
pub fn byte_order(a: &[u8], b: &[u8]) -> Ordering {
    a.cmp(b)
}

/// Counters reported by a sort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SortStats {
    /// Records sorted
    pub records: u64,
    /// Sorted runs produced before merging
    pub runs: usize,
    /// Merge passes needed to reduce the runs to one file
    pub merge_passes: usize,
}

/// Sort strategy over spill files.
pub trait Sorter: Send + Sync {
    /// Sort `input` into `output` by key.
    ///
    /// `output` is created or truncated. `input` is left untouched.
    fn sort(&self, input: &Path, output: &Path, cmp: KeyComparator) -> Result<SortStats>;

    /// Short name for logs.
    fn name(&self) -> &'static str;
}
