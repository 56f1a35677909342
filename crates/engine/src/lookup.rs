//! Point-lookup reader over a published compacted index file.
//!
//! The file is memory-mapped and searched in place. Lines have variable
//! length, so the binary search works on byte ranges: each probe picks the
//! middle byte of the remaining range, backs up to the start of the line
//! containing it, decodes that line's key and narrows the range to one side
//! of the line. Only the probed lines are ever decoded.
//!
//! A reader is bound to the file it opened. Publishing a new index renames
//! a new file over the path; existing readers keep serving the old
//! generation until they are replaced (see [`crate::handle::ReaderHandle`]).

use crate::compacted::{parse_line, parse_values, split_line, unescape};
use crate::schema::IndexSchema;
use derivex_core::{Error, Result, Timestamp};
use memmap2::Mmap;
use std::cmp::Ordering;
use std::fs::File;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use tracing::trace;

/// Read-only view of one published index generation.
pub struct IndexReader<S: IndexSchema> {
    path: PathBuf,
    /// `None` for an empty file, which cannot be mapped
    map: Option<Mmap>,
    modified: Timestamp,
    _schema: PhantomData<fn() -> S>,
}

impl<S: IndexSchema> IndexReader<S> {
    /// Open and map a published index file.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let metadata = file.metadata()?;
        let modified = Timestamp::from_system_time(metadata.modified()?);
        let map = if metadata.len() == 0 {
            None
        } else {
            // Published files are only ever replaced by rename, never
            // modified in place, so the mapping stays valid.
            Some(unsafe { Mmap::map(&file)? })
        };
        Ok(IndexReader {
            path: path.to_path_buf(),
            map,
            modified,
            _schema: PhantomData,
        })
    }

    fn data(&self) -> &[u8] {
        self.map.as_deref().unwrap_or(&[])
    }

    /// Aggregate stored for `key`, or `None` when the key is absent.
    pub fn lookup(&self, key: &str) -> Result<Option<S::Aggregate>> {
        let data = self.data();
        let target = key.as_bytes();
        // `lo` is always a line start; `hi` is a line start or the end
        let mut lo = 0usize;
        let mut hi = data.len();
        let mut probes = 0u32;

        while lo < hi {
            probes += 1;
            let mid = lo + (hi - lo) / 2;
            let start = match data[lo..mid].iter().rposition(|&b| b == b'\n') {
                Some(i) => lo + i + 1,
                None => lo,
            };
            let end = match data[start..hi].iter().position(|&b| b == b'\n') {
                Some(i) => start + i,
                None => hi,
            };

            let (raw_key, values) = split_line(&data[start..end], start as u64)?;
            let probe = unescape(raw_key, start as u64)?;
            match probe.as_bytes().cmp(target) {
                Ordering::Equal => {
                    trace!(target: "derivex::lookup", key, probes, "Hit");
                    let values = parse_values(values, start as u64)?;
                    let aggregate =
                        S::parse_values(values).map_err(|e| Error::corrupt(start as u64, e))?;
                    return Ok(Some(aggregate));
                }
                Ordering::Less => lo = end + 1,
                Ordering::Greater => hi = start,
            }
        }

        trace!(target: "derivex::lookup", key, probes, "Miss");
        Ok(None)
    }

    /// Sequential scan over every entry, in key order.
    pub fn entries(&self) -> Entries<'_, S> {
        Entries {
            data: self.data(),
            pos: 0,
            _schema: PhantomData,
        }
    }

    /// Last-modified time of the file this reader opened.
    pub fn freshness(&self) -> Timestamp {
        self.modified
    }

    /// Size of the mapped file in bytes.
    pub fn len_bytes(&self) -> u64 {
        self.data().len() as u64
    }

    /// True when the index holds no entries.
    pub fn is_empty(&self) -> bool {
        self.data().is_empty()
    }

    /// Path the reader was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl<S: IndexSchema> std::fmt::Debug for IndexReader<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexReader")
            .field("kind", &S::KIND)
            .field("path", &self.path)
            .field("len_bytes", &self.len_bytes())
            .field("modified", &self.modified)
            .finish()
    }
}

/// Iterator returned by [`IndexReader::entries`].
pub struct Entries<'a, S: IndexSchema> {
    data: &'a [u8],
    pos: usize,
    _schema: PhantomData<fn() -> S>,
}

impl<S: IndexSchema> Iterator for Entries<'_, S> {
    type Item = Result<(String, S::Aggregate)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos >= self.data.len() {
            return None;
        }
        let start = self.pos;
        let end = match self.data[start..].iter().position(|&b| b == b'\n') {
            Some(i) => start + i,
            None => self.data.len(),
        };
        self.pos = end + 1;

        let entry = parse_line(&self.data[start..end], start as u64).and_then(|(key, values)| {
            S::parse_values(values)
                .map(|aggregate| (key, aggregate))
                .map_err(|e| Error::corrupt(start as u64, e))
        });
        if entry.is_err() {
            // Stop after the first corrupt line
            self.pos = self.data.len();
        }
        Some(entry)
    }
}
