//! Shared, lazily opened index reader.
//!
//! A [`ReaderHandle`] is owned by a builder and handed to any number of
//! query threads. The first lookup opens the published file exactly once,
//! behind a `OnceCell` guard, no matter how many threads race to it. After a
//! rebuild the builder calls [`ReaderHandle::reopen`], which swaps in a
//! reader for the new generation; readers already handed out keep serving
//! the generation they opened.

use crate::lookup::IndexReader;
use crate::schema::IndexSchema;
use derivex_core::{Error, Result, Timestamp};
use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

type Slot<S> = Arc<OnceCell<Arc<IndexReader<S>>>>;

/// Lazily opened, explicitly refreshed reader for one index path.
pub struct ReaderHandle<S: IndexSchema> {
    path: PathBuf,
    slot: RwLock<Slot<S>>,
}

impl<S: IndexSchema> ReaderHandle<S> {
    /// Handle for the index published at `path`. Nothing is opened yet.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        ReaderHandle {
            path: path.into(),
            slot: RwLock::new(Arc::new(OnceCell::new())),
        }
    }

    /// Path of the published index.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current reader, opening it on first use.
    ///
    /// Returns `None` while no index has been published. A missing file is
    /// not cached, so a later call picks up a file published since.
    pub fn get(&self) -> Result<Option<Arc<IndexReader<S>>>> {
        let slot = self.slot.read().clone();
        match slot.get_or_try_init(|| IndexReader::open(&self.path).map(Arc::new)) {
            Ok(reader) => Ok(Some(Arc::clone(reader))),
            Err(Error::Io(e)) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Replace the current reader with one for the file now at the path.
    ///
    /// If the new file cannot be opened the previous generation is dropped
    /// as well, and the next [`ReaderHandle::get`] tries again.
    pub fn reopen(&self) -> Result<Option<Arc<IndexReader<S>>>> {
        let (slot, reader) = match IndexReader::open(&self.path) {
            Ok(reader) => {
                let reader = Arc::new(reader);
                (OnceCell::with_value(Arc::clone(&reader)), Some(reader))
            }
            Err(Error::Io(e)) if e.kind() == io::ErrorKind::NotFound => (OnceCell::new(), None),
            Err(e) => {
                // Drop the old generation; the next get retries the open
                *self.slot.write() = Arc::new(OnceCell::new());
                return Err(e);
            }
        };
        *self.slot.write() = Arc::new(slot);
        debug!(
            target: "derivex::lookup",
            kind = S::KIND,
            path = ?self.path,
            present = reader.is_some(),
            "Reader reopened"
        );
        Ok(reader)
    }

    /// Look `key` up in the current generation.
    ///
    /// An index that was never built answers `None` like an absent key;
    /// use [`ReaderHandle::freshness`] to tell the two apart.
    pub fn lookup(&self, key: &str) -> Result<Option<S::Aggregate>> {
        match self.get()? {
            Some(reader) => reader.lookup(key),
            None => Ok(None),
        }
    }

    /// Last-modified time of the current generation, `None` if not built.
    pub fn freshness(&self) -> Result<Option<Timestamp>> {
        Ok(self.get()?.map(|reader| reader.freshness()))
    }
}

impl<S: IndexSchema> std::fmt::Debug for ReaderHandle<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReaderHandle")
            .field("kind", &S::KIND)
            .field("path", &self.path)
            .finish()
    }
}
