//! Index builder facade
//!
//! Drives one rebuild of a derived index:
//!
//! ```text
//! reset → spill observations → sort → reduce → publish (tmp + fsync + rename)
//! ```
//!
//! The builder exclusively owns its spill and sorted files for the duration
//! of a rebuild and holds an advisory lock on `<name>.lock` while doing so.
//! Lookups go through a shared [`ReaderHandle`] and keep answering from the
//! previously published file until the new one has been renamed into place
//! and the handle reopened.
//!
//! A failed rebuild removes its intermediate files and leaves the last
//! published index untouched.

use crate::compacted::CompactedWriter;
use crate::handle::ReaderHandle;
use crate::lookup::IndexReader;
use crate::reduce::reduce;
use crate::schema::{IndexSchema, Payload};
use crate::token_counter::TokenCounter;
use crate::whohas::WhoHas;
use derivex_core::{BuilderConfig, DocumentError, Error, Result, Timestamp};
use derivex_durability::{
    byte_order, remove_if_exists, temp_path, AtomicFile, ExternalSorter, PayloadCodec,
    RecordReader, SortStats, Sorter, SpillWriter,
};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Counters reported by a rebuild.
#[derive(Debug, Clone, Copy)]
pub struct RebuildStats {
    /// Corpus items turned into observations
    pub documents: u64,
    /// Corpus items skipped after a per-document failure
    pub skipped: u64,
    /// Observations spilled
    pub observations: u64,
    /// Distinct keys in the published index
    pub keys: u64,
    /// Sort counters
    pub sort: SortStats,
    /// Wall time of the whole rebuild
    pub elapsed: Duration,
    /// Freshness of the published file
    pub published: Timestamp,
}

/// Builder for one derived index.
pub struct IndexBuilder<S: IndexSchema> {
    config: BuilderConfig,
    schema: S,
    sorter: Box<dyn Sorter>,
    spill: Option<SpillWriter>,
    lock: Option<File>,
    handle: Arc<ReaderHandle<S>>,
}

impl IndexBuilder<WhoHas> {
    /// "Which documents contain token T" builder.
    pub fn who_has(config: BuilderConfig) -> Result<Self> {
        let schema = WhoHas::from_config(&config);
        Self::new(config, schema)
    }
}

impl IndexBuilder<TokenCounter> {
    /// Category-occurrence counter builder.
    pub fn token_counter(config: BuilderConfig) -> Result<Self> {
        let schema = TokenCounter::from_config(&config);
        Self::new(config, schema)
    }
}

impl<S: IndexSchema> IndexBuilder<S> {
    /// Validate `config`, create the data directory and wire the external
    /// sorter.
    pub fn new(config: BuilderConfig, schema: S) -> Result<Self> {
        config.validate()?;
        std::fs::create_dir_all(&config.data_dir)?;
        std::fs::create_dir_all(config.scratch_dir())?;

        let sorter = Box::new(ExternalSorter::from_config(&config));
        let handle = Arc::new(ReaderHandle::new(
            config.data_dir.join(format!("{}.idx", config.name)),
        ));
        Ok(IndexBuilder {
            config,
            schema,
            sorter,
            spill: None,
            lock: None,
            handle,
        })
    }

    /// Replace the sort strategy (builder pattern).
    pub fn with_sorter(mut self, sorter: impl Sorter + 'static) -> Self {
        self.sorter = Box::new(sorter);
        self
    }

    /// Builder configuration.
    pub fn config(&self) -> &BuilderConfig {
        &self.config
    }

    /// Index schema.
    pub fn schema(&self) -> &S {
        &self.schema
    }

    fn file(&self, suffix: &str) -> PathBuf {
        self.config
            .data_dir
            .join(format!("{}.{}", self.config.name, suffix))
    }

    /// Unsorted observations of the rebuild in progress.
    pub fn spill_path(&self) -> PathBuf {
        self.file("spill")
    }

    /// Sorted observations of the rebuild in progress.
    pub fn sorted_path(&self) -> PathBuf {
        self.file("sorted")
    }

    /// Published index.
    pub fn index_path(&self) -> &Path {
        self.handle.path()
    }

    fn lock_path(&self) -> PathBuf {
        self.file("lock")
    }

    /// Start a fresh rebuild.
    ///
    /// Takes the rebuild lock, deletes leftover spill, sorted and temporary
    /// files and opens an empty spill file. Calling it again discards
    /// everything spilled so far.
    pub fn reset(&mut self) -> Result<()> {
        self.acquire_lock()?;
        self.spill = None;
        for path in [self.spill_path(), self.sorted_path(), temp_path(self.index_path())] {
            if remove_if_exists(&path)? {
                debug!(target: "derivex::build", path = ?path, "Removed leftover file");
            }
        }
        self.spill = Some(SpillWriter::create(
            &self.spill_path(),
            <S::Codec as PayloadCodec>::SCHEMA_TAG,
        )?);
        Ok(())
    }

    /// Spill one observation.
    pub fn add_observation(&mut self, key: &str, payload: &Payload<S>) -> Result<()> {
        let spill = self
            .spill
            .as_mut()
            .ok_or_else(|| Error::InvalidState("add_observation called before reset".into()))?;
        spill.append::<S::Codec>(key, payload)
    }

    /// Rebuild the index from `corpus` and publish it.
    ///
    /// Items that fail to load, or that the schema rejects, are logged and
    /// skipped. Any other failure aborts the rebuild, removes the
    /// intermediate files and leaves the previous index in place.
    pub fn rebuild<I>(&mut self, corpus: I) -> Result<RebuildStats>
    where
        I: IntoIterator<Item = std::result::Result<S::Input, DocumentError>>,
    {
        let started = Instant::now();
        info!(
            target: "derivex::build",
            index = %self.config.name,
            kind = S::KIND,
            sorter = self.sorter.name(),
            "Rebuild started"
        );

        let result = self.spill_corpus(corpus).and_then(|(documents, skipped)| {
            let mut stats = self.publish_spilled()?;
            stats.documents = documents;
            stats.skipped = skipped;
            stats.elapsed = started.elapsed();
            Ok(stats)
        });

        match &result {
            Ok(stats) => info!(
                target: "derivex::build",
                index = %self.config.name,
                documents = stats.documents,
                skipped = stats.skipped,
                observations = stats.observations,
                keys = stats.keys,
                elapsed_ms = stats.elapsed.as_millis() as u64,
                "Rebuild complete"
            ),
            Err(e) => {
                warn!(
                    target: "derivex::build",
                    index = %self.config.name,
                    error = %e,
                    "Rebuild failed, previous index kept"
                );
                self.abandon();
            }
        }
        result
    }

    fn spill_corpus<I>(&mut self, corpus: I) -> Result<(u64, u64)>
    where
        I: IntoIterator<Item = std::result::Result<S::Input, DocumentError>>,
    {
        self.reset()?;
        let mut documents = 0u64;
        let mut skipped = 0u64;

        for item in corpus {
            match item.and_then(|input| self.schema.observe(&input)) {
                Ok(observations) => {
                    documents += 1;
                    for (key, payload) in observations {
                        self.add_observation(&key, &payload)?;
                    }
                }
                Err(e) => {
                    skipped += 1;
                    warn!(
                        target: "derivex::build",
                        index = %self.config.name,
                        document = %e.id,
                        reason = %e.reason,
                        "Skipping document"
                    );
                }
            }
        }
        Ok((documents, skipped))
    }

    /// Sort, reduce and publish everything spilled since [`IndexBuilder::reset`].
    ///
    /// For callers driving [`IndexBuilder::add_observation`] directly.
    pub fn publish(&mut self) -> Result<RebuildStats> {
        let result = self.publish_spilled();
        if result.is_err() {
            self.abandon();
        }
        result
    }

    fn publish_spilled(&mut self) -> Result<RebuildStats> {
        let started = Instant::now();
        let spill = self
            .spill
            .take()
            .ok_or_else(|| Error::InvalidState("publish called before reset".into()))?;
        let summary = spill.finish()?;

        let spill_path = self.spill_path();
        let sorted_path = self.sorted_path();
        let sort = self.sorter.sort(&spill_path, &sorted_path, byte_order)?;
        debug!(
            target: "derivex::build",
            index = %self.config.name,
            sorter = self.sorter.name(),
            records = sort.records,
            runs = sort.runs,
            merge_passes = sort.merge_passes,
            "Spill sorted"
        );

        let mut sorted = RecordReader::open(&sorted_path)?;
        let mut out = CompactedWriter::new(AtomicFile::create(self.index_path())?);
        let reduced = reduce::<S, _>(&mut sorted, &mut out)?;
        drop(sorted);
        let (_, file) = out.finish()?;
        file.commit()?;

        // The new generation is live from here on. Cleanup and reopen
        // failures are logged, not returned.
        let reopened = self.handle.reopen();
        for path in [&spill_path, &sorted_path] {
            if let Err(e) = remove_if_exists(path) {
                warn!(
                    target: "derivex::build",
                    path = ?path,
                    error = %e,
                    "Failed to remove intermediate file"
                );
            }
        }
        self.release_lock();

        let published = match reopened {
            Ok(Some(reader)) => reader.freshness(),
            Ok(None) => return Err(Error::InvalidState("published index vanished".into())),
            Err(e) => {
                warn!(
                    target: "derivex::build",
                    index = %self.config.name,
                    error = %e,
                    "Published index could not be reopened"
                );
                self.freshness().ok().flatten().unwrap_or_else(Timestamp::now)
            }
        };
        info!(
            target: "derivex::build",
            index = %self.config.name,
            keys = reduced.keys,
            records = reduced.records,
            published = %published,
            "Index published"
        );

        Ok(RebuildStats {
            documents: 0,
            skipped: 0,
            observations: summary.records,
            keys: reduced.keys,
            sort,
            elapsed: started.elapsed(),
            published,
        })
    }

    /// Drop the rebuild in progress.
    fn abandon(&mut self) {
        self.spill = None;
        if self.lock.is_none() {
            // Intermediate files belong to whoever holds the lock
            return;
        }
        for path in [self.spill_path(), self.sorted_path(), temp_path(self.index_path())] {
            if let Err(e) = remove_if_exists(&path) {
                warn!(
                    target: "derivex::build",
                    path = ?path,
                    error = %e,
                    "Failed to remove intermediate file"
                );
            }
        }
        self.release_lock();
    }

    fn acquire_lock(&mut self) -> Result<()> {
        if self.lock.is_some() {
            return Ok(());
        }
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(self.lock_path())?;
        file.try_lock_exclusive().map_err(|_| {
            Error::Locked(format!(
                "index '{}' in '{}' is being rebuilt by another builder",
                self.config.name,
                self.config.data_dir.display()
            ))
        })?;
        self.lock = Some(file);
        Ok(())
    }

    fn release_lock(&mut self) {
        if let Some(file) = self.lock.take() {
            if let Err(e) = file.unlock() {
                warn!(target: "derivex::build", error = %e, "Failed to release rebuild lock");
            }
        }
    }

    /// Shared reader handle, for query threads.
    pub fn handle(&self) -> Arc<ReaderHandle<S>> {
        Arc::clone(&self.handle)
    }

    /// Current reader, `None` if the index was never built.
    pub fn reader(&self) -> Result<Option<Arc<IndexReader<S>>>> {
        self.handle.get()
    }

    /// Look `key` up in the published index.
    ///
    /// A miss and a never-built index both answer `None`; see
    /// [`IndexBuilder::is_built`].
    pub fn lookup(&self, key: &str) -> Result<Option<S::Aggregate>> {
        self.handle.lookup(key)
    }

    /// Last-modified time of the published index, `None` if not built.
    pub fn freshness(&self) -> Result<Option<Timestamp>> {
        match std::fs::metadata(self.index_path()) {
            Ok(metadata) => Ok(Some(Timestamp::from_system_time(metadata.modified()?))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// True once an index has been published.
    pub fn is_built(&self) -> bool {
        self.index_path().is_file()
    }
}

impl<S: IndexSchema + std::fmt::Debug> std::fmt::Debug for IndexBuilder<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexBuilder")
            .field("name", &self.config.name)
            .field("schema", &self.schema)
            .field("sorter", &self.sorter.name())
            .field("rebuilding", &self.spill.is_some())
            .finish()
    }
}
