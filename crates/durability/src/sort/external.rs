//! Bounded-memory external merge sort.
//!
//! 1. Read the input in chunks of `chunk_records`, sort each chunk in memory
//!    and write it out as a sorted run.
//! 2. While more than `fan_in` runs remain, k-way merge groups of `fan_in`
//!    runs into longer runs.
//! 3. K-way merge the remaining runs into the output.
//!
//! Memory holds at most one chunk while splitting and one record per run
//! while merging, independent of input size. Run files live in the scratch
//! directory and are removed when no longer needed, including on error.

use super::{KeyComparator, SortStats, Sorter};
use crate::format::RawRecord;
use crate::spill::{RecordReader, SpillWriter};
use derivex_core::{BuilderConfig, Result};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::path::{Path, PathBuf};

/// Chunk-sort-then-merge sorter.
#[derive(Debug, Clone)]
pub struct ExternalSorter {
    chunk_records: usize,
    fan_in: usize,
    scratch_dir: PathBuf,
}

impl ExternalSorter {
    /// Create a sorter. `chunk_records` is raised to 1 and `fan_in` to 2 if lower.
    pub fn new(scratch_dir: impl Into<PathBuf>, chunk_records: usize, fan_in: usize) -> Self {
        ExternalSorter {
            chunk_records: chunk_records.max(1),
            fan_in: fan_in.max(2),
            scratch_dir: scratch_dir.into(),
        }
    }

    /// Sorter configured from a builder's `[sort]` settings.
    pub fn from_config(config: &BuilderConfig) -> Self {
        Self::new(
            config.scratch_dir(),
            config.sort.chunk_records,
            config.sort.fan_in,
        )
    }

    /// Records held in memory per run.
    pub fn chunk_records(&self) -> usize {
        self.chunk_records
    }

    /// Runs merged per pass.
    pub fn fan_in(&self) -> usize {
        self.fan_in
    }

    fn run_path(&self, stem: &str, pass: usize, index: usize) -> PathBuf {
        self.scratch_dir
            .join(format!("{}.run-{}-{}", stem, pass, index))
    }
}

impl Sorter for ExternalSorter {
    fn sort(&self, input: &Path, output: &Path, cmp: KeyComparator) -> Result<SortStats> {
        std::fs::create_dir_all(&self.scratch_dir)?;
        let stem = output
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "sort".to_string());

        let mut reader = RecordReader::open(input)?;
        let schema_tag = reader.header().schema_tag;

        let mut runs = RunFiles::default();
        let mut chunk: Vec<RawRecord> = Vec::with_capacity(self.chunk_records.min(4096));
        let mut records = 0u64;

        while let Some(record) = reader.next_raw()? {
            chunk.push(record);
            records += 1;
            if chunk.len() >= self.chunk_records {
                let path = self.run_path(&stem, 0, runs.len());
                runs.push(path.clone());
                write_run(&path, schema_tag, &mut chunk, cmp)?;
            }
        }
        drop(reader);

        if runs.is_empty() {
            // Everything fit in one chunk
            write_run(output, schema_tag, &mut chunk, cmp)?;
            return Ok(SortStats {
                records,
                runs: usize::from(records > 0),
                merge_passes: 0,
            });
        }

        if !chunk.is_empty() {
            let path = self.run_path(&stem, 0, runs.len());
            runs.push(path.clone());
            write_run(&path, schema_tag, &mut chunk, cmp)?;
        }
        drop(chunk);

        let initial_runs = runs.len();
        let mut pass = 0;
        while runs.len() > self.fan_in {
            pass += 1;
            let mut next = RunFiles::default();
            for (index, group) in runs.paths.chunks(self.fan_in).enumerate() {
                let path = self.run_path(&stem, pass, index);
                next.push(path.clone());
                merge_runs(group, &path, schema_tag, cmp)?;
            }
            tracing::debug!(
                target: "derivex::sort",
                pass,
                runs_in = runs.len(),
                runs_out = next.len(),
                "Merge pass complete"
            );
            runs = next;
        }
        merge_runs(&runs.paths, output, schema_tag, cmp)?;

        Ok(SortStats {
            records,
            runs: initial_runs,
            merge_passes: pass + 1,
        })
    }

    fn name(&self) -> &'static str {
        "external"
    }
}

/// Sort a chunk in memory and write it as one run. Leaves `chunk` empty.
fn write_run(
    path: &Path,
    schema_tag: u8,
    chunk: &mut Vec<RawRecord>,
    cmp: KeyComparator,
) -> Result<()> {
    chunk.sort_by(|a, b| cmp(a.key.as_bytes(), b.key.as_bytes()));
    let mut writer = SpillWriter::create(path, schema_tag)?;
    for record in chunk.iter() {
        writer.append_raw(&record.key, &record.payload)?;
    }
    let summary = writer.finish()?;
    tracing::debug!(
        target: "derivex::sort",
        path = %path.display(),
        records = summary.records,
        bytes = summary.bytes,
        "Wrote sorted run"
    );
    chunk.clear();
    Ok(())
}

/// K-way merge sorted runs into `output`.
fn merge_runs(
    inputs: &[PathBuf],
    output: &Path,
    schema_tag: u8,
    cmp: KeyComparator,
) -> Result<()> {
    let mut readers = inputs
        .iter()
        .map(|path| RecordReader::open(path))
        .collect::<Result<Vec<_>>>()?;

    let mut heap = BinaryHeap::with_capacity(readers.len());
    for (source, reader) in readers.iter_mut().enumerate() {
        if let Some(record) = reader.next_raw()? {
            heap.push(HeapItem {
                record,
                source,
                cmp,
            });
        }
    }

    let mut writer = SpillWriter::create(output, schema_tag)?;
    while let Some(HeapItem { record, source, .. }) = heap.pop() {
        writer.append_raw(&record.key, &record.payload)?;
        if let Some(next) = readers[source].next_raw()? {
            heap.push(HeapItem {
                record: next,
                source,
                cmp,
            });
        }
    }
    writer.finish()?;
    Ok(())
}

/// Head record of one run inside the merge heap.
///
/// Ordering is reversed so `BinaryHeap` pops the smallest key first; ties
/// go to the lower source index.
struct HeapItem {
    record: RawRecord,
    source: usize,
    cmp: KeyComparator,
}

impl Ord for HeapItem {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.cmp)(other.record.key.as_bytes(), self.record.key.as_bytes())
            .then_with(|| other.source.cmp(&self.source))
    }
}

impl PartialOrd for HeapItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for HeapItem {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for HeapItem {}

/// Run files owned by a sort; removed from disk on drop.
#[derive(Default)]
struct RunFiles {
    paths: Vec<PathBuf>,
}

impl RunFiles {
    fn push(&mut self, path: PathBuf) {
        self.paths.push(path);
    }

    fn len(&self) -> usize {
        self.paths.len()
    }

    fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

impl Drop for RunFiles {
    fn drop(&mut self) {
        for path in &self.paths {
            if let Err(e) = std::fs::remove_file(path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(
                        target: "derivex::sort",
                        path = %path.display(),
                        error = %e,
                        "Failed to remove sort run"
                    );
                }
            }
        }
    }
}
