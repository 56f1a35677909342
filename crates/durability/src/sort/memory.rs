//! In-memory sorter.
//!
//! Loads the whole input, sorts it and writes it back out. Memory grows with
//! the input, so this is only meant for tests and small indexes.

use super::{KeyComparator, SortStats, Sorter};
use crate::spill::{RecordReader, SpillWriter};
use derivex_core::Result;
use std::path::Path;

/// Sorter that holds every record in memory.
#[derive(Debug, Clone, Copy, Default)]
pub struct InMemorySorter;

impl Sorter for InMemorySorter {
    fn sort(&self, input: &Path, output: &Path, cmp: KeyComparator) -> Result<SortStats> {
        let mut reader = RecordReader::open(input)?;
        let schema_tag = reader.header().schema_tag;
        let mut records = Vec::new();
        while let Some(record) = reader.next_raw()? {
            records.push(record);
        }
        drop(reader);

        records.sort_by(|a, b| cmp(a.key.as_bytes(), b.key.as_bytes()));

        let mut writer = SpillWriter::create(output, schema_tag)?;
        for record in &records {
            writer.append_raw(&record.key, &record.payload)?;
        }
        writer.finish()?;

        Ok(SortStats {
            records: records.len() as u64,
            runs: usize::from(!records.is_empty()),
            merge_passes: 0,
        })
    }

    fn name(&self) -> &'static str {
        "in-memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sort::byte_order;
    use crate::sort::test_support::{read_all, write_keys};
    use tempfile::TempDir;

    #[test]
    fn test_sorts_and_keeps_duplicates() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("in.spill");
        let output = dir.path().join("out.sorted");
        write_keys(&input, &["b", "a", "b", "a_b"]);

        let stats = InMemorySorter.sort(&input, &output, byte_order).unwrap();
        assert_eq!(stats.records, 4);
        let keys: Vec<String> = read_all(&output).into_iter().map(|r| r.key).collect();
        assert_eq!(keys, vec!["a", "a_b", "b", "b"]);
    }

    #[test]
    fn test_byte_order_not_locale_order() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("in.spill");
        let output = dir.path().join("out.sorted");
        write_keys(&input, &["b", "B", "é", "a"]);

        InMemorySorter.sort(&input, &output, byte_order).unwrap();
        let keys: Vec<String> = read_all(&output).into_iter().map(|r| r.key).collect();
        assert_eq!(keys, vec!["B", "a", "b", "é"]);
    }
}
