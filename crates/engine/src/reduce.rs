//! Reduce-merge pass.
//!
//! One sequential scan over a sorted spill file. Consecutive records with
//! the same key are folded into one aggregate with the schema's merge
//! function and written out as a single compacted entry. Only the current
//! key's aggregate is held in memory.

use crate::compacted::CompactedWriter;
use crate::schema::IndexSchema;
use derivex_core::{Error, Result};
use derivex_durability::RecordReader;
use std::io::Write;
use tracing::debug;

/// Counters reported by a reduce pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReduceStats {
    /// Sorted records read
    pub records: u64,
    /// Distinct keys written
    pub keys: u64,
}

/// Fold every run of equal keys in `sorted` into one entry of `out`.
///
/// An empty input produces no entries. A record whose key sorts before the
/// previous one means the input was not sorted and is reported as a
/// malformed record.
pub fn reduce<S, W>(sorted: &mut RecordReader, out: &mut CompactedWriter<W>) -> Result<ReduceStats>
where
    S: IndexSchema,
    W: Write,
{
    let mut stats = ReduceStats::default();
    let mut current: Option<(String, S::Aggregate)> = None;

    loop {
        let offset = sorted.offset();
        let record = match sorted.next_record::<S::Codec>()? {
            Some(record) => record,
            None => break,
        };
        stats.records += 1;

        current = match current.take() {
            Some((key, mut aggregate)) if key == record.key => {
                S::merge(&mut aggregate, record.payload);
                Some((key, aggregate))
            }
            Some((key, aggregate)) => {
                if record.key.as_bytes() < key.as_bytes() {
                    return Err(Error::malformed(
                        offset,
                        format!("key '{}' sorts before '{}'", record.key, key),
                    ));
                }
                out.write_entry(&key, &S::format_values(&aggregate))?;
                stats.keys += 1;
                Some((record.key, S::seed(record.payload)))
            }
            None => Some((record.key, S::seed(record.payload))),
        };
    }

    if let Some((key, aggregate)) = current {
        out.write_entry(&key, &S::format_values(&aggregate))?;
        stats.keys += 1;
    }

    debug!(
        target: "derivex::build",
        kind = S::KIND,
        records = stats.records,
        keys = stats.keys,
        "Reduce pass complete"
    );
    Ok(stats)
}
