//! Spill writer and record reader.
//!
//! The spill writer appends observations to an unsorted file as they are
//! produced. It owns a single scratch buffer that is cleared between
//! records, so at most one record is ever materialized in memory no matter
//! how many are spilled. The reader is the matching sequential scan used by
//! the sorter and by the reduce pass.

use crate::codec::{PayloadCodec, Record};
use crate::format::{
    encode_record, read_record, RawRecord, SpillHeader, MAX_RECORD_BODY, SPILL_HEADER_SIZE,
};
use derivex_core::{Error, Result};
use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

/// Summary of a finished spill file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SpillSummary {
    /// Records written
    pub records: u64,
    /// File size in bytes, header included
    pub bytes: u64,
}

/// Append-only writer for spill files.
pub struct SpillWriter {
    file: BufWriter<File>,
    path: PathBuf,
    header: SpillHeader,
    scratch: Vec<u8>,
    payload: Vec<u8>,
    records: u64,
    bytes: u64,
}

impl SpillWriter {
    /// Create (or truncate) a spill file and write its header.
    pub fn create(path: &Path, schema_tag: u8) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;
        let mut file = BufWriter::new(file);
        let header = SpillHeader::new(schema_tag);
        file.write_all(&header.to_bytes())?;

        Ok(SpillWriter {
            file,
            path: path.to_path_buf(),
            header,
            scratch: Vec::new(),
            payload: Vec::new(),
            records: 0,
            bytes: SPILL_HEADER_SIZE as u64,
        })
    }

    /// Append a record whose payload is already encoded.
    pub fn append_raw(&mut self, key: &str, payload: &[u8]) -> Result<()> {
        if 4 + key.len() + payload.len() > MAX_RECORD_BODY {
            return Err(Error::InvalidState(format!(
                "record for key of {} bytes with {} payload bytes exceeds the record size limit",
                key.len(),
                payload.len()
            )));
        }
        self.scratch.clear();
        encode_record(key, payload, &mut self.scratch);
        self.file.write_all(&self.scratch)?;
        self.records += 1;
        self.bytes += self.scratch.len() as u64;
        Ok(())
    }

    /// Encode and append one typed observation.
    pub fn append<C: PayloadCodec>(&mut self, key: &str, payload: &C::Payload) -> Result<()> {
        if C::SCHEMA_TAG != self.header.schema_tag {
            return Err(Error::InvalidState(format!(
                "payload schema {} does not match spill file schema {}",
                C::SCHEMA_TAG,
                self.header.schema_tag
            )));
        }
        let mut payload_buf = std::mem::take(&mut self.payload);
        payload_buf.clear();
        C::encode(payload, &mut payload_buf);
        let result = self.append_raw(key, &payload_buf);
        self.payload = payload_buf;
        result
    }

    /// Records appended so far.
    pub fn records(&self) -> u64 {
        self.records
    }

    /// Path of the file being written.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flush buffered bytes and fsync the file.
    pub fn finish(mut self) -> Result<SpillSummary> {
        self.file.flush()?;
        let file = self
            .file
            .into_inner()
            .map_err(|e| Error::Io(e.into_error()))?;
        file.sync_all()?;
        Ok(SpillSummary {
            records: self.records,
            bytes: self.bytes,
        })
    }
}

/// Sequential reader over a spill or sorted file.
pub struct RecordReader {
    reader: BufReader<File>,
    header: SpillHeader,
    offset: u64,
}

impl RecordReader {
    /// Open a file and validate its header.
    pub fn open(path: &Path) -> Result<Self> {
        let mut reader = BufReader::new(File::open(path)?);
        let mut header_bytes = [0u8; SPILL_HEADER_SIZE];
        reader.read_exact(&mut header_bytes).map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                Error::malformed(0, "truncated spill header")
            } else {
                Error::Io(e)
            }
        })?;
        let header = SpillHeader::from_bytes(&header_bytes)?;
        Ok(RecordReader {
            reader,
            header,
            offset: SPILL_HEADER_SIZE as u64,
        })
    }

    /// The file header.
    pub fn header(&self) -> SpillHeader {
        self.header
    }

    /// Byte offset of the next record.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Next record with its payload still encoded, or `None` at end-of-file.
    pub fn next_raw(&mut self) -> Result<Option<RawRecord>> {
        match read_record(&mut self.reader, self.offset)? {
            Some((record, consumed)) => {
                self.offset += consumed as u64;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    /// Next record decoded with codec `C`, or `None` at end-of-file.
    pub fn next_record<C: PayloadCodec>(&mut self) -> Result<Option<Record<C::Payload>>> {
        if C::SCHEMA_TAG != self.header.schema_tag {
            return Err(Error::malformed(
                0,
                format!(
                    "file schema {} does not match payload schema {}",
                    self.header.schema_tag,
                    C::SCHEMA_TAG
                ),
            ));
        }
        let offset = self.offset;
        match self.next_raw()? {
            Some(raw) => {
                let payload = C::decode(&raw.payload)
                    .map_err(|e| Error::malformed(offset, e.to_string()))?;
                Ok(Some(Record {
                    key: raw.key,
                    payload,
                }))
            }
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{CounterDelta, CounterDeltaCodec, UrlSetCodec};
    use std::collections::BTreeSet;
    use tempfile::TempDir;

    #[test]
    fn test_write_then_read_typed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("t.spill");

        let mut writer = SpillWriter::create(&path, CounterDeltaCodec::SCHEMA_TAG).unwrap();
        writer
            .append::<CounterDeltaCodec>("beta", &CounterDelta::new(1, 0))
            .unwrap();
        writer
            .append::<CounterDeltaCodec>("alpha", &CounterDelta::new(0, 1))
            .unwrap();
        assert_eq!(writer.records(), 2);
        let summary = writer.finish().unwrap();
        assert_eq!(summary.records, 2);
        assert_eq!(summary.bytes, std::fs::metadata(&path).unwrap().len());

        let mut reader = RecordReader::open(&path).unwrap();
        let first = reader.next_record::<CounterDeltaCodec>().unwrap().unwrap();
        assert_eq!(first, Record::new("beta", CounterDelta::new(1, 0)));
        let second = reader.next_record::<CounterDeltaCodec>().unwrap().unwrap();
        assert_eq!(second, Record::new("alpha", CounterDelta::new(0, 1)));
        assert!(reader.next_record::<CounterDeltaCodec>().unwrap().is_none());
        assert_eq!(reader.offset(), summary.bytes);
    }

    #[test]
    fn test_empty_spill_reads_clean() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.spill");
        SpillWriter::create(&path, UrlSetCodec::SCHEMA_TAG)
            .unwrap()
            .finish()
            .unwrap();

        let mut reader = RecordReader::open(&path).unwrap();
        assert_eq!(reader.header().schema_tag, UrlSetCodec::SCHEMA_TAG);
        assert!(reader.next_raw().unwrap().is_none());
    }

    #[test]
    fn test_schema_mismatch_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("m.spill");
        let mut writer = SpillWriter::create(&path, UrlSetCodec::SCHEMA_TAG).unwrap();
        assert!(matches!(
            writer.append::<CounterDeltaCodec>("k", &CounterDelta::default()),
            Err(Error::InvalidState(_))
        ));
        writer
            .append::<UrlSetCodec>("k", &BTreeSet::from(["u".to_string()]))
            .unwrap();
        writer.finish().unwrap();

        let mut reader = RecordReader::open(&path).unwrap();
        assert!(matches!(
            reader.next_record::<CounterDeltaCodec>(),
            Err(Error::MalformedRecord { .. })
        ));
    }

    #[test]
    fn test_truncated_tail_is_malformed_after_valid_records() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("trunc.spill");
        let mut writer = SpillWriter::create(&path, CounterDeltaCodec::SCHEMA_TAG).unwrap();
        writer
            .append::<CounterDeltaCodec>("a", &CounterDelta::new(1, 0))
            .unwrap();
        writer
            .append::<CounterDeltaCodec>("b", &CounterDelta::new(1, 0))
            .unwrap();
        let summary = writer.finish().unwrap();

        let file = OpenOptions::new().write(true).open(&path).unwrap();
        file.set_len(summary.bytes - 2).unwrap();

        let mut reader = RecordReader::open(&path).unwrap();
        assert!(reader.next_raw().unwrap().is_some());
        let second_offset = reader.offset();
        match reader.next_raw() {
            Err(Error::MalformedRecord { offset, .. }) => assert_eq!(offset, second_offset),
            other => panic!("expected malformed record, got {:?}", other),
        }
    }

    #[test]
    fn test_truncated_header_is_malformed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("hdr.spill");
        std::fs::write(&path, b"DXS").unwrap();
        assert!(matches!(
            RecordReader::open(&path),
            Err(Error::MalformedRecord { offset: 0, .. })
        ));
    }

    #[test]
    fn test_create_truncates_previous_contents() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("again.spill");
        let mut writer = SpillWriter::create(&path, UrlSetCodec::SCHEMA_TAG).unwrap();
        writer.append_raw("x", &[0, 0, 0, 0]).unwrap();
        writer.finish().unwrap();

        SpillWriter::create(&path, UrlSetCodec::SCHEMA_TAG)
            .unwrap()
            .finish()
            .unwrap();
        let mut reader = RecordReader::open(&path).unwrap();
        assert!(reader.next_raw().unwrap().is_none());
    }
}
