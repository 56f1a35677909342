//! Spill file and record format.
//!
//! Spill files (and the sorted files the sorter produces from them) are a
//! private format: only the build pipeline ever reads them.
//!
//! # File Layout
//!
//! ```text
//! ┌────────────────────────────────────┐
//! │ Spill Header (8 bytes)             │
//! ├────────────────────────────────────┤
//! │ Record 1                           │
//! ├────────────────────────────────────┤
//! │ ...                                │
//! └────────────────────────────────────┘
//! ```
//!
//! # Header Layout
//!
//! ```text
//! ┌───────────────┬──────────────┬──────────────┬──────────────┐
//! │ Magic "DXSP"  │ Version (1)  │ Schema (1)   │ Reserved (2) │
//! └───────────────┴──────────────┴──────────────┴──────────────┘
//! ```
//!
//! # Record Layout
//!
//! ```text
//! ┌────────────────┬────────────────┬────────────┬─────────────────┬───────────┐
//! │ BodyLen (4 LE) │ KeyLen (4 LE)  │ Key (UTF-8)│ Payload (var)   │ CRC32 (4) │
//! └────────────────┴────────────────┴────────────┴─────────────────┴───────────┘
//! ```
//!
//! `BodyLen` covers KeyLen + Key + Payload; the CRC covers the same bytes.

use byteorder::{ByteOrder, LittleEndian};
use crc32fast::Hasher;
use derivex_core::{Error, Result};
use std::io::{self, Read};

/// Magic bytes identifying a spill file: "DXSP"
pub const SPILL_MAGIC: [u8; 4] = *b"DXSP";

/// Current spill format version
pub const SPILL_FORMAT_VERSION: u8 = 1;

/// Size of the spill header in bytes
pub const SPILL_HEADER_SIZE: usize = 8;

/// Upper bound on a single record body; anything larger is treated as corruption.
pub const MAX_RECORD_BODY: usize = 64 * 1024 * 1024;

/// Spill file header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpillHeader {
    /// Format version
    pub version: u8,
    /// Tag of the payload schema every record in the file uses
    pub schema_tag: u8,
}

impl SpillHeader {
    /// Header for the current format version.
    pub fn new(schema_tag: u8) -> Self {
        SpillHeader {
            version: SPILL_FORMAT_VERSION,
            schema_tag,
        }
    }

    /// Serialize header to bytes.
    pub fn to_bytes(&self) -> [u8; SPILL_HEADER_SIZE] {
        let mut bytes = [0u8; SPILL_HEADER_SIZE];
        bytes[0..4].copy_from_slice(&SPILL_MAGIC);
        bytes[4] = self.version;
        bytes[5] = self.schema_tag;
        bytes
    }

    /// Deserialize and validate a header.
    pub fn from_bytes(bytes: &[u8; SPILL_HEADER_SIZE]) -> Result<Self> {
        if bytes[0..4] != SPILL_MAGIC {
            return Err(Error::malformed(0, "bad spill magic"));
        }
        if bytes[4] != SPILL_FORMAT_VERSION {
            return Err(Error::malformed(
                0,
                format!("unsupported spill format version {}", bytes[4]),
            ));
        }
        Ok(SpillHeader {
            version: bytes[4],
            schema_tag: bytes[5],
        })
    }
}

/// A record whose payload has not been decoded yet.
///
/// The sorter only needs keys, so it moves records around in this form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    /// Record key
    pub key: String,
    /// Encoded payload bytes
    pub payload: Vec<u8>,
}

impl RawRecord {
    /// Bytes this record occupies on disk.
    pub fn encoded_len(&self) -> usize {
        4 + 4 + self.key.len() + self.payload.len() + 4
    }
}

/// Append one framed record to `buf`.
pub fn encode_record(key: &str, payload: &[u8], buf: &mut Vec<u8>) {
    let body_len = 4 + key.len() + payload.len();
    let start = buf.len();
    buf.reserve(4 + body_len + 4);
    buf.extend_from_slice(&(body_len as u32).to_le_bytes());
    buf.extend_from_slice(&(key.len() as u32).to_le_bytes());
    buf.extend_from_slice(key.as_bytes());
    buf.extend_from_slice(payload);

    let mut hasher = Hasher::new();
    hasher.update(&buf[start + 4..]);
    buf.extend_from_slice(&hasher.finalize().to_le_bytes());
}

/// Read until `buf` is full or the reader hits end-of-file.
///
/// Returns how many bytes were read, so callers can tell a clean end-of-file
/// (zero bytes) from a truncated field (some bytes).
fn read_up_to<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Read one framed record starting at byte `offset`.
///
/// Returns `Ok(None)` on a clean end-of-file, the record and the number of
/// bytes consumed otherwise. A record cut short after its first byte is a
/// [`Error::MalformedRecord`].
pub fn read_record<R: Read>(reader: &mut R, offset: u64) -> Result<Option<(RawRecord, usize)>> {
    let mut len_buf = [0u8; 4];
    match read_up_to(reader, &mut len_buf)? {
        0 => return Ok(None),
        4 => {}
        n => {
            return Err(Error::malformed(
                offset,
                format!("truncated length prefix ({} of 4 bytes)", n),
            ))
        }
    }
    let body_len = LittleEndian::read_u32(&len_buf) as usize;
    if body_len < 4 {
        return Err(Error::malformed(
            offset,
            format!("record body length {} is below the 4-byte minimum", body_len),
        ));
    }
    if body_len > MAX_RECORD_BODY {
        return Err(Error::malformed(
            offset,
            format!("record body length {} exceeds limit", body_len),
        ));
    }

    let mut body = vec![0u8; body_len + 4];
    let got = read_up_to(reader, &mut body)?;
    if got < body.len() {
        return Err(Error::malformed(
            offset,
            format!("truncated record body ({} of {} bytes)", got, body.len()),
        ));
    }
    let crc_bytes = body.split_off(body_len);
    let stored_crc = LittleEndian::read_u32(&crc_bytes);
    let mut hasher = Hasher::new();
    hasher.update(&body);
    let computed_crc = hasher.finalize();
    if stored_crc != computed_crc {
        return Err(Error::malformed(
            offset,
            format!(
                "checksum mismatch (stored {:08x}, computed {:08x})",
                stored_crc, computed_crc
            ),
        ));
    }

    let key_len = LittleEndian::read_u32(&body[0..4]) as usize;
    if 4 + key_len > body_len {
        return Err(Error::malformed(
            offset,
            format!("key length {} overruns record body", key_len),
        ));
    }
    let payload = body.split_off(4 + key_len);
    body.drain(0..4);
    let key = String::from_utf8(body)
        .map_err(|_| Error::malformed(offset, "key is not valid UTF-8"))?;

    Ok(Some((RawRecord { key, payload }, 4 + body_len + 4)))
}
