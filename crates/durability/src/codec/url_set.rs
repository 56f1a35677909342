//! Payload codec for "which documents contain this token" observations.
//!
//! ```text
//! [count: u32 LE] then per URL: [len: u32 LE][UTF-8 bytes]
//! ```
//!
//! Observations carry a singleton set; the list form exists so that the
//! same codec can describe any merged set.

use super::traits::{CodecError, PayloadCodec, PayloadCursor};
use byteorder::{ByteOrder, LittleEndian};
use std::collections::BTreeSet;

/// Codec for a set of document URLs.
#[derive(Debug, Clone, Copy, Default)]
pub struct UrlSetCodec;

impl PayloadCodec for UrlSetCodec {
    type Payload = BTreeSet<String>;

    const SCHEMA_TAG: u8 = 1;

    fn encode(payload: &Self::Payload, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        for url in payload {
            buf.extend_from_slice(&(url.len() as u32).to_le_bytes());
            buf.extend_from_slice(url.as_bytes());
        }
    }

    fn decode(bytes: &[u8]) -> Result<Self::Payload, CodecError> {
        let mut cursor = PayloadCursor::new(bytes);
        let count = LittleEndian::read_u32(cursor.take(4)?);
        let mut urls = BTreeSet::new();
        for _ in 0..count {
            let len = LittleEndian::read_u32(cursor.take(4)?) as usize;
            let url = std::str::from_utf8(cursor.take(len)?).map_err(|_| CodecError::InvalidUtf8)?;
            urls.insert(url.to_string());
        }
        cursor.finish()?;
        Ok(urls)
    }
}
