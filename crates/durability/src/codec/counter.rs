//! Payload codec for category-occurrence observations.
//!
//! ```text
//! [in_category: i16 LE][out_of_category: i16 LE]
//! ```

use super::traits::{CodecError, PayloadCodec, PayloadCursor};
use byteorder::{ByteOrder, LittleEndian};

/// Per-document contribution to a token's category counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct CounterDelta {
    /// Added to the in-category count
    pub in_category: i16,
    /// Added to the out-of-category count
    pub out_of_category: i16,
}

impl CounterDelta {
    /// Create a delta.
    pub fn new(in_category: i16, out_of_category: i16) -> Self {
        CounterDelta {
            in_category,
            out_of_category,
        }
    }

    /// Delta for a document with `count` units on one side.
    ///
    /// Counts that do not fit in an `i16` clamp to `i16::MAX`.
    pub fn from_count(in_category: bool, count: u32) -> Self {
        let clamped = i16::try_from(count).unwrap_or(i16::MAX);
        if in_category {
            CounterDelta::new(clamped, 0)
        } else {
            CounterDelta::new(0, clamped)
        }
    }
}

/// Codec for [`CounterDelta`]: two fixed-width signed 16-bit fields.
#[derive(Debug, Clone, Copy, Default)]
pub struct CounterDeltaCodec;

impl PayloadCodec for CounterDeltaCodec {
    type Payload = CounterDelta;

    const SCHEMA_TAG: u8 = 2;

    fn encode(payload: &Self::Payload, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&payload.in_category.to_le_bytes());
        buf.extend_from_slice(&payload.out_of_category.to_le_bytes());
    }

    fn decode(bytes: &[u8]) -> Result<Self::Payload, CodecError> {
        let mut cursor = PayloadCursor::new(bytes);
        let in_category = LittleEndian::read_i16(cursor.take(2)?);
        let out_of_category = LittleEndian::read_i16(cursor.take(2)?);
        cursor.finish()?;
        Ok(CounterDelta::new(in_category, out_of_category))
    }
}
