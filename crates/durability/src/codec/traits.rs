//! Payload codec trait definitions.

/// Typed payload codec.
///
/// Each builder fixes one payload schema. The codec turns that schema's
/// observation payload into the bytes carried inside a spill record and
/// back. Framing, keys and checksums are handled by the record format; a
/// codec only sees its own payload bytes.
///
/// Implementations must round-trip exactly: `decode(encode(p)) == p`.
pub trait PayloadCodec: Send + Sync + 'static {
    /// Decoded payload type.
    type Payload;

    /// Tag stored in the spill header so a file is never decoded with the
    /// wrong schema.
    const SCHEMA_TAG: u8;

    /// Append the encoded payload to `buf`.
    fn encode(payload: &Self::Payload, buf: &mut Vec<u8>);

    /// Decode a payload that must span all of `bytes`.
    fn decode(bytes: &[u8]) -> Result<Self::Payload, CodecError>;
}

/// Payload decoding errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    /// Payload ends before a field is complete.
    #[error("Truncated payload: needed {needed} bytes, had {have}")]
    Truncated {
        /// Bytes required to finish the current field
        needed: usize,
        /// Bytes remaining
        have: usize,
    },

    /// Bytes left over after the payload was fully decoded.
    #[error("{0} trailing bytes after payload")]
    TrailingBytes(usize),

    /// A string field is not valid UTF-8.
    #[error("Invalid UTF-8 in string field")]
    InvalidUtf8,
}

/// A typed observation: key plus decoded payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record<P> {
    /// Token key
    pub key: String,
    /// Decoded payload
    pub payload: P,
}

impl<P> Record<P> {
    /// Create a record.
    pub fn new(key: impl Into<String>, payload: P) -> Self {
        Record {
            key: key.into(),
            payload,
        }
    }
}

/// Cursor over a payload byte slice used by codec implementations.
pub(crate) struct PayloadCursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> PayloadCursor<'a> {
    pub(crate) fn new(bytes: &'a [u8]) -> Self {
        PayloadCursor { bytes, pos: 0 }
    }

    pub(crate) fn take(&mut self, n: usize) -> Result<&'a [u8], CodecError> {
        let have = self.bytes.len() - self.pos;
        if n > have {
            return Err(CodecError::Truncated { needed: n, have });
        }
        let slice = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub(crate) fn finish(self) -> Result<(), CodecError> {
        match self.bytes.len() - self.pos {
            0 => Ok(()),
            n => Err(CodecError::TrailingBytes(n)),
        }
    }
}
