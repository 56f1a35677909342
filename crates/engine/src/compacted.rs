//! Compacted index file format.
//!
//! The published artifact of a rebuild is UTF-8 text with one entry per
//! line:
//!
//! ```text
//! escaped(key) TAB escaped(v1) "," escaped(v2) ... LF
//! ```
//!
//! Keys and values are percent-encoded. `%`, `,`, TAB, CR, LF and the other
//! ASCII control characters are always escaped, so neither separator can
//! appear unescaped inside a field. Non-ASCII characters are escaped as well
//! (`é` is written `%C3%A9`), keeping the file 7-bit clean.
//!
//! Lines are ordered by the raw, unescaped key bytes. Keys are unique.
//! An entry with no values is written as `key TAB LF`; a list holding a
//! single empty string is indistinguishable from an empty list.

use derivex_core::{Error, Result};
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};
use std::borrow::Cow;
use std::io::Write;

/// Separates the key from its values.
pub const KEY_SEPARATOR: char = '\t';

/// Separates values from each other.
pub const VALUE_SEPARATOR: char = ',';

/// Characters escaped in keys and values.
const ESCAPE: &AsciiSet = &CONTROLS.add(b'%').add(b',');

/// Percent-encode one field.
pub fn escape(field: &str) -> Cow<'_, str> {
    utf8_percent_encode(field, ESCAPE).into()
}

/// Decode one field of the line starting at `offset`.
pub fn unescape(field: &str, offset: u64) -> Result<Cow<'_, str>> {
    percent_decode_str(field)
        .decode_utf8()
        .map_err(|e| Error::corrupt(offset, format!("escaped field is not UTF-8: {}", e)))
}

/// Split a line (without its LF) into the escaped key and the escaped
/// value list.
pub fn split_line(line: &[u8], offset: u64) -> Result<(&str, &str)> {
    let line = std::str::from_utf8(line)
        .map_err(|e| Error::corrupt(offset, format!("line is not UTF-8: {}", e)))?;
    line.split_once(KEY_SEPARATOR)
        .ok_or_else(|| Error::corrupt(offset, "missing key separator"))
}

/// Decode an escaped value list.
pub fn parse_values(values: &str, offset: u64) -> Result<Vec<String>> {
    if values.is_empty() {
        return Ok(Vec::new());
    }
    values
        .split(VALUE_SEPARATOR)
        .map(|v| unescape(v, offset).map(Cow::into_owned))
        .collect()
}

/// Decode a full line into its key and values.
pub fn parse_line(line: &[u8], offset: u64) -> Result<(String, Vec<String>)> {
    let (key, values) = split_line(line, offset)?;
    let key = unescape(key, offset)?.into_owned();
    Ok((key, parse_values(values, offset)?))
}

/// Counters reported by a [`CompactedWriter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CompactedStats {
    /// Entries written
    pub entries: u64,
    /// Bytes written
    pub bytes: u64,
}

/// Streaming writer for compacted index files.
///
/// Rejects keys that are not strictly increasing.
pub struct CompactedWriter<W: Write> {
    out: W,
    line: String,
    last_key: Option<String>,
    stats: CompactedStats,
}

impl<W: Write> CompactedWriter<W> {
    /// Wrap an output.
    pub fn new(out: W) -> Self {
        CompactedWriter {
            out,
            line: String::new(),
            last_key: None,
            stats: CompactedStats::default(),
        }
    }

    /// Append one entry.
    pub fn write_entry<V: AsRef<str>>(&mut self, key: &str, values: &[V]) -> Result<()> {
        if let Some(last) = &self.last_key {
            if last.as_bytes() >= key.as_bytes() {
                return Err(Error::InvalidState(format!(
                    "compacted keys out of order: '{}' after '{}'",
                    key, last
                )));
            }
        }

        self.line.clear();
        self.line.push_str(&escape(key));
        self.line.push(KEY_SEPARATOR);
        for (i, value) in values.iter().enumerate() {
            if i > 0 {
                self.line.push(VALUE_SEPARATOR);
            }
            self.line.push_str(&escape(value.as_ref()));
        }
        self.line.push('\n');
        self.out.write_all(self.line.as_bytes())?;

        match &mut self.last_key {
            Some(last) => {
                last.clear();
                last.push_str(key);
            }
            None => self.last_key = Some(key.to_string()),
        }
        self.stats.entries += 1;
        self.stats.bytes += self.line.len() as u64;
        Ok(())
    }

    /// Counters so far.
    pub fn stats(&self) -> CompactedStats {
        self.stats
    }

    /// Flush and hand back the output.
    pub fn finish(mut self) -> Result<(CompactedStats, W)> {
        self.out.flush()?;
        Ok((self.stats, self.out))
    }
}
