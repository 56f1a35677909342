//! Binary on-disk formats used during a rebuild.

pub mod record;

pub use record::{
    encode_record, read_record, RawRecord, SpillHeader, MAX_RECORD_BODY, SPILL_FORMAT_VERSION,
    SPILL_HEADER_SIZE, SPILL_MAGIC,
};
