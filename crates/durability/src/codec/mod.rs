//! Typed payload codecs for spill records.

pub mod counter;
pub mod traits;
pub mod url_set;

pub use counter::{CounterDelta, CounterDeltaCodec};
pub use traits::{CodecError, PayloadCodec, Record};
pub use url_set::UrlSetCodec;
