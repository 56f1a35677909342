//! Index schemas
//!
//! An [`IndexSchema`] fixes everything that differs between two derived
//! indexes built on the same pipeline: what a corpus item is, which
//! observations it yields, how observation payloads are encoded in spill
//! files, how payloads sharing a key fold into one aggregate, and how an
//! aggregate is written to and read back from the published text file.
//!
//! `merge` must be associative and commutative. The sorter does not order
//! records with equal keys, so the aggregate may not depend on the order
//! they arrive in.

use derivex_core::DocumentError;
use derivex_durability::PayloadCodec;
use std::fmt::Debug;

/// Observation payload type of schema `S`.
pub type Payload<S> = <<S as IndexSchema>::Codec as PayloadCodec>::Payload;

/// One kind of derived index.
pub trait IndexSchema: Send + Sync + 'static {
    /// Corpus item consumed by a rebuild.
    type Input;

    /// Spill codec for observation payloads.
    type Codec: PayloadCodec;

    /// Merged value stored per key.
    type Aggregate: Clone + Debug + PartialEq + Send + Sync;

    /// Short name used in logs.
    const KIND: &'static str;

    /// Observations contributed by one corpus item.
    ///
    /// Called once per item. An error skips the item without aborting the
    /// rebuild.
    fn observe(&self, input: &Self::Input) -> Result<Vec<(String, Payload<Self>)>, DocumentError>;

    /// Start a new aggregate from the first payload of a key.
    fn seed(payload: Payload<Self>) -> Self::Aggregate;

    /// Fold another payload of the same key into `aggregate`.
    fn merge(aggregate: &mut Self::Aggregate, payload: Payload<Self>);

    /// Values written for `aggregate` in the published file, unescaped.
    fn format_values(aggregate: &Self::Aggregate) -> Vec<String>;

    /// Inverse of [`IndexSchema::format_values`].
    fn parse_values(values: Vec<String>) -> Result<Self::Aggregate, String>;
}
