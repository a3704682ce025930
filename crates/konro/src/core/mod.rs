//! The batching pipeline itself.
//!
//! * [`admission`] - the background loop that forms time- and
//!   size-bounded batches and drives them through generation.
//! * [`generate`] - the blocking generation worker, one invocation per
//!   batch.
//! * [`demux`] - routes each decoding step's outputs back to the batch
//!   members' streams.
//! * [`worker`] - lifecycle handle for the background admission task.

pub(crate) mod admission;
pub(crate) mod demux;
pub(crate) mod generate;
pub(crate) mod worker;
