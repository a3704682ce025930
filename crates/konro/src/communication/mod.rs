//! Channels connecting the pipeline's execution contexts.
//!
//! * [`bridge`] - the per-batch handoff between the blocking generation
//!   worker and the async demultiplexer. The only structure in the crate
//!   mutated from two execution contexts.
//! * [`stream`] - the per-caller token stream handed back at admission.
//! * [`pill`] - panic propagation for the background admission task.

mod bridge;
mod pill;
mod stream;

pub(crate) use bridge::{step_bridge, StepEvent, StepReceiver, StepSender};
pub(crate) use pill::Pill;
pub use stream::TokenStream;
