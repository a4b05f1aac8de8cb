//! Handoff document encoding, durable storage, and state extraction.
//!
//! Deliberately has no dependency on `ac-lifecycle`: this crate only knows
//! how to turn an `AgentInstance` snapshot into a document and store it.
//! Driving the exhaustion-to-handoff-to-respawn sequence is the
//! orchestrator's job.

pub mod codec;
pub mod extraction;
pub mod store;

#[cfg(test)]
mod testutil;

pub use extraction::{extract, fallback, ExtractionInput};
pub use store::HandoffStore;
