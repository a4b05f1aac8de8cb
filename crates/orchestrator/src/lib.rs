//! Message classification, workflow stage sequencing, and the
//! exhaustion-to-handoff-to-respawn recovery loop.

pub mod classify;
pub mod dedupe;
pub mod notifier;
pub mod orchestrator;

pub use dedupe::DedupeStore;
pub use notifier::{phrasing, NullNotifier, Notifier};
pub use orchestrator::{InboundMessage, Orchestrator};
