//! Shared types for agentcore: agent identity and state, token usage
//! accounting, the handoff document model, configuration, and the
//! cross-cutting error type every other crate returns.

pub mod agent;
pub mod concurrency;
pub mod config;
pub mod error;
pub mod handoff;
pub mod trace;
pub mod usage;

pub use agent::{AgentInstance, AgentState, AgentType, TerminationReason};
pub use concurrency::KeyedMutex;
pub use config::Config;
pub use error::{Error, Result};
pub use handoff::HandoffDocument;
pub use trace::TraceEvent;
pub use usage::{ThresholdStatus, TokenTrackerSnapshot, TokenUsage, Usage};
