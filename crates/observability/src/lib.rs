//! The lexically-scoped span stack and discrete event emission shared by
//! every agentcore component.

pub mod bus;
pub mod span;

pub use bus::{ObservabilityBus, SpanGuard};
pub use span::{Span, SpanLevel};
