//! The `Tool` abstraction and the session bookkeeping agent instances use
//! to survive a handoff.

pub mod session;
pub mod traits;

pub use session::{ToolSession, ToolSessionRegistry, ToolSessionStatus};
pub use traits::{Tool, ToolInvocation, ToolOutcome};
