//! The `Tool` abstraction agent instances call into. Concrete tools
//! (shell exec, file access, MCP bridges) are platform adapters outside
//! this crate's scope; this defines the seam and the session bookkeeping
//! an agent's handoff needs to carry across a respawn.

use ac_domain::error::Result;

#[derive(Debug, Clone)]
pub struct ToolInvocation {
    pub tool_name: String,
    pub arguments: serde_json::Value,
}

#[derive(Debug, Clone)]
pub struct ToolOutcome {
    pub ok: bool,
    pub output: String,
}

#[async_trait::async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    async fn invoke(&self, call: ToolInvocation) -> Result<ToolOutcome>;
}
