//! Provider-agnostic model invocation.
//!
//! `ModelClient` is the seam the orchestrator and lifecycle manager call
//! through; they never depend on a specific vendor wire format.

use ac_domain::error::Result;
use ac_domain::usage::Usage;

/// One message in a model conversation.
#[derive(Debug, Clone)]
pub struct ModelMessage {
    pub role: Role,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    System,
    User,
    Assistant,
}

/// An opaque tool name + JSON schema the model may choose to invoke. The
/// schema itself is owned by `ac-tools`; this crate only forwards it.
#[derive(Debug, Clone)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

#[derive(Debug, Clone)]
pub struct ToolCallRequest {
    pub tool_name: String,
    pub arguments: serde_json::Value,
}

#[derive(Debug, Clone, Default)]
pub struct ModelRequest {
    pub messages: Vec<ModelMessage>,
    pub tools: Vec<ToolSchema>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub model: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ModelReply {
    pub content: String,
    pub tool_calls: Vec<ToolCallRequest>,
    pub usage: Usage,
    pub model: String,
    pub finish_reason: Option<String>,
}

/// Trait every provider adapter implements. Non-streaming by design — the
/// lifecycle manager consumes a full reply before updating token counters,
/// so a streaming surface would add complexity with no caller that needs it.
#[async_trait::async_trait]
pub trait ModelClient: Send + Sync {
    async fn complete(&self, req: ModelRequest) -> Result<ModelReply>;

    /// A unique identifier for this client instance, used in logs and spans.
    fn client_id(&self) -> &str;
}
