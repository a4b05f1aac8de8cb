/// Shared error type used across all agentcore crates.
///
/// `ContextWindowExhausted` is a signal, not a failure: it is recovered by
/// the orchestrator driving a handoff, never surfaced to the end user.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP: {0}")]
    Http(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("model call timeout after {0}s")]
    ModelCallTimeout(u64),

    #[error("model provider {provider}: {message}")]
    Provider { provider: String, message: String },

    #[error("context window exhausted: {used}/{limit} tokens ({pct:.1}%)")]
    ContextWindowExhausted { used: u64, limit: u64, pct: f64 },

    #[error("handoff limit exceeded: {0} handoffs attempted for this task")]
    HandoffLimitExceeded(u32),

    #[error("handoff store unavailable: {0}")]
    HandoffStoreUnavailable(String),

    #[error("handoff not found: {0}")]
    HandoffNotFound(String),

    #[error("malformed handoff: {0}")]
    MalformedHandoff(String),

    #[error("handoff chain broken: predecessor {0} not found")]
    ChainBroken(String),

    #[error("handoff chain cycle detected at {0}")]
    ChainCycle(String),

    #[error("classification failed: {0}")]
    ClassificationFailed(String),

    #[error("config: {0}")]
    Config(String),

    #[error("auth: {0}")]
    Auth(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
