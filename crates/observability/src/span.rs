//! The six span levels and the record shape persisted for each one.
//!
//! Grounded on the teacher's `Run`/`RunNode` (`gateway/src/runtime/runs.rs`):
//! a started_at/ended_at/duration_ms record with a JSON attribute bag,
//! generalized from "one run, nodes for its LLM/tool steps" to six nested
//! levels that any component can open and close.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Nesting order is significant: a span can only be opened inside its
/// immediate parent level (`Workflow` inside `UserRequest`, never the other
/// way around, never two levels deep in one step). Declaration order is the
/// nesting order — derived `Ord` relies on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpanLevel {
    UserRequest,
    Workflow,
    AgentLifecycle,
    Task,
    TokenUsage,
    DbOp,
}

impl SpanLevel {
    pub const ALL: [SpanLevel; 6] = [
        SpanLevel::UserRequest,
        SpanLevel::Workflow,
        SpanLevel::AgentLifecycle,
        SpanLevel::Task,
        SpanLevel::TokenUsage,
        SpanLevel::DbOp,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SpanLevel::UserRequest => "user_request",
            SpanLevel::Workflow => "workflow",
            SpanLevel::AgentLifecycle => "agent_lifecycle",
            SpanLevel::Task => "task",
            SpanLevel::TokenUsage => "token_usage",
            SpanLevel::DbOp => "db_op",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Span {
    pub span_id: String,
    pub level: SpanLevel,
    pub name: String,
    pub trace_id: String,
    pub parent_span_id: Option<String>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<u64>,
    pub attributes: serde_json::Value,
}

impl Span {
    pub fn close(&mut self) {
        let now = Utc::now();
        self.ended_at = Some(now);
        self.duration_ms = Some((now - self.started_at).num_milliseconds().max(0) as u64);
    }
}
