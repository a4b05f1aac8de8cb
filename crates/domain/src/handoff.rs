//! The handoff document data model — an immutable, schema-versioned
//! record of an agent's terminal state (`spec.md` §3, §6).
//!
//! This module defines the types only. Encoding/decoding to the canonical
//! on-disk text form and durable persistence live in the `ac-handoff`
//! crate, which depends on these types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::agent::{AgentType, TerminationReason};

pub const SCHEMA_VERSION: &str = "1.0.0";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Nested record types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceAgent {
    pub agent_id: String,
    pub agent_type: AgentType,
    pub version: u32,
    pub spawn_time: DateTime<Utc>,
    pub termination_time: DateTime<Utc>,
    pub termination_reason: TerminationReason,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenUsageSummary {
    pub total: u64,
    pub input: u64,
    pub output: u64,
    pub cache_read: u64,
    pub cache_create: u64,
    pub usage_percentage: f64,
    pub history: Vec<crate::usage::TokenUsage>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    InProgress,
    Blocked,
    ReadyForHandoff,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
    pub id: String,
    pub title: String,
    pub rationale: String,
    /// Confidence in [0.0, 1.0].
    pub confidence: f64,
    pub alternatives_considered: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RejectedAlternative {
    pub option: String,
    pub reason_rejected: String,
    pub context: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkItem {
    pub artifact_kind: String,
    pub identifier: String,
    pub summary: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Priority {
    P0,
    P1,
    P2,
    P3,
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Priority::P0 => "P0",
            Priority::P1 => "P1",
            Priority::P2 => "P2",
            Priority::P3 => "P3",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TodoItem {
    /// References a `Decision.id` when this TODO follows from a decision
    /// made earlier in the task. `HandoffDocument::validate` checks every
    /// populated reference resolves to a real decision.
    #[serde(default)]
    pub decision_ref: Option<String>,
    pub priority: Priority,
    pub description: String,
    pub acceptance_criteria: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Dependencies {
    pub upstream: Vec<String>,
    pub downstream: Vec<String>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// HandoffDocument
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Immutable record of an agent's terminal state, written once by
/// `LifecycleManager::create_handoff` and never mutated thereafter.
///
/// Retained for at least `HandoffConfig::retention_days` (default 30).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandoffDocument {
    pub schema_version: String,
    pub handoff_id: String,
    pub trace_id: String,
    pub task_id: String,
    pub user_id: String,
    pub project_id: String,
    pub predecessor_handoff_id: Option<String>,
    pub source_agent: SourceAgent,
    pub token_usage: TokenUsageSummary,

    pub original_request: String,
    pub task_description: String,
    pub current_phase: String,
    /// 0-100. Monotonically non-decreasing along a chain — enforced by
    /// `LifecycleManager::create_handoff`, not by this type.
    pub completion_percentage: u8,
    pub task_status: TaskStatus,

    pub decisions: Vec<Decision>,
    pub rejected_alternatives: Vec<RejectedAlternative>,
    pub work_completed: Vec<WorkItem>,
    pub work_in_progress: String,
    pub todo_list: Vec<TodoItem>,
    /// Opaque key/value snapshot: DB handles, API sessions represented by
    /// reconnection recipes. Never raw secrets.
    pub tool_state: serde_json::Value,
    pub assumptions: Vec<String>,
    pub constraints: Vec<String>,
    pub dependencies: Dependencies,
    pub error_history: Vec<String>,
    pub references: Vec<String>,

    /// `true` when this handoff was produced under a second exhaustion
    /// during state extraction itself (see `spec.md` §4.4 step 3).
    pub degraded: bool,
}

impl HandoffDocument {
    /// Every `schema_version` this build can load. Major-incompatible
    /// versions are rejected at decode time.
    pub fn is_schema_compatible(version: &str) -> bool {
        let major = version.split('.').next().unwrap_or("");
        let current_major = SCHEMA_VERSION.split('.').next().unwrap_or("");
        major == current_major
    }

    /// Structural validation used by both `Validate` (pre-decode check)
    /// and `Decode` (post-deserialize check): every TODO that references a
    /// decision must resolve to a decision present in this document.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if !Self::is_schema_compatible(&self.schema_version) {
            errors.push(format!(
                "schema_version {} is major-incompatible with {}",
                self.schema_version, SCHEMA_VERSION
            ));
        }

        if self.completion_percentage > 100 {
            errors.push(format!(
                "completion_percentage {} out of range 0..=100",
                self.completion_percentage
            ));
        }

        let known_ids: std::collections::HashSet<&str> =
            self.decisions.iter().map(|d| d.id.as_str()).collect();
        for todo in &self.todo_list {
            if let Some(r) = &todo.decision_ref {
                if !known_ids.contains(r.as_str()) {
                    errors.push(format!(
                        "todo_list references unknown decision id \"{r}\""
                    ));
                }
            }
        }

        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_compatible_ignores_minor_patch() {
        assert!(HandoffDocument::is_schema_compatible("1.0.0"));
        assert!(HandoffDocument::is_schema_compatible("1.9.3"));
        assert!(!HandoffDocument::is_schema_compatible("2.0.0"));
    }

    #[test]
    fn priority_orders_p0_first() {
        let mut priorities = vec![Priority::P2, Priority::P0, Priority::P3, Priority::P1];
        priorities.sort();
        assert_eq!(
            priorities,
            vec![Priority::P0, Priority::P1, Priority::P2, Priority::P3]
        );
    }
}
