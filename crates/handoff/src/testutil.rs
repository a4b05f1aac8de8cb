//! Fixtures shared by this crate's test modules. Not part of the public API.

use ac_domain::agent::{AgentType, TerminationReason};
use ac_domain::handoff::{
    Decision, Dependencies, HandoffDocument, Priority, RejectedAlternative, SourceAgent,
    TaskStatus, TodoItem, TokenUsageSummary, WorkItem, SCHEMA_VERSION,
};

pub fn sample_document() -> HandoffDocument {
    let now = chrono::Utc::now();
    HandoffDocument {
        schema_version: SCHEMA_VERSION.to_string(),
        handoff_id: "handoff-abc123".to_string(),
        trace_id: "trace-1".to_string(),
        task_id: "task-1".to_string(),
        user_id: "user-1".to_string(),
        project_id: "project-1".to_string(),
        predecessor_handoff_id: None,
        source_agent: SourceAgent {
            agent_id: "agent-1".to_string(),
            agent_type: AgentType::Backend,
            version: 1,
            spawn_time: now,
            termination_time: now,
            termination_reason: TerminationReason::Handoff,
        },
        token_usage: TokenUsageSummary {
            total: 190_000,
            input: 150_000,
            output: 30_000,
            cache_read: 10_000,
            cache_create: 0,
            usage_percentage: 92.0,
            history: Vec::new(),
        },
        original_request: "Add rate limiting to the webhook ingress".to_string(),
        task_description: "Implement a token-bucket limiter in front of inbound webhooks"
            .to_string(),
        current_phase: "implementation".to_string(),
        completion_percentage: 60,
        task_status: TaskStatus::InProgress,
        decisions: vec![Decision {
            id: "d1".to_string(),
            title: "Use a token bucket over a sliding window".to_string(),
            rationale: "Simpler to reason about under bursty webhook traffic".to_string(),
            confidence: 0.8,
            alternatives_considered: vec!["sliding window".to_string()],
            timestamp: now,
        }],
        rejected_alternatives: vec![RejectedAlternative {
            option: "Redis-backed counter".to_string(),
            reason_rejected: "adds an external dependency for a single-process limiter"
                .to_string(),
            context: "rate limiting".to_string(),
        }],
        work_completed: vec![WorkItem {
            artifact_kind: "module".to_string(),
            identifier: "ac_domain::config::server::RateLimitConfig".to_string(),
            summary: "config schema for burst size and requests per second".to_string(),
        }],
        work_in_progress: "Wiring the limiter into the webhook handler".to_string(),
        todo_list: vec![TodoItem {
            decision_ref: Some("d1".to_string()),
            priority: Priority::P1,
            description: "Add limiter middleware to the webhook route".to_string(),
            acceptance_criteria: "Requests beyond burst size receive 429".to_string(),
        }],
        tool_state: serde_json::json!({}),
        assumptions: vec!["Single gateway instance, no shared limiter state needed".to_string()],
        constraints: vec!["Must not add a new external service dependency".to_string()],
        dependencies: Dependencies::default(),
        error_history: Vec::new(),
        references: Vec::new(),
        degraded: false,
    }
}
