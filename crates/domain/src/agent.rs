//! Agent identity and lifecycle state — the tagged-variant model that
//! replaces runtime class dispatch over agent "kinds" (see `spec.md` §9,
//! Design Note "Dynamic dispatch across agent types").

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::usage::TokenTrackerSnapshot;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// AgentType — fixed tag set, capability table keyed by tag
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Fixed set of agent variants. The lifecycle manager looks up a base
/// system prompt and spawn policy by tag; it never dispatches through
/// virtual inheritance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentType {
    Designer,
    Frontend,
    Backend,
    CodeReviewer,
    Qa,
    Devops,
    Conversational,
}

impl AgentType {
    pub const ALL: [AgentType; 7] = [
        AgentType::Designer,
        AgentType::Frontend,
        AgentType::Backend,
        AgentType::CodeReviewer,
        AgentType::Qa,
        AgentType::Devops,
        AgentType::Conversational,
    ];

    /// Stable lowercase tag, used in logs, spans, and the handoff codec.
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentType::Designer => "designer",
            AgentType::Frontend => "frontend",
            AgentType::Backend => "backend",
            AgentType::CodeReviewer => "code_reviewer",
            AgentType::Qa => "qa",
            AgentType::Devops => "devops",
            AgentType::Conversational => "conversational",
        }
    }

    /// Base system prompt prefix for this agent type. Production
    /// deployments load the real prompt templates from the workspace;
    /// this returns a short stand-in identifying the role.
    pub fn base_prompt(&self) -> String {
        format!("You are the {} agent for this project.", self.as_str())
    }
}

impl std::fmt::Display for AgentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Agent state machine
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// `SPAWNING → ACTIVE → WARNING → CRITICAL → HANDOFF_IN_PROGRESS →
/// TERMINATED`, with a `TERMINATED_ERROR` sink for failures.
///
/// Transitions are monotonic except `WARNING ↔ ACTIVE`, which is not
/// permitted: once an instance reaches `WARNING` it never returns to
/// `ACTIVE`. Only the lifecycle manager mutates this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentState {
    Spawning,
    Active,
    Warning,
    Critical,
    HandoffInProgress,
    Terminated,
    TerminatedError,
}

impl AgentState {
    /// Whether `self -> next` is a legal transition under the state
    /// machine in `spec.md` §3.
    pub fn can_transition_to(&self, next: AgentState) -> bool {
        use AgentState::*;
        match (*self, next) {
            (Spawning, Active) => true,
            (Active, Warning) | (Active, Terminated) | (Active, TerminatedError) => true,
            (Warning, Critical) | (Warning, Terminated) | (Warning, TerminatedError) => true,
            (Critical, HandoffInProgress) | (Critical, Terminated) | (Critical, TerminatedError) => {
                true
            }
            (HandoffInProgress, Terminated) | (HandoffInProgress, TerminatedError) => true,
            _ => false,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, AgentState::Terminated | AgentState::TerminatedError)
    }
}

/// Why an agent instance was terminated. Carried into
/// `HandoffDocument.source_agent.termination_reason`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationReason {
    TaskCompleted,
    Handoff,
    Cancelled,
    Error,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// AgentInstance
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A uniquely identified running agent. Created by
/// `LifecycleManager::spawn`, mutated only by the manager, destroyed by
/// `terminate`. The orchestrator holds only the `agent_id` (a weak
/// reference by convention — it never mutates instance state directly).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentInstance {
    pub agent_id: String,
    pub agent_type: AgentType,
    /// The n-th successor in a handoff chain. The root instance is
    /// version 1.
    pub version: u32,
    pub spawn_time: DateTime<Utc>,
    pub state: AgentState,
    pub user_id: String,
    pub project_id: String,
    pub trace_id: String,
    pub task_id: String,
    pub predecessor_handoff_id: Option<String>,
    /// Snapshot of this instance's token tracker at the time the
    /// instance was last inspected. Authoritative counters live in the
    /// tracker owned by `LifecycleManager`; this is a point-in-time copy
    /// for callers that just need a read.
    pub token_snapshot: TokenTrackerSnapshot,
}

impl AgentInstance {
    /// Transition this instance's state in place. Returns an error
    /// message describing the illegal transition instead of panicking —
    /// callers (the lifecycle manager) decide how to treat it.
    pub fn transition(&mut self, next: AgentState) -> Result<(), String> {
        if !self.state.can_transition_to(next) {
            return Err(format!(
                "illegal agent state transition {:?} -> {:?} for {}",
                self.state, next, self.agent_id
            ));
        }
        self.state = next;
        Ok(())
    }
}
