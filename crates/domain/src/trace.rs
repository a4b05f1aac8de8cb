use serde::Serialize;

/// Discrete structured events emitted across all agentcore crates, carried
/// through whichever span is active on the `ac-observability` stack when
/// `emit` is called (see `spec.md` §7).
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    AgentSpawned {
        agent_id: String,
        agent_type: String,
        version: u32,
        predecessor_handoff_id: Option<String>,
    },
    AgentTerminated {
        agent_id: String,
        agent_type: String,
        reason: String,
        final_state: String,
        lifetime_ms: u64,
    },
    ThresholdCrossed {
        agent_id: String,
        from_status: String,
        to_status: String,
        usage_percentage: f64,
    },
    HandoffSaved {
        handoff_id: String,
        agent_id: String,
        predecessor_handoff_id: Option<String>,
        degraded: bool,
    },
    HandoffLoaded {
        handoff_id: String,
        chain_depth: u32,
    },
    ModelCall {
        provider: String,
        model: String,
        duration_ms: u64,
        input_tokens: u64,
        output_tokens: u64,
    },
    ToolInvoked {
        tool_name: String,
        duration_ms: u64,
        ok: bool,
    },
    WorkflowSelected {
        template: String,
        user_id: String,
        task_id: String,
    },
    MessageDeduplicated {
        event_id: String,
        user_id: String,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "ac_event");
    }
}
