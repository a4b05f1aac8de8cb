//! State extraction: turning a terminated agent's working memory into a
//! `HandoffDocument` via one model call.
//!
//! Grounded on the teacher's `generate_summary` (`gateway/src/runtime/compact.rs`):
//! build a structured prompt enumerating the facts a successor needs, call
//! the model with a low temperature and a token ceiling, and treat a
//! malformed reply as a recoverable condition with a bounded number of
//! repair attempts rather than a hard failure.

use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use ac_domain::agent::{AgentInstance, TerminationReason};
use ac_domain::handoff::{
    Decision, Dependencies, HandoffDocument, RejectedAlternative, SourceAgent, TaskStatus,
    TodoItem, TokenUsageSummary, WorkItem, SCHEMA_VERSION,
};
use ac_domain::usage::TokenTrackerSnapshot;
use ac_providers::{ModelClient, ModelMessage, ModelRequest, Role};

/// Everything extraction needs beyond what the model produces: identity,
/// accounting, and the raw transcript to summarize.
pub struct ExtractionInput<'a> {
    pub predecessor: &'a AgentInstance,
    pub termination_reason: TerminationReason,
    pub snapshot: TokenTrackerSnapshot,
    pub original_request: String,
    pub transcript: String,
    pub tool_state: serde_json::Value,
    /// The immediately preceding handoff's `completion_percentage`, or `0`
    /// if this is the task's first handoff. A floor, never a ceiling: the
    /// assembled document's completion can only go up from here.
    pub predecessor_completion_percentage: u8,
}

/// The subset of `HandoffDocument` the model is asked to produce. Identity,
/// accounting, and tool state are filled in by this crate, not the model —
/// asking the model to restate numbers it already received invites drift.
#[derive(Debug, Deserialize)]
struct ExtractedFields {
    task_description: String,
    current_phase: String,
    completion_percentage: u8,
    task_status: TaskStatus,
    #[serde(default)]
    decisions: Vec<ExtractedDecision>,
    #[serde(default)]
    rejected_alternatives: Vec<RejectedAlternative>,
    #[serde(default)]
    work_completed: Vec<WorkItem>,
    work_in_progress: String,
    #[serde(default)]
    todo_list: Vec<ExtractedTodo>,
    #[serde(default)]
    assumptions: Vec<String>,
    #[serde(default)]
    constraints: Vec<String>,
    #[serde(default)]
    dependencies: Dependencies,
}

#[derive(Debug, Deserialize)]
struct ExtractedDecision {
    title: String,
    rationale: String,
    #[serde(default)]
    confidence: f64,
    #[serde(default)]
    alternatives_considered: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ExtractedTodo {
    #[serde(default)]
    decision_ref: Option<String>,
    priority: ac_domain::handoff::Priority,
    description: String,
    acceptance_criteria: String,
}

fn extraction_prompt(input: &ExtractionInput<'_>) -> String {
    format!(
        "You are producing a handoff summary so a successor agent can resume \
         this task without the conversation history below. Respond with a \
         single JSON object, no prose, matching exactly this shape:\n\
         {{\n\
         \"task_description\": string,\n\
         \"current_phase\": string,\n\
         \"completion_percentage\": integer 0-100,\n\
         \"task_status\": \"in_progress\" | \"blocked\" | \"ready_for_handoff\",\n\
         \"decisions\": [{{\"title\": string, \"rationale\": string, \"confidence\": number 0-1, \"alternatives_considered\": [string]}}],\n\
         \"rejected_alternatives\": [{{\"option\": string, \"reason_rejected\": string, \"context\": string}}],\n\
         \"work_completed\": [{{\"artifact_kind\": string, \"identifier\": string, \"summary\": string}}],\n\
         \"work_in_progress\": string,\n\
         \"todo_list\": [{{\"decision_ref\": string | null, \"priority\": \"P0\"|\"P1\"|\"P2\"|\"P3\", \"description\": string, \"acceptance_criteria\": string}}],\n\
         \"assumptions\": [string],\n\
         \"constraints\": [string],\n\
         \"dependencies\": {{\"upstream\": [string], \"downstream\": [string]}}\n\
         }}\n\n\
         ORIGINAL REQUEST:\n{}\n\n\
         CONVERSATION AND WORK LOG:\n{}\n",
        input.original_request, input.transcript,
    )
}

fn repair_prompt(previous_error: &str) -> String {
    format!(
        "Your previous reply could not be parsed as the requested JSON object: \
         {previous_error}. Reply again with only the corrected JSON object, no \
         surrounding text."
    )
}

fn parse_fields(raw: &str) -> Result<ExtractedFields, String> {
    let trimmed = raw.trim();
    let json_start = trimmed.find('{').ok_or("no JSON object found in reply")?;
    let json_end = trimmed.rfind('}').ok_or("no JSON object found in reply")?;
    let candidate = &trimmed[json_start..=json_end];
    serde_json::from_str(candidate).map_err(|e| e.to_string())
}

fn assemble(
    input: &ExtractionInput<'_>,
    fields: ExtractedFields,
    degraded: bool,
) -> HandoffDocument {
    HandoffDocument {
        schema_version: SCHEMA_VERSION.to_string(),
        handoff_id: format!("handoff-{}", Uuid::new_v4()),
        trace_id: input.predecessor.trace_id.clone(),
        task_id: input.predecessor.task_id.clone(),
        user_id: input.predecessor.user_id.clone(),
        project_id: input.predecessor.project_id.clone(),
        predecessor_handoff_id: input.predecessor.predecessor_handoff_id.clone(),
        source_agent: SourceAgent {
            agent_id: input.predecessor.agent_id.clone(),
            agent_type: input.predecessor.agent_type,
            version: input.predecessor.version,
            spawn_time: input.predecessor.spawn_time,
            termination_time: Utc::now(),
            termination_reason: input.termination_reason,
        },
        token_usage: TokenUsageSummary {
            total: input.snapshot.total_tokens,
            input: input.snapshot.input_tokens,
            output: input.snapshot.output_tokens,
            cache_read: input.snapshot.cache_read_tokens,
            cache_create: input.snapshot.cache_create_tokens,
            usage_percentage: input.snapshot.usage_percentage,
            history: Vec::new(),
        },
        original_request: input.original_request.clone(),
        task_description: fields.task_description,
        current_phase: fields.current_phase,
        // Monotonicity: a successor's reported progress never regresses
        // below its predecessor's, whatever the extraction model reported.
        completion_percentage: fields
            .completion_percentage
            .min(100)
            .max(input.predecessor_completion_percentage),
        task_status: fields.task_status,
        decisions: fields
            .decisions
            .into_iter()
            .map(|d| Decision {
                id: format!("d-{}", Uuid::new_v4()),
                title: d.title,
                rationale: d.rationale,
                confidence: d.confidence,
                alternatives_considered: d.alternatives_considered,
                timestamp: Utc::now(),
            })
            .collect(),
        rejected_alternatives: fields.rejected_alternatives,
        work_completed: fields.work_completed,
        work_in_progress: fields.work_in_progress,
        todo_list: fields
            .todo_list
            .into_iter()
            .map(|t| TodoItem {
                decision_ref: t.decision_ref,
                priority: t.priority,
                description: t.description,
                acceptance_criteria: t.acceptance_criteria,
            })
            .collect(),
        tool_state: input.tool_state.clone(),
        assumptions: fields.assumptions,
        constraints: fields.constraints,
        dependencies: fields.dependencies,
        error_history: Vec::new(),
        references: Vec::new(),
        degraded,
    }
}

/// A minimal handoff built without any model call, used when extraction
/// itself cannot complete — e.g. the model call times out or every repair
/// attempt is exhausted. `degraded` is always `true`.
pub fn fallback(input: &ExtractionInput<'_>, reason: &str) -> HandoffDocument {
    let fields = ExtractedFields {
        task_description: input.original_request.clone(),
        current_phase: "unknown".to_string(),
        completion_percentage: 0,
        task_status: TaskStatus::Blocked,
        decisions: Vec::new(),
        rejected_alternatives: Vec::new(),
        work_completed: Vec::new(),
        work_in_progress: format!("state extraction failed ({reason}); resume from raw transcript"),
        todo_list: Vec::new(),
        assumptions: Vec::new(),
        constraints: Vec::new(),
        dependencies: Dependencies::default(),
    };
    let mut doc = assemble(input, fields, true);
    doc.error_history.push(reason.to_string());
    doc
}

/// Run extraction against `client`, retrying up to `repair_attempts` times
/// on a malformed reply before degrading to [`fallback`].
pub async fn extract(
    client: &dyn ModelClient,
    input: ExtractionInput<'_>,
    repair_attempts: u32,
) -> HandoffDocument {
    let mut messages = vec![ModelMessage {
        role: Role::User,
        content: extraction_prompt(&input),
    }];

    let mut last_error = String::new();
    for attempt in 0..=repair_attempts {
        let request = ModelRequest {
            messages: messages.clone(),
            temperature: Some(0.1),
            max_tokens: Some(2000),
            ..Default::default()
        };

        let reply = match client.complete(request).await {
            Ok(r) => r,
            Err(e) => {
                last_error = e.to_string();
                tracing::warn!(attempt, error = %last_error, "extraction model call failed");
                continue;
            }
        };

        match parse_fields(&reply.content) {
            Ok(fields) => {
                let doc = assemble(&input, fields, false);
                if doc.validate().is_empty() {
                    return doc;
                }
                last_error = doc.validate().join("; ");
            }
            Err(e) => {
                last_error = e;
            }
        }

        tracing::warn!(attempt, error = %last_error, "extraction reply failed validation, repairing");
        messages.push(ModelMessage {
            role: Role::Assistant,
            content: reply.content,
        });
        messages.push(ModelMessage {
            role: Role::User,
            content: repair_prompt(&last_error),
        });
    }

    fallback(&input, &format!("exhausted repair attempts: {last_error}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ac_domain::agent::{AgentState, AgentType};
    use ac_providers::test_client::TestModelClient;

    fn predecessor() -> AgentInstance {
        AgentInstance {
            agent_id: "agent-1".to_string(),
            agent_type: AgentType::Backend,
            version: 1,
            spawn_time: Utc::now(),
            state: AgentState::Critical,
            user_id: "u1".to_string(),
            project_id: "p1".to_string(),
            trace_id: "t1".to_string(),
            task_id: "task-1".to_string(),
            predecessor_handoff_id: None,
            token_snapshot: TokenTrackerSnapshot {
                total_tokens: 190_000,
                input_tokens: 180_000,
                output_tokens: 10_000,
                cache_read_tokens: 0,
                cache_create_tokens: 0,
                usage_percentage: 90.0,
                remaining_tokens: 20_000,
                status: ac_domain::usage::ThresholdStatus::Critical,
            },
        }
    }

    fn input(predecessor: &AgentInstance) -> ExtractionInput<'_> {
        input_with_floor(predecessor, 0)
    }

    fn input_with_floor(predecessor: &AgentInstance, predecessor_completion_percentage: u8) -> ExtractionInput<'_> {
        ExtractionInput {
            predecessor,
            termination_reason: TerminationReason::Handoff,
            snapshot: predecessor.token_snapshot.clone(),
            original_request: "Build the rate limiter".to_string(),
            transcript: "agent implemented token bucket, wrote tests".to_string(),
            tool_state: serde_json::json!({}),
            predecessor_completion_percentage,
        }
    }

    #[tokio::test]
    async fn valid_reply_produces_a_non_degraded_document() {
        let client = TestModelClient::new("test");
        client.push_text_reply(
            r#"{"task_description":"rate limiter","current_phase":"implementation",
               "completion_percentage":50,"task_status":"in_progress","decisions":[],
               "rejected_alternatives":[],"work_completed":[],
               "work_in_progress":"wiring middleware","todo_list":[],
               "assumptions":[],"constraints":[],
               "dependencies":{"upstream":[],"downstream":[]}}"#,
            100,
            50,
        );
        let predecessor = predecessor();
        let doc = extract(&client, input(&predecessor), 1).await;
        assert!(!doc.degraded);
        assert_eq!(doc.completion_percentage, 50);
        assert_eq!(client.call_count(), 1);
    }

    #[tokio::test]
    async fn malformed_reply_is_repaired_once_then_succeeds() {
        let client = TestModelClient::new("test");
        client.push_text_reply("not json at all", 100, 10);
        client.push_text_reply(
            r#"{"task_description":"x","current_phase":"p","completion_percentage":10,
               "task_status":"blocked","work_in_progress":"wip"}"#,
            100,
            10,
        );
        let predecessor = predecessor();
        let doc = extract(&client, input(&predecessor), 1).await;
        assert!(!doc.degraded);
        assert_eq!(client.call_count(), 2);
    }

    #[tokio::test]
    async fn exhausting_repairs_degrades_to_fallback() {
        let client = TestModelClient::new("test");
        client.push_text_reply("garbage", 100, 5);
        client.push_text_reply("still garbage", 100, 5);
        let predecessor = predecessor();
        let doc = extract(&client, input(&predecessor), 1).await;
        assert!(doc.degraded);
        assert_eq!(doc.task_status, TaskStatus::Blocked);
    }

    #[tokio::test]
    async fn completion_percentage_never_regresses_below_predecessor() {
        let client = TestModelClient::new("test");
        client.push_text_reply(
            r#"{"task_description":"rate limiter","current_phase":"implementation",
               "completion_percentage":30,"task_status":"in_progress",
               "work_in_progress":"re-checking an earlier assumption"}"#,
            100,
            10,
        );
        let predecessor = predecessor();
        let doc = extract(&client, input_with_floor(&predecessor, 60), 1).await;
        assert_eq!(doc.completion_percentage, 60);
    }

    #[tokio::test]
    async fn completion_percentage_above_floor_passes_through() {
        let client = TestModelClient::new("test");
        client.push_text_reply(
            r#"{"task_description":"rate limiter","current_phase":"implementation",
               "completion_percentage":80,"task_status":"in_progress",
               "work_in_progress":"final cleanup"}"#,
            100,
            10,
        );
        let predecessor = predecessor();
        let doc = extract(&client, input_with_floor(&predecessor, 60), 1).await;
        assert_eq!(doc.completion_percentage, 80);
    }

    #[tokio::test]
    async fn fallback_document_is_floored_to_predecessor_completion() {
        let predecessor = predecessor();
        let doc = fallback(&input_with_floor(&predecessor, 45), "model unreachable");
        assert_eq!(doc.completion_percentage, 45);
    }
}
