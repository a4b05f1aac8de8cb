//! `Orchestrator` — drives an inbound message through classification,
//! workflow stage selection, and the lifecycle/handoff recovery loop.
//!
//! Grounded on the teacher's `run_turn` (`gateway/src/runtime/turn.rs`):
//! resolve context, call the model, handle the reply, persist state,
//! notify. Generalized from a single streamed tool-call loop to a
//! multi-stage workflow where a context-window exhaustion mid-stage is
//! recovered by handing off to a successor instead of failing the turn.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use uuid::Uuid;

use ac_domain::agent::{AgentState, AgentType, TerminationReason};
use ac_domain::concurrency::KeyedMutex;
use ac_domain::config::{WorkflowConfig, WorkflowTemplate};
use ac_domain::error::{Error, Result};
use ac_domain::trace::TraceEvent;
use ac_handoff::{ExtractionInput, HandoffStore};
use ac_lifecycle::LifecycleManager;
use ac_observability::{ObservabilityBus, SpanGuard, SpanLevel};
use ac_providers::{ModelClient, ModelMessage, ModelRequest, Role};
use ac_tools::ToolSessionRegistry;

use crate::classify;
use crate::dedupe::DedupeStore;
use crate::notifier::{phrasing, Notifier};

/// An inbound message normalized across every channel adapter (WhatsApp,
/// GitHub, ...). `task_id` is `None` for the first message of a new task.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub event_id: String,
    pub user_id: String,
    pub project_id: String,
    pub task_id: Option<String>,
    pub text: String,
}

struct WorkflowState {
    trace_id: String,
    template: WorkflowTemplate,
    stages: Vec<AgentType>,
    stage_index: usize,
    active_agent_id: String,
    original_request: String,
    /// Kept open for the life of the workflow. Declared before `user_span`
    /// so it drops (closes) first when the state is removed — spans must
    /// close in lexical (innermost-first) order.
    workflow_span: SpanGuard,
    user_span: SpanGuard,
}

/// Maximum number of successive handoffs a single workflow stage will
/// absorb before the orchestrator gives up and surfaces the task to a
/// human instead of looping forever.
const MAX_RECOVERY_ATTEMPTS: u32 = 4;

/// A stage agent signals it has finished its work by ending its reply with
/// this token, per the instruction appended to its system prompt. Until
/// then the same agent instance keeps handling the task's inbound messages.
fn stage_is_complete(reply_content: &str) -> bool {
    reply_content.contains("STAGE_COMPLETE")
}

pub struct Orchestrator {
    lifecycle: Arc<LifecycleManager>,
    handoff_store: Arc<HandoffStore>,
    observability: Arc<ObservabilityBus>,
    model_client: Arc<dyn ModelClient>,
    notifier: Arc<dyn Notifier>,
    workflow_config: WorkflowConfig,
    user_lock: KeyedMutex<String>,
    dedupe: DedupeStore,
    workflows: RwLock<HashMap<String, WorkflowState>>,
    /// Keyed by agent_id. Carried forward across a handoff (same stage,
    /// successor instance); replaced with a fresh registry on stage
    /// advance (a new stage starts with no open sessions of its own).
    tool_sessions: RwLock<HashMap<String, Arc<ToolSessionRegistry>>>,
}

impl Orchestrator {
    pub fn new(
        lifecycle: Arc<LifecycleManager>,
        handoff_store: Arc<HandoffStore>,
        observability: Arc<ObservabilityBus>,
        model_client: Arc<dyn ModelClient>,
        notifier: Arc<dyn Notifier>,
        workflow_config: WorkflowConfig,
    ) -> Self {
        Self {
            lifecycle,
            handoff_store,
            observability,
            model_client,
            notifier,
            workflow_config,
            user_lock: KeyedMutex::new(),
            dedupe: DedupeStore::new(Duration::from_secs(15 * 60)),
            workflows: RwLock::new(HashMap::new()),
            tool_sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Entry point for every inbound message. Deduplicates, then serializes
    /// per `user_id` so two messages from the same user never race each
    /// other's workflow step.
    pub async fn handle_message(&self, msg: InboundMessage) -> Result<()> {
        if self.dedupe.check_and_insert(&msg.event_id) {
            TraceEvent::MessageDeduplicated {
                event_id: msg.event_id.clone(),
                user_id: msg.user_id.clone(),
            }
            .emit();
            return Ok(());
        }

        let user_id = msg.user_id.clone();
        self.user_lock
            .with_lock(&user_id, || self.handle_message_locked(msg))
            .await
    }

    async fn handle_message_locked(&self, msg: InboundMessage) -> Result<()> {
        let existing = msg
            .task_id
            .as_ref()
            .map(|id| self.workflows.read().contains_key(id))
            .unwrap_or(false);

        let task_id = if existing {
            let task_id = msg.task_id.clone().unwrap();
            // A follow-up on a task already in progress: classify only to
            // catch `cancellation` — every other category routes to the
            // workflow already running, same as before classification
            // existed.
            let category = classify::classify_category(self.model_client.as_ref(), &msg.text).await;
            if category == classify::MessageCategory::Cancellation {
                return self.cancel_workflow(&task_id).await;
            }
            task_id
        } else {
            let task_id = msg
                .task_id
                .clone()
                .unwrap_or_else(|| format!("task-{}", Uuid::new_v4()));
            self.start_workflow(&msg, &task_id).await?;
            task_id
        };

        self.run_recovering_step(&task_id, &msg.text).await
    }

    /// Stop scheduling further steps for `task_id` and terminate its active
    /// agent. Any handoff document already persisted for this task stays;
    /// nothing in-flight is discarded because `cancel_workflow` only runs
    /// between steps, never mid-model-call.
    async fn cancel_workflow(&self, task_id: &str) -> Result<()> {
        let (agent_id, user_id, template) = {
            let workflows = self.workflows.read();
            let state = match workflows.get(task_id) {
                Some(s) => s,
                None => return Ok(()),
            };
            let user_id = self
                .lifecycle
                .get(&state.active_agent_id)
                .map(|i| i.user_id)
                .unwrap_or_default();
            (state.active_agent_id.clone(), user_id, state.template)
        };

        self.lifecycle.terminate(&agent_id, TerminationReason::Cancelled)?;
        self.workflows.write().remove(task_id);
        self.tool_sessions.write().remove(&agent_id);
        self.notifier
            .notify(&user_id, &phrasing::task_cancelled(template.as_str()))
            .await
    }

    async fn start_workflow(&self, msg: &InboundMessage, task_id: &str) -> Result<()> {
        // Stage 1: decide the message's category. Stage 2 (workflow
        // template selection) only runs for `new_task` — there's no active
        // workflow yet to route any other category to, so fall back to a
        // plain conversation rather than spending a second model call.
        let category = classify::classify_category(self.model_client.as_ref(), &msg.text).await;
        let template = if category.is_new_task() {
            classify::classify_template(self.model_client.as_ref(), &msg.text).await
        } else {
            WorkflowTemplate::Conversational
        };
        let stages = self
            .workflow_config
            .templates
            .get(template.as_str())
            .map(|t| t.stages.clone())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| vec![AgentType::Conversational]);

        let trace_id = format!("trace-{}", Uuid::new_v4());
        let stage = stages[0];

        // Kept open for the life of the workflow: every stage's
        // `AgentLifecycle` span nests under `workflow_span`, which nests
        // under `user_span`. Both close only once the task completes or
        // the workflow is abandoned (see `maybe_advance_stage` and
        // `run_recovering_step`).
        let user_span = self.observability.enter(
            trace_id.clone(),
            SpanLevel::UserRequest,
            "inbound_message",
            serde_json::json!({ "user_id": msg.user_id, "task_id": task_id }),
        )?;
        let workflow_span = self.observability.enter(
            trace_id.clone(),
            SpanLevel::Workflow,
            format!("workflow:{}", template.as_str()),
            serde_json::json!({ "template": template.as_str(), "task_id": task_id }),
        )?;

        let instance = self
            .lifecycle
            .spawn_root(stage, &msg.user_id, &msg.project_id, &trace_id, task_id);

        TraceEvent::WorkflowSelected {
            template: template.as_str().to_string(),
            user_id: msg.user_id.clone(),
            task_id: task_id.to_string(),
        }
        .emit();

        self.notifier
            .notify(&msg.user_id, &phrasing::workflow_started(template.as_str(), stage))
            .await?;

        self.tool_sessions
            .write()
            .insert(instance.agent_id.clone(), Arc::new(ToolSessionRegistry::new()));

        self.workflows.write().insert(
            task_id.to_string(),
            WorkflowState {
                trace_id,
                template,
                stages,
                stage_index: 0,
                active_agent_id: instance.agent_id,
                original_request: msg.text.clone(),
                workflow_span,
                user_span,
            },
        );
        Ok(())
    }

    /// Run one workflow step, recovering from context-window exhaustion by
    /// handing off and retrying, bounded by `MAX_RECOVERY_ATTEMPTS`.
    async fn run_recovering_step(&self, task_id: &str, text: &str) -> Result<()> {
        for attempt in 0..MAX_RECOVERY_ATTEMPTS {
            match self.run_step(task_id, text).await {
                Ok(()) => return Ok(()),
                Err(Error::ContextWindowExhausted { .. }) => {
                    tracing::info!(task_id, attempt, "recovering from context window exhaustion");
                    continue;
                }
                Err(e) => return Err(e),
            }
        }

        let (user_id, template) = {
            let workflows = self.workflows.read();
            let state = workflows
                .get(task_id)
                .ok_or_else(|| Error::Other(format!("unknown task {task_id}")))?;
            let user_id = self
                .lifecycle
                .get(&state.active_agent_id)
                .map(|i| i.user_id)
                .unwrap_or_default();
            (user_id, state.template)
        };
        self.notifier
            .notify(&user_id, &phrasing::handoff_limit_exceeded(template.as_str()))
            .await?;
        // Give up on this workflow: drop its state, closing the
        // `workflow_span`/`user_span` pair that have been open since
        // `start_workflow`.
        self.workflows.write().remove(task_id);
        Err(Error::HandoffLimitExceeded(MAX_RECOVERY_ATTEMPTS))
    }

    async fn run_step(&self, task_id: &str, text: &str) -> Result<()> {
        let (agent_id, stage, trace_id, user_id) = {
            let workflows = self.workflows.read();
            let state = workflows
                .get(task_id)
                .ok_or_else(|| Error::Other(format!("unknown task {task_id}")))?;
            (
                state.active_agent_id.clone(),
                state.stages[state.stage_index],
                state.trace_id.clone(),
                self.lifecycle
                    .get(&state.active_agent_id)
                    .map(|i| i.user_id)
                    .unwrap_or_default(),
            )
        };

        let system_prompt = format!(
            "{} End your reply with the literal token STAGE_COMPLETE once this stage's work is done.",
            stage.base_prompt()
        );
        let request = ModelRequest {
            messages: vec![
                ModelMessage {
                    role: Role::System,
                    content: system_prompt,
                },
                ModelMessage {
                    role: Role::User,
                    content: text.to_string(),
                },
            ],
            ..Default::default()
        };

        let agent_span = self.observability.enter(
            trace_id.clone(),
            SpanLevel::AgentLifecycle,
            stage.as_str(),
            serde_json::json!({ "agent_id": agent_id }),
        )?;

        let reply = self.model_client.complete(request).await?;

        TraceEvent::ModelCall {
            provider: self.model_client.client_id().to_string(),
            model: reply.model.clone(),
            duration_ms: 0,
            input_tokens: reply.usage.input_tokens,
            output_tokens: reply.usage.output_tokens,
        }
        .emit();

        let previous_state = self.lifecycle.get(&agent_id).map(|i| i.state);

        let usage_result = self
            .lifecycle
            .record_usage(&agent_id, "turn", reply.usage.clone());

        agent_span.finish();

        match usage_result {
            Ok(snapshot) => {
                // Fire the WARNING advisory exactly once, on the call that
                // crosses the threshold — not on every subsequent turn
                // spent at WARNING.
                let now_warning = self.lifecycle.get(&agent_id).map(|i| i.state) == Some(AgentState::Warning);
                if now_warning && previous_state != Some(AgentState::Warning) {
                    self.notifier
                        .notify(&user_id, &phrasing::approaching_limit(stage, snapshot.usage_percentage))
                        .await?;
                }

                if stage_is_complete(&reply.content) {
                    self.maybe_advance_stage(task_id, &user_id).await
                } else {
                    // Usage recorded without crossing into a handoff, but
                    // the model hasn't signalled the stage is finished:
                    // stay on this agent instance and wait for the next
                    // inbound message.
                    Ok(())
                }
            }
            Err(Error::ContextWindowExhausted { used, limit, pct }) => {
                // `record_usage` returns this exactly once, on the call
                // that first crosses into CRITICAL — the right moment to
                // fire the CRITICAL advisory, before recovery begins.
                self.notifier
                    .notify(&user_id, &phrasing::critical_preparing_handoff(stage))
                    .await?;
                self.recover_from_exhaustion(task_id, &agent_id, &user_id).await?;
                Err(Error::ContextWindowExhausted { used, limit, pct })
            }
            Err(e) => Err(e),
        }
    }

    async fn recover_from_exhaustion(
        &self,
        task_id: &str,
        agent_id: &str,
        user_id: &str,
    ) -> Result<()> {
        let predecessor = self
            .lifecycle
            .begin_handoff(agent_id)?;

        let snapshot = predecessor.token_snapshot.clone();
        let original_request = self
            .workflows
            .read()
            .get(task_id)
            .map(|s| s.original_request.clone())
            .unwrap_or_default();

        let tool_state = self
            .tool_sessions
            .read()
            .get(agent_id)
            .map(|r| r.snapshot())
            .unwrap_or_else(|| serde_json::json!({}));

        // Floor for the monotonicity check in `ac_handoff::extract`: the
        // previous handoff in this chain, if any.
        let predecessor_completion_percentage = predecessor
            .predecessor_handoff_id
            .as_deref()
            .and_then(|id| self.handoff_store.load(id).ok())
            .map(|doc| doc.completion_percentage)
            .unwrap_or(0);

        let input = ExtractionInput {
            predecessor: &predecessor,
            termination_reason: TerminationReason::Handoff,
            snapshot,
            original_request,
            transcript: String::new(),
            tool_state,
            predecessor_completion_percentage,
        };

        let repair_attempts = 1;
        let doc = ac_handoff::extract(self.model_client.as_ref(), input, repair_attempts).await;
        let degraded = doc.degraded;
        self.handoff_store.save(doc.clone()).await?;

        self.lifecycle.terminate(agent_id, TerminationReason::Handoff)?;
        let successor = self.lifecycle.spawn_successor(&predecessor, doc.handoff_id.clone());

        if let Some(state) = self.workflows.write().get_mut(task_id) {
            state.active_agent_id = successor.agent_id.clone();
        }
        let carried_registry = self.tool_sessions.write().remove(agent_id);
        if let Some(registry) = carried_registry {
            self.tool_sessions
                .write()
                .insert(successor.agent_id.clone(), registry);
        }

        let phrase = if degraded {
            phrasing::degraded_handoff_occurred(predecessor.agent_type, successor.version)
        } else {
            phrasing::handoff_occurred(predecessor.agent_type, successor.version)
        };
        self.notifier.notify(user_id, &phrase).await?;

        Ok(())
    }

    async fn maybe_advance_stage(&self, task_id: &str, user_id: &str) -> Result<()> {
        let (agent_id, current_stage, next_stage, template) = {
            let workflows = self.workflows.read();
            let state = workflows
                .get(task_id)
                .ok_or_else(|| Error::Other(format!("unknown task {task_id}")))?;
            let next = state.stages.get(state.stage_index + 1).copied();
            (
                state.active_agent_id.clone(),
                state.stages[state.stage_index],
                next,
                state.template,
            )
        };

        let instance = match self.lifecycle.get(&agent_id) {
            Some(i) => i,
            None => return Ok(()),
        };

        match next_stage {
            Some(next) => {
                self.lifecycle.terminate(&agent_id, TerminationReason::TaskCompleted)?;
                let trace_id = instance.trace_id.clone();
                let successor = self.lifecycle.spawn_root(
                    next,
                    &instance.user_id,
                    &instance.project_id,
                    &trace_id,
                    task_id,
                );
                self.tool_sessions.write().remove(&agent_id);
                self.tool_sessions
                    .write()
                    .insert(successor.agent_id.clone(), Arc::new(ToolSessionRegistry::new()));
                if let Some(state) = self.workflows.write().get_mut(task_id) {
                    state.stage_index += 1;
                    state.active_agent_id = successor.agent_id;
                }
                self.notifier
                    .notify(user_id, &phrasing::stage_advanced(current_stage, next))
                    .await?;
            }
            None => {
                self.lifecycle.terminate(&agent_id, TerminationReason::TaskCompleted)?;
                self.workflows.write().remove(task_id);
                self.tool_sessions.write().remove(&agent_id);
                self.notifier
                    .notify(user_id, &phrasing::task_completed(template.as_str()))
                    .await?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ac_domain::config::ThresholdConfig;
    use ac_providers::test_client::TestModelClient;
    use std::sync::Mutex as StdMutex;

    struct CapturingNotifier {
        sent: StdMutex<Vec<(String, String)>>,
    }

    impl CapturingNotifier {
        fn new() -> Self {
            Self {
                sent: StdMutex::new(Vec::new()),
            }
        }

        fn messages(&self) -> Vec<(String, String)> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl Notifier for CapturingNotifier {
        async fn notify(&self, user_id: &str, body: &str) -> Result<()> {
            self.sent
                .lock()
                .unwrap()
                .push((user_id.to_string(), body.to_string()));
            Ok(())
        }
    }

    fn build(
        client: Arc<TestModelClient>,
        notifier: Arc<CapturingNotifier>,
    ) -> Orchestrator {
        let threshold = ThresholdConfig {
            context_window_limit: 1000,
            warn_fraction: 0.75,
            critical_fraction: 0.90,
        };
        let lifecycle = Arc::new(LifecycleManager::new(threshold));
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(HandoffStore::open(dir.path().join("handoffs.json")).unwrap());
        // Leaked on purpose: the tempdir must outlive the store for the
        // duration of the test, and tests are short-lived processes.
        std::mem::forget(dir);
        let observability = Arc::new(ObservabilityBus::new());
        Orchestrator::new(
            lifecycle,
            store,
            observability,
            client,
            notifier,
            WorkflowConfig::default(),
        )
    }

    #[tokio::test]
    async fn conversational_message_completes_in_one_step() {
        let client = Arc::new(TestModelClient::new("test"));
        client.push_text_reply("new_task", 1, 1);
        client.push_text_reply("bug_fix", 1, 1);
        client.push_text_reply("handled it", 50, 20);
        let notifier = Arc::new(CapturingNotifier::new());
        let orch = build(client, notifier.clone());

        orch.handle_message(InboundMessage {
            event_id: "evt-1".to_string(),
            user_id: "user-1".to_string(),
            project_id: "proj-1".to_string(),
            task_id: None,
            text: "fix the crash on login".to_string(),
        })
        .await
        .unwrap();

        let messages = notifier.messages();
        assert!(messages.iter().any(|(_, m)| m.contains("Starting a bug_fix")));
    }

    #[tokio::test]
    async fn duplicate_event_id_is_ignored() {
        let client = Arc::new(TestModelClient::new("test"));
        client.push_text_reply("new_task", 1, 1);
        client.push_text_reply("conversational", 1, 1);
        client.push_text_reply("hi", 10, 5);
        let notifier = Arc::new(CapturingNotifier::new());
        let orch = build(client.clone(), notifier.clone());

        let msg = InboundMessage {
            event_id: "evt-dup".to_string(),
            user_id: "user-1".to_string(),
            project_id: "proj-1".to_string(),
            task_id: None,
            text: "hello".to_string(),
        };
        orch.handle_message(msg.clone()).await.unwrap();
        let calls_after_first = client.call_count();
        orch.handle_message(msg).await.unwrap();
        assert_eq!(client.call_count(), calls_after_first);
    }

    #[tokio::test]
    async fn exhaustion_triggers_handoff_and_recovers() {
        let client = Arc::new(TestModelClient::new("test"));
        client.push_text_reply("new_task", 1, 1);
        client.push_text_reply("bug_fix", 1, 1);
        // First message crosses into WARNING only; the agent keeps working.
        client.push_text_reply("still digging into it", 750, 0);
        // Second message is a follow-up on the same task: only the
        // category call runs (stage 1), no template reclassification.
        client.push_text_reply("status_query", 1, 1);
        // Second message pushes it over CRITICAL.
        client.push_text_reply("getting closer", 200, 0);
        // Extraction call during recovery.
        client.push_text_reply(
            r#"{"task_description":"fix login crash","current_phase":"debugging",
               "completion_percentage":20,"task_status":"in_progress",
               "work_in_progress":"narrowing down the crash"}"#,
            100,
            20,
        );
        // Retried turn against the successor completes the stage.
        client.push_text_reply("fixed it. STAGE_COMPLETE", 10, 5);
        let notifier = Arc::new(CapturingNotifier::new());
        let orch = build(client, notifier.clone());

        let task_id = Some("task-fix-login".to_string());
        orch.handle_message(InboundMessage {
            event_id: "evt-2a".to_string(),
            user_id: "user-1".to_string(),
            project_id: "proj-1".to_string(),
            task_id: task_id.clone(),
            text: "fix the crash".to_string(),
        })
        .await
        .unwrap();

        orch.handle_message(InboundMessage {
            event_id: "evt-2b".to_string(),
            user_id: "user-1".to_string(),
            project_id: "proj-1".to_string(),
            task_id,
            text: "any progress?".to_string(),
        })
        .await
        .unwrap();

        let messages = notifier.messages();
        assert!(messages.iter().any(|(_, m)| m.contains("handed off")));
        assert!(messages.iter().any(|(_, m)| m.contains("backend finished its part")));
    }

    #[tokio::test]
    async fn cancellation_stops_the_workflow_without_a_turn() {
        let client = Arc::new(TestModelClient::new("test"));
        client.push_text_reply("new_task", 1, 1);
        client.push_text_reply("bug_fix", 1, 1);
        client.push_text_reply("on it", 10, 5);
        // Follow-up classifies as cancellation: no further turn is run.
        client.push_text_reply("cancellation", 1, 1);
        let notifier = Arc::new(CapturingNotifier::new());
        let orch = build(client.clone(), notifier.clone());

        let task_id = Some("task-cancel-me".to_string());
        orch.handle_message(InboundMessage {
            event_id: "evt-3a".to_string(),
            user_id: "user-1".to_string(),
            project_id: "proj-1".to_string(),
            task_id: task_id.clone(),
            text: "fix the crash".to_string(),
        })
        .await
        .unwrap();
        let calls_after_first = client.call_count();

        orch.handle_message(InboundMessage {
            event_id: "evt-3b".to_string(),
            user_id: "user-1".to_string(),
            project_id: "proj-1".to_string(),
            task_id,
            text: "actually never mind, cancel this".to_string(),
        })
        .await
        .unwrap();

        // The category call ran but no model turn was taken afterward.
        assert_eq!(client.call_count(), calls_after_first + 1);
        let messages = notifier.messages();
        assert!(messages.iter().any(|(_, m)| m.contains("cancelled")));
    }
}
