//! `LifecycleManager` — sole authority over agent instance state.
//!
//! Grounded on the teacher's session `LifecycleManager` (evaluate, then
//! mutate — the manager is the only writer of instance state) and
//! `AgentManager`'s registry-by-id shape, generalized from a reset-on-idle
//! session registry to a monotonic agent-instance state machine.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use uuid::Uuid;

use ac_domain::agent::{AgentInstance, AgentState, AgentType, TerminationReason};
use ac_domain::config::ThresholdConfig;
use ac_domain::error::{Error, Result};
use ac_domain::trace::TraceEvent;
use ac_domain::usage::{TokenTrackerSnapshot, Usage};

use crate::tracker::TokenTracker;

struct Entry {
    instance: AgentInstance,
    tracker: Arc<TokenTracker>,
}

/// Registry of live agent instances plus the token tracker each one owns.
/// This is the only component allowed to mutate `AgentInstance::state` —
/// every other crate reads a snapshot.
pub struct LifecycleManager {
    threshold: ThresholdConfig,
    entries: RwLock<HashMap<String, Entry>>,
}

impl LifecycleManager {
    pub fn new(threshold: ThresholdConfig) -> Self {
        Self {
            threshold,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Spawn the root instance of a task (version 1, no predecessor).
    pub fn spawn_root(
        &self,
        agent_type: AgentType,
        user_id: impl Into<String>,
        project_id: impl Into<String>,
        trace_id: impl Into<String>,
        task_id: impl Into<String>,
    ) -> AgentInstance {
        self.spawn_inner(agent_type, user_id, project_id, trace_id, task_id, 1, None)
    }

    /// Spawn the successor named by a handoff: version is the predecessor's
    /// version + 1, identity fields are carried forward unchanged.
    pub fn spawn_successor(&self, predecessor: &AgentInstance, handoff_id: impl Into<String>) -> AgentInstance {
        self.spawn_inner(
            predecessor.agent_type,
            predecessor.user_id.clone(),
            predecessor.project_id.clone(),
            predecessor.trace_id.clone(),
            predecessor.task_id.clone(),
            predecessor.version + 1,
            Some(handoff_id.into()),
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn spawn_inner(
        &self,
        agent_type: AgentType,
        user_id: impl Into<String>,
        project_id: impl Into<String>,
        trace_id: impl Into<String>,
        task_id: impl Into<String>,
        version: u32,
        predecessor_handoff_id: Option<String>,
    ) -> AgentInstance {
        let agent_id = Uuid::new_v4().to_string();
        let tracker = Arc::new(TokenTracker::new(self.threshold.clone()));
        let mut instance = AgentInstance {
            agent_id: agent_id.clone(),
            agent_type,
            version,
            spawn_time: Utc::now(),
            state: AgentState::Spawning,
            user_id: user_id.into(),
            project_id: project_id.into(),
            trace_id: trace_id.into(),
            task_id: task_id.into(),
            predecessor_handoff_id: predecessor_handoff_id.clone(),
            token_snapshot: tracker.snapshot(),
        };
        instance
            .transition(AgentState::Active)
            .expect("Spawning -> Active is always legal");

        TraceEvent::AgentSpawned {
            agent_id: agent_id.clone(),
            agent_type: agent_type.as_str().to_string(),
            version,
            predecessor_handoff_id,
        }
        .emit();

        self.entries.write().insert(
            agent_id,
            Entry {
                instance: instance.clone(),
                tracker,
            },
        );
        instance
    }

    pub fn get(&self, agent_id: &str) -> Option<AgentInstance> {
        self.entries.read().get(agent_id).map(|e| e.instance.clone())
    }

    pub fn list_active(&self) -> Vec<AgentInstance> {
        self.entries.read().values().map(|e| e.instance.clone()).collect()
    }

    /// Record one model call's usage against `agent_id`'s tracker and
    /// advance its threshold state accordingly.
    ///
    /// Returns `Ok(snapshot)` normally. Returns
    /// `Err(Error::ContextWindowExhausted)` exactly once — on the call that
    /// first crosses into CRITICAL — which the orchestrator treats as the
    /// signal to begin a handoff, not as a failed operation.
    pub fn record_usage(
        &self,
        agent_id: &str,
        operation_name: &str,
        usage: Usage,
    ) -> Result<TokenTrackerSnapshot> {
        let mut entries = self.entries.write();
        let entry = entries
            .get_mut(agent_id)
            .ok_or_else(|| Error::Other(format!("unknown agent instance {agent_id}")))?;

        let previous_state = entry.instance.state;
        let snapshot = entry.tracker.record(operation_name, usage);
        entry.instance.token_snapshot = snapshot.clone();

        let target_state = match snapshot.status {
            ac_domain::usage::ThresholdStatus::Ok => previous_state,
            ac_domain::usage::ThresholdStatus::Warning => AgentState::Warning,
            ac_domain::usage::ThresholdStatus::Critical => AgentState::Critical,
        };

        if target_state != previous_state && entry.instance.state.can_transition_to(target_state) {
            entry
                .instance
                .transition(target_state)
                .map_err(Error::Other)?;

            TraceEvent::ThresholdCrossed {
                agent_id: agent_id.to_string(),
                from_status: format!("{previous_state:?}"),
                to_status: format!("{target_state:?}"),
                usage_percentage: snapshot.usage_percentage,
            }
            .emit();

            if target_state == AgentState::Critical {
                return Err(Error::ContextWindowExhausted {
                    used: snapshot.input_tokens + snapshot.cache_read_tokens,
                    limit: self.threshold.context_window_limit,
                    pct: snapshot.usage_percentage,
                });
            }
        }

        Ok(snapshot)
    }

    /// CRITICAL -> HANDOFF_IN_PROGRESS. Called once the orchestrator has
    /// decided to drive a handoff for this instance.
    pub fn begin_handoff(&self, agent_id: &str) -> Result<AgentInstance> {
        self.transition(agent_id, AgentState::HandoffInProgress)
    }

    /// Terminate an instance and remove it from the live registry. The
    /// instance is returned one last time so the caller can read its final
    /// snapshot for the handoff document / observability record.
    pub fn terminate(&self, agent_id: &str, reason: TerminationReason) -> Result<AgentInstance> {
        let target = match reason {
            TerminationReason::Error => AgentState::TerminatedError,
            _ => AgentState::Terminated,
        };
        let instance = self.transition(agent_id, target)?;

        TraceEvent::AgentTerminated {
            agent_id: agent_id.to_string(),
            agent_type: instance.agent_type.as_str().to_string(),
            reason: format!("{reason:?}"),
            final_state: format!("{:?}", instance.state),
            lifetime_ms: (Utc::now() - instance.spawn_time).num_milliseconds().max(0) as u64,
        }
        .emit();

        self.entries.write().remove(agent_id);
        Ok(instance)
    }

    fn transition(&self, agent_id: &str, next: AgentState) -> Result<AgentInstance> {
        let mut entries = self.entries.write();
        let entry = entries
            .get_mut(agent_id)
            .ok_or_else(|| Error::Other(format!("unknown agent instance {agent_id}")))?;
        entry.instance.transition(next).map_err(Error::Other)?;
        Ok(entry.instance.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn threshold() -> ThresholdConfig {
        ThresholdConfig {
            context_window_limit: 1000,
            warn_fraction: 0.75,
            critical_fraction: 0.90,
        }
    }

    #[test]
    fn spawn_root_starts_active_at_version_1() {
        let mgr = LifecycleManager::new(threshold());
        let instance = mgr.spawn_root(AgentType::Backend, "u1", "p1", "t1", "task1");
        assert_eq!(instance.state, AgentState::Active);
        assert_eq!(instance.version, 1);
        assert!(instance.predecessor_handoff_id.is_none());
    }

    #[test]
    fn spawn_successor_increments_version_and_links_predecessor() {
        let mgr = LifecycleManager::new(threshold());
        let root = mgr.spawn_root(AgentType::Backend, "u1", "p1", "t1", "task1");
        let successor = mgr.spawn_successor(&root, "handoff-123");
        assert_eq!(successor.version, 2);
        assert_eq!(successor.predecessor_handoff_id.as_deref(), Some("handoff-123"));
        assert_eq!(successor.user_id, root.user_id);
    }

    #[test]
    fn record_usage_crosses_into_warning_without_error() {
        let mgr = LifecycleManager::new(threshold());
        let instance = mgr.spawn_root(AgentType::Backend, "u1", "p1", "t1", "task1");
        let snap = mgr
            .record_usage(&instance.agent_id, "call-1", Usage::new(750, 0, 0, 0))
            .unwrap();
        assert_eq!(snap.status, ac_domain::usage::ThresholdStatus::Warning);
        assert_eq!(mgr.get(&instance.agent_id).unwrap().state, AgentState::Warning);
    }

    #[test]
    fn record_usage_signals_context_window_exhausted_once() {
        let mgr = LifecycleManager::new(threshold());
        let instance = mgr.spawn_root(AgentType::Backend, "u1", "p1", "t1", "task1");
        mgr.record_usage(&instance.agent_id, "call-1", Usage::new(750, 0, 0, 0))
            .unwrap();

        let err = mgr
            .record_usage(&instance.agent_id, "call-2", Usage::new(200, 0, 0, 0))
            .unwrap_err();
        assert!(matches!(err, Error::ContextWindowExhausted { .. }));
        assert_eq!(mgr.get(&instance.agent_id).unwrap().state, AgentState::Critical);

        // A further call while already CRITICAL does not re-fire the signal.
        let snap = mgr
            .record_usage(&instance.agent_id, "call-3", Usage::new(10, 0, 0, 0))
            .unwrap();
        assert_eq!(snap.status, ac_domain::usage::ThresholdStatus::Critical);
    }

    #[test]
    fn full_lifecycle_to_termination() {
        let mgr = LifecycleManager::new(threshold());
        let instance = mgr.spawn_root(AgentType::Backend, "u1", "p1", "t1", "task1");
        mgr.record_usage(&instance.agent_id, "call-1", Usage::new(950, 0, 0, 0))
            .unwrap_err();
        mgr.begin_handoff(&instance.agent_id).unwrap();
        let terminated = mgr
            .terminate(&instance.agent_id, TerminationReason::Handoff)
            .unwrap();
        assert_eq!(terminated.state, AgentState::Terminated);
        assert!(mgr.get(&instance.agent_id).is_none());
    }
}
