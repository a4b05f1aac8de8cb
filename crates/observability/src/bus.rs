//! `ObservabilityBus` — a lexically-scoped span stack per trace, plus
//! discrete event emission.
//!
//! Grounded on the teacher's `RunStore` (`gateway/src/runtime/runs.rs`): a
//! bounded in-memory ring with an id index for O(1) lookup, backed by an
//! append-only on-disk log. Generalized from "one run with flat LLM/tool
//! nodes" to a stack of six nested span levels per trace id.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::RwLock;
use uuid::Uuid;

use ac_domain::error::{Error, Result};

use crate::span::{Span, SpanLevel};

const MAX_SPANS_IN_MEMORY: usize = 4096;

/// Live stack of open spans for one trace, plus a bounded ring of closed
/// spans across all traces for querying.
pub struct ObservabilityBus {
    open: RwLock<HashMap<String, Vec<Span>>>,
    closed: RwLock<VecDeque<Span>>,
}

impl Default for ObservabilityBus {
    fn default() -> Self {
        Self::new()
    }
}

impl ObservabilityBus {
    pub fn new() -> Self {
        Self {
            open: RwLock::new(HashMap::new()),
            closed: RwLock::new(VecDeque::new()),
        }
    }

    /// Open a span at `level` under `trace_id`'s current stack. The first
    /// span opened for a trace must be `UserRequest`; every subsequent one
    /// must be exactly one level deeper than whatever is currently on top —
    /// skipping a level, or opening a level out of order, is rejected.
    pub fn enter(
        self: &Arc<Self>,
        trace_id: impl Into<String>,
        level: SpanLevel,
        name: impl Into<String>,
        attributes: serde_json::Value,
    ) -> Result<SpanGuard> {
        let trace_id = trace_id.into();
        let mut open = self.open.write();
        let stack = open.entry(trace_id.clone()).or_default();

        let expected = stack.last().map(|s| level_index(s.level) + 1).unwrap_or(0);
        if level_index(level) != expected {
            return Err(Error::Other(format!(
                "cannot open {} span on trace {trace_id}: expected the next level after {:?}",
                level.as_str(),
                stack.last().map(|s| s.level)
            )));
        }

        let span = Span {
            span_id: Uuid::new_v4().to_string(),
            level,
            name: name.into(),
            trace_id: trace_id.clone(),
            parent_span_id: stack.last().map(|s| s.span_id.clone()),
            started_at: chrono::Utc::now(),
            ended_at: None,
            duration_ms: None,
            attributes,
        };
        let span_id = span.span_id.clone();
        tracing::info!(
            trace_id = %trace_id,
            span_id = %span_id,
            level = level.as_str(),
            name = %span.name,
            "span_opened"
        );
        stack.push(span);

        Ok(SpanGuard {
            bus: self.clone(),
            trace_id,
            span_id,
        })
    }

    fn close(&self, trace_id: &str, span_id: &str) {
        let closed_span = {
            let mut open = self.open.write();
            let Some(stack) = open.get_mut(trace_id) else {
                return;
            };
            match stack.last() {
                Some(top) if top.span_id == span_id => {
                    let mut span = stack.pop().expect("checked non-empty above");
                    span.close();
                    if stack.is_empty() {
                        open.remove(trace_id);
                    }
                    span
                }
                _ => {
                    tracing::error!(
                        trace_id = %trace_id,
                        span_id = %span_id,
                        "span closed out of lexical order, dropping without recording"
                    );
                    return;
                }
            }
        };

        tracing::info!(
            trace_id = %closed_span.trace_id,
            span_id = %closed_span.span_id,
            level = closed_span.level.as_str(),
            name = %closed_span.name,
            duration_ms = closed_span.duration_ms,
            "span_closed"
        );

        let mut closed = self.closed.write();
        closed.push_back(closed_span);
        if closed.len() > MAX_SPANS_IN_MEMORY {
            closed.pop_front();
        }
    }

    /// Emit a discrete event not backed by a span. `trace_id` is always
    /// carried so events can be correlated with whatever span was open when
    /// they fired.
    pub fn emit_event(&self, trace_id: &str, name: &str, attributes: serde_json::Value) {
        tracing::info!(
            trace_id = %trace_id,
            event = %name,
            attributes = %attributes,
            "ac_observability_event"
        );
    }

    pub fn open_depth(&self, trace_id: &str) -> usize {
        self.open.read().get(trace_id).map_or(0, |s| s.len())
    }

    pub fn recent_closed(&self, limit: usize) -> Vec<Span> {
        let closed = self.closed.read();
        closed.iter().rev().take(limit).cloned().collect()
    }

    pub fn for_trace(&self, trace_id: &str) -> Vec<Span> {
        self.closed
            .read()
            .iter()
            .filter(|s| s.trace_id == trace_id)
            .cloned()
            .collect()
    }
}

fn level_index(level: SpanLevel) -> usize {
    SpanLevel::ALL.iter().position(|&l| l == level).expect("ALL covers every variant")
}

/// RAII handle for an open span. Dropping it — or calling `finish`
/// explicitly — closes the span. Must be dropped in stack order (innermost
/// first); an out-of-order drop is logged and the span is discarded rather
/// than recorded with bad timing data.
pub struct SpanGuard {
    bus: Arc<ObservabilityBus>,
    trace_id: String,
    span_id: String,
}

impl SpanGuard {
    pub fn span_id(&self) -> &str {
        &self.span_id
    }

    pub fn finish(self) {
        // Drop glue does the work; this just gives callers an explicit name.
    }
}

impl Drop for SpanGuard {
    fn drop(&mut self) {
        self.bus.close(&self.trace_id, &self.span_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spans_must_open_in_level_order() {
        let bus = Arc::new(ObservabilityBus::new());
        let err = bus
            .enter("trace-1", SpanLevel::Workflow, "wf", serde_json::json!({}))
            .unwrap_err();
        assert!(matches!(err, Error::Other(_)));
    }

    #[test]
    fn spans_must_open_without_skipping_a_level() {
        let bus = Arc::new(ObservabilityBus::new());
        let _req = bus
            .enter("trace-1", SpanLevel::UserRequest, "req", serde_json::json!({}))
            .unwrap();
        let err = bus
            .enter("trace-1", SpanLevel::AgentLifecycle, "agent", serde_json::json!({}))
            .unwrap_err();
        assert!(matches!(err, Error::Other(_)));
    }

    #[test]
    fn nested_spans_close_and_record_in_order() {
        let bus = Arc::new(ObservabilityBus::new());
        {
            let _req = bus
                .enter("trace-1", SpanLevel::UserRequest, "req", serde_json::json!({}))
                .unwrap();
            assert_eq!(bus.open_depth("trace-1"), 1);
            {
                let _wf = bus
                    .enter("trace-1", SpanLevel::Workflow, "wf", serde_json::json!({}))
                    .unwrap();
                assert_eq!(bus.open_depth("trace-1"), 2);
            }
            assert_eq!(bus.open_depth("trace-1"), 1);
        }
        assert_eq!(bus.open_depth("trace-1"), 0);

        let recorded = bus.for_trace("trace-1");
        assert_eq!(recorded.len(), 2);
        assert!(recorded.iter().all(|s| s.ended_at.is_some()));
    }

    #[test]
    fn distinct_traces_track_independent_stacks() {
        let bus = Arc::new(ObservabilityBus::new());
        let _a = bus
            .enter("trace-a", SpanLevel::UserRequest, "a", serde_json::json!({}))
            .unwrap();
        let _b = bus
            .enter("trace-b", SpanLevel::UserRequest, "b", serde_json::json!({}))
            .unwrap();
        assert_eq!(bus.open_depth("trace-a"), 1);
        assert_eq!(bus.open_depth("trace-b"), 1);
    }

    #[test]
    fn parent_span_id_links_to_enclosing_span() {
        let bus = Arc::new(ObservabilityBus::new());
        let req = bus
            .enter("trace-1", SpanLevel::UserRequest, "req", serde_json::json!({}))
            .unwrap();
        let req_id = req.span_id().to_string();
        {
            let _wf = bus
                .enter("trace-1", SpanLevel::Workflow, "wf", serde_json::json!({}))
                .unwrap();
        }
        drop(req);

        let recorded = bus.for_trace("trace-1");
        let wf = recorded.iter().find(|s| s.level == SpanLevel::Workflow).unwrap();
        assert_eq!(wf.parent_span_id.as_deref(), Some(req_id.as_str()));
    }
}
