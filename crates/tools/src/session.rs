//! In-memory registry of tool sessions: opaque handles that outlive a
//! single model turn (an open DB connection, an authenticated API
//! client) and need to survive an agent respawn.
//!
//! Grounded on the teacher's `ProcessManager` session registry, trimmed
//! to the reconnection-recipe shape a `HandoffDocument.tool_state` needs:
//! no raw secrets, no process handles, just enough for the successor
//! agent's tools to reconnect.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolSessionStatus {
    Active,
    Closed,
}

/// A single tool session's reconnect state. `reconnect_hint` is whatever
/// opaque JSON a tool adapter needs to re-establish the session (e.g. a
/// connection string with secrets already stripped) — never the raw
/// secret itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSession {
    pub id: String,
    pub tool_name: String,
    pub created_at: DateTime<Utc>,
    pub last_used_at: DateTime<Utc>,
    pub status: ToolSessionStatus,
    pub reconnect_hint: serde_json::Value,
}

/// In-memory registry of tool sessions for one agent instance. Handed to
/// the lifecycle manager at handoff time via `snapshot()`, which becomes
/// `HandoffDocument.tool_state`.
pub struct ToolSessionRegistry {
    sessions: RwLock<HashMap<String, Arc<RwLock<ToolSession>>>>,
}

impl Default for ToolSessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolSessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub fn register(&self, session: ToolSession) {
        self.sessions
            .write()
            .insert(session.id.clone(), Arc::new(RwLock::new(session)));
    }

    pub fn get(&self, id: &str) -> Option<ToolSession> {
        self.sessions.read().get(id).map(|s| s.read().clone())
    }

    pub fn touch(&self, id: &str, at: DateTime<Utc>) {
        if let Some(s) = self.sessions.read().get(id) {
            s.write().last_used_at = at;
        }
    }

    pub fn close(&self, id: &str) {
        if let Some(s) = self.sessions.read().get(id) {
            s.write().status = ToolSessionStatus::Closed;
        }
    }

    /// Serialize every session into the JSON value that becomes
    /// `HandoffDocument.tool_state`.
    pub fn snapshot(&self) -> serde_json::Value {
        let sessions: Vec<ToolSession> =
            self.sessions.read().values().map(|s| s.read().clone()).collect();
        serde_json::json!({ "sessions": sessions })
    }

    /// Rebuild a registry from a previously saved `tool_state` snapshot.
    /// Sessions that were `Closed` at save time are restored closed;
    /// callers are responsible for actually reconnecting `Active` ones.
    pub fn restore(snapshot: &serde_json::Value) -> Self {
        let registry = Self::new();
        if let Some(sessions) = snapshot.get("sessions").and_then(|v| v.as_array()) {
            for raw in sessions {
                if let Ok(session) = serde_json::from_value::<ToolSession>(raw.clone()) {
                    registry.register(session);
                }
            }
        }
        registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(id: &str) -> ToolSession {
        let now = Utc::now();
        ToolSession {
            id: id.to_string(),
            tool_name: "postgres".into(),
            created_at: now,
            last_used_at: now,
            status: ToolSessionStatus::Active,
            reconnect_hint: serde_json::json!({ "host": "localhost", "db": "app" }),
        }
    }

    #[test]
    fn snapshot_and_restore_round_trips() {
        let registry = ToolSessionRegistry::new();
        registry.register(sample("s1"));
        registry.close("s1");

        let snap = registry.snapshot();
        let restored = ToolSessionRegistry::restore(&snap);
        let session = restored.get("s1").unwrap();
        assert_eq!(session.status, ToolSessionStatus::Closed);
        assert_eq!(session.tool_name, "postgres");
    }

    #[test]
    fn touch_updates_last_used() {
        let registry = ToolSessionRegistry::new();
        registry.register(sample("s1"));
        let later = Utc::now() + chrono::Duration::seconds(10);
        registry.touch("s1", later);
        assert_eq!(registry.get("s1").unwrap().last_used_at, later);
    }
}
