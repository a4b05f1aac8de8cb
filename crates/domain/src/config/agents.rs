use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::agent::AgentType;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Per-agent-type policy
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Tool and fan-out policy for one `AgentType`. Looked up by tag — this
/// is the capability table the tagged-variant model reads from instead of
/// per-subclass virtual methods.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AgentTypeConfig {
    #[serde(default)]
    pub tool_policy: ToolPolicy,
    #[serde(default)]
    pub limits: AgentLimits,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AgentsConfig {
    #[serde(default)]
    pub by_type: HashMap<AgentType, AgentTypeConfig>,
}

/// Hard ceilings on a single agent instance's resource use.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentLimits {
    /// Maximum successive handoffs in this agent's own chain before the
    /// orchestrator escalates instead of respawning again.
    #[serde(default = "d_max_chain_length")]
    pub max_chain_length: u32,
    /// Wall-clock timeout per model call, in seconds.
    #[serde(default = "d_model_call_timeout_secs")]
    pub model_call_timeout_secs: u64,
}

impl Default for AgentLimits {
    fn default() -> Self {
        Self {
            max_chain_length: d_max_chain_length(),
            model_call_timeout_secs: d_model_call_timeout_secs(),
        }
    }
}

/// Tool allow/deny policy — prefix-based, deny takes precedence.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ToolPolicy {
    /// Tool name prefixes this agent may use. Empty or `["*"]` = unrestricted.
    #[serde(default)]
    pub allow: Vec<String>,
    /// Tool name prefixes this agent is denied, checked before `allow`.
    #[serde(default)]
    pub deny: Vec<String>,
}

impl ToolPolicy {
    /// Case-insensitive prefix match. Deny always wins over allow.
    pub fn allows(&self, tool_name: &str) -> bool {
        let name = tool_name.to_ascii_lowercase();

        for d in &self.deny {
            let d_lower = d.to_ascii_lowercase();
            if d_lower == "*" || name == d_lower || name.starts_with(&format!("{d_lower}.")) {
                return false;
            }
        }
        if self.allow.is_empty() || self.allow.iter().any(|a| a == "*") {
            return true;
        }
        for a in &self.allow {
            let a_lower = a.to_ascii_lowercase();
            if name == a_lower || name.starts_with(&format!("{a_lower}.")) {
                return true;
            }
        }
        false
    }
}

fn d_max_chain_length() -> u32 {
    5
}
fn d_model_call_timeout_secs() -> u64 {
    120
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_policy_empty_allows_all() {
        let policy = ToolPolicy::default();
        assert!(policy.allows("exec"));
        assert!(policy.allows("fs.read"));
    }

    #[test]
    fn tool_policy_allow_restricts() {
        let policy = ToolPolicy {
            allow: vec!["fs".into()],
            deny: vec![],
        };
        assert!(policy.allows("fs.read"));
        assert!(!policy.allows("exec"));
    }

    #[test]
    fn tool_policy_deny_takes_precedence() {
        let policy = ToolPolicy {
            allow: vec!["*".into()],
            deny: vec!["exec".into()],
        };
        assert!(!policy.allows("exec"));
        assert!(policy.allows("fs.read"));
    }

    #[test]
    fn tool_policy_deny_star_blocks_all() {
        let policy = ToolPolicy {
            allow: vec!["exec".into()],
            deny: vec!["*".into()],
        };
        assert!(!policy.allows("exec"));
    }

    #[test]
    fn agent_limits_defaults() {
        let limits = AgentLimits::default();
        assert_eq!(limits.max_chain_length, 5);
        assert_eq!(limits.model_call_timeout_secs, 120);
    }
}
