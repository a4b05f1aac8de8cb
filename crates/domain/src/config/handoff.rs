use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Handoff policy
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandoffConfig {
    /// Minimum number of days a handoff document is retained before it
    /// becomes eligible for garbage collection.
    #[serde(default = "d_retention_days")]
    pub retention_days: u32,
    /// Hard ceiling on successive handoffs within a single task, guarding
    /// against a task that can never converge.
    #[serde(default = "d_max_handoffs_per_task")]
    pub max_handoffs_per_task: u32,
    /// Number of times the state-extraction step retries the model call
    /// with a trimmed prompt before falling back to a degraded handoff
    /// (see DESIGN.md, Open Question #3).
    #[serde(default = "d_repair_attempts")]
    pub repair_attempts: u32,
    /// When true, every saved handoff is additionally exported as a
    /// human-readable markdown file alongside the authoritative JSON
    /// record (see DESIGN.md, Open Question #1). The JSON record is
    /// always authoritative; this is a convenience export only.
    #[serde(default)]
    pub export_markdown: bool,
}

impl Default for HandoffConfig {
    fn default() -> Self {
        Self {
            retention_days: d_retention_days(),
            max_handoffs_per_task: d_max_handoffs_per_task(),
            repair_attempts: d_repair_attempts(),
            export_markdown: false,
        }
    }
}

fn d_retention_days() -> u32 {
    30
}
fn d_max_handoffs_per_task() -> u32 {
    10
}
fn d_repair_attempts() -> u32 {
    1
}
