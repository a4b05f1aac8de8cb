use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Context window thresholds
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThresholdConfig {
    /// Total context window budget in tokens.
    #[serde(default = "d_context_window_limit")]
    pub context_window_limit: u64,
    /// Fraction of the limit at which an agent enters WARNING. `0.75` means 75%.
    #[serde(default = "d_warn_fraction")]
    pub warn_fraction: f64,
    /// Fraction of the limit at which an agent enters CRITICAL and a
    /// handoff is triggered.
    #[serde(default = "d_critical_fraction")]
    pub critical_fraction: f64,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            context_window_limit: d_context_window_limit(),
            warn_fraction: d_warn_fraction(),
            critical_fraction: d_critical_fraction(),
        }
    }
}

fn d_context_window_limit() -> u64 {
    200_000
}
fn d_warn_fraction() -> f64 {
    0.75
}
fn d_critical_fraction() -> f64 {
    0.90
}
