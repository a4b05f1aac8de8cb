//! Token accounting types shared by `ac-lifecycle` (the tracker that owns
//! the counters) and everything that reads a snapshot of them (handoff
//! documents, observability spans, the HTTP admin surface).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Usage — what a ModelClient call returns
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Token usage for a single model call, as returned by `ModelClient`.
/// Provider-agnostic: every vendor adapter translates its own response
/// shape into this.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_read_tokens: u64,
    pub cache_create_tokens: u64,
}

impl Usage {
    pub fn new(input: u64, output: u64, cache_read: u64, cache_create: u64) -> Self {
        Self {
            input_tokens: input,
            output_tokens: output,
            cache_read_tokens: cache_read,
            cache_create_tokens: cache_create,
        }
    }

    /// Sum of every field — used for `total_tokens` bookkeeping.
    pub fn sum(&self) -> u64 {
        self.input_tokens + self.output_tokens + self.cache_read_tokens + self.cache_create_tokens
    }

    /// Tokens that count toward the context-window budget: input plus
    /// cache-read, which the spec defines as counting at the same weight
    /// as input (see DESIGN.md, Open Question #2).
    pub fn budget_tokens(&self) -> u64 {
        self.input_tokens + self.cache_read_tokens
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// TokenUsage — an atomic append-only log record
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One entry in a `TokenTracker`'s append-only usage log. All fields are
/// non-negative by construction (`TokenTracker::record_usage` rejects
/// negative input before a `TokenUsage` is ever built).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenUsage {
    pub usage_id: String,
    pub operation_name: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_read_tokens: u64,
    pub cache_create_tokens: u64,
    pub timestamp: DateTime<Utc>,
}

impl TokenUsage {
    pub fn sum(&self) -> u64 {
        self.input_tokens + self.output_tokens + self.cache_read_tokens + self.cache_create_tokens
    }

    pub fn budget_tokens(&self) -> u64 {
        self.input_tokens + self.cache_read_tokens
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Threshold policy
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Three zones, derived from `usage_percentage` against the configured
/// warn/critical thresholds. `OK` <75%, `WARNING` in [75%, 90%), `CRITICAL`
/// >=90% (thresholds themselves are configuration — see
/// `ac_domain::config::ThresholdConfig`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdStatus {
    Ok,
    Warning,
    Critical,
}

impl ThresholdStatus {
    pub fn from_percentage(pct: f64, warn: f64, critical: f64) -> Self {
        if pct >= critical * 100.0 {
            ThresholdStatus::Critical
        } else if pct >= warn * 100.0 {
            ThresholdStatus::Warning
        } else {
            ThresholdStatus::Ok
        }
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self, ThresholdStatus::Critical)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// TokenTrackerSnapshot — a read-only view handed out by the tracker
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Point-in-time cumulative view of an agent's token usage.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenTrackerSnapshot {
    pub total_tokens: u64,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_read_tokens: u64,
    pub cache_create_tokens: u64,
    pub usage_percentage: f64,
    pub remaining_tokens: i64,
    pub status: ThresholdStatus,
}

impl Default for ThresholdStatus {
    fn default() -> Self {
        ThresholdStatus::Ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_boundaries() {
        assert_eq!(
            ThresholdStatus::from_percentage(74.9, 0.75, 0.90),
            ThresholdStatus::Ok
        );
        assert_eq!(
            ThresholdStatus::from_percentage(75.0, 0.75, 0.90),
            ThresholdStatus::Warning
        );
        assert_eq!(
            ThresholdStatus::from_percentage(89.9, 0.75, 0.90),
            ThresholdStatus::Warning
        );
        assert_eq!(
            ThresholdStatus::from_percentage(90.0, 0.75, 0.90),
            ThresholdStatus::Critical
        );
        assert_eq!(
            ThresholdStatus::from_percentage(140.0, 0.75, 0.90),
            ThresholdStatus::Critical
        );
    }

    #[test]
    fn usage_budget_tokens_includes_cache_read_not_output() {
        let u = Usage::new(100, 50, 20, 10);
        assert_eq!(u.budget_tokens(), 120);
        assert_eq!(u.sum(), 180);
    }
}
