//! Cumulative, never-reset token accounting for a single agent instance.
//!
//! Grounded on the teacher's `QuotaTracker` (mutex-guarded per-key counters
//! with a derived status), generalized from a daily-resetting quota to a
//! monotonically-growing context-window budget: there is no day boundary
//! here, the counters live exactly as long as the agent instance does.

use parking_lot::Mutex;
use uuid::Uuid;

use ac_domain::config::ThresholdConfig;
use ac_domain::usage::{ThresholdStatus, TokenTrackerSnapshot, TokenUsage, Usage};

struct Totals {
    input: u64,
    output: u64,
    cache_read: u64,
    cache_create: u64,
    log: Vec<TokenUsage>,
}

impl Totals {
    fn new() -> Self {
        Self {
            input: 0,
            output: 0,
            cache_read: 0,
            cache_create: 0,
            log: Vec::new(),
        }
    }

    fn budget_tokens(&self) -> u64 {
        self.input + self.cache_read
    }

    fn total_tokens(&self) -> u64 {
        self.input + self.output + self.cache_read + self.cache_create
    }
}

/// Owns the append-only usage log and cumulative counters for one agent
/// instance. Never resets — an instance's tracker lives and dies with it.
pub struct TokenTracker {
    threshold: ThresholdConfig,
    totals: Mutex<Totals>,
}

impl TokenTracker {
    pub fn new(threshold: ThresholdConfig) -> Self {
        Self {
            threshold,
            totals: Mutex::new(Totals::new()),
        }
    }

    /// Append a usage record and return the snapshot taken immediately
    /// after recording it.
    pub fn record(&self, operation_name: &str, usage: Usage) -> TokenTrackerSnapshot {
        let mut totals = self.totals.lock();
        totals.input += usage.input_tokens;
        totals.output += usage.output_tokens;
        totals.cache_read += usage.cache_read_tokens;
        totals.cache_create += usage.cache_create_tokens;
        totals.log.push(TokenUsage {
            usage_id: Uuid::new_v4().to_string(),
            operation_name: operation_name.to_string(),
            input_tokens: usage.input_tokens,
            output_tokens: usage.output_tokens,
            cache_read_tokens: usage.cache_read_tokens,
            cache_create_tokens: usage.cache_create_tokens,
            timestamp: chrono::Utc::now(),
        });
        self.snapshot_locked(&totals)
    }

    pub fn snapshot(&self) -> TokenTrackerSnapshot {
        let totals = self.totals.lock();
        self.snapshot_locked(&totals)
    }

    pub fn history(&self) -> Vec<TokenUsage> {
        self.totals.lock().log.clone()
    }

    fn snapshot_locked(&self, totals: &Totals) -> TokenTrackerSnapshot {
        let limit = self.threshold.context_window_limit;
        let budget = totals.budget_tokens();
        let usage_percentage = if limit == 0 {
            0.0
        } else {
            (budget as f64 / limit as f64) * 100.0
        };
        let status = ThresholdStatus::from_percentage(
            usage_percentage,
            self.threshold.warn_fraction,
            self.threshold.critical_fraction,
        );
        TokenTrackerSnapshot {
            total_tokens: totals.total_tokens(),
            input_tokens: totals.input,
            output_tokens: totals.output,
            cache_read_tokens: totals.cache_read,
            cache_create_tokens: totals.cache_create,
            usage_percentage,
            remaining_tokens: limit as i64 - budget as i64,
            status,
        }
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
    fn usage_percentage_excludes_output_and_cache_create() {
        let tracker = TokenTracker::new(threshold());
        let snap = tracker.record("call-1", Usage::new(700, 500, 0, 0));
        assert_eq!(snap.usage_percentage, 70.0);
        assert_eq!(snap.status, ThresholdStatus::Ok);
    }

    #[test]
    fn crossing_warn_threshold() {
        let tracker = TokenTracker::new(threshold());
        let snap = tracker.record("call-1", Usage::new(750, 0, 0, 0));
        assert_eq!(snap.status, ThresholdStatus::Warning);
    }

    #[test]
    fn crossing_critical_threshold() {
        let tracker = TokenTracker::new(threshold());
        tracker.record("call-1", Usage::new(800, 0, 0, 0));
        let snap = tracker.record("call-2", Usage::new(150, 0, 0, 0));
        assert_eq!(snap.status, ThresholdStatus::Critical);
        assert_eq!(snap.usage_percentage, 95.0);
    }

    #[test]
    fn counters_accumulate_across_calls() {
        let tracker = TokenTracker::new(threshold());
        tracker.record("call-1", Usage::new(100, 20, 5, 1));
        let snap = tracker.record("call-2", Usage::new(50, 10, 0, 0));
        assert_eq!(snap.input_tokens, 150);
        assert_eq!(snap.output_tokens, 30);
        assert_eq!(snap.cache_read_tokens, 5);
        assert_eq!(snap.cache_create_tokens, 1);
        assert_eq!(tracker.history().len(), 2);
    }

    #[test]
    fn remaining_tokens_can_go_negative_past_limit() {
        let tracker = TokenTracker::new(threshold());
        let snap = tracker.record("call-1", Usage::new(1200, 0, 0, 0));
        assert_eq!(snap.remaining_tokens, -200);
        assert_eq!(snap.status, ThresholdStatus::Critical);
    }
}
