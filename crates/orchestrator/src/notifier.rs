//! Outbound notification seam plus the canned phrasing the orchestrator
//! sends through it. Keeping the wording here, not inline at each call
//! site, is what makes the phrasing stable across releases — adapters
//! (WhatsApp, GitHub, ...) implement delivery only.

use async_trait::async_trait;

use ac_domain::agent::AgentType;
use ac_domain::error::Result;

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, user_id: &str, body: &str) -> Result<()>;
}

/// A `Notifier` that drops every message. Used in tests and for workflows
/// run without a configured outbound channel.
pub struct NullNotifier;

#[async_trait]
impl Notifier for NullNotifier {
    async fn notify(&self, _user_id: &str, _body: &str) -> Result<()> {
        Ok(())
    }
}

pub mod phrasing {
    use super::AgentType;

    pub fn workflow_started(template: &str, stage: AgentType) -> String {
        format!("Starting a {template} workflow — the {stage} agent is on it.")
    }

    pub fn approaching_limit(stage: AgentType, usage_percentage: f64) -> String {
        format!("{stage} at {usage_percentage:.1}% token usage — approaching context limit.")
    }

    pub fn critical_preparing_handoff(stage: AgentType) -> String {
        format!("{stage} at critical usage — preparing handoff.")
    }

    pub fn handoff_occurred(stage: AgentType, version: u32) -> String {
        format!(
            "The {stage} agent reached its context limit and handed off to successor #{version}. \
             Work continues without you needing to do anything."
        )
    }

    pub fn degraded_handoff_occurred(stage: AgentType, version: u32) -> String {
        format!(
            "The {stage} agent handed off to successor #{version} under degraded conditions — \
             some context may have been lost. Worth a check-in once this task completes."
        )
    }

    pub fn stage_advanced(from: AgentType, to: AgentType) -> String {
        format!("{from} finished its part; {to} is picking up next.")
    }

    pub fn task_completed(template: &str) -> String {
        format!("Your {template} task is complete.")
    }

    pub fn task_blocked(stage: AgentType, reason: &str) -> String {
        format!("The {stage} agent is blocked: {reason}")
    }

    pub fn task_cancelled(template: &str) -> String {
        format!("Your {template} task has been cancelled.")
    }

    pub fn handoff_limit_exceeded(template: &str) -> String {
        format!(
            "Your {template} task has handed off more times than the configured limit allows. \
             Pausing here for a human to take a look."
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phrasing_is_deterministic() {
        assert_eq!(
            phrasing::workflow_started("full_build", AgentType::Designer),
            phrasing::workflow_started("full_build", AgentType::Designer)
        );
    }
}
