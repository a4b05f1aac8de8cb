mod agents;
mod handoff;
mod llm;
mod server;
mod storage;
mod threshold;
mod workflow;

pub use agents::*;
pub use handoff::*;
pub use llm::*;
pub use server::*;
pub use storage::*;
pub use threshold::*;
pub use workflow::*;

use serde::{Deserialize, Serialize};
use std::fmt;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub threshold: ThresholdConfig,
    #[serde(default)]
    pub handoff: HandoffConfig,
    #[serde(default)]
    pub workflow: WorkflowConfig,
    #[serde(default)]
    pub agents: AgentsConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

#[derive(Debug, Clone)]
pub struct ConfigError {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validate the configuration and return every issue found. An empty
    /// vec means the config is clean. Callers (the `agentcore doctor` and
    /// `serve` commands) decide whether `Warning`-only results should
    /// block startup.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if self.server.port == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "server.port".into(),
                message: "port must be greater than 0".into(),
            });
        }

        if self.server.host.is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "server.host".into(),
                message: "host must not be empty".into(),
            });
        }

        if self.server.cors.allowed_origins.len() == 1 && self.server.cors.allowed_origins[0] == "*"
        {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "server.cors.allowed_origins".into(),
                message: "wildcard \"*\" allows all origins (not recommended for production)"
                    .into(),
            });
        }

        if let Some(rl) = &self.server.rate_limit {
            if rl.requests_per_second == 0 {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: "server.rate_limit.requests_per_second".into(),
                    message: "requests_per_second must be greater than 0".into(),
                });
            }
            if rl.burst_size == 0 {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: "server.rate_limit.burst_size".into(),
                    message: "burst_size must be greater than 0".into(),
                });
            }
        }

        if std::env::var(&self.server.webhook_secret_env).is_err() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "server.webhook_secret_env".into(),
                message: format!(
                    "env var \"{}\" is unset — inbound webhook signature verification is disabled",
                    self.server.webhook_secret_env
                ),
            });
        }

        if self.threshold.warn_fraction <= 0.0 || self.threshold.warn_fraction >= 1.0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "threshold.warn_fraction".into(),
                message: "must be in (0.0, 1.0)".into(),
            });
        }
        if self.threshold.critical_fraction <= 0.0 || self.threshold.critical_fraction >= 1.0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "threshold.critical_fraction".into(),
                message: "must be in (0.0, 1.0)".into(),
            });
        }
        if self.threshold.warn_fraction >= self.threshold.critical_fraction {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "threshold.warn_fraction".into(),
                message: format!(
                    "warn_fraction ({}) must be strictly less than critical_fraction ({})",
                    self.threshold.warn_fraction, self.threshold.critical_fraction
                ),
            });
        }
        if self.threshold.context_window_limit == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "threshold.context_window_limit".into(),
                message: "must be greater than 0".into(),
            });
        }

        if self.handoff.max_handoffs_per_task == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "handoff.max_handoffs_per_task".into(),
                message: "must be greater than 0".into(),
            });
        }

        if self.workflow.templates.is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "workflow.templates".into(),
                message: "no workflow templates configured".into(),
            });
        }
        for name in self.workflow.templates.keys() {
            if crate::config::WorkflowTemplate::ALL
                .iter()
                .all(|t| t.as_str() != name)
            {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Warning,
                    field: format!("workflow.templates[{name}]"),
                    message: "template name does not match any known WorkflowTemplate variant"
                        .into(),
                });
            }
        }

        if self.llm.base_url.is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "llm.base_url".into(),
                message: "must not be empty".into(),
            });
        }
        if !self.llm.api_key_env.is_empty() && std::env::var(&self.llm.api_key_env).is_err() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "llm.api_key_env".into(),
                message: format!(
                    "env var \"{}\" is unset — model calls will fail until it is set",
                    self.llm.api_key_env
                ),
            });
        }

        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_no_errors() {
        let cfg = Config::default();
        let errs: Vec<_> = cfg
            .validate()
            .into_iter()
            .filter(|e| e.severity == ConfigSeverity::Error)
            .collect();
        assert!(errs.is_empty(), "unexpected errors: {errs:?}");
    }

    #[test]
    fn zero_port_is_an_error() {
        let mut cfg = Config::default();
        cfg.server.port = 0;
        let errs = cfg.validate();
        assert!(errs
            .iter()
            .any(|e| e.field == "server.port" && e.severity == ConfigSeverity::Error));
    }

    #[test]
    fn warn_fraction_must_be_below_critical() {
        let mut cfg = Config::default();
        cfg.threshold.warn_fraction = 0.95;
        cfg.threshold.critical_fraction = 0.90;
        let errs = cfg.validate();
        assert!(errs
            .iter()
            .any(|e| e.field == "threshold.warn_fraction" && e.severity == ConfigSeverity::Error));
    }

    #[test]
    fn toml_round_trip() {
        let cfg = Config::default();
        let s = toml::to_string(&cfg).expect("serialize");
        let back: Config = toml::from_str(&s).expect("deserialize");
        assert_eq!(back.server.port, cfg.server.port);
    }
}
