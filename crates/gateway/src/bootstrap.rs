//! Process wiring: turns a validated [`Config`] into a running
//! [`AppState`]. Grounded on the teacher's `build_app_state` — same shape
//! (validate, construct each subsystem in dependency order, log a line
//! per subsystem, assemble the shared state struct) generalized from the
//! teacher's dozen-service gateway down to this spec's five components.

use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use sha2::{Digest, Sha256};

use ac_domain::config::{Config, ConfigSeverity};
use ac_domain::error::Result;
use ac_handoff::HandoffStore;
use ac_lifecycle::LifecycleManager;
use ac_observability::ObservabilityBus;
use ac_orchestrator::{Notifier, Orchestrator};
use ac_providers::{ModelClient, OpenAiCompatClient};

use crate::state::AppState;

/// A [`Notifier`] that logs outbound notifications as structured events
/// instead of delivering them anywhere. Real channel adapters (WhatsApp,
/// GitHub, ...) are external collaborators this crate exposes a seam for
/// but does not implement.
struct LoggingNotifier;

#[async_trait]
impl Notifier for LoggingNotifier {
    async fn notify(&self, user_id: &str, body: &str) -> Result<()> {
        tracing::info!(user_id, body, "notification");
        Ok(())
    }
}

/// Validate config, construct every subsystem, and return a fully-wired
/// [`AppState`]. Shared by the `serve` and `doctor` commands.
pub fn build_app_state(config: Arc<Config>) -> anyhow::Result<AppState> {
    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    if issues.iter().any(|i| i.severity == ConfigSeverity::Error) {
        anyhow::bail!(
            "config validation failed with {} error(s)",
            issues
                .iter()
                .filter(|i| i.severity == ConfigSeverity::Error)
                .count()
        );
    }

    // ── State directory ──────────────────────────────────────────────
    std::fs::create_dir_all(&config.storage.state_dir)
        .with_context(|| format!("creating {}", config.storage.state_dir.display()))?;

    // ── Handoff store ────────────────────────────────────────────────
    let markdown_dir = config
        .handoff
        .export_markdown
        .then(|| config.storage.state_dir.join("handoffs"));
    let handoff_store = Arc::new(
        HandoffStore::open_with_markdown(
            config.storage.handoffs_path(),
            config.handoff.export_markdown,
            markdown_dir,
        )
        .context("opening handoff store")?,
    );
    tracing::info!(
        path = %config.storage.handoffs_path().display(),
        markdown_export = config.handoff.export_markdown,
        "handoff store ready"
    );

    // ── Lifecycle manager ────────────────────────────────────────────
    let lifecycle = Arc::new(LifecycleManager::new(config.threshold.clone()));
    tracing::info!(
        context_window_limit = config.threshold.context_window_limit,
        "lifecycle manager ready"
    );

    // ── Observability bus ────────────────────────────────────────────
    let observability = Arc::new(ObservabilityBus::new());
    tracing::info!("observability bus ready");

    // ── Model client ─────────────────────────────────────────────────
    let api_key = if config.llm.api_key_env.is_empty() {
        String::new()
    } else {
        std::env::var(&config.llm.api_key_env).unwrap_or_default()
    };
    let model_client: Arc<dyn ModelClient> = Arc::new(
        OpenAiCompatClient::new(
            config.llm.id.clone(),
            config.llm.base_url.clone(),
            api_key,
        )
        .context("constructing model client")?
        .with_default_model(config.llm.default_model.clone()),
    );
    tracing::info!(
        provider = %config.llm.id,
        base_url = %config.llm.base_url,
        model = %config.llm.default_model,
        "model client ready"
    );

    // ── Orchestrator ─────────────────────────────────────────────────
    let orchestrator = Arc::new(Orchestrator::new(
        lifecycle.clone(),
        handoff_store,
        observability.clone(),
        model_client,
        Arc::new(LoggingNotifier),
        config.workflow.clone(),
    ));
    tracing::info!("orchestrator ready");

    // ── Admin token (read once, hash for constant-time comparison) ──
    let admin_token_hash = match std::env::var(&config.server.admin_token_env) {
        Ok(token) if !token.is_empty() => {
            tracing::info!("admin bearer-token auth enabled");
            Some(Sha256::digest(token.as_bytes()).to_vec())
        }
        _ => {
            tracing::warn!(
                env_var = %config.server.admin_token_env,
                "admin bearer-token auth DISABLED — set the configured env var to enable"
            );
            None
        }
    };

    // ── Webhook secret (read once; raw bytes, HMAC keys accept any length) ──
    let webhook_secret = match std::env::var(&config.server.webhook_secret_env) {
        Ok(secret) if !secret.is_empty() => {
            tracing::info!("inbound webhook signature verification enabled");
            Some(secret.into_bytes())
        }
        _ => {
            tracing::warn!(
                env_var = %config.server.webhook_secret_env,
                "inbound webhook signature verification DISABLED"
            );
            None
        }
    };

    Ok(AppState {
        config,
        orchestrator,
        lifecycle,
        observability,
        admin_token_hash,
        webhook_secret,
    })
}
