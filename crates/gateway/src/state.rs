use std::sync::Arc;

use ac_domain::config::Config;

/// Shared application state passed to all HTTP handlers.
///
/// A thin wrapper around the process's single [`ac_orchestrator::Orchestrator`]
/// plus the startup-computed security material admin/inbound handlers need.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub orchestrator: Arc<ac_orchestrator::Orchestrator>,
    pub lifecycle: Arc<ac_lifecycle::LifecycleManager>,
    pub observability: Arc<ac_observability::ObservabilityBus>,

    /// SHA-256 hash of the admin bearer token. `None` = dev mode (admin
    /// endpoints accessible without auth).
    pub admin_token_hash: Option<Vec<u8>>,
    /// HMAC-SHA256 secret used to verify inbound webhook signatures.
    /// `None` disables signature verification for `/v1/inbound`.
    pub webhook_secret: Option<Vec<u8>>,
}
