use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Server
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "d_port")]
    pub port: u16,
    #[serde(default = "d_host")]
    pub host: String,
    #[serde(default)]
    pub cors: CorsConfig,
    #[serde(default)]
    pub rate_limit: Option<RateLimitConfig>,
    /// Env var holding the HMAC secret used to verify inbound webhook
    /// signatures (GitHub-style `X-Hub-Signature-256`). Disabled if unset.
    #[serde(default = "d_webhook_secret_env")]
    pub webhook_secret_env: String,
    /// Env var holding the bearer token for admin/health endpoints. If
    /// unset, admin endpoints are disabled (403).
    #[serde(default = "d_admin_token_env")]
    pub admin_token_env: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: d_port(),
            host: d_host(),
            cors: CorsConfig::default(),
            rate_limit: Some(RateLimitConfig::default()),
            webhook_secret_env: d_webhook_secret_env(),
            admin_token_env: d_admin_token_env(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    /// Origins allowed for CORS, supporting a `:*` wildcard port suffix
    /// (e.g. `http://localhost:*`). Use `["*"]` for fully permissive (not
    /// recommended).
    #[serde(default = "d_cors_origins")]
    pub allowed_origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: d_cors_origins(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "d_rps")]
    pub requests_per_second: u32,
    #[serde(default = "d_burst")]
    pub burst_size: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: d_rps(),
            burst_size: d_burst(),
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_port() -> u16 {
    8080
}
fn d_host() -> String {
    "127.0.0.1".into()
}
fn d_cors_origins() -> Vec<String> {
    vec!["http://localhost:*".into(), "http://127.0.0.1:*".into()]
}
fn d_rps() -> u32 {
    10
}
fn d_burst() -> u32 {
    20
}
fn d_webhook_secret_env() -> String {
    "AGENTCORE_WEBHOOK_SECRET".into()
}
fn d_admin_token_env() -> String {
    "AGENTCORE_ADMIN_TOKEN".into()
}
