use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Model provider
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Configuration for the single OpenAI-compatible `ModelClient` the
/// process wires up at startup. Multi-provider routing/tiering is out of
/// scope — one adapter, pointed at whichever OpenAI-compatible endpoint
/// the deployment uses (OpenAI itself, Azure, a local vLLM/Ollama server).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "d_id")]
    pub id: String,
    #[serde(default = "d_base_url")]
    pub base_url: String,
    /// Env var holding the API key. Empty string is valid for endpoints
    /// that don't require one (e.g. a local Ollama server).
    #[serde(default = "d_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "d_default_model")]
    pub default_model: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            id: d_id(),
            base_url: d_base_url(),
            api_key_env: d_api_key_env(),
            default_model: d_default_model(),
        }
    }
}

fn d_id() -> String {
    "openai".into()
}
fn d_base_url() -> String {
    "https://api.openai.com/v1".into()
}
fn d_api_key_env() -> String {
    "AGENTCORE_LLM_API_KEY".into()
}
fn d_default_model() -> String {
    "gpt-4o".into()
}
