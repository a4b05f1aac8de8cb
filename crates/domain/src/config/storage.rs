use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// On-disk state
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding `handoffs.json` and any other persisted state.
    /// Created at startup if missing.
    #[serde(default = "d_state_dir")]
    pub state_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            state_dir: d_state_dir(),
        }
    }
}

impl StorageConfig {
    pub fn handoffs_path(&self) -> PathBuf {
        self.state_dir.join("handoffs.json")
    }
}

fn d_state_dir() -> PathBuf {
    PathBuf::from("./data")
}
