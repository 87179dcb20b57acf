use corkboard::CorkboardError;
use serde::{Deserialize, Serialize};
use std::path::Path;

const DEFAULT_API_URL: &str = "http://127.0.0.1:8080/api";
const DEFAULT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Base URL of the board API, e.g. "https://boards.example.com/api/boards/42".
    pub api_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl Default for RemoteConfig {
    fn default() -> Self {
        RemoteConfig {
            api_url: DEFAULT_API_URL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl RemoteConfig {
    /// Load from {data_dir}/remote.json, falling back to environment
    /// variables and then defaults.
    pub fn load_or_default(data_dir: &Path) -> Self {
        let remote_json = data_dir.join("remote.json");

        if remote_json.exists() {
            match Self::load(&remote_json) {
                Ok(config) => {
                    tracing::info!(
                        "[remote] loaded config: api_url={}, timeout={}s",
                        config.api_url,
                        config.timeout_secs
                    );
                    return config;
                }
                Err(e) => {
                    tracing::error!("[remote] {}, using environment", e);
                }
            }
        }

        Self::from_env()
    }

    pub fn load(path: &Path) -> Result<Self, CorkboardError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            CorkboardError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&content).map_err(|e| {
            CorkboardError::Config(format!("failed to parse {}: {}", path.display(), e))
        })
    }

    pub fn from_env() -> Self {
        let api_url =
            std::env::var("CORKBOARD_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string());
        let timeout_secs = std::env::var("CORKBOARD_API_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        RemoteConfig {
            api_url,
            timeout_secs,
        }
    }
}
