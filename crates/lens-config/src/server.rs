//! HTTP server configuration.

use serde::{Deserialize, Serialize};

fn default_bind() -> String {
    "127.0.0.1:8002".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Socket address the API listens on.
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Shared API key. Empty disables authentication.
    #[serde(default)]
    pub api_key: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            api_key: String::new(),
        }
    }
}

impl ServerConfig {
    /// Whether requests must present the API key.
    pub fn requires_auth(&self) -> bool {
        !self.api_key.is_empty()
    }
}
