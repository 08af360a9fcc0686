//! ============================================================================
//! Client Configuration
//! ============================================================================
//! Built from environment variables (a `.env` file is loaded by the binary):
//! - SUPPLYCHAIN_SERVER_URL   ledger server root (default http://localhost:5000)
//! - SUPPLYCHAIN_DB_PATH      local settings database
//! - SUPPLYCHAIN_TIMEOUT_SECS HTTP request timeout
//! ============================================================================

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{Result, SupplyChainError};

pub const ENV_SERVER_URL: &str = "SUPPLYCHAIN_SERVER_URL";
pub const ENV_DB_PATH: &str = "SUPPLYCHAIN_DB_PATH";
pub const ENV_TIMEOUT_SECS: &str = "SUPPLYCHAIN_TIMEOUT_SECS";

pub const DEFAULT_SERVER_URL: &str = "http://localhost:5000";

/// Every ledger route lives under this prefix
pub const DEFAULT_API_PREFIX: &str = "/api";

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Supply chain client configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    pub server_url: String,
    pub api_prefix: String,
    /// None selects the default database location
    pub db_path: Option<PathBuf>,
    pub timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            api_prefix: DEFAULT_API_PREFIX.to_string(),
            db_path: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl ClientConfig {
    /// Defaults overridden by the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each variable
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(url) = lookup(ENV_SERVER_URL).filter(|v| !v.trim().is_empty()) {
            config.server_url = url.trim().to_string();
        }
        if let Some(path) = lookup(ENV_DB_PATH).filter(|v| !v.trim().is_empty()) {
            config.db_path = Some(PathBuf::from(path.trim()));
        }
        if let Some(raw) = lookup(ENV_TIMEOUT_SECS).filter(|v| !v.trim().is_empty()) {
            config.timeout_secs = raw.trim().parse().map_err(|_| {
                SupplyChainError::Config(format!("{} must be a whole number of seconds, got '{}'", ENV_TIMEOUT_SECS, raw))
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let url = reqwest::Url::parse(&self.server_url).map_err(|e| {
            SupplyChainError::Config(format!("Invalid server URL '{}': {}", self.server_url, e))
        })?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(SupplyChainError::Config(format!(
                "Server URL must be http or https, got '{}'",
                self.server_url
            )));
        }
        if self.timeout_secs == 0 {
            return Err(SupplyChainError::Config("Request timeout must be at least 1 second".into()));
        }
        Ok(())
    }

    /// Base URL every API path is appended to, without a trailing slash
    pub fn api_base(&self) -> String {
        let server = self.server_url.trim_end_matches('/');
        let prefix = self.api_prefix.trim_matches('/');
        if prefix.is_empty() {
            server.to_string()
        } else {
            format!("{}/{}", server, prefix)
        }
    }
}
