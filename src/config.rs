//! # Client Configuration
//!
//! Connection and concurrency settings for [`PhantomClient`](crate::PhantomClient).
//!
//! Precedence (highest to lowest):
//! 1. Environment variables prefixed `PHANTOM_` (e.g. `PHANTOM_BASE_URL`)
//! 2. Config file (`./phantom-client.toml`, `./config/phantom-client.toml`,
//!    or an explicit path)
//! 3. Default values

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

use crate::constants::{concurrency, pagination};
use crate::error::{ClientError, ClientResult};

const ENV_PREFIX: &str = "PHANTOM";
const DEFAULT_CONFIG_FILES: [&str; 2] = ["phantom-client", "config/phantom-client"];

/// Client configuration
///
/// # Examples
///
/// ```rust
/// use phantom_client::ClientConfig;
///
/// let config = ClientConfig::default();
/// assert_eq!(config.max_concurrency, 15);
/// assert_eq!(config.delete_concurrency, 3);
/// assert_eq!(config.page_size, 1000);
/// ```
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the Phantom instance (e.g., "<https://phantom.example.com>")
    pub base_url: String,
    /// API token sent in the `ph-auth-token` header
    pub auth_token: Option<String>,
    /// Verify the server's TLS certificate
    pub verify_ssl: bool,
    /// Request timeout in milliseconds
    pub timeout_ms: u64,
    /// Maximum requests in flight for reads, creates and updates
    pub max_concurrency: usize,
    /// Maximum requests in flight for deletes
    pub delete_concurrency: usize,
    /// Default page size for listings
    pub page_size: u32,
    /// Override for the User-Agent header
    pub user_agent: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "https://localhost".to_string(),
            auth_token: None,
            verify_ssl: true,
            timeout_ms: 30000,
            max_concurrency: concurrency::DEFAULT_MAX_IN_FLIGHT,
            delete_concurrency: concurrency::DEFAULT_DELETE_IN_FLIGHT,
            page_size: pagination::DEFAULT_PAGE_SIZE,
            user_agent: None,
        }
    }
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field("auth_token", &self.auth_token.as_deref().map(mask_secret))
            .field("verify_ssl", &self.verify_ssl)
            .field("timeout_ms", &self.timeout_ms)
            .field("max_concurrency", &self.max_concurrency)
            .field("delete_concurrency", &self.delete_concurrency)
            .field("page_size", &self.page_size)
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

impl ClientConfig {
    /// Load configuration from the default file locations and environment
    pub fn load() -> ClientResult<Self> {
        let mut builder = Config::builder();
        for candidate in DEFAULT_CONFIG_FILES {
            builder = builder.add_source(File::with_name(candidate).required(false));
        }
        Self::finish(builder)
    }

    /// Load configuration from a specific file, then apply environment overrides
    pub fn load_from_file(path: &Path) -> ClientResult<Self> {
        debug!("Loading config from: {}", path.display());
        let builder = Config::builder().add_source(File::from(path).required(true));
        Self::finish(builder)
    }

    fn finish(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> ClientResult<Self> {
        let config = builder
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()
            .and_then(|c| c.try_deserialize::<Self>())
            .map_err(|e| ClientError::config_error(format!("Failed to load configuration: {e}")))?;

        config.validate()?;
        debug!("Loaded client configuration: {:?}", config);
        Ok(config)
    }

    /// Reject settings that would make every request fail
    pub fn validate(&self) -> ClientResult<()> {
        reqwest::Url::parse(&self.base_url)
            .map_err(|e| ClientError::config_error(format!("Invalid base_url: {e}")))?;

        if self.max_concurrency == 0 {
            return Err(ClientError::config_error("max_concurrency must be at least 1"));
        }
        if self.delete_concurrency == 0 {
            return Err(ClientError::config_error(
                "delete_concurrency must be at least 1",
            ));
        }
        if self.page_size == 0 {
            return Err(ClientError::config_error("page_size must be at least 1"));
        }
        Ok(())
    }
}

/// Show only the first and last two characters of a secret
fn mask_secret(secret: &str) -> String {
    if secret.is_empty() {
        "[EMPTY]".to_string()
    } else if secret.chars().count() > 4 {
        let head: String = secret.chars().take(2).collect();
        let mut tail: Vec<char> = secret.chars().rev().take(2).collect();
        tail.reverse();
        let tail: String = tail.into_iter().collect();
        format!("[MASKED: {head}***{tail}]")
    } else {
        "[MASKED: ***]".to_string()
    }
}
