//! Configuration for the topic sync session
//!
//! Loaded from TOML. Only `[backend]` is required; every other section falls
//! back to the defaults the mobile client shipped with (30 second timeouts,
//! 30 second keepalive pings, 5 second reconnect delay).

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Main sync configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SyncConfig {
    pub backend: BackendSection,
    #[serde(default)]
    pub auth: AuthSection,
    #[serde(default)]
    pub tenant: TenantSection,
    #[serde(default)]
    pub reconnect: ReconnectSection,
    #[serde(default)]
    pub transport: TransportSection,
}

/// Backend section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BackendSection {
    /// Base address of the streaming backend (`ws://` or `wss://`)
    pub base_url: String,
}

/// Credential source used by the command line runner
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuthSection {
    /// Environment variable containing the bearer token
    #[serde(default = "default_token_env")]
    pub token_env: String,
}

impl Default for AuthSection {
    fn default() -> Self {
        Self {
            token_env: default_token_env(),
        }
    }
}

fn default_token_env() -> String {
    "TOPIC_SYNC_TOKEN".to_string()
}

/// Tenant routing key
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TenantSection {
    /// Tenant used when nothing else is selected
    #[serde(default = "default_tenant_id")]
    pub tenant_id: String,
    /// Optional environment variable that overrides `tenant_id`
    pub tenant_env: Option<String>,
}

impl Default for TenantSection {
    fn default() -> Self {
        Self {
            tenant_id: default_tenant_id(),
            tenant_env: None,
        }
    }
}

pub(crate) fn default_tenant_id() -> String {
    "default".to_string()
}

/// Reconnection section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReconnectSection {
    /// Fixed delay before each reconnection attempt, in milliseconds
    #[serde(default = "default_reconnect_delay_ms")]
    pub delay_ms: u64,
}

impl Default for ReconnectSection {
    fn default() -> Self {
        Self {
            delay_ms: default_reconnect_delay_ms(),
        }
    }
}

fn default_reconnect_delay_ms() -> u64 {
    5000
}

/// Transport timeouts
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransportSection {
    /// Handshake timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Seconds an open stream may stay silent before it is treated as lost
    /// (0 disables). With keepalive pings enabled this counts from the
    /// oldest ping still waiting for any inbound frame, so an idle backend
    /// that answers pings is never timed out.
    #[serde(default = "default_timeout_secs")]
    pub read_timeout_secs: u64,
    /// Keepalive ping cadence in seconds (0 disables)
    #[serde(default = "default_timeout_secs")]
    pub ping_interval_secs: u64,
}

impl Default for TransportSection {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_timeout_secs(),
            read_timeout_secs: default_timeout_secs(),
            ping_interval_secs: default_timeout_secs(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    30
}

impl TransportSection {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn read_timeout(&self) -> Option<Duration> {
        (self.read_timeout_secs > 0).then(|| Duration::from_secs(self.read_timeout_secs))
    }

    pub fn ping_interval(&self) -> Option<Duration> {
        (self.ping_interval_secs > 0).then(|| Duration::from_secs(self.ping_interval_secs))
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Invalid base URL: {0}")]
    InvalidBaseUrl(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl SyncConfig {
    /// Load configuration from a TOML file and validate it
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: SyncConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Configuration pointing at `base_url` with every other value defaulted
    pub fn with_base_url<S: Into<String>>(base_url: S) -> Self {
        Self {
            backend: BackendSection {
                base_url: base_url.into(),
            },
            auth: AuthSection::default(),
            tenant: TenantSection::default(),
            reconnect: ReconnectSection::default(),
            transport: TransportSection::default(),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_base_url(&self.backend.base_url)?;

        if self.reconnect.delay_ms == 0 {
            return Err(ConfigError::InvalidConfig(
                "reconnect.delay_ms must be greater than 0".to_string(),
            ));
        }

        if self.transport.connect_timeout_secs == 0 {
            return Err(ConfigError::InvalidConfig(
                "transport.connect_timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.tenant.tenant_id.trim().is_empty() {
            return Err(ConfigError::InvalidConfig(
                "tenant.tenant_id must not be empty".to_string(),
            ));
        }

        Ok(())
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect.delay_ms)
    }

    /// Tenant configured for this process, honouring `tenant_env` when set
    pub fn initial_tenant_id(&self) -> String {
        self.tenant
            .tenant_env
            .as_ref()
            .and_then(|name| std::env::var(name).ok())
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| self.tenant.tenant_id.clone())
    }
}

fn validate_base_url(base_url: &str) -> Result<(), ConfigError> {
    let url = Url::parse(base_url).map_err(|_| ConfigError::InvalidBaseUrl(base_url.to_string()))?;
    match url.scheme() {
        "ws" | "wss" if url.host_str().is_some() => Ok(()),
        _ => Err(ConfigError::InvalidBaseUrl(base_url.to_string())),
    }
}
