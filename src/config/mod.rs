use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

/// Complete Beacon configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BeaconConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub hub: HubConfig,
    #[serde(default)]
    pub websocket: WebSocketConfig,
    #[serde(default)]
    pub auth: AuthConfig,
}

/// HTTP listener configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
        }
    }
}

/// Hub mailbox sizing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubConfig {
    /// Outbound mailbox size per client; deliveries beyond this are dropped
    #[serde(default = "default_client_mailbox_capacity")]
    pub client_mailbox_capacity: usize,
    /// Size of each hub control mailbox (register, unregister, join, leave, broadcast)
    #[serde(default = "default_control_mailbox_capacity")]
    pub control_mailbox_capacity: usize,
}

fn default_client_mailbox_capacity() -> usize {
    256
}

fn default_control_mailbox_capacity() -> usize {
    1024
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            client_mailbox_capacity: default_client_mailbox_capacity(),
            control_mailbox_capacity: default_control_mailbox_capacity(),
        }
    }
}

/// WebSocket connection liveness
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebSocketConfig {
    /// How often the server sends a transport-level ping
    #[serde(default = "default_ping_interval")]
    pub ping_interval_seconds: u64,
    /// Close the connection when nothing is received for this long
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_seconds: u64,
}

fn default_ping_interval() -> u64 {
    30
}

fn default_idle_timeout() -> u64 {
    90
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            ping_interval_seconds: default_ping_interval(),
            idle_timeout_seconds: default_idle_timeout(),
        }
    }
}

/// Connection authentication
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Require a session token on WebSocket connect
    #[serde(default)]
    pub enabled: bool,
    /// Bearer token for mutating admin endpoints. None = unrestricted (dev mode)
    #[serde(default)]
    pub admin_token: Option<String>,
}

/// Load configuration from TOML file
pub fn load_config(path: impl AsRef<Path>) -> Result<BeaconConfig> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    let config: BeaconConfig = toml::from_str(&contents)
        .with_context(|| format!("failed to parse config file {}", path.display()))?;
    Ok(config)
}

/// Load from `path` if it exists, otherwise start from defaults.
/// Environment overrides are applied in both cases.
pub fn load_or_default(path: impl AsRef<Path>) -> Result<BeaconConfig> {
    let path = path.as_ref();
    let mut config = if path.exists() {
        info!(path = %path.display(), "Loading config file");
        load_config(path)?
    } else {
        info!(path = %path.display(), "Config file not found, using defaults");
        BeaconConfig::default()
    };
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    Ok(config)
}

/// Apply `BEACON_*` overrides. Unparseable values are ignored.
pub fn apply_env_overrides<F>(config: &mut BeaconConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(v) = lookup("BEACON_BIND_ADDR") {
        config.server.bind_addr = v;
    }
    if let Some(v) = lookup("BEACON_AUTH_ENABLED") {
        match v.parse::<bool>() {
            Ok(b) => config.auth.enabled = b,
            Err(_) => warn!(value = %v, "Ignoring invalid BEACON_AUTH_ENABLED"),
        }
    }
    if let Some(v) = lookup("BEACON_ADMIN_TOKEN") {
        if !v.is_empty() {
            config.auth.admin_token = Some(v);
        }
    }
    if let Some(v) = lookup("BEACON_CLIENT_MAILBOX_CAPACITY") {
        match v.parse::<usize>() {
            Ok(n) if n > 0 => config.hub.client_mailbox_capacity = n,
            _ => warn!(value = %v, "Ignoring invalid BEACON_CLIENT_MAILBOX_CAPACITY"),
        }
    }
}
