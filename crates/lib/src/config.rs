//! Configuration types and loading.
//!
//! Config is loaded from a JSON file (e.g. `~/.atende/config.json`) and
//! environment. Relative paths in the file resolve against the config file's
//! directory so a whole deployment can be moved as one folder.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level application config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Messaging bridge connection settings.
    #[serde(default)]
    pub channel: ChannelConfig,

    /// Conversation state persistence.
    #[serde(default)]
    pub store: StoreConfig,

    /// Broadcast pacing.
    #[serde(default)]
    pub broadcast: BroadcastConfig,

    /// Order lookup service.
    #[serde(default)]
    pub orders: OrdersConfig,

    /// Loyalty/points service.
    #[serde(default)]
    pub loyalty: LoyaltyConfig,

    /// Optional media files attached to catalog/promotion replies.
    #[serde(default)]
    pub media: MediaConfig,
}

/// Bridge URL, auth, and initialization behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelConfig {
    /// Base URL of the messaging bridge daemon (default "http://127.0.0.1:8930").
    #[serde(default = "default_bridge_url")]
    pub bridge_url: String,

    /// Bearer token for the bridge API. Overridden by ATENDE_BRIDGE_TOKEN env.
    pub auth_token: Option<String>,

    /// How long to wait for the channel to become ready before falling back
    /// to offline simulation (default 15).
    #[serde(default = "default_init_timeout_secs")]
    pub init_timeout_secs: u64,

    /// Start in offline simulation without touching the bridge at all.
    #[serde(default)]
    pub offline: bool,
}

fn default_bridge_url() -> String {
    "http://127.0.0.1:8930".to_string()
}

fn default_init_timeout_secs() -> u64 {
    15
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            bridge_url: default_bridge_url(),
            auth_token: None,
            init_timeout_secs: default_init_timeout_secs(),
            offline: false,
        }
    }
}

/// Where the contact → state file lives.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreConfig {
    /// Path of the state file. Relative paths resolve against the config
    /// file's directory. Default: `state.json` next to the config file.
    #[serde(default)]
    pub state_path: Option<PathBuf>,
}

/// Broadcast pacing config.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastConfig {
    /// Seconds between broadcast sends (default 4). The gap keeps the channel's
    /// anti-abuse throttling away; lowering it is at your own risk.
    #[serde(default = "default_broadcast_delay_secs")]
    pub delay_secs: u64,
}

fn default_broadcast_delay_secs() -> u64 {
    4
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            delay_secs: default_broadcast_delay_secs(),
        }
    }
}

/// Order lookup service endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrdersConfig {
    /// Base URL (default "http://127.0.0.1:8931").
    pub base_url: Option<String>,
}

/// Loyalty service endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoyaltyConfig {
    /// Base URL (default "http://127.0.0.1:8932").
    pub base_url: Option<String>,
}

/// Media attached to canned replies when present.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaConfig {
    /// Catalog file sent with menu option 1 (e.g. a PDF). Relative paths
    /// resolve against the config file's directory.
    #[serde(default)]
    pub catalog_document: Option<PathBuf>,

    /// Promo image sent with menu option 6.
    #[serde(default)]
    pub promo_image: Option<PathBuf>,
}

/// Resolve the bridge token: env ATENDE_BRIDGE_TOKEN overrides config.
pub fn resolve_bridge_token(config: &Config) -> Option<String> {
    std::env::var("ATENDE_BRIDGE_TOKEN")
        .ok()
        .and_then(|s| {
            let t = s.trim();
            if t.is_empty() {
                None
            } else {
                Some(t.to_string())
            }
        })
        .or_else(|| {
            config
                .channel
                .auth_token
                .as_ref()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        })
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var("ATENDE_CONFIG_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::home_dir()
                .map(|h| h.join(".atende").join("config.json"))
                .unwrap_or_else(|| PathBuf::from("config.json"))
        })
}

/// Load config from the default path (or ATENDE_CONFIG_PATH). Missing file =>
/// default config. Returns the config and the path that was used (for
/// resolving relative paths).
pub fn load_config(path: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    let path = path.unwrap_or_else(default_config_path);
    let config = if !path.exists() {
        log::debug!("config file not found, using defaults: {}", path.display());
        Config::default()
    } else {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        serde_json::from_str(&s)
            .with_context(|| format!("parsing config from {}", path.display()))?
    };
    Ok((config, path))
}

fn config_parent(config_path: &Path) -> &Path {
    config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
}

/// Resolve a configured path against the config file's directory.
fn resolve_against_config(path: &Path, config_path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        config_parent(config_path).join(path)
    }
}

/// Resolve the state file path: `store.statePath` if set (relative paths
/// against the config directory), otherwise `state.json` next to the config.
pub fn resolve_state_path(config: &Config, config_path: &Path) -> PathBuf {
    match &config.store.state_path {
        Some(p) if !p.as_os_str().is_empty() => resolve_against_config(p, config_path),
        _ => config_parent(config_path).join("state.json"),
    }
}

/// Resolve media paths against the config directory.
pub fn resolve_media(config: &Config, config_path: &Path) -> MediaConfig {
    MediaConfig {
        catalog_document: config
            .media
            .catalog_document
            .as_ref()
            .map(|p| resolve_against_config(p, config_path)),
        promo_image: config
            .media
            .promo_image
            .as_ref()
            .map(|p| resolve_against_config(p, config_path)),
    }
}

/// Initialization timeout as a `Duration`.
pub fn init_timeout(config: &Config) -> Duration {
    Duration::from_secs(config.channel.init_timeout_secs)
}

/// Broadcast inter-message delay as a `Duration`.
pub fn broadcast_delay(config: &Config) -> Duration {
    Duration::from_secs(config.broadcast.delay_secs)
}
