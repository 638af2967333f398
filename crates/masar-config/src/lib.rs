//! Shared configuration for MASAR tools.
//!
//! TOML profiles, `MASAR_` environment overrides, and translation to
//! `masar_core::ClientConfig` and `masar_api::TransportConfig`. The CLI
//! adds flag-aware wrappers on top.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use masar_api::{ReconnectConfig, TransportConfig};
use masar_core::ClientConfig;

/// Environment variable naming an explicit config file.
pub const CONFIG_FILE_ENV: &str = "MASAR_CONFIG_FILE";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("profile '{name}' not found")]
    UnknownProfile { name: String },

    #[error("no user configured for profile '{profile}'")]
    NoUser { profile: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Config {
    /// Default profile name.
    pub default_profile: Option<String>,

    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named gateway profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: HashMap::new(),
        }
    }
}

impl Config {
    /// Look up a profile, falling back to `default_profile`, then `"default"`.
    pub fn profile(&self, name: Option<&str>) -> Result<(String, &Profile), ConfigError> {
        let name = name
            .or(self.default_profile.as_deref())
            .unwrap_or("default")
            .to_owned();
        match self.profiles.get(&name) {
            Some(profile) => Ok((name, profile)),
            None => Err(ConfigError::UnknownProfile { name }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,

    /// Seconds to wait for a service channel to connect.
    #[serde(default = "default_connection_timeout")]
    pub connection_timeout: u64,

    /// Seconds to wait for a single response. Unset waits indefinitely.
    #[serde(default)]
    pub request_timeout: Option<u64>,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            connection_timeout: default_connection_timeout(),
            request_timeout: None,
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}
fn default_connection_timeout() -> u64 {
    5
}

/// A named gateway profile.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Profile {
    /// Gateway base URL (e.g., "ws://gateway:5080/masar/").
    pub gateway: String,

    /// Known service endpoints, preferred first.
    #[serde(default)]
    pub services: Vec<String>,

    /// Identity recorded on saved snapshots.
    pub user: Option<String>,

    /// Override connection timeout (seconds).
    pub connection_timeout: Option<u64>,

    /// Override request timeout (seconds).
    pub request_timeout: Option<u64>,

    /// Give up reconnecting after this many failed attempts.
    pub max_retries: Option<u32>,
}

impl Profile {
    pub fn new(gateway: impl Into<String>) -> Self {
        Self {
            gateway: gateway.into(),
            services: Vec::new(),
            user: None,
            connection_timeout: None,
            request_timeout: None,
            max_retries: None,
        }
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path: `MASAR_CONFIG_FILE`, else XDG / platform
/// conventions.
pub fn config_path() -> PathBuf {
    if let Some(explicit) = std::env::var_os(CONFIG_FILE_ENV) {
        return PathBuf::from(explicit);
    }
    ProjectDirs::from("org", "masar", "masar").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("masar");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from an explicit file, with `MASAR_` environment overrides
/// (`MASAR_DEFAULTS__OUTPUT=json`, `MASAR_PROFILES__LAB__GATEWAY=...`).
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("MASAR_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if the file doesn't exist.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

/// Record a newly added service at the front of a profile's list.
///
/// Returns `false` if the profile already knew it.
pub fn remember_service(
    cfg: &mut Config,
    profile_name: &str,
    service: &str,
) -> Result<bool, ConfigError> {
    let profile = cfg
        .profiles
        .get_mut(profile_name)
        .ok_or_else(|| ConfigError::UnknownProfile {
            name: profile_name.into(),
        })?;
    if profile.services.iter().any(|s| s == service) {
        return Ok(false);
    }
    profile.services.insert(0, service.to_owned());
    Ok(true)
}

// ── Translation ─────────────────────────────────────────────────────

/// Identity to record on saved snapshots: the profile's `user`, else the
/// login name from the environment.
pub fn resolve_user(profile: &Profile, profile_name: &str) -> Result<String, ConfigError> {
    profile
        .user
        .clone()
        .filter(|u| !u.is_empty())
        .or_else(|| std::env::var("USER").ok())
        .or_else(|| std::env::var("USERNAME").ok())
        .filter(|u| !u.is_empty())
        .ok_or_else(|| ConfigError::NoUser {
            profile: profile_name.into(),
        })
}

/// Build a `ClientConfig` from a profile and the global defaults.
pub fn profile_to_client_config(profile: &Profile, defaults: &Defaults) -> ClientConfig {
    let connection_secs = profile
        .connection_timeout
        .unwrap_or(defaults.connection_timeout);
    let request_secs = profile.request_timeout.or(defaults.request_timeout);

    ClientConfig {
        services: profile.services.clone(),
        connection_timeout: Duration::from_secs(connection_secs),
        request_timeout: request_secs.map(Duration::from_secs),
    }
}

/// Build a `TransportConfig` from a profile, validating the gateway URL.
pub fn profile_to_transport_config(profile: &Profile) -> Result<TransportConfig, ConfigError> {
    let gateway = parse_gateway(&profile.gateway)?;
    Ok(TransportConfig {
        gateway,
        reconnect: ReconnectConfig {
            max_retries: profile.max_retries,
            ..ReconnectConfig::default()
        },
    })
}

/// Parse a gateway URL; only WebSocket schemes are accepted.
pub fn parse_gateway(raw: &str) -> Result<Url, ConfigError> {
    let url: Url = raw.parse().map_err(|_| ConfigError::Validation {
        field: "gateway".into(),
        reason: format!("invalid URL: {raw}"),
    })?;
    match url.scheme() {
        "ws" | "wss" => Ok(url),
        other => Err(ConfigError::Validation {
            field: "gateway".into(),
            reason: format!("expected a ws:// or wss:// URL, got scheme '{other}'"),
        }),
    }
}
