//! CLI configuration: thin wrapper around `masar_config` shared types.
//!
//! Adds resolution that respects `GlobalOpts` flag overrides
//! (--profile, --gateway, --service, --timeout).

use masar_api::TransportConfig;
use masar_core::ClientConfig;

use crate::cli::GlobalOpts;
use crate::error::CliError;

// ── Re-exports from shared crate ────────────────────────────────────

pub use masar_config::{Config, Profile, config_path, load_config_or_default, save_config};

/// A profile with CLI overrides applied, ready to build a client from.
#[derive(Debug)]
pub struct Resolved {
    pub name: String,
    pub profile: Profile,
    /// `true` if the profile came from the config file (and can be updated).
    pub persisted: bool,
    pub client: ClientConfig,
    pub transport: TransportConfig,
}

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    global
        .profile
        .clone()
        .or_else(|| config.default_profile.clone())
        .unwrap_or_else(|| "default".into())
}

/// Translate the active profile + global flags into client and transport
/// configuration. Flags take priority over profile values.
pub fn resolve(global: &GlobalOpts, config: &Config) -> Result<Resolved, CliError> {
    let name = active_profile_name(global, config);

    let (mut profile, persisted) = match config.profiles.get(&name) {
        Some(profile) => (profile.clone(), true),
        None if global.profile.is_some() => {
            return Err(CliError::ProfileNotFound {
                available: available_profiles(config),
                name,
            });
        }
        None => {
            let gateway = global.gateway.clone().ok_or_else(|| CliError::NoConfig {
                path: config_path().display().to_string(),
            })?;
            (Profile::new(gateway), false)
        }
    };

    if let Some(ref gateway) = global.gateway {
        profile.gateway.clone_from(gateway);
    }
    if let Some(timeout) = global.timeout {
        profile.request_timeout = Some(timeout);
    }
    if let Some(ref service) = global.service {
        profile.services.retain(|s| s != service);
        profile.services.insert(0, service.clone());
    }

    let client = masar_config::profile_to_client_config(&profile, &config.defaults);
    let transport = masar_config::profile_to_transport_config(&profile)?;

    Ok(Resolved {
        name,
        profile,
        persisted,
        client,
        transport,
    })
}

/// Comma-separated profile names, or "(none)".
pub fn available_profiles(config: &Config) -> String {
    let mut names: Vec<_> = config.profiles.keys().cloned().collect();
    if names.is_empty() {
        return "(none)".into();
    }
    names.sort();
    names.join(", ")
}
