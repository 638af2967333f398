//! Config subcommand handlers.

use serde::Serialize;
use tabled::Tabled;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts, OutputFormat};
use crate::config::{self, Config};
use crate::error::CliError;
use crate::output;

#[derive(Serialize)]
struct ProfileEntry {
    name: String,
    default: bool,
    gateway: String,
    services: Vec<String>,
}

#[derive(Tabled)]
struct ProfileRow {
    #[tabled(rename = "")]
    marker: &'static str,
    #[tabled(rename = "Profile")]
    name: String,
    #[tabled(rename = "Gateway")]
    gateway: String,
    #[tabled(rename = "Services")]
    services: String,
}

impl From<&ProfileEntry> for ProfileRow {
    fn from(p: &ProfileEntry) -> Self {
        Self {
            marker: if p.default { "*" } else { "" },
            name: p.name.clone(),
            gateway: p.gateway.clone(),
            services: p.services.join(", "),
        }
    }
}

fn profile_entries(cfg: &Config) -> Vec<ProfileEntry> {
    let default = cfg.default_profile.as_deref().unwrap_or("default");
    let mut entries: Vec<ProfileEntry> = cfg
        .profiles
        .iter()
        .map(|(name, p)| ProfileEntry {
            name: name.clone(),
            default: name == default,
            gateway: p.gateway.clone(),
            services: p.services.clone(),
        })
        .collect();
    entries.sort_by(|a, b| a.name.cmp(&b.name));
    entries
}

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Path => {
            output::print_output(&config::config_path().display().to_string(), global.quiet);
            Ok(())
        }

        // ── Show ────────────────────────────────────────────────────
        ConfigCommand::Show => {
            let cfg = config::load_config_or_default();
            let out = match global.output {
                OutputFormat::Table | OutputFormat::Plain => {
                    toml::to_string_pretty(&cfg).map_err(|e| CliError::Validation {
                        field: "config".into(),
                        reason: format!("cannot render config: {e}"),
                    })?
                }
                _ => output::render_single(&global.output, &cfg, |_| String::new(), |_| String::new()),
            };
            output::print_output(out.trim_end(), global.quiet);
            Ok(())
        }

        // ── Profiles ────────────────────────────────────────────────
        ConfigCommand::Profiles => {
            let cfg = config::load_config_or_default();
            let entries = profile_entries(&cfg);
            if entries.is_empty() {
                eprintln!(
                    "No profiles configured. Add one to {}",
                    config::config_path().display()
                );
                return Ok(());
            }
            let out = output::render_list(
                &global.output,
                &entries,
                |p| ProfileRow::from(p),
                |p| p.name.clone(),
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }

        // ── Use <name> ─────────────────────────────────────────────
        ConfigCommand::Use { name } => {
            let mut cfg = config::load_config_or_default();

            if !cfg.profiles.contains_key(&name) {
                return Err(CliError::ProfileNotFound {
                    available: config::available_profiles(&cfg),
                    name,
                });
            }

            cfg.default_profile = Some(name.clone());
            config::save_config(&cfg)?;
            output::success(global, &format!("Default profile set to '{name}'"));
            Ok(())
        }
    }
}
