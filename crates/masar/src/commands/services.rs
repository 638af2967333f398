//! Service command handlers.

use serde::Serialize;
use tabled::Tabled;

use masar_core::SaveRestoreClient;

use crate::cli::{GlobalOpts, ServicesArgs, ServicesCommand};
use crate::config::{self, Resolved};
use crate::error::CliError;
use crate::output;

#[derive(Serialize)]
struct ServiceEntry {
    name: String,
    selected: bool,
}

#[derive(Tabled)]
struct ServiceRow {
    #[tabled(rename = "")]
    marker: &'static str,
    #[tabled(rename = "Service")]
    name: String,
}

impl From<&ServiceEntry> for ServiceRow {
    fn from(e: &ServiceEntry) -> Self {
        Self {
            marker: if e.selected { "*" } else { "" },
            name: e.name.clone(),
        }
    }
}

pub async fn handle(
    client: &SaveRestoreClient,
    args: ServicesArgs,
    resolved: &Resolved,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match args.command {
        ServicesCommand::List => {
            let selected = client.selected_service().await;
            let entries: Vec<ServiceEntry> = client
                .services()
                .await
                .into_iter()
                .map(|s| ServiceEntry {
                    selected: selected.as_ref() == Some(&s),
                    name: s.name,
                })
                .collect();
            let out = output::render_list(
                &global.output,
                &entries,
                |e| ServiceRow::from(e),
                |e| e.name.clone(),
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ServicesCommand::Add { name } => {
            let endpoint = client.add_service(&name).await?;

            if resolved.persisted {
                let mut cfg = config::load_config_or_default();
                if masar_config::remember_service(&mut cfg, &resolved.name, &endpoint.name)? {
                    config::save_config(&cfg)?;
                }
            }
            output::success(global, &format!("Service '{endpoint}' added and selected"));
            Ok(())
        }
    }
}
