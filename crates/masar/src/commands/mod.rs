//! Command dispatch: bridges CLI args -> client calls -> output formatting.

pub mod base_levels;
pub mod config_cmd;
pub mod services;
pub mod sets;
pub mod snapshots;
pub mod util;

use masar_core::SaveRestoreClient;

use crate::cli::{Command, GlobalOpts};
use crate::config::Resolved;
use crate::error::CliError;

/// Dispatch a service-bound command to the appropriate handler.
pub async fn dispatch(
    cmd: Command,
    client: &SaveRestoreClient,
    resolved: &Resolved,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match cmd {
        Command::Services(args) => services::handle(client, args, resolved, global).await,
        Command::BaseLevels => base_levels::handle(client, global).await,
        Command::Sets(args) => sets::list(client, args, global).await,
        Command::Contents(args) => sets::contents(client, args, global).await,
        Command::Snapshots(args) => snapshots::list(client, args, global).await,
        Command::Find(args) => snapshots::find(client, args, global).await,
        Command::Show(args) => snapshots::show(client, args, global).await,
        Command::Take(args) => snapshots::take(client, args, resolved, global).await,
        // Config and Completions are handled before dispatch
        Command::Config(_) | Command::Completions(_) => unreachable!(),
    }
}
