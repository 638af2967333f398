//! Base level listing.

use tabled::Tabled;

use masar_core::{BaseLevel, SaveRestoreClient};

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

use super::util;

#[derive(Tabled)]
struct BaseLevelRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Service")]
    service: String,
}

impl From<&BaseLevel> for BaseLevelRow {
    fn from(l: &BaseLevel) -> Self {
        Self {
            name: l.display_name.clone(),
            service: l.endpoint.to_string(),
        }
    }
}

pub async fn handle(client: &SaveRestoreClient, global: &GlobalOpts) -> Result<(), CliError> {
    let levels = client.base_levels(&util::selected()).await?;
    let out = output::render_list(
        &global.output,
        &levels,
        |l| BaseLevelRow::from(l),
        |l| l.storage_name.clone(),
    );
    output::print_output(&out, global.quiet);
    Ok(())
}
