//! Configuration set handlers: listing and contents.

use tabled::Tabled;

use masar_core::{BeamlineSet, BeamlineSetData, SaveRestoreClient};

use crate::cli::{ContentsArgs, GlobalOpts, SetsArgs};
use crate::error::CliError;
use crate::output;

use super::util;

// ── Table rows ──────────────────────────────────────────────────────

#[derive(Tabled)]
struct SetRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Base level")]
    base_level: String,
    #[tabled(rename = "Index")]
    index: String,
    #[tabled(rename = "Description")]
    description: String,
}

impl From<&BeamlineSet> for SetRow {
    fn from(s: &BeamlineSet) -> Self {
        Self {
            name: s.name().to_owned(),
            base_level: s
                .base_level
                .as_ref()
                .map(|l| l.display_name.clone())
                .unwrap_or_default(),
            index: s.config_index().unwrap_or_default().to_owned(),
            description: s.description.clone(),
        }
    }
}

#[derive(Tabled)]
struct PvRow {
    #[tabled(rename = "#")]
    position: usize,
    #[tabled(rename = "Process variable")]
    name: String,
}

fn contents_detail(data: &BeamlineSetData) -> String {
    let rows: Vec<PvRow> = data
        .pv_list
        .iter()
        .enumerate()
        .map(|(i, name)| PvRow {
            position: i + 1,
            name: name.clone(),
        })
        .collect();
    let mut lines = vec![format!("Set:         {}", data.set.name())];
    if !data.description.is_empty() {
        lines.push(format!("Description: {}", data.description));
    }
    lines.push(output::render_table(&rows));
    lines.join("\n")
}

// ── Handlers ────────────────────────────────────────────────────────

pub async fn list(
    client: &SaveRestoreClient,
    args: SetsArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let level = util::resolve_base_level(client, &args.base_level).await?;
    let sets = client.beamline_sets(level.as_ref(), &util::selected()).await?;
    let out = output::render_list(&global.output, &sets, |s| SetRow::from(s), |s| {
        s.name().to_owned()
    });
    output::print_output(&out, global.quiet);
    Ok(())
}

pub async fn contents(
    client: &SaveRestoreClient,
    args: ContentsArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let set = util::resolve_set(client, &args.set, &args.base_level).await?;
    let data = client.load_beamline_set_data(&set).await?;
    let out = output::render_single(&global.output, &data, contents_detail, |d| {
        d.pv_list.join("\n")
    });
    output::print_output(&out, global.quiet);
    Ok(())
}
