//! Snapshot handlers: listing, search, values, and take/save.

use tabled::Tabled;

use masar_core::{SaveRestoreClient, Snapshot, SnapshotQuery, ValueSnapshot};

use crate::cli::{FindArgs, GlobalOpts, ShowArgs, SnapshotsArgs, TakeArgs};
use crate::config::Resolved;
use crate::error::CliError;
use crate::output;

use super::util;

// ── Table rows ──────────────────────────────────────────────────────

#[derive(Tabled)]
struct SnapshotRow {
    #[tabled(rename = "Event")]
    event: String,
    #[tabled(rename = "Set")]
    set: String,
    #[tabled(rename = "Date")]
    date: String,
    #[tabled(rename = "Owner")]
    owner: String,
    #[tabled(rename = "Comment")]
    comment: String,
}

impl From<&Snapshot> for SnapshotRow {
    fn from(s: &Snapshot) -> Self {
        Self {
            event: s.event_id().unwrap_or_default().to_owned(),
            set: s.beamline_set.name().to_owned(),
            date: util::date_cell(s.date.as_ref()),
            owner: s.owner.clone(),
            comment: s.comment.clone(),
        }
    }
}

#[derive(Tabled)]
struct ValueRow {
    #[tabled(rename = "Process variable")]
    name: String,
    #[tabled(rename = "Sel")]
    selected: &'static str,
    #[tabled(rename = "Value")]
    value: String,
    #[tabled(rename = "Severity")]
    severity: String,
    #[tabled(rename = "Status")]
    status: i32,
    #[tabled(rename = "Timestamp")]
    timestamp: String,
}

fn value_rows(values: &ValueSnapshot) -> Vec<ValueRow> {
    values
        .names()
        .iter()
        .zip(values.selected())
        .zip(values.values())
        .map(|((name, selected), captured)| ValueRow {
            name: name.clone(),
            selected: if *selected { "x" } else { "" },
            value: captured.value.to_string(),
            severity: captured.severity.to_string(),
            status: captured.status,
            timestamp: util::date_cell(captured.timestamp.as_ref()),
        })
        .collect()
}

fn values_detail(values: &ValueSnapshot) -> String {
    let mut lines = vec![format!("Set:       {}", values.beamline_set().name())];
    if let Some(meta) = values.snapshot() {
        if let Some(event) = meta.event_id() {
            lines.push(format!("Event:     {event}"));
        }
        if !meta.owner.is_empty() {
            lines.push(format!("Owner:     {}", meta.owner));
        }
        if !meta.comment.is_empty() {
            lines.push(format!("Comment:   {}", meta.comment));
        }
    }
    lines.push(format!(
        "Captured:  {}",
        masar_core::mapper::format_date(&values.timestamp())
    ));
    lines.push(format!("Items:     {}", values.len()));
    lines.push(output::render_table(&value_rows(values)));
    lines.join("\n")
}

fn render_snapshots(global: &GlobalOpts, snapshots: &[Snapshot]) {
    let out = output::render_list(
        &global.output,
        snapshots,
        |s| SnapshotRow::from(s),
        |s| s.event_id().unwrap_or_default().to_owned(),
    );
    output::print_output(&out, global.quiet);
}

fn render_values(global: &GlobalOpts, values: &ValueSnapshot) {
    let out = output::render_single(&global.output, values, values_detail, |v| {
        v.names().join("\n")
    });
    output::print_output(&out, global.quiet);
}

// ── Handlers ────────────────────────────────────────────────────────

pub async fn list(
    client: &SaveRestoreClient,
    args: SnapshotsArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let set = util::resolve_set(client, &args.set, &args.base_level).await?;
    let snapshots = client.snapshots(&set).await?;
    render_snapshots(global, &snapshots);
    Ok(())
}

pub async fn find(
    client: &SaveRestoreClient,
    args: FindArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let mut query = SnapshotQuery::new(util::selected(), args.expression);
    if args.by_user {
        query = query.by_user();
    }
    if args.by_comment {
        query = query.by_comment();
    }
    if let Some(ref raw) = args.start {
        query = query.start(util::parse_time("start", raw)?);
    }
    if let Some(ref raw) = args.end {
        query = query.end(util::parse_time("end", raw)?);
    }

    let snapshots = client.find_snapshots(&query).await?;
    render_snapshots(global, &snapshots);
    Ok(())
}

pub async fn show(
    client: &SaveRestoreClient,
    args: ShowArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let set = util::resolve_set(client, &args.set, &args.base_level).await?;
    let snapshot = client
        .snapshots(&set)
        .await?
        .into_iter()
        .find(|s| s.event_id() == Some(args.event_id.as_str()))
        .ok_or_else(|| {
            CliError::not_found(
                "snapshot",
                &args.event_id,
                &format!("snapshots {}", set.name()),
            )
        })?;

    let values = client.load_snapshot_data(&snapshot).await?;
    render_values(global, &values);
    Ok(())
}

pub async fn take(
    client: &SaveRestoreClient,
    args: TakeArgs,
    resolved: &Resolved,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    // Resolve the user up front so a missing one fails before anything is taken.
    let user = if args.save {
        Some(match args.user {
            Some(user) => user,
            None => masar_config::resolve_user(&resolved.profile, &resolved.name)?,
        })
    } else {
        None
    };

    let set = util::resolve_set(client, &args.set, &args.base_level).await?;
    let taken = client.take_snapshot(&set).await?;

    let (Some(user), Some(comment)) = (user, args.comment) else {
        render_values(global, &taken);
        output::success(global, "Snapshot taken (not saved)");
        return Ok(());
    };

    let saved = client.save_snapshot(&taken, &comment, &user).await?;
    render_values(global, &saved);
    let event = saved
        .snapshot()
        .and_then(Snapshot::event_id)
        .unwrap_or_default();
    output::success(global, &format!("Snapshot saved as event {event}"));
    Ok(())
}
