//! Shared helpers for command handlers.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use masar_core::{BaseLevel, BeamlineSet, SaveRestoreClient, ServiceEndpoint};

use crate::cli::BaseLevelArg;
use crate::error::CliError;

/// The endpoint commands address: whatever service is selected.
pub fn selected() -> ServiceEndpoint {
    ServiceEndpoint::default_endpoint()
}

/// Resolve `--base-level` to a base level of the selected service.
pub async fn resolve_base_level(
    client: &SaveRestoreClient,
    arg: &BaseLevelArg,
) -> Result<Option<BaseLevel>, CliError> {
    let Some(ref name) = arg.base_level else {
        return Ok(None);
    };
    let levels = client.base_levels(&selected()).await?;
    levels
        .into_iter()
        .find(|l| l.storage_name == *name || l.display_name == *name)
        .map(Some)
        .ok_or_else(|| CliError::not_found("base level", name, "base-levels"))
}

/// Resolve a configuration set by name, optionally within a base level.
pub async fn resolve_set(
    client: &SaveRestoreClient,
    name: &str,
    base_level: &BaseLevelArg,
) -> Result<BeamlineSet, CliError> {
    let level = resolve_base_level(client, base_level).await?;
    let sets = client.beamline_sets(level.as_ref(), &selected()).await?;
    sets.into_iter()
        .find(|s| s.name() == name)
        .ok_or_else(|| CliError::not_found("configuration set", name, "sets"))
}

/// Parse a `--start` / `--end` value.
///
/// Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS`, or a bare date (midnight).
/// Times without an offset are taken as UTC.
pub fn parse_time(field: &str, raw: &str) -> Result<DateTime<Utc>, CliError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, masar_api::wire::DATE_FORMAT) {
        return Ok(naive.and_utc());
    }
    if let Some(naive) = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
    {
        return Ok(naive.and_utc());
    }
    Err(CliError::Validation {
        field: field.into(),
        reason: format!("unrecognized time '{raw}' (expected e.g. 2024-03-01 08:00:00)"),
    })
}

/// Table cell for an optional timestamp.
pub fn date_cell(date: Option<&DateTime<Utc>>) -> String {
    date.map(masar_core::mapper::format_date).unwrap_or_default()
}
