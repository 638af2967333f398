// ── Wire-to-domain mapping ──
//
// One request builder and one response parser per service function.
// Parsers first look for a backend-reported failure, then pull columns
// out of the `value` table by name. Nothing here touches the transport.

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::de::DeserializeOwned;
use serde_json::Value;

use masar_api::wire::{
    ConfigTable, DATE_FORMAT, EventTable, SnapshotTable, SystemListTable,
};
use masar_api::{FunctionCode, RpcRequest, RpcResponse};

use crate::error::CoreError;
use crate::model::{
    AlarmSeverity, BaseLevel, BeamlineSet, CapturedValue, ProcessValue, ServiceEndpoint, Snapshot,
    SnapshotItems, SnapshotQuery, ValueSnapshot,
};

// ── Helpers ────────────────────────────────────────────────────────

/// Decode the envelope and fail on a backend-reported alarm message.
fn checked(raw: Value) -> Result<RpcResponse, CoreError> {
    let response = RpcResponse::from_value(raw)?;
    if let Some(message) = response.failure_message() {
        return Err(CoreError::BackendRejected {
            message: message.to_owned(),
        });
    }
    Ok(response)
}

/// Decode the `value` table of a response.
fn table<T: DeserializeOwned>(response: RpcResponse, function: FunctionCode) -> Result<T, CoreError> {
    let value = response
        .value
        .ok_or_else(|| CoreError::malformed(format!("{function}: response carries no value")))?;
    serde_json::from_value(value).map_err(|e| CoreError::malformed(format!("{function}: {e}")))
}

fn column<'a, T>(items: &'a [T], row: usize, name: &str) -> Result<&'a T, CoreError> {
    items
        .get(row)
        .ok_or_else(|| CoreError::malformed(format!("column '{name}' is missing row {row}")))
}

fn parse_date(raw: &str) -> Result<DateTime<Utc>, CoreError> {
    NaiveDateTime::parse_from_str(raw.trim(), DATE_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|e| CoreError::malformed(format!("unparsable date '{raw}': {e}")))
}

pub fn format_date(date: &DateTime<Utc>) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn epoch_to_datetime(seconds: i64, nanos: i32) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(seconds, u32::try_from(nanos).unwrap_or(0))
}

/// Best-effort conversion of a loosely typed readback cell.
fn json_to_process_value(value: &Value) -> ProcessValue {
    match value {
        Value::Number(n) => n
            .as_i64()
            .map_or_else(|| ProcessValue::Double(n.as_f64().unwrap_or(f64::NAN)), ProcessValue::Long),
        Value::String(s) => ProcessValue::Text(s.clone()),
        Value::Bool(b) => ProcessValue::Long(i64::from(*b)),
        Value::Array(items) => ProcessValue::Array(items.clone()),
        Value::Null | Value::Object(_) => ProcessValue::Disconnected,
    }
}

// ── Base levels ────────────────────────────────────────────────────

pub fn base_levels_request() -> RpcRequest {
    RpcRequest::new(FunctionCode::LoadBaseLevels)
}

/// Distinct base levels sorted by name, behind a synthetic `"all"` entry.
pub fn parse_base_levels(
    endpoint: &ServiceEndpoint,
    raw: Value,
) -> Result<Vec<BaseLevel>, CoreError> {
    let systems: SystemListTable = table(checked(raw)?, FunctionCode::LoadBaseLevels)?;

    let names: BTreeSet<String> = systems
        .system
        .into_iter()
        .filter(|s| !s.is_empty() && s != BaseLevel::ALL)
        .collect();

    let mut levels = Vec::with_capacity(names.len() + 1);
    levels.push(BaseLevel::all(endpoint.clone()));
    levels.extend(names.into_iter().map(|n| BaseLevel::new(endpoint.clone(), n)));
    Ok(levels)
}

// ── Configuration sets ─────────────────────────────────────────────

pub fn beamline_sets_request(base_level: Option<&BaseLevel>) -> RpcRequest {
    let mut request = RpcRequest::new(FunctionCode::LoadBeamlineSets);
    request.system = Some(
        base_level
            .map_or(BaseLevel::ALL, |b| b.storage_name.as_str())
            .to_owned(),
    );
    request.config_name = Some("*".into());
    request
}

pub fn parse_beamline_sets(
    endpoint: &ServiceEndpoint,
    base_level: Option<&BaseLevel>,
    raw: Value,
) -> Result<Vec<BeamlineSet>, CoreError> {
    let configs: ConfigTable = table(checked(raw)?, FunctionCode::LoadBeamlineSets)?;

    configs
        .config_name
        .iter()
        .enumerate()
        .map(|(row, name)| {
            let index = column(&configs.config_idx, row, "config_idx")?;
            let mut set = BeamlineSet::new(endpoint.clone(), name.as_str())
                .with_parameter(BeamlineSet::CONFIG_INDEX, index.to_string())
                .with_parameter(BeamlineSet::CONFIG_NAME, name.as_str());
            set.base_level = base_level.cloned();
            set.description = configs.config_desc.get(row).cloned().unwrap_or_default();
            Ok(set)
        })
        .collect()
}

// ── Snapshot lists ─────────────────────────────────────────────────

pub fn find_snapshots_request(query: &SnapshotQuery) -> RpcRequest {
    let pattern = format!("*{}*", query.expression);
    let mut request = RpcRequest::new(FunctionCode::FindSnapshots);
    request.comment = Some(if query.by_comment { pattern.clone() } else { "*".into() });
    request.user = Some(if query.by_user { pattern } else { "*".into() });
    request.start = query.start.as_ref().map(format_date);
    request.end = query.end.as_ref().map(format_date);
    request
}

pub fn snapshots_request(set: &BeamlineSet) -> RpcRequest {
    let mut request = RpcRequest::new(FunctionCode::LoadSnapshots);
    request.config_id = set.config_index().map(str::to_owned);
    request
}

/// Snapshots of a search result. Each row names its own configuration.
pub fn parse_found_snapshots(
    endpoint: &ServiceEndpoint,
    raw: Value,
) -> Result<Vec<Snapshot>, CoreError> {
    let events: EventTable = table(checked(raw)?, FunctionCode::FindSnapshots)?;
    let config_names = events.config_name.clone();
    snapshot_rows(events, |row, config_id| {
        let config_id = config_id.to_string();
        let set = match config_names.get(row) {
            Some(name) => BeamlineSet::new(endpoint.clone(), name.as_str())
                .with_parameter(BeamlineSet::CONFIG_NAME, name.as_str()),
            None => BeamlineSet::new(endpoint.clone(), config_id.as_str()),
        };
        set.with_parameter(BeamlineSet::CONFIG_INDEX, config_id)
    })
}

/// Revisions of one configuration set.
pub fn parse_snapshots(set: &BeamlineSet, raw: Value) -> Result<Vec<Snapshot>, CoreError> {
    let events: EventTable = table(checked(raw)?, FunctionCode::LoadSnapshots)?;
    snapshot_rows(events, |_, _| set.clone())
}

/// Build one snapshot per event row, newest first.
fn snapshot_rows<F>(events: EventTable, mut set_for: F) -> Result<Vec<Snapshot>, CoreError>
where
    F: FnMut(usize, i64) -> BeamlineSet,
{
    let mut snapshots = events
        .event_id
        .iter()
        .enumerate()
        .map(|(row, event_id)| {
            let config_id = *column(&events.config_id, row, "config_id")?;
            let date = parse_date(column(&events.event_time, row, "event_time")?)?;
            Ok(Snapshot {
                beamline_set: set_for(row, config_id),
                date: Some(date),
                comment: events.comments.get(row).cloned().unwrap_or_default(),
                owner: events.user_name.get(row).cloned().unwrap_or_default(),
                parameters: [
                    (Snapshot::EVENT_ID.to_owned(), event_id.to_string()),
                    (Snapshot::CONFIG_ID.to_owned(), config_id.to_string()),
                ]
                .into(),
            })
        })
        .collect::<Result<Vec<_>, CoreError>>()?;

    snapshots.sort_by(|a, b| b.date.cmp(&a.date));
    Ok(snapshots)
}

// ── Snapshot values ────────────────────────────────────────────────

pub fn snapshot_data_request(snapshot: &Snapshot) -> Result<RpcRequest, CoreError> {
    let event_id = snapshot
        .event_id()
        .ok_or_else(|| CoreError::invalid("snapshot has no event id"))?;
    let mut request = RpcRequest::new(FunctionCode::LoadSnapshotData);
    request.event_id = Some(event_id.to_owned());
    Ok(request)
}

pub fn parse_snapshot_data(snapshot: &Snapshot, raw: Value) -> Result<ValueSnapshot, CoreError> {
    let rows: SnapshotTable = table(checked(raw)?, FunctionCode::LoadSnapshotData)?;
    let items = snapshot_items(&rows)?;

    let timestamp = snapshot
        .date
        .or_else(|| items.values.iter().filter_map(|v| v.timestamp).max())
        .ok_or_else(|| CoreError::malformed("snapshot has neither a date nor value timestamps"))?;

    ValueSnapshot::new(
        Some(snapshot.clone()),
        snapshot.beamline_set.clone(),
        items,
        timestamp,
    )
}

/// Turn the per-PV columns into snapshot items.
///
/// Selection flags follow `isConnected`; readback and delta columns are
/// kept only when they cover every row.
fn snapshot_items(rows: &SnapshotTable) -> Result<SnapshotItems, CoreError> {
    let n = rows.pv_name.len();
    let mut selected = Vec::with_capacity(n);
    let mut values = Vec::with_capacity(n);

    for row in 0..n {
        let connected = rows
            .is_connected
            .as_ref()
            .and_then(|c| c.get(row).copied())
            .unwrap_or(true);
        let value = if connected {
            process_value(rows, row)?
        } else {
            ProcessValue::Disconnected
        };
        let timestamp = match (rows.seconds_past_epoch.get(row), rows.nano_seconds.get(row)) {
            (Some(&secs), nanos) => epoch_to_datetime(secs, nanos.copied().unwrap_or(0)),
            (None, _) => None,
        };

        selected.push(connected);
        values.push(CapturedValue {
            value,
            severity: rows.severity.get(row).copied().map_or(AlarmSeverity::Undefined, AlarmSeverity::from),
            status: rows.status.get(row).copied().unwrap_or_default(),
            timestamp,
        });
    }

    let full = |len: usize| len == n && n > 0;
    Ok(SnapshotItems {
        names: rows.pv_name.clone(),
        selected,
        values,
        readback_names: if full(rows.readback_name.len()) {
            rows.readback_name.clone()
        } else {
            Vec::new()
        },
        readback_values: if full(rows.readback_value.len()) {
            rows.readback_value.iter().map(json_to_process_value).collect()
        } else {
            Vec::new()
        },
        deltas: if full(rows.delta.len()) {
            rows.delta.clone()
        } else {
            Vec::new()
        },
    })
}

/// Select the value column for `row` by its DBR type.
fn process_value(rows: &SnapshotTable, row: usize) -> Result<ProcessValue, CoreError> {
    if let Some(Value::Array(items)) = rows.array_value.get(row) {
        if !items.is_empty() {
            return Ok(ProcessValue::Array(items.clone()));
        }
    }

    let dbr_type = *column(&rows.dbr_type, row, "dbr_type")?;
    Ok(match dbr_type {
        1 | 4 | 5 => ProcessValue::Long(*column(&rows.long_val, row, "long_val")?),
        2 | 6 => ProcessValue::Double(*column(&rows.double_val, row, "double_val")?),
        3 => ProcessValue::Enum(*column(&rows.long_val, row, "long_val")?),
        _ => ProcessValue::Text(column(&rows.string_val, row, "string_val")?.clone()),
    })
}

// ── Take / save ────────────────────────────────────────────────────

pub fn take_snapshot_request(set: &BeamlineSet) -> Result<RpcRequest, CoreError> {
    let name = set
        .config_name()
        .ok_or_else(|| CoreError::invalid(format!("unknown configuration set '{}'", set.name())))?;
    let mut request = RpcRequest::new(FunctionCode::TakeSnapshot);
    request.config_name = Some(name.to_owned());
    Ok(request)
}

/// A freshly taken, unsaved snapshot.
///
/// The service signals failure by omitting the `isConnected` column, or
/// the whole `value`; the reason is in the alarm message. The event id
/// rides in `timeStamp.userTag`.
pub fn parse_take_snapshot(set: &BeamlineSet, raw: Value) -> Result<ValueSnapshot, CoreError> {
    let response = RpcResponse::from_value(raw)?;
    let taken = response
        .value
        .as_ref()
        .and_then(|v| v.get("isConnected"))
        .is_some_and(|c| !c.is_null());
    if !taken {
        return Err(CoreError::BackendRejected {
            message: response
                .failure_message()
                .unwrap_or("snapshot could not be taken")
                .to_owned(),
        });
    }

    let time_stamp = response.time_stamp.clone();
    let rows: SnapshotTable = table(response, FunctionCode::TakeSnapshot)?;

    let stamp = time_stamp.ok_or_else(|| CoreError::malformed("take-snapshot response has no timeStamp"))?;
    let timestamp = epoch_to_datetime(stamp.seconds_past_epoch, stamp.nanoseconds)
        .ok_or_else(|| CoreError::malformed("take-snapshot timestamp out of range"))?;

    let snapshot = Snapshot::unsaved(set.clone(), stamp.user_tag.to_string());
    ValueSnapshot::new(Some(snapshot), set.clone(), snapshot_items(&rows)?, timestamp)
}

pub fn save_snapshot_request(
    snapshot: &ValueSnapshot,
    comment: &str,
    user: &str,
) -> Result<RpcRequest, CoreError> {
    let meta = snapshot
        .snapshot()
        .ok_or_else(|| CoreError::invalid("value snapshot has no snapshot metadata"))?;
    let event_id = meta
        .event_id()
        .ok_or_else(|| CoreError::invalid("snapshot has no event id"))?;

    let mut request = RpcRequest::new(FunctionCode::SaveSnapshot);
    request.event_id = Some(event_id.to_owned());
    request.user = Some(user.to_owned());
    request.description = Some(comment.to_owned());
    Ok(request)
}

/// The saved snapshot: same values, new metadata.
///
/// The service answers `value: true` on success and `false` plus an alarm
/// message otherwise.
pub fn parse_save_snapshot(
    snapshot: &ValueSnapshot,
    comment: &str,
    user: &str,
    raw: Value,
) -> Result<ValueSnapshot, CoreError> {
    let response = RpcResponse::from_value(raw)?;
    match response.value {
        Some(Value::Bool(true)) => {}
        Some(Value::Bool(false)) => {
            return Err(CoreError::BackendRejected {
                message: response
                    .failure_message()
                    .unwrap_or("snapshot was not saved")
                    .to_owned(),
            });
        }
        Some(_) | None => {
            if let Some(message) = response.failure_message() {
                return Err(CoreError::BackendRejected {
                    message: message.to_owned(),
                });
            }
            return Err(CoreError::malformed("save-snapshot response value is not a boolean"));
        }
    }

    let meta = snapshot
        .snapshot()
        .ok_or_else(|| CoreError::invalid("value snapshot has no snapshot metadata"))?;
    let date = meta.date.unwrap_or_else(|| snapshot.timestamp());
    Ok(snapshot.with_snapshot(meta.saved(date, comment, user)))
}
