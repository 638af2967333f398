// MASAR wire payloads
//
// Requests are flat JSON objects selecting a service function; responses use
// the normative-type envelope `{ value, alarm, timeStamp }` where `value`
// holds a column-oriented table. Table fields use `#[serde(default)]`
// liberally because services omit columns they have no data for.

use serde::{Deserialize, Serialize, Serializer};
use strum::{AsRefStr, Display};

use crate::error::Error;

/// Timestamp format used by the service for dates in both directions.
pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// ── Function codes ───────────────────────────────────────────────────

/// Value of the mandatory `function` request field.
///
/// Finding snapshots and listing the revisions of one configuration share
/// the same service function; they differ only in the filter fields sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr)]
pub enum FunctionCode {
    #[strum(serialize = "retrieveSystemList")]
    LoadBaseLevels,
    #[strum(serialize = "retrieveServiceConfigs")]
    LoadBeamlineSets,
    #[strum(serialize = "retrieveServiceEvents")]
    FindSnapshots,
    #[strum(serialize = "retrieveServiceEvents")]
    LoadSnapshots,
    #[strum(serialize = "retrieveSnapshot")]
    LoadSnapshotData,
    #[strum(serialize = "updateSnapshotEvent")]
    SaveSnapshot,
    #[strum(serialize = "saveSnapshot")]
    TakeSnapshot,
}

impl Serialize for FunctionCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_ref())
    }
}

// ── Request ──────────────────────────────────────────────────────────

/// Outgoing RPC argument. Unset fields are omitted from the payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RpcRequest {
    pub function: FunctionCode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    #[serde(rename = "configname", skip_serializing_if = "Option::is_none")]
    pub config_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<String>,
    #[serde(rename = "configid", skip_serializing_if = "Option::is_none")]
    pub config_id: Option<String>,
    #[serde(rename = "eventid", skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    #[serde(rename = "desc", skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl RpcRequest {
    pub fn new(function: FunctionCode) -> Self {
        Self {
            function,
            system: None,
            config_name: None,
            comment: None,
            user: None,
            start: None,
            end: None,
            config_id: None,
            event_id: None,
            description: None,
        }
    }

    /// Encode into the JSON object handed to the transport.
    pub fn to_value(&self) -> Result<serde_json::Value, Error> {
        serde_json::to_value(self).map_err(|e| Error::Serialization(e.to_string()))
    }
}

// ── Response envelope ────────────────────────────────────────────────

/// Incoming RPC result.
///
/// On failure the service returns an `alarm` with a message and no usable
/// `value`; `take snapshot` additionally carries the event id in
/// `timeStamp.userTag`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RpcResponse {
    #[serde(default)]
    pub value: Option<serde_json::Value>,
    #[serde(default)]
    pub alarm: Option<Alarm>,
    #[serde(default, rename = "timeStamp")]
    pub time_stamp: Option<TimeStamp>,
}

impl RpcResponse {
    pub fn from_value(value: serde_json::Value) -> Result<Self, Error> {
        serde_json::from_value(value.clone()).map_err(|e| Error::Deserialization {
            message: e.to_string(),
            body: value.to_string(),
        })
    }

    /// The backend-reported failure message, if the alarm carries one.
    pub fn failure_message(&self) -> Option<&str> {
        self.alarm
            .as_ref()
            .map(|a| a.message.as_str())
            .filter(|m| !m.is_empty())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Alarm {
    #[serde(default)]
    pub severity: i32,
    #[serde(default)]
    pub status: i32,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TimeStamp {
    #[serde(default, rename = "secondsPastEpoch")]
    pub seconds_past_epoch: i64,
    #[serde(default)]
    pub nanoseconds: i32,
    #[serde(default, rename = "userTag")]
    pub user_tag: i32,
}

// ── Value tables ─────────────────────────────────────────────────────

/// `value` of `retrieveSystemList`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SystemListTable {
    #[serde(default)]
    pub system: Vec<String>,
}

/// `value` of `retrieveServiceConfigs`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigTable {
    #[serde(default)]
    pub config_idx: Vec<i64>,
    #[serde(default)]
    pub config_name: Vec<String>,
    #[serde(default)]
    pub config_desc: Vec<String>,
    #[serde(default)]
    pub config_create_date: Vec<String>,
    #[serde(default)]
    pub config_version: Vec<i64>,
}

/// `value` of `retrieveServiceEvents`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventTable {
    #[serde(default)]
    pub event_id: Vec<i64>,
    #[serde(default)]
    pub config_id: Vec<i64>,
    /// Only present in search results spanning several configurations.
    #[serde(default)]
    pub config_name: Vec<String>,
    #[serde(default)]
    pub comments: Vec<String>,
    #[serde(default)]
    pub event_time: Vec<String>,
    #[serde(default)]
    pub user_name: Vec<String>,
}

/// `value` of `retrieveSnapshot` and `saveSnapshot`: one row per process variable.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SnapshotTable {
    #[serde(default)]
    pub pv_name: Vec<String>,
    #[serde(default)]
    pub string_val: Vec<String>,
    #[serde(default)]
    pub double_val: Vec<f64>,
    #[serde(default)]
    pub long_val: Vec<i64>,
    #[serde(default)]
    pub dbr_type: Vec<i32>,
    /// Absent when a take-snapshot request failed.
    #[serde(default, rename = "isConnected")]
    pub is_connected: Option<Vec<bool>>,
    #[serde(default, rename = "secondsPastEpoch")]
    pub seconds_past_epoch: Vec<i64>,
    #[serde(default, rename = "nanoSeconds")]
    pub nano_seconds: Vec<i32>,
    #[serde(default)]
    pub severity: Vec<i32>,
    #[serde(default)]
    pub status: Vec<i32>,
    #[serde(default)]
    pub array_value: Vec<serde_json::Value>,
    #[serde(default)]
    pub readback_name: Vec<String>,
    #[serde(default)]
    pub readback_value: Vec<serde_json::Value>,
    #[serde(default)]
    pub delta: Vec<String>,
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn function_codes_use_service_names() {
        assert_eq!(FunctionCode::LoadBaseLevels.as_ref(), "retrieveSystemList");
        assert_eq!(FunctionCode::FindSnapshots.as_ref(), "retrieveServiceEvents");
        assert_eq!(FunctionCode::LoadSnapshots.as_ref(), "retrieveServiceEvents");
        assert_eq!(FunctionCode::TakeSnapshot.to_string(), "saveSnapshot");
        assert_eq!(FunctionCode::SaveSnapshot.to_string(), "updateSnapshotEvent");
    }

    #[test]
    fn request_omits_unset_fields() {
        let mut request = RpcRequest::new(FunctionCode::LoadSnapshotData);
        request.event_id = Some("42".into());

        assert_eq!(
            request.to_value().unwrap(),
            json!({ "function": "retrieveSnapshot", "eventid": "42" })
        );
    }

    #[test]
    fn request_renames_wire_fields() {
        let mut request = RpcRequest::new(FunctionCode::SaveSnapshot);
        request.event_id = Some("7".into());
        request.user = Some("operator".into());
        request.description = Some("golden orbit".into());
        request.config_name = Some("*".into());
        request.config_id = Some("3".into());

        let value = request.to_value().unwrap();
        assert_eq!(value["desc"], "golden orbit");
        assert_eq!(value["configname"], "*");
        assert_eq!(value["configid"], "3");
        assert!(value.get("description").is_none());
    }

    #[test]
    fn response_failure_message_ignores_empty_alarm() {
        let ok = RpcResponse::from_value(json!({
            "value": { "system": ["SR"] },
            "alarm": { "severity": 0, "status": 0, "message": "" }
        }))
        .unwrap();
        assert!(ok.failure_message().is_none());

        let failed = RpcResponse::from_value(json!({
            "alarm": { "severity": 2, "status": 0, "message": "no such configuration" }
        }))
        .unwrap();
        assert_eq!(failed.failure_message(), Some("no such configuration"));
        assert!(failed.value.is_none());
    }

    #[test]
    fn response_rejects_non_object_payload() {
        let result = RpcResponse::from_value(json!("not an envelope"));
        assert!(matches!(result, Err(Error::Deserialization { .. })));
    }

    #[test]
    fn snapshot_table_distinguishes_missing_connection_column() {
        let table: SnapshotTable = serde_json::from_value(json!({
            "pv_name": ["SR:C01:BPM:X"],
            "dbr_type": [6],
            "double_val": [0.25]
        }))
        .unwrap();
        assert!(table.is_connected.is_none());
        assert_eq!(table.double_val, vec![0.25]);
    }
}
