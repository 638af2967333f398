// ── Snapshot domain types ──
//
// `Snapshot` is the metadata of one captured instance of a configuration
// set; `ValueSnapshot` carries the captured values themselves. Both are
// values: saving produces a new one instead of mutating.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::Display;

use super::beamline_set::BeamlineSet;
use crate::error::CoreError;

// ── Snapshot metadata ────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub beamline_set: BeamlineSet,
    /// Creation date; `None` until the snapshot has been saved.
    pub date: Option<DateTime<Utc>>,
    pub comment: String,
    pub owner: String,
    /// Backend addressing data (`event_id`, `config_id`).
    pub parameters: BTreeMap<String, String>,
}

impl Snapshot {
    /// Parameter holding the backend-assigned event id.
    pub const EVENT_ID: &'static str = "event_id";
    /// Parameter holding the id of the owning configuration.
    pub const CONFIG_ID: &'static str = "config_id";

    /// An unsaved snapshot known only by its event id.
    pub fn unsaved(beamline_set: BeamlineSet, event_id: impl Into<String>) -> Self {
        Self {
            beamline_set,
            date: None,
            comment: String::new(),
            owner: String::new(),
            parameters: BTreeMap::from([(Self::EVENT_ID.to_owned(), event_id.into())]),
        }
    }

    pub fn event_id(&self) -> Option<&str> {
        self.parameters.get(Self::EVENT_ID).map(String::as_str)
    }

    /// A copy of this snapshot as it reads after being saved.
    pub fn saved(&self, date: DateTime<Utc>, comment: &str, owner: &str) -> Self {
        Self {
            beamline_set: self.beamline_set.clone(),
            date: Some(date),
            comment: comment.to_owned(),
            owner: owner.to_owned(),
            parameters: self.parameters.clone(),
        }
    }
}

// ── Captured values ──────────────────────────────────────────────────

/// EPICS alarm severity of a captured value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
pub enum AlarmSeverity {
    #[strum(serialize = "NONE")]
    None,
    #[strum(serialize = "MINOR")]
    Minor,
    #[strum(serialize = "MAJOR")]
    Major,
    #[strum(serialize = "INVALID")]
    Invalid,
    #[strum(serialize = "UNDEFINED")]
    Undefined,
}

impl From<i32> for AlarmSeverity {
    fn from(code: i32) -> Self {
        match code {
            0 => Self::None,
            1 => Self::Minor,
            2 => Self::Major,
            3 => Self::Invalid,
            _ => Self::Undefined,
        }
    }
}

/// The value of one process variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ProcessValue {
    Double(f64),
    Long(i64),
    /// Enumerated value, stored by index.
    Enum(i64),
    Text(String),
    Array(Vec<serde_json::Value>),
    /// The process variable was not connected when captured.
    Disconnected,
}

impl std::fmt::Display for ProcessValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Double(v) => write!(f, "{v}"),
            Self::Long(v) | Self::Enum(v) => write!(f, "{v}"),
            Self::Text(s) => f.write_str(s),
            Self::Array(items) => {
                let joined: Vec<String> = items.iter().map(ToString::to_string).collect();
                write!(f, "[{}]", joined.join(", "))
            }
            Self::Disconnected => f.write_str("<disconnected>"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapturedValue {
    pub value: ProcessValue,
    pub severity: AlarmSeverity,
    pub status: i32,
    pub timestamp: Option<DateTime<Utc>>,
}

// ── ValueSnapshot ────────────────────────────────────────────────────

/// Parallel per-item columns of a [`ValueSnapshot`].
///
/// `selected` and `values` must match `names` in length; the readback
/// and delta columns must match it too or be empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SnapshotItems {
    pub names: Vec<String>,
    pub selected: Vec<bool>,
    pub values: Vec<CapturedValue>,
    pub readback_names: Vec<String>,
    pub readback_values: Vec<ProcessValue>,
    pub deltas: Vec<String>,
}

impl SnapshotItems {
    fn validate(&self) -> Result<(), CoreError> {
        let n = self.names.len();
        let required = [("selected", self.selected.len()), ("values", self.values.len())];
        let optional = [
            ("readback_names", self.readback_names.len()),
            ("readback_values", self.readback_values.len()),
            ("deltas", self.deltas.len()),
        ];

        for (column, len) in required {
            if len != n {
                return Err(CoreError::malformed(format!(
                    "column '{column}' has {len} entries, expected {n}"
                )));
            }
        }
        for (column, len) in optional {
            if len != 0 && len != n {
                return Err(CoreError::malformed(format!(
                    "column '{column}' has {len} entries, expected 0 or {n}"
                )));
            }
        }
        Ok(())
    }
}

/// A fully materialized snapshot: item names, selection flags, captured
/// values, optional readbacks, and the capture time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValueSnapshot {
    snapshot: Option<Snapshot>,
    beamline_set: BeamlineSet,
    #[serde(flatten)]
    items: SnapshotItems,
    timestamp: DateTime<Utc>,
}

impl ValueSnapshot {
    /// Fails with `MalformedResponse` if the item columns disagree in length.
    pub fn new(
        snapshot: Option<Snapshot>,
        beamline_set: BeamlineSet,
        items: SnapshotItems,
        timestamp: DateTime<Utc>,
    ) -> Result<Self, CoreError> {
        items.validate()?;
        Ok(Self {
            snapshot,
            beamline_set,
            items,
            timestamp,
        })
    }

    pub fn snapshot(&self) -> Option<&Snapshot> {
        self.snapshot.as_ref()
    }

    pub fn beamline_set(&self) -> &BeamlineSet {
        &self.beamline_set
    }

    pub fn names(&self) -> &[String] {
        &self.items.names
    }

    pub fn selected(&self) -> &[bool] {
        &self.items.selected
    }

    pub fn values(&self) -> &[CapturedValue] {
        &self.items.values
    }

    pub fn readback_names(&self) -> &[String] {
        &self.items.readback_names
    }

    pub fn readback_values(&self) -> &[ProcessValue] {
        &self.items.readback_values
    }

    pub fn deltas(&self) -> &[String] {
        &self.items.deltas
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn len(&self) -> usize {
        self.items.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.names.is_empty()
    }

    /// The same values under different snapshot metadata.
    pub fn with_snapshot(&self, snapshot: Snapshot) -> Self {
        Self {
            snapshot: Some(snapshot),
            beamline_set: self.beamline_set.clone(),
            items: self.items.clone(),
            timestamp: self.timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ServiceEndpoint;

    fn value(v: f64) -> CapturedValue {
        CapturedValue {
            value: ProcessValue::Double(v),
            severity: AlarmSeverity::None,
            status: 0,
            timestamp: None,
        }
    }

    #[test]
    fn rejects_mismatched_columns() {
        let set = BeamlineSet::new(ServiceEndpoint::new("sr"), "orbit");
        let items = SnapshotItems {
            names: vec!["a".into(), "b".into()],
            selected: vec![true],
            values: vec![value(1.0), value(2.0)],
            ..SnapshotItems::default()
        };
        let err = ValueSnapshot::new(None, set, items, Utc::now()).unwrap_err();
        assert!(matches!(err, CoreError::MalformedResponse { .. }));
    }

    #[test]
    fn readback_columns_may_be_empty() {
        let set = BeamlineSet::new(ServiceEndpoint::new("sr"), "orbit");
        let items = SnapshotItems {
            names: vec!["a".into()],
            selected: vec![true],
            values: vec![value(1.0)],
            ..SnapshotItems::default()
        };
        let vs = ValueSnapshot::new(None, set, items, Utc::now()).unwrap();
        assert_eq!(vs.len(), 1);
        assert!(vs.readback_names().is_empty());
    }

    #[test]
    fn severity_codes() {
        assert_eq!(AlarmSeverity::from(2), AlarmSeverity::Major);
        assert_eq!(AlarmSeverity::from(17), AlarmSeverity::Undefined);
        assert_eq!(AlarmSeverity::Minor.to_string(), "MINOR");
    }
}
