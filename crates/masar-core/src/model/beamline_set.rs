// ── Configuration sets ──

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::base_level::BaseLevel;
use super::endpoint::ServiceEndpoint;

/// A named, ordered list of process variables captured and restored together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeamlineSet {
    pub endpoint: ServiceEndpoint,
    pub base_level: Option<BaseLevel>,
    /// Path segments; the last one is the set's name.
    pub path: Vec<String>,
    pub description: String,
    /// Backend addressing data (`config_idx`, `config_name`).
    pub parameters: BTreeMap<String, String>,
}

impl BeamlineSet {
    /// Parameter holding the backend-assigned configuration index.
    pub const CONFIG_INDEX: &'static str = "config_idx";
    /// Parameter holding the configuration name used by take-snapshot.
    pub const CONFIG_NAME: &'static str = "config_name";

    pub fn new(endpoint: ServiceEndpoint, name: impl Into<String>) -> Self {
        Self {
            endpoint,
            base_level: None,
            path: vec![name.into()],
            description: String::new(),
            parameters: BTreeMap::new(),
        }
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    pub fn name(&self) -> &str {
        self.path.last().map_or("", String::as_str)
    }

    pub fn config_index(&self) -> Option<&str> {
        self.parameters.get(Self::CONFIG_INDEX).map(String::as_str)
    }

    pub fn config_name(&self) -> Option<&str> {
        self.parameters.get(Self::CONFIG_NAME).map(String::as_str)
    }
}

/// Contents of a configuration set: the process variables it captures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeamlineSetData {
    pub set: BeamlineSet,
    pub pv_list: Vec<String>,
    pub readback_list: Vec<String>,
    pub delta_list: Vec<String>,
    pub description: String,
}
