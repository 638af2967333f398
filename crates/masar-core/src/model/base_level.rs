// ── Base level ──

use serde::{Deserialize, Serialize};

use super::endpoint::ServiceEndpoint;

/// A grouping context for configuration sets (a MASAR "system").
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BaseLevel {
    pub endpoint: ServiceEndpoint,
    pub storage_name: String,
    pub display_name: String,
}

impl BaseLevel {
    /// Storage name of the synthetic base level spanning every system.
    pub const ALL: &'static str = "all";

    pub fn new(endpoint: ServiceEndpoint, name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            endpoint,
            display_name: name.clone(),
            storage_name: name,
        }
    }

    pub fn all(endpoint: ServiceEndpoint) -> Self {
        Self::new(endpoint, Self::ALL)
    }

    pub fn is_all(&self) -> bool {
        self.storage_name == Self::ALL
    }
}
