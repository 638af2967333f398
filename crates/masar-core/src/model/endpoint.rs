// ── Service endpoint ──

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

/// One addressable MASAR service instance.
///
/// Identity is the name alone: two endpoints with the same name are equal
/// regardless of display name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceEndpoint {
    pub name: String,
    pub display_name: String,
}

impl ServiceEndpoint {
    /// Name of the placeholder meaning "whatever is currently selected".
    pub const DEFAULT_NAME: &'static str = "default";

    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            display_name: name.clone(),
            name,
        }
    }

    /// The placeholder endpoint. Selecting it never changes an existing
    /// selection.
    pub fn default_endpoint() -> Self {
        Self::new(Self::DEFAULT_NAME)
    }

    pub fn is_default(&self) -> bool {
        self.name == Self::DEFAULT_NAME
    }
}

impl PartialEq for ServiceEndpoint {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for ServiceEndpoint {}

impl Hash for ServiceEndpoint {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl PartialOrd for ServiceEndpoint {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ServiceEndpoint {
    fn cmp(&self, other: &Self) -> Ordering {
        self.name.cmp(&other.name)
    }
}

impl fmt::Display for ServiceEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_name)
    }
}

impl From<&str> for ServiceEndpoint {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}
