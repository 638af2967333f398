// ── Snapshot search query ──

use chrono::{DateTime, Utc};

use super::endpoint::ServiceEndpoint;

/// Search criteria for [`SaveRestoreClient::find_snapshots`](crate::SaveRestoreClient::find_snapshots).
///
/// A snapshot matches when the expression occurs in its comment (if
/// `by_comment`) or its creator (if `by_user`), and it was created inside
/// the optional `[start, end]` window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotQuery {
    pub endpoint: ServiceEndpoint,
    pub expression: String,
    pub by_user: bool,
    pub by_comment: bool,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl SnapshotQuery {
    pub fn new(endpoint: ServiceEndpoint, expression: impl Into<String>) -> Self {
        Self {
            endpoint,
            expression: expression.into(),
            by_user: false,
            by_comment: false,
            start: None,
            end: None,
        }
    }

    pub fn by_user(mut self) -> Self {
        self.by_user = true;
        self
    }

    pub fn by_comment(mut self) -> Self {
        self.by_comment = true;
        self
    }

    pub fn start(mut self, start: DateTime<Utc>) -> Self {
        self.start = Some(start);
        self
    }

    pub fn end(mut self, end: DateTime<Utc>) -> Self {
        self.end = Some(end);
        self
    }
}
