// ── Runtime client configuration ──
//
// Describes which services a client knows about and how long it waits.
// Never touches disk: the CLI builds a `ClientConfig` from its profile
// and hands it in.

use std::time::Duration;

/// Configuration for one [`SaveRestoreClient`](crate::SaveRestoreClient).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Known service endpoints, in preference order. The first one is
    /// selected when nothing else is.
    pub services: Vec<String>,
    /// How long `ensure_connected` waits for a channel to come up.
    pub connection_timeout: Duration,
    /// Upper bound on a single request. `None` waits until the response
    /// arrives or the request is lost.
    pub request_timeout: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            services: Vec::new(),
            connection_timeout: Duration::from_secs(5),
            request_timeout: None,
        }
    }
}

impl ClientConfig {
    pub fn with_services<I, S>(services: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            services: services.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }
}
