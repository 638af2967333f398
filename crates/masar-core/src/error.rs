// ── Core error types ──
//
// Caller-facing errors from masar-core. Consumers never see channel or
// frame-level failures directly: the `From<masar_api::Error>` impl
// translates transport errors into the variants below.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Service '{endpoint}' is unreachable: {reason}")]
    EndpointUnreachable { endpoint: String, reason: String },

    #[error("Connection to service '{endpoint}' timed out after {timeout_secs}s")]
    ConnectionTimeout { endpoint: String, timeout_secs: u64 },

    #[error("No service selected")]
    NoServiceSelected,

    // ── Registry errors ──────────────────────────────────────────────
    #[error("Service '{name}' already exists")]
    DuplicateEndpoint { name: String },

    #[error("Unknown service: {name}")]
    UnknownEndpoint { name: String },

    // ── Request errors ───────────────────────────────────────────────
    #[error("Request lost because the connection was re-established; retry the operation")]
    RequestLost,

    #[error("Request timed out after {timeout_secs}s")]
    RequestTimeout { timeout_secs: u64 },

    #[error("Service rejected the request: {message}")]
    BackendRejected { message: String },

    #[error("Malformed response: {message}")]
    MalformedResponse { message: String },

    // ── Caller errors ────────────────────────────────────────────────
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// The service could not be reached at all (as opposed to failing a call).
    pub fn is_unreachable(&self) -> bool {
        matches!(
            self,
            Self::EndpointUnreachable { .. } | Self::ConnectionTimeout { .. }
        )
    }

    /// The caller may reasonably retry the same operation.
    ///
    /// Retrying a take-snapshot after `RequestLost` can create a second
    /// event on the service if the first request already completed there.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RequestLost
                | Self::RequestTimeout { .. }
                | Self::ConnectionTimeout { .. }
                | Self::EndpointUnreachable { .. }
        )
    }

    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedResponse {
            message: message.into(),
        }
    }

    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<masar_api::Error> for CoreError {
    fn from(err: masar_api::Error) -> Self {
        match err {
            masar_api::Error::ChannelClosed { .. } => CoreError::RequestLost,
            masar_api::Error::ChannelCreate { endpoint, reason }
            | masar_api::Error::Send { endpoint, reason } => {
                CoreError::EndpointUnreachable { endpoint, reason }
            }
            masar_api::Error::WebSocketConnect(reason) => CoreError::EndpointUnreachable {
                endpoint: String::new(),
                reason,
            },
            masar_api::Error::InvalidUrl(e) => CoreError::InvalidArgument {
                message: format!("Invalid URL: {e}"),
            },
            masar_api::Error::Status { message } => CoreError::BackendRejected { message },
            masar_api::Error::Deserialization { message, body: _ } => {
                CoreError::MalformedResponse { message }
            }
            masar_api::Error::Serialization(message) => {
                CoreError::Internal(format!("Serialization error: {message}"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_errors_map_to_caller_variants() {
        let closed: CoreError = masar_api::Error::ChannelClosed {
            endpoint: "sr".into(),
        }
        .into();
        assert!(matches!(closed, CoreError::RequestLost));

        let create: CoreError = masar_api::Error::ChannelCreate {
            endpoint: "sr".into(),
            reason: "no runtime".into(),
        }
        .into();
        assert!(create.is_unreachable());

        let status: CoreError = masar_api::Error::Status {
            message: "denied".into(),
        }
        .into();
        assert_eq!(status.to_string(), "Service rejected the request: denied");
    }

    #[test]
    fn only_transient_failures_are_retryable() {
        assert!(CoreError::RequestLost.is_retryable());
        assert!(!CoreError::NoServiceSelected.is_retryable());
        assert!(!CoreError::malformed("missing value").is_retryable());
        assert!(
            !CoreError::BackendRejected {
                message: "x".into()
            }
            .is_retryable()
        );
    }
}
