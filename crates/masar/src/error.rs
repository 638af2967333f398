//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` variants into user-facing errors
//! with actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use masar_config::ConfigError;
use masar_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const NOT_FOUND: i32 = 4;
    pub const CONFLICT: i32 = 6;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not reach service '{service}'")]
    #[diagnostic(code(masar::unreachable))]
    Unreachable {
        service: String,
        reason: String,
        #[help]
        hint: String,
    },

    #[error("No service selected")]
    #[diagnostic(
        code(masar::no_service),
        help(
            "List services in the profile's `services` array, or pass --service.\n\
             Run: masar services list"
        )
    )]
    NoService,

    #[error("The request was lost when the connection dropped")]
    #[diagnostic(code(masar::request_lost))]
    RequestLost {
        #[help]
        hint: String,
    },

    // ── Timeout ──────────────────────────────────────────────────────
    #[error("{what} timed out after {seconds}s")]
    #[diagnostic(code(masar::timeout))]
    Timeout {
        what: String,
        seconds: u64,
        #[help]
        hint: String,
    },

    // ── Resources ────────────────────────────────────────────────────
    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(
        code(masar::not_found),
        help("Run: masar {list_command} to see available {resource_type}s")
    )]
    NotFound {
        resource_type: String,
        identifier: String,
        list_command: String,
    },

    #[error("{resource_type} '{identifier}' already exists")]
    #[diagnostic(code(masar::conflict))]
    Conflict {
        resource_type: String,
        identifier: String,
    },

    // ── Service ──────────────────────────────────────────────────────
    #[error("Service error: {message}")]
    #[diagnostic(code(masar::service_error))]
    Service { message: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(masar::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(masar::profile_not_found),
        help("Available profiles: {available}")
    )]
    ProfileNotFound { name: String, available: String },

    #[error("No gateway configured")]
    #[diagnostic(
        code(masar::no_config),
        help(
            "Add a profile with a `gateway` to {path}\n\
             or pass --gateway ws://host:port/path/"
        )
    )]
    NoConfig { path: String },

    #[error("No user to record on the saved snapshot")]
    #[diagnostic(
        code(masar::no_user),
        help("Pass --user, set `user` in profile '{profile}', or set MASAR_USER.")
    )]
    NoUser { profile: String },

    #[error(transparent)]
    #[diagnostic(code(masar::config))]
    Config(ConfigError),

    // ── IO ───────────────────────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Unreachable { .. } | Self::RequestLost { .. } => exit_code::CONNECTION,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::NotFound { .. } | Self::ProfileNotFound { .. } => exit_code::NOT_FOUND,
            Self::Conflict { .. } => exit_code::CONFLICT,
            Self::Validation { .. } | Self::NoService | Self::NoConfig { .. } | Self::NoUser { .. } => {
                exit_code::USAGE
            }
            _ => exit_code::GENERAL,
        }
    }

    pub fn not_found(resource_type: &str, identifier: &str, list_command: &str) -> Self {
        Self::NotFound {
            resource_type: resource_type.into(),
            identifier: identifier.into(),
            list_command: list_command.into(),
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

const RUN_AGAIN: &str = "The failure is transient; running the command again may succeed.";

/// Append the run-again note to `help` when the failure is worth retrying.
fn retry_hint(retryable: bool, help: &str) -> String {
    if retryable {
        format!("{help}\n{RUN_AGAIN}")
    } else {
        help.to_owned()
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        const TIMEOUT_HELP: &str =
            "Increase the timeout with --timeout or check gateway responsiveness.";
        let retryable = err.is_retryable();

        match err {
            CoreError::EndpointUnreachable { endpoint, reason } => CliError::Unreachable {
                hint: retry_hint(
                    retryable,
                    &format!(
                        "Check that the gateway is running and the service name is right.\n\
                         Reason: {reason}"
                    ),
                ),
                service: endpoint,
                reason,
            },

            CoreError::ConnectionTimeout {
                endpoint,
                timeout_secs,
            } => CliError::Timeout {
                what: format!("Connecting to '{endpoint}'"),
                seconds: timeout_secs,
                hint: retry_hint(retryable, TIMEOUT_HELP),
            },

            CoreError::RequestTimeout { timeout_secs } => CliError::Timeout {
                what: "Request".into(),
                seconds: timeout_secs,
                hint: retry_hint(retryable, TIMEOUT_HELP),
            },

            CoreError::NoServiceSelected => CliError::NoService,

            CoreError::RequestLost => CliError::RequestLost {
                hint: retry_hint(
                    retryable,
                    "The service may or may not have acted on it. Check before retrying a take.",
                ),
            },

            CoreError::UnknownEndpoint { name } => {
                CliError::not_found("service", &name, "services list")
            }

            CoreError::DuplicateEndpoint { name } => CliError::Conflict {
                resource_type: "service".into(),
                identifier: name,
            },

            CoreError::InvalidArgument { message } => CliError::Validation {
                field: "input".into(),
                reason: message,
            },

            CoreError::BackendRejected { message } | CoreError::MalformedResponse { message } => {
                CliError::Service { message }
            }

            CoreError::Internal(message) => CliError::Service {
                message: format!("internal: {message}"),
            },
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::NoUser { profile } => CliError::NoUser { profile },
            ConfigError::UnknownProfile { name } => CliError::ProfileNotFound {
                name,
                available: "run `masar config profiles`".into(),
            },
            ConfigError::Io(e) => CliError::Io(e),
            other => CliError::Config(other),
        }
    }
}
