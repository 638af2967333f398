use thiserror::Error;

/// Top-level error type for the `masar-api` crate.
///
/// Covers every failure mode below the request correlator: channel
/// lifecycle, the WebSocket transport, and payload (de)serialization.
/// `masar-core` maps these into caller-facing variants.
#[derive(Debug, Error)]
pub enum Error {
    // ── Channel ─────────────────────────────────────────────────────
    /// The transport refused to create a channel for the endpoint.
    #[error("Failed to create channel '{endpoint}': {reason}")]
    ChannelCreate { endpoint: String, reason: String },

    /// The channel has been destroyed and accepts no more requests.
    #[error("Channel '{endpoint}' is closed")]
    ChannelClosed { endpoint: String },

    /// A request could not be handed to the transport.
    #[error("Failed to send request on '{endpoint}': {reason}")]
    Send { endpoint: String, reason: String },

    // ── Transport ───────────────────────────────────────────────────
    /// Gateway or channel URL could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// WebSocket handshake or stream failure.
    #[error("WebSocket connection failed: {0}")]
    WebSocketConnect(String),

    // ── RPC ─────────────────────────────────────────────────────────
    /// The transport completed the request with a non-OK status.
    #[error("RPC request failed: {message}")]
    Status { message: String },

    // ── Data ────────────────────────────────────────────────────────
    /// Inbound payload was not valid JSON, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },

    /// Outbound payload could not be encoded.
    #[error("Serialization error: {0}")]
    Serialization(String),
}
