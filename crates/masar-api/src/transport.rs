// Transport seam shared by every RPC backend.
//
// A transport creates named channels. Each channel reports connection state
// and request completion out of band through a `ChannelListener`, possibly
// from a thread the caller does not own. Nothing above the listener ever
// registers callbacks directly.

use std::sync::Arc;

use serde_json::Value;
use url::Url;

use crate::error::Error;
use crate::websocket::ReconnectConfig;

/// Connection state reported by a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelStatus {
    /// First connection attempt in progress.
    Connecting,
    /// Channel is usable.
    Connected,
    /// An established connection dropped; the transport is re-establishing it.
    Reconnecting,
    /// Channel is gone for good (destroyed or retry limit reached).
    Disconnected,
}

/// Severity of an informational transport message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Info,
    Warning,
    Error,
    Fatal,
}

/// Receiver of out-of-band channel notifications.
///
/// Implementations must not block: they are invoked from transport tasks
/// and arbitrary threads.
pub trait ChannelListener: Send + Sync {
    fn on_state(&self, status: ChannelStatus);

    /// Completion of the single outstanding request.
    fn on_response(&self, result: Result<Value, Error>);

    /// Informational transport message. Never an error for the caller.
    fn on_message(&self, kind: MessageKind, message: &str);
}

/// One named channel to one service endpoint.
pub trait RpcChannel: Send + Sync {
    fn endpoint(&self) -> &str;

    /// Hand a request to the transport. Completion arrives through the
    /// listener's `on_response`; implementations must never invoke the
    /// listener synchronously from inside this call.
    fn request(&self, payload: Value) -> Result<(), Error>;

    /// Tear the channel down. Idempotent.
    fn destroy(&self) -> Result<(), Error>;
}

/// Factory for channels.
pub trait RpcTransport: Send + Sync + 'static {
    fn create_channel(
        &self,
        endpoint: &str,
        listener: Arc<dyn ChannelListener>,
    ) -> Result<Box<dyn RpcChannel>, Error>;
}

/// Shared configuration for network transports.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Gateway base URL; endpoint names are resolved relative to it.
    pub gateway: Url,
    pub reconnect: ReconnectConfig,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            gateway: Url::parse("ws://localhost:5080/masar/").expect("static gateway URL is valid"),
            reconnect: ReconnectConfig::default(),
        }
    }
}

impl TransportConfig {
    pub fn new(gateway: Url) -> Self {
        Self {
            gateway,
            reconnect: ReconnectConfig::default(),
        }
    }

    /// Resolve the URL serving `endpoint`: `{gateway}/{endpoint}`.
    pub fn channel_url(&self, endpoint: &str) -> Result<Url, Error> {
        if endpoint.is_empty() {
            return Err(Error::ChannelCreate {
                endpoint: endpoint.into(),
                reason: "endpoint name is empty".into(),
            });
        }
        let mut base = self.gateway.clone();
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(base.join(endpoint)?)
    }
}
