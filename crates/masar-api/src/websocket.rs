//! WebSocket RPC transport with auto-reconnect.
//!
//! Each channel is a background task holding one WebSocket connection to
//! `{gateway}/{endpoint}`. Requests and responses are JSON text frames.
//! When an established connection drops the task reports
//! [`ChannelStatus::Reconnecting`], discards frames queued for the dead
//! socket, and reconnects with exponential backoff + jitter.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use masar_api::{RpcTransport, TransportConfig, WebSocketTransport};
//!
//! let transport = WebSocketTransport::new(TransportConfig::new(gateway));
//! let channel = transport.create_channel("sr_masar", listener)?;
//! channel.request(serde_json::json!({ "function": "retrieveSystemList" }))?;
//! // completion arrives on `listener.on_response`
//! channel.destroy()?;
//! ```

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::Error;
use crate::transport::{
    ChannelListener, ChannelStatus, MessageKind, RpcChannel, RpcTransport, TransportConfig,
};

// ── ReconnectConfig ──────────────────────────────────────────────────

/// Exponential backoff configuration for channel reconnection.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt. Default: 1s.
    pub initial_delay: Duration,

    /// Upper bound on backoff delay. Default: 30s.
    pub max_delay: Duration,

    /// Maximum consecutive failed attempts before giving up.
    /// `None` means retry forever.
    pub max_retries: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_retries: None,
        }
    }
}

// ── WebSocketTransport ───────────────────────────────────────────────

/// [`RpcTransport`] over WebSocket text frames.
///
/// Channels spawn onto the ambient tokio runtime, so `create_channel`
/// must be called from within one.
#[derive(Debug, Clone)]
pub struct WebSocketTransport {
    config: TransportConfig,
}

impl WebSocketTransport {
    pub fn new(config: TransportConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }
}

impl RpcTransport for WebSocketTransport {
    fn create_channel(
        &self,
        endpoint: &str,
        listener: Arc<dyn ChannelListener>,
    ) -> Result<Box<dyn RpcChannel>, Error> {
        let url = self.config.channel_url(endpoint)?;
        let runtime = tokio::runtime::Handle::try_current().map_err(|e| Error::ChannelCreate {
            endpoint: endpoint.into(),
            reason: e.to_string(),
        })?;

        let (outgoing_tx, outgoing_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        tracing::info!(endpoint, url = %url, "creating channel");
        listener.on_state(ChannelStatus::Connecting);

        runtime.spawn(channel_loop(
            url,
            outgoing_rx,
            listener,
            self.config.reconnect.clone(),
            cancel.clone(),
        ));

        Ok(Box::new(WebSocketChannel {
            endpoint: endpoint.to_owned(),
            outgoing: outgoing_tx,
            cancel,
        }))
    }
}

// ── WebSocketChannel ─────────────────────────────────────────────────

struct WebSocketChannel {
    endpoint: String,
    outgoing: mpsc::UnboundedSender<Value>,
    cancel: CancellationToken,
}

impl RpcChannel for WebSocketChannel {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn request(&self, payload: Value) -> Result<(), Error> {
        if self.cancel.is_cancelled() {
            return Err(Error::ChannelClosed {
                endpoint: self.endpoint.clone(),
            });
        }
        self.outgoing.send(payload).map_err(|_| Error::ChannelClosed {
            endpoint: self.endpoint.clone(),
        })
    }

    fn destroy(&self) -> Result<(), Error> {
        if !self.cancel.is_cancelled() {
            tracing::debug!(endpoint = %self.endpoint, "destroying channel");
            self.cancel.cancel();
        }
        Ok(())
    }
}

impl Drop for WebSocketChannel {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

// ── Background reconnection loop ─────────────────────────────────────

/// How a single connection ended without error.
enum SessionEnd {
    /// The server closed the socket; reconnect.
    Closed,
    /// The channel was destroyed; stop.
    Shutdown,
}

/// Main loop: connect → serve → on drop, report, backoff → reconnect.
async fn channel_loop(
    url: Url,
    mut outgoing: mpsc::UnboundedReceiver<Value>,
    listener: Arc<dyn ChannelListener>,
    reconnect: ReconnectConfig,
    cancel: CancellationToken,
) {
    let mut attempt: u32 = 0;

    loop {
        let mut connected = false;
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            result = connect_and_serve(&url, &mut outgoing, listener.as_ref(), &cancel, &mut connected) => result,
        };

        if connected {
            attempt = 0;
            // Anything still queued was meant for the dead socket; its caller
            // has already been told the request was lost.
            while outgoing.try_recv().is_ok() {}
        }

        match result {
            Ok(SessionEnd::Shutdown) => break,
            Ok(SessionEnd::Closed) => {
                tracing::info!(url = %url, "channel closed by server, reconnecting");
                listener.on_state(ChannelStatus::Reconnecting);
            }
            Err(e) => {
                if connected {
                    listener.on_state(ChannelStatus::Reconnecting);
                }
                listener.on_message(MessageKind::Warning, &e.to_string());
                tracing::warn!(error = %e, attempt, "channel error");

                if let Some(max) = reconnect.max_retries {
                    if attempt >= max {
                        tracing::error!(
                            max_retries = max,
                            url = %url,
                            "channel reconnection limit reached, giving up"
                        );
                        break;
                    }
                }

                let delay = calculate_backoff(attempt, &reconnect);
                tracing::info!(
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    attempt,
                    "waiting before reconnect"
                );

                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(delay) => {}
                }

                attempt += 1;
            }
        }
    }

    listener.on_state(ChannelStatus::Disconnected);
    tracing::debug!(url = %url, "channel loop exiting");
}

// ── Single connection lifecycle ──────────────────────────────────────

/// Establish one WebSocket connection and pump frames until it drops.
///
/// Sets `connected` once the handshake succeeds so the caller can tell a
/// failed attempt from a lost connection.
async fn connect_and_serve(
    url: &Url,
    outgoing: &mut mpsc::UnboundedReceiver<Value>,
    listener: &dyn ChannelListener,
    cancel: &CancellationToken,
    connected: &mut bool,
) -> Result<SessionEnd, Error> {
    tracing::debug!(url = %url, "connecting channel");

    let (ws_stream, _response) = tokio_tungstenite::connect_async(url.as_str())
        .await
        .map_err(|e| Error::WebSocketConnect(e.to_string()))?;

    *connected = true;
    tracing::info!(url = %url, "channel connected");
    listener.on_state(ChannelStatus::Connected);

    let (mut write, mut read) = ws_stream.split();

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                let _ = write.send(tungstenite::Message::Close(None)).await;
                return Ok(SessionEnd::Shutdown);
            }
            payload = outgoing.recv() => {
                let Some(payload) = payload else {
                    return Ok(SessionEnd::Shutdown);
                };
                write
                    .send(tungstenite::Message::text(payload.to_string()))
                    .await
                    .map_err(|e| Error::WebSocketConnect(e.to_string()))?;
            }
            frame = read.next() => {
                match frame {
                    Some(Ok(tungstenite::Message::Text(text))) => {
                        listener.on_response(parse_frame(&text));
                    }
                    Some(Ok(tungstenite::Message::Ping(_))) => {
                        // tungstenite handles pong replies automatically
                        tracing::trace!("channel ping");
                    }
                    Some(Ok(tungstenite::Message::Close(frame))) => {
                        if let Some(ref cf) = frame {
                            tracing::info!(
                                code = %cf.code,
                                reason = %cf.reason,
                                "channel close frame received"
                            );
                        }
                        return Ok(SessionEnd::Closed);
                    }
                    Some(Err(e)) => {
                        return Err(Error::WebSocketConnect(e.to_string()));
                    }
                    None => {
                        tracing::info!("channel stream ended");
                        return Ok(SessionEnd::Closed);
                    }
                    _ => {
                        // Binary, Pong, Frame -- ignore
                    }
                }
            }
        }
    }
}

// ── Frame parsing ────────────────────────────────────────────────────

/// Parse one inbound text frame into a completion.
fn parse_frame(text: &str) -> Result<Value, Error> {
    serde_json::from_str(text).map_err(|e| Error::Deserialization {
        message: e.to_string(),
        body: text.to_owned(),
    })
}

// ── Backoff calculation ──────────────────────────────────────────────

/// Exponential backoff with jitter.
///
/// `delay = min(initial * 2^attempt, max) + jitter`
///
/// Jitter is +-25% to spread out reconnection storms from multiple clients.
fn calculate_backoff(attempt: u32, config: &ReconnectConfig) -> Duration {
    let exponent = i32::try_from(attempt.min(30)).unwrap_or(30);
    let base = config.initial_delay.as_secs_f64() * 2.0_f64.powi(exponent);
    let capped = base.min(config.max_delay.as_secs_f64());

    // Deterministic "jitter" seeded from the attempt number.
    let jitter_factor = 1.0 + 0.25 * (f64::from(attempt) * 7.3).sin();
    let with_jitter = (capped * jitter_factor).max(0.0);

    Duration::from_secs_f64(with_jitter)
}

// ── Tests ────────────────────────────────────────────────────────────
