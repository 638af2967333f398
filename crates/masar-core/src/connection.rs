// ── Connection manager ──
//
// Owns the one live transport channel of a client. The live slot is an
// `ArcSwapOption`: readers see the previous fully-connected channel,
// nothing, or the next fully-connected channel, never one still coming up.
// A new channel is only published after it reports `Connected`.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use arc_swap::ArcSwapOption;
use serde_json::Value;
use tracing::{debug, info, warn};

use masar_api::{ChannelListener, RpcChannel, RpcTransport};

use crate::correlator::{ConnectionState, Correlator};
use crate::error::CoreError;

// ── LiveChannel ──────────────────────────────────────────────────

/// One transport channel bound to one endpoint, with its correlator.
pub struct LiveChannel {
    endpoint: String,
    generation: u64,
    channel: Box<dyn RpcChannel>,
    correlator: Arc<Correlator>,
    closed: AtomicBool,
}

impl LiveChannel {
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn state(&self) -> ConnectionState {
        self.correlator.state()
    }

    /// Release any waiter and destroy the transport channel. Runs once;
    /// destroy errors are logged.
    fn shutdown(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.correlator.release();
        if let Err(e) = self.channel.destroy() {
            warn!(endpoint = %self.endpoint, error = %e, "channel destroy failed");
        }
        debug!(endpoint = %self.endpoint, generation = self.generation, "channel disposed");
    }
}

// Covers an `open` future cancelled while waiting for the connection.
impl Drop for LiveChannel {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// ── ConnectionManager ────────────────────────────────────────────

pub struct ConnectionManager {
    transport: Arc<dyn RpcTransport>,
    live: ArcSwapOption<LiveChannel>,
    generation: AtomicU64,
    connection_timeout: Duration,
    request_timeout: Option<Duration>,
}

impl ConnectionManager {
    pub fn new(
        transport: Arc<dyn RpcTransport>,
        connection_timeout: Duration,
        request_timeout: Option<Duration>,
    ) -> Self {
        Self {
            transport,
            live: ArcSwapOption::const_empty(),
            generation: AtomicU64::new(0),
            connection_timeout,
            request_timeout,
        }
    }

    /// Make sure a connected channel to `selected` is live and return it.
    ///
    /// Reuses the live channel when it is bound to `selected`, waiting out
    /// a transport reconnect if one is in progress. Otherwise replaces it.
    pub async fn ensure_connected(
        &self,
        selected: Option<&str>,
    ) -> Result<Arc<LiveChannel>, CoreError> {
        let selected = selected.ok_or(CoreError::NoServiceSelected)?;

        if let Some(live) = self.live.load_full() {
            if live.endpoint == selected {
                match live.state() {
                    ConnectionState::Connected => return Ok(live),
                    ConnectionState::Connecting => {
                        debug!(endpoint = selected, "waiting for channel to reconnect");
                        match live.correlator.wait_settled(self.connection_timeout).await {
                            Some(ConnectionState::Connected) => return Ok(live),
                            Some(_) => {
                                info!(endpoint = selected, "live channel is gone, recreating");
                            }
                            None => {
                                self.dispose();
                                return Err(self.timeout_error(selected));
                            }
                        }
                    }
                    ConnectionState::Disconnected => {
                        info!(endpoint = selected, "live channel is gone, recreating");
                    }
                }
            }
        }

        self.dispose();
        let live = self.open(selected).await?;
        self.live.store(Some(Arc::clone(&live)));
        Ok(live)
    }

    /// Connect a channel to `endpoint` and make it live only if it comes up.
    ///
    /// On failure the current live channel is left untouched.
    pub async fn probe(&self, endpoint: &str) -> Result<(), CoreError> {
        let live = self.open(endpoint).await?;
        if let Some(old) = self.live.swap(Some(live)) {
            old.shutdown();
        }
        Ok(())
    }

    /// Create a channel and wait for it to connect. The result is not
    /// published; callers decide.
    async fn open(&self, endpoint: &str) -> Result<Arc<LiveChannel>, CoreError> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let correlator = Arc::new(Correlator::new(endpoint));
        let listener: Arc<dyn ChannelListener> = correlator.clone();

        info!(endpoint, generation, "opening channel");
        let channel = self
            .transport
            .create_channel(endpoint, listener)
            .map_err(|e| CoreError::EndpointUnreachable {
                endpoint: endpoint.into(),
                reason: e.to_string(),
            })?;

        let live = Arc::new(LiveChannel {
            endpoint: endpoint.to_owned(),
            generation,
            channel,
            correlator,
            closed: AtomicBool::new(false),
        });

        match live.correlator.wait_settled(self.connection_timeout).await {
            Some(ConnectionState::Connected) => {
                info!(endpoint, generation, "channel connected");
                Ok(live)
            }
            Some(_) => {
                live.shutdown();
                Err(CoreError::EndpointUnreachable {
                    endpoint: endpoint.into(),
                    reason: "channel closed before connecting".into(),
                })
            }
            None => {
                live.shutdown();
                Err(self.timeout_error(endpoint))
            }
        }
    }

    fn timeout_error(&self, endpoint: &str) -> CoreError {
        warn!(endpoint, timeout_secs = self.connection_timeout.as_secs(), "connection timed out");
        CoreError::ConnectionTimeout {
            endpoint: endpoint.into(),
            timeout_secs: self.connection_timeout.as_secs(),
        }
    }

    /// Run one request on `live` through its correlator.
    ///
    /// A timed-out request may still be answered on its channel, so the
    /// channel is retired and the next call connects a fresh one.
    pub async fn execute(&self, live: &LiveChannel, payload: Value) -> Result<Value, CoreError> {
        let result = live
            .correlator
            .execute(live.channel.as_ref(), payload, self.request_timeout)
            .await;
        if matches!(result, Err(CoreError::RequestTimeout { .. })) {
            if self.channel_generation() == Some(live.generation) {
                self.dispose();
            } else {
                live.shutdown();
            }
        }
        result
    }

    /// Drop the live channel, if any. Idempotent and lock-free; releases a
    /// waiting caller with `RequestLost`.
    pub fn dispose(&self) {
        if let Some(old) = self.live.swap(None) {
            old.shutdown();
        }
    }

    pub fn live(&self) -> Option<Arc<LiveChannel>> {
        self.live.load_full()
    }

    pub fn state(&self) -> ConnectionState {
        self.live
            .load()
            .as_ref()
            .map_or(ConnectionState::Disconnected, |live| live.state())
    }

    /// Generation of the live channel; `None` when nothing is live.
    pub fn channel_generation(&self) -> Option<u64> {
        self.live.load().as_ref().map(|live| live.generation)
    }

    /// Number of channels ever created, including failed attempts.
    pub fn channels_created(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        self.dispose();
    }
}
