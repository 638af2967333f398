// ── Request correlator ──
//
// Bridges the transport's out-of-band callbacks to an awaited call. The
// correlator is the channel's listener: callbacks only deposit into the
// single pending slot or publish connection state, then return.
//
// A request pending when the channel re-enters `Connecting` (or goes away)
// is released with `Completion::Lost`, so a response from a previous
// connection incarnation can never reach a caller waiting for a fresh one.
// A request abandoned on timeout stays outstanding on the wire; its reply
// is counted as orphaned and swallowed when it finally arrives.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{oneshot, watch};
use tracing::{debug, error, info, warn};

use masar_api::{ChannelListener, ChannelStatus, MessageKind, RpcChannel};

use crate::error::CoreError;

// ── ConnectionState ──────────────────────────────────────────────

/// Connection state of the live channel, observable by consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// What the waiter receives.
#[derive(Debug)]
enum Completion {
    Done(Result<Value, masar_api::Error>),
    /// The connection was re-established (or torn down) while waiting.
    Lost,
}

#[derive(Debug)]
struct Slot {
    status: ConnectionState,
    ever_connected: bool,
    pending: Option<oneshot::Sender<Completion>>,
    /// Replies still owed for requests whose callers gave up waiting.
    orphaned: usize,
}

impl Slot {
    fn release_lost(&mut self) -> bool {
        match self.pending.take() {
            Some(tx) => {
                let _ = tx.send(Completion::Lost);
                true
            }
            None => false,
        }
    }

    /// The connection is being replaced; nothing owed on it will arrive.
    fn forget_connection(&mut self) -> bool {
        let released = self.release_lost();
        self.orphaned = 0;
        released
    }
}

// ── Correlator ───────────────────────────────────────────────────

pub struct Correlator {
    endpoint: String,
    slot: Mutex<Slot>,
    state: watch::Sender<ConnectionState>,
}

impl Correlator {
    /// A correlator for a channel about to be created (state `Connecting`).
    pub fn new(endpoint: impl Into<String>) -> Self {
        let (state, _) = watch::channel(ConnectionState::Connecting);
        Self {
            endpoint: endpoint.into(),
            slot: Mutex::new(Slot {
                status: ConnectionState::Connecting,
                ever_connected: false,
                pending: None,
                orphaned: 0,
            }),
            state,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Callbacks must keep working after a panic elsewhere held the lock.
    fn lock(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, slot: &mut Slot, status: ConnectionState) {
        slot.status = status;
        self.state.send_replace(status);
    }

    /// Wait until the channel is either connected or gone for good.
    ///
    /// Returns `None` if neither happened within `timeout`.
    pub async fn wait_settled(&self, timeout: Duration) -> Option<ConnectionState> {
        let mut rx = self.subscribe();
        let settled = rx.wait_for(|s| matches!(s, ConnectionState::Connected | ConnectionState::Disconnected));
        match tokio::time::timeout(timeout, settled).await {
            Ok(Ok(state)) => Some(*state),
            // The sender lives in `self`; it cannot be dropped while we borrow it.
            Ok(Err(_)) => Some(ConnectionState::Disconnected),
            Err(_) => None,
        }
    }

    /// Issue one request on `channel` and wait for its completion.
    ///
    /// The payload is handed to the channel while the slot lock is held,
    /// so a state change cannot slip in between the connectivity check
    /// and the registration of the waiter.
    pub async fn execute(
        &self,
        channel: &dyn RpcChannel,
        payload: Value,
        timeout: Option<Duration>,
    ) -> Result<Value, CoreError> {
        let rx = {
            let mut slot = self.lock();
            if slot.pending.is_some() {
                return Err(CoreError::Internal("request already in flight".into()));
            }
            if slot.status != ConnectionState::Connected {
                return Err(CoreError::RequestLost);
            }
            let (tx, rx) = oneshot::channel();
            slot.pending = Some(tx);
            if let Err(e) = channel.request(payload) {
                slot.pending = None;
                return Err(e.into());
            }
            rx
        };
        debug!(endpoint = %self.endpoint, "request dispatched");

        let completion = match timeout {
            Some(limit) => match tokio::time::timeout(limit, rx).await {
                Ok(received) => received,
                Err(_) => {
                    let mut slot = self.lock();
                    if slot.pending.take().is_some() {
                        slot.orphaned += 1;
                    }
                    drop(slot);
                    warn!(endpoint = %self.endpoint, timeout_secs = limit.as_secs(), "request timed out");
                    return Err(CoreError::RequestTimeout {
                        timeout_secs: limit.as_secs(),
                    });
                }
            },
            None => rx.await,
        };

        match completion {
            Ok(Completion::Done(Ok(value))) => Ok(value),
            Ok(Completion::Done(Err(e))) => Err(e.into()),
            Ok(Completion::Lost) | Err(_) => {
                info!(endpoint = %self.endpoint, "pending request lost to reconnect");
                Err(CoreError::RequestLost)
            }
        }
    }

    /// Release any waiter and mark the channel gone. Used on disposal.
    pub fn release(&self) {
        let mut slot = self.lock();
        if slot.forget_connection() {
            debug!(endpoint = %self.endpoint, "released pending request on dispose");
        }
        self.publish(&mut slot, ConnectionState::Disconnected);
    }
}

impl ChannelListener for Correlator {
    fn on_state(&self, status: ChannelStatus) {
        info!(endpoint = %self.endpoint, ?status, "channel state changed");
        let mut slot = self.lock();
        match status {
            ChannelStatus::Connecting => {
                self.publish(&mut slot, ConnectionState::Connecting);
            }
            ChannelStatus::Connected => {
                // A second `Connected` means the transport reconnected under us.
                if slot.ever_connected && slot.forget_connection() {
                    info!(endpoint = %self.endpoint, "reconnected with a request in flight");
                }
                slot.ever_connected = true;
                self.publish(&mut slot, ConnectionState::Connected);
            }
            ChannelStatus::Reconnecting => {
                slot.forget_connection();
                self.publish(&mut slot, ConnectionState::Connecting);
            }
            ChannelStatus::Disconnected => {
                slot.forget_connection();
                self.publish(&mut slot, ConnectionState::Disconnected);
            }
        }
    }

    fn on_response(&self, result: Result<Value, masar_api::Error>) {
        let pending = {
            let mut slot = self.lock();
            if slot.orphaned > 0 {
                slot.orphaned -= 1;
                drop(slot);
                warn!(endpoint = %self.endpoint, "discarding late response to a timed-out request");
                return;
            }
            slot.pending.take()
        };
        match pending {
            Some(tx) => {
                let _ = tx.send(Completion::Done(result));
            }
            None => {
                warn!(endpoint = %self.endpoint, "discarding response with no pending request");
            }
        }
    }

    fn on_message(&self, kind: MessageKind, message: &str) {
        match kind {
            MessageKind::Info => info!(endpoint = %self.endpoint, "{message}"),
            MessageKind::Warning => warn!(endpoint = %self.endpoint, "{message}"),
            MessageKind::Error | MessageKind::Fatal => {
                error!(endpoint = %self.endpoint, ?kind, "{message}");
            }
        }
    }
}
