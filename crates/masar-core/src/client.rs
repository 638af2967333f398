// ── Save/restore client ──
//
// Public entry point. Every operation runs under one client-wide lock:
// the transport allows a single outstanding request per channel, so
// operations are strictly one after another. `dispose` bypasses the lock
// so it can release a caller stuck waiting on a response.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use masar_api::{RpcRequest, RpcTransport};

use crate::config::ClientConfig;
use crate::connection::{ConnectionManager, LiveChannel};
use crate::correlator::ConnectionState;
use crate::error::CoreError;
use crate::mapper;
use crate::model::{
    BaseLevel, BeamlineSet, BeamlineSetData, ServiceEndpoint, Snapshot, SnapshotQuery,
    ValueSnapshot,
};
use crate::registry::ServiceRegistry;

/// Client for a set of MASAR save/restore services.
///
/// Cheaply cloneable via `Arc<ClientInner>`. Clones share the registry,
/// the live channel, and the serialization lock; use separate clients for
/// concurrent work. The channel is disposed when the last clone drops.
#[derive(Clone)]
pub struct SaveRestoreClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    config: ClientConfig,
    registry: Mutex<ServiceRegistry>,
    connection: ConnectionManager,
}

impl SaveRestoreClient {
    /// Create a client. Does NOT connect: call
    /// [`initialize()`](Self::initialize) before anything else.
    pub fn new(config: ClientConfig, transport: Arc<dyn RpcTransport>) -> Self {
        let connection = ConnectionManager::new(
            transport,
            config.connection_timeout,
            config.request_timeout,
        );
        Self {
            inner: Arc::new(ClientInner {
                config,
                registry: Mutex::new(ServiceRegistry::new()),
                connection,
            }),
        }
    }

    /// Create a client and initialize it with `config.services`.
    pub async fn with_services(
        config: ClientConfig,
        transport: Arc<dyn RpcTransport>,
    ) -> Result<Self, CoreError> {
        let services = config.services.clone();
        let client = Self::new(config, transport);
        client.initialize(services).await?;
        Ok(client)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    // ── Service registry ─────────────────────────────────────────

    /// Replace the known services and connect to the selected one.
    ///
    /// Returns `Ok(false)` if there is nothing to connect to or the
    /// selected service could not be reached.
    pub async fn initialize<I, S>(&self, services: I) -> Result<bool, CoreError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut registry = self.inner.registry.lock().await;
        let has_selection = registry.initialize(services);
        self.inner.connection.dispose();
        if !has_selection {
            info!("initialized with no services");
            return Ok(false);
        }

        match self.inner.connection.ensure_connected(registry.selected()).await {
            Ok(live) => {
                info!(endpoint = live.endpoint(), "client initialized");
                Ok(true)
            }
            Err(e) if e.is_unreachable() => {
                warn!(error = %e, "selected service is not reachable");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Switch to `endpoint`, reconnecting if the selection changes.
    pub async fn select_service(&self, endpoint: &ServiceEndpoint) -> Result<(), CoreError> {
        let mut registry = self.inner.registry.lock().await;
        self.connect_locked(&mut registry, endpoint).await?;
        Ok(())
    }

    /// Connect to a new service. Only if that succeeds is it added in
    /// front of the known services and selected.
    pub async fn add_service(&self, name: &str) -> Result<ServiceEndpoint, CoreError> {
        let mut registry = self.inner.registry.lock().await;
        registry.check_new(name)?;

        self.inner
            .connection
            .probe(name)
            .await
            .map_err(|e| match e {
                CoreError::EndpointUnreachable { .. } => e,
                other => CoreError::EndpointUnreachable {
                    endpoint: name.into(),
                    reason: other.to_string(),
                },
            })?;

        info!(endpoint = name, "service added");
        Ok(registry.insert_selected(name))
    }

    /// Known services sorted by name.
    pub async fn services(&self) -> Vec<ServiceEndpoint> {
        self.inner.registry.lock().await.list()
    }

    /// Known service names in preference order, most recently added first.
    pub async fn service_names(&self) -> Vec<String> {
        self.inner.registry.lock().await.names().to_vec()
    }

    pub async fn selected_service(&self) -> Option<ServiceEndpoint> {
        self.inner
            .registry
            .lock()
            .await
            .selected()
            .map(ServiceEndpoint::new)
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.inner.connection.state()
    }

    // ── Operations ───────────────────────────────────────────────

    /// Base levels of `endpoint`, with the synthetic `"all"` entry first.
    pub async fn base_levels(&self, endpoint: &ServiceEndpoint) -> Result<Vec<BaseLevel>, CoreError> {
        let mut registry = self.inner.registry.lock().await;
        let (endpoint, raw) = self
            .call(&mut registry, endpoint, mapper::base_levels_request())
            .await?;
        mapper::parse_base_levels(&endpoint, raw)
    }

    /// Configuration sets of `endpoint`, optionally restricted to a base level.
    pub async fn beamline_sets(
        &self,
        base_level: Option<&BaseLevel>,
        endpoint: &ServiceEndpoint,
    ) -> Result<Vec<BeamlineSet>, CoreError> {
        let mut registry = self.inner.registry.lock().await;
        let (endpoint, raw) = self
            .call(&mut registry, endpoint, mapper::beamline_sets_request(base_level))
            .await?;
        mapper::parse_beamline_sets(&endpoint, base_level, raw)
    }

    /// Snapshots across all configuration sets matching `query`.
    pub async fn find_snapshots(&self, query: &SnapshotQuery) -> Result<Vec<Snapshot>, CoreError> {
        let mut registry = self.inner.registry.lock().await;
        let (endpoint, raw) = self
            .call(&mut registry, &query.endpoint, mapper::find_snapshots_request(query))
            .await?;
        mapper::parse_found_snapshots(&endpoint, raw)
    }

    /// Snapshot revisions of `set`, newest first.
    pub async fn snapshots(&self, set: &BeamlineSet) -> Result<Vec<Snapshot>, CoreError> {
        let mut registry = self.inner.registry.lock().await;
        self.snapshots_locked(&mut registry, set).await
    }

    pub async fn load_snapshot_data(&self, snapshot: &Snapshot) -> Result<ValueSnapshot, CoreError> {
        let mut registry = self.inner.registry.lock().await;
        self.load_snapshot_data_locked(&mut registry, snapshot).await
    }

    /// Persist a taken snapshot under `comment` and `user`.
    ///
    /// Returns a new value snapshot; the argument is left as it was.
    pub async fn save_snapshot(
        &self,
        snapshot: &ValueSnapshot,
        comment: &str,
        user: &str,
    ) -> Result<ValueSnapshot, CoreError> {
        let request = mapper::save_snapshot_request(snapshot, comment, user)?;
        let mut registry = self.inner.registry.lock().await;
        let (_, raw) = self
            .call(&mut registry, &snapshot.beamline_set().endpoint, request)
            .await?;
        let saved = mapper::parse_save_snapshot(snapshot, comment, user, raw)?;
        info!(set = snapshot.beamline_set().name(), user, "snapshot saved");
        Ok(saved)
    }

    /// Capture the current values of `set`. The snapshot stays unsaved
    /// until passed to [`save_snapshot()`](Self::save_snapshot).
    pub async fn take_snapshot(&self, set: &BeamlineSet) -> Result<ValueSnapshot, CoreError> {
        let mut registry = self.inner.registry.lock().await;
        self.take_snapshot_locked(&mut registry, set).await
    }

    /// Process variables of `set`.
    ///
    /// Read from the most recent snapshot; if the set has none, a snapshot
    /// is taken and discarded without being saved.
    pub async fn load_beamline_set_data(&self, set: &BeamlineSet) -> Result<BeamlineSetData, CoreError> {
        let mut registry = self.inner.registry.lock().await;
        let snapshots = self.snapshots_locked(&mut registry, set).await?;

        let values = match snapshots.first() {
            Some(latest) => self.load_snapshot_data_locked(&mut registry, latest).await?,
            None => {
                debug!(set = set.name(), "no snapshots yet, reading contents from a fresh take");
                self.take_snapshot_locked(&mut registry, set).await?
            }
        };

        Ok(BeamlineSetData {
            set: set.clone(),
            pv_list: values.names().to_vec(),
            readback_list: Vec::new(),
            delta_list: Vec::new(),
            description: set.description.clone(),
        })
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Close the live channel. Safe from any state; a caller waiting on a
    /// response gets `RequestLost`.
    pub fn dispose(&self) {
        self.inner.connection.dispose();
    }

    /// Generation of the live channel, `None` when nothing is connected.
    pub fn channel_generation(&self) -> Option<u64> {
        self.inner.connection.channel_generation()
    }

    /// Number of channels created over the client's lifetime.
    pub fn channels_created(&self) -> u64 {
        self.inner.connection.channels_created()
    }

    // ── Internals (registry lock held) ───────────────────────────

    /// Apply a selection and make sure its channel is live.
    async fn connect_locked(
        &self,
        registry: &mut ServiceRegistry,
        endpoint: &ServiceEndpoint,
    ) -> Result<Arc<LiveChannel>, CoreError> {
        if registry.select(endpoint)? {
            info!(endpoint = %endpoint.name, "service selected");
        }
        self.inner.connection.ensure_connected(registry.selected()).await
    }

    /// Run one request against `endpoint`. Also returns the endpoint that
    /// actually served it, which differs from the argument when the default
    /// placeholder was given.
    async fn call(
        &self,
        registry: &mut ServiceRegistry,
        endpoint: &ServiceEndpoint,
        request: RpcRequest,
    ) -> Result<(ServiceEndpoint, Value), CoreError> {
        let live = self.connect_locked(registry, endpoint).await?;
        debug!(endpoint = live.endpoint(), function = %request.function, "executing request");
        let raw = self.inner.connection.execute(&live, request.to_value()?).await?;
        Ok((ServiceEndpoint::new(live.endpoint()), raw))
    }

    async fn snapshots_locked(
        &self,
        registry: &mut ServiceRegistry,
        set: &BeamlineSet,
    ) -> Result<Vec<Snapshot>, CoreError> {
        let (_, raw) = self
            .call(registry, &set.endpoint, mapper::snapshots_request(set))
            .await?;
        mapper::parse_snapshots(set, raw)
    }

    async fn load_snapshot_data_locked(
        &self,
        registry: &mut ServiceRegistry,
        snapshot: &Snapshot,
    ) -> Result<ValueSnapshot, CoreError> {
        let request = mapper::snapshot_data_request(snapshot)?;
        let (_, raw) = self
            .call(registry, &snapshot.beamline_set.endpoint, request)
            .await?;
        mapper::parse_snapshot_data(snapshot, raw)
    }

    async fn take_snapshot_locked(
        &self,
        registry: &mut ServiceRegistry,
        set: &BeamlineSet,
    ) -> Result<ValueSnapshot, CoreError> {
        let request = mapper::take_snapshot_request(set)?;
        let (_, raw) = self.call(registry, &set.endpoint, request).await?;
        mapper::parse_take_snapshot(set, raw)
    }
}
