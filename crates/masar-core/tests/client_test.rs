#![allow(clippy::unwrap_used)]

// Integration tests for `SaveRestoreClient` against an in-memory backend.
//
// The scripted transport answers from separate OS threads, the same way a
// real transport calls listeners back from threads the client does not own.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::{Value, json};

use masar_api::{ChannelListener, ChannelStatus, RpcChannel, RpcTransport};
use masar_core::{
    BaseLevel, BeamlineSet, ClientConfig, ConnectionState, CoreError, SaveRestoreClient,
    ServiceEndpoint, SnapshotQuery,
};

// ── Scripted backend ────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
enum ChannelEvent {
    Created(String),
    Destroyed(String),
}

#[derive(Default)]
struct Backend {
    events: Mutex<Vec<ChannelEvent>>,
    live: AtomicUsize,
    max_live: AtomicUsize,
    refused: Mutex<HashSet<String>>,
    hanging: Mutex<HashSet<String>>,
    silent: Mutex<HashSet<String>>,
    requests: Mutex<Vec<(String, Value)>>,
    listeners: Mutex<Vec<Arc<dyn ChannelListener>>>,
    takes: AtomicUsize,
    saves: AtomicUsize,
}

impl Backend {
    fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn refuse(&self, endpoint: &str) {
        self.refused.lock().unwrap().insert(endpoint.into());
    }

    fn hang(&self, endpoint: &str) {
        self.hanging.lock().unwrap().insert(endpoint.into());
    }

    /// Stop answering `function` requests.
    fn silence(&self, function: &str) {
        self.silent.lock().unwrap().insert(function.into());
    }

    fn unsilence(&self, function: &str) {
        self.silent.lock().unwrap().remove(function);
    }

    fn events(&self) -> Vec<ChannelEvent> {
        self.events.lock().unwrap().clone()
    }

    fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    fn last_request(&self) -> Value {
        self.requests.lock().unwrap().last().unwrap().1.clone()
    }

    async fn wait_for_requests(&self, count: usize) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while self.request_count() < count {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
    }

    /// Make the most recent channel drop and re-establish its connection.
    fn bounce_latest(&self) {
        let listener = self.listeners.lock().unwrap().last().unwrap().clone();
        thread::spawn(move || {
            listener.on_state(ChannelStatus::Reconnecting);
            thread::sleep(Duration::from_millis(20));
            listener.on_state(ChannelStatus::Connected);
        });
    }

    /// Make the most recent channel drop its connection for good.
    fn strand_latest(&self) {
        let listener = self.listeners.lock().unwrap().last().unwrap().clone();
        listener.on_state(ChannelStatus::Reconnecting);
    }

    /// Deliver a response on the `index`-th channel ever created.
    fn reply_on(&self, index: usize, value: Value) {
        let listener = self.listeners.lock().unwrap()[index].clone();
        listener.on_response(Ok(value));
    }

    fn respond(&self, payload: &Value) -> Value {
        let field = |name: &str| payload.get(name).and_then(Value::as_str).unwrap_or_default();
        match field("function") {
            "retrieveSystemList" => json!({ "value": { "system": ["SR", "LINAC", "SR", "BTS"] } }),
            "retrieveServiceConfigs" => json!({ "value": {
                "config_idx": [3, 8],
                "config_name": ["orbit", "rf"],
                "config_desc": ["golden orbit", "rf cavities"]
            }}),
            "retrieveServiceEvents" => match field("configid") {
                "3" => json!({ "value": {
                    "event_id": [10, 11],
                    "config_id": [3, 3],
                    "comments": ["older", "newer"],
                    "event_time": ["2024-01-01 08:00:00", "2024-02-01 08:00:00"],
                    "user_name": ["op", "op"]
                }}),
                "" => json!({ "value": {
                    "event_id": [11, 20],
                    "config_id": [3, 8],
                    "config_name": ["orbit", "rf"],
                    "comments": ["orbit ok", "orbit check"],
                    "event_time": ["2024-02-01 08:00:00", "2024-03-01 08:00:00"],
                    "user_name": ["op", "op"]
                }}),
                _ => json!({ "value": {
                    "event_id": [], "config_id": [], "comments": [], "event_time": [], "user_name": []
                }}),
            },
            "retrieveSnapshot" => {
                let id = field("eventid");
                pv_table(&[format!("SR:EV{id}:A"), format!("SR:EV{id}:B")])
            }
            "saveSnapshot" => {
                let n = self.takes.fetch_add(1, Ordering::SeqCst);
                let mut reply = pv_table(&["SR:TAKE:A".into(), "SR:TAKE:B".into()]);
                reply["timeStamp"] = json!({
                    "secondsPastEpoch": 1_710_000_000,
                    "nanoseconds": 0,
                    "userTag": 100 + n
                });
                reply
            }
            "updateSnapshotEvent" => {
                self.saves.fetch_add(1, Ordering::SeqCst);
                json!({ "value": true })
            }
            other => json!({ "alarm": { "severity": 2, "status": 0, "message": format!("unknown function {other}") } }),
        }
    }
}

fn pv_table(names: &[String]) -> Value {
    let n = names.len();
    json!({ "value": {
        "pv_name": names,
        "string_val": vec![""; n],
        "double_val": vec![1.5; n],
        "long_val": vec![0; n],
        "dbr_type": vec![6; n],
        "isConnected": vec![true; n],
        "secondsPastEpoch": vec![1_700_000_000; n],
        "nanoSeconds": vec![0; n],
        "severity": vec![0; n],
        "status": vec![0; n],
        "array_value": vec![json!([]); n]
    }})
}

struct ScriptedTransport {
    backend: Arc<Backend>,
}

impl RpcTransport for ScriptedTransport {
    fn create_channel(
        &self,
        endpoint: &str,
        listener: Arc<dyn ChannelListener>,
    ) -> Result<Box<dyn RpcChannel>, masar_api::Error> {
        let backend = &self.backend;
        backend
            .events
            .lock()
            .unwrap()
            .push(ChannelEvent::Created(endpoint.into()));
        let live = backend.live.fetch_add(1, Ordering::SeqCst) + 1;
        backend.max_live.fetch_max(live, Ordering::SeqCst);
        backend.listeners.lock().unwrap().push(listener.clone());

        let refused = backend.refused.lock().unwrap().contains(endpoint);
        let hanging = backend.hanging.lock().unwrap().contains(endpoint);
        let notify = listener.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(5));
            if refused {
                notify.on_state(ChannelStatus::Disconnected);
            } else if !hanging {
                notify.on_state(ChannelStatus::Connected);
            }
        });

        Ok(Box::new(ScriptedChannel {
            endpoint: endpoint.into(),
            backend: Arc::clone(backend),
            listener,
            destroyed: AtomicBool::new(false),
        }))
    }
}

struct ScriptedChannel {
    endpoint: String,
    backend: Arc<Backend>,
    listener: Arc<dyn ChannelListener>,
    destroyed: AtomicBool,
}

impl RpcChannel for ScriptedChannel {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn request(&self, payload: Value) -> Result<(), masar_api::Error> {
        if self.destroyed.load(Ordering::SeqCst) {
            return Err(masar_api::Error::ChannelClosed {
                endpoint: self.endpoint.clone(),
            });
        }
        self.backend
            .requests
            .lock()
            .unwrap()
            .push((self.endpoint.clone(), payload.clone()));

        let function = payload["function"].as_str().unwrap_or_default().to_owned();
        if self.backend.silent.lock().unwrap().contains(&function) {
            return Ok(());
        }

        let backend = Arc::clone(&self.backend);
        let listener = Arc::clone(&self.listener);
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(2));
            listener.on_response(Ok(backend.respond(&payload)));
        });
        Ok(())
    }

    fn destroy(&self) -> Result<(), masar_api::Error> {
        if !self.destroyed.swap(true, Ordering::SeqCst) {
            self.backend
                .events
                .lock()
                .unwrap()
                .push(ChannelEvent::Destroyed(self.endpoint.clone()));
            self.backend.live.fetch_sub(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

fn config() -> ClientConfig {
    ClientConfig {
        services: Vec::new(),
        connection_timeout: Duration::from_secs(2),
        request_timeout: None,
    }
}

fn new_client(backend: &Arc<Backend>, config: ClientConfig) -> SaveRestoreClient {
    SaveRestoreClient::new(
        config,
        Arc::new(ScriptedTransport {
            backend: Arc::clone(backend),
        }),
    )
}

async fn connected_client(backend: &Arc<Backend>, services: &[&str]) -> SaveRestoreClient {
    let client = new_client(backend, config());
    assert!(client.initialize(services.iter().copied()).await.unwrap());
    client
}

fn svc(name: &str) -> ServiceEndpoint {
    ServiceEndpoint::new(name)
}

async fn set_named(client: &SaveRestoreClient, name: &str) -> BeamlineSet {
    client
        .beamline_sets(None, &svc("svcA"))
        .await
        .unwrap()
        .into_iter()
        .find(|s| s.name() == name)
        .unwrap()
}

// ── Registry ────────────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread")]
async fn initialize_lists_each_service_once_sorted() {
    let backend = Backend::new();
    let client = connected_client(&backend, &["svcC", "svcA", "svcB", "svcA"]).await;

    let names: Vec<String> = client.services().await.into_iter().map(|e| e.name).collect();
    assert_eq!(names, vec!["svcA", "svcB", "svcC"]);
    assert_eq!(client.selected_service().await, Some(svc("svcC")));
    assert_eq!(client.connection_state(), ConnectionState::Connected);
}

#[tokio::test(flavor = "multi_thread")]
async fn initialize_without_services_returns_false() {
    let backend = Backend::new();
    let client = new_client(&backend, config());
    assert!(!client.initialize(Vec::<String>::new()).await.unwrap());
    assert!(backend.events().is_empty());

    let err = client
        .base_levels(&ServiceEndpoint::default_endpoint())
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::NoServiceSelected));
}

#[tokio::test(flavor = "multi_thread")]
async fn initialize_with_unreachable_service_returns_false() {
    let backend = Backend::new();
    backend.refuse("svcA");
    let client = new_client(&backend, config());

    assert!(!client.initialize(["svcA"]).await.unwrap());
    assert_eq!(client.channel_generation(), None);
    assert_eq!(backend.live.load(Ordering::SeqCst), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn with_services_uses_configured_list() {
    let backend = Backend::new();
    let mut cfg = config();
    cfg.services = vec!["svcB".into(), "svcA".into()];
    let client = SaveRestoreClient::with_services(
        cfg,
        Arc::new(ScriptedTransport {
            backend: Arc::clone(&backend),
        }),
    )
    .await
    .unwrap();

    assert_eq!(client.selected_service().await, Some(svc("svcB")));
    assert_eq!(client.channels_created(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn selecting_current_service_creates_no_channel() {
    let backend = Backend::new();
    let client = connected_client(&backend, &["svcA", "svcB"]).await;
    let generation = client.channel_generation();

    client.select_service(&svc("svcA")).await.unwrap();
    client
        .select_service(&ServiceEndpoint::default_endpoint())
        .await
        .unwrap();

    assert_eq!(client.channel_generation(), generation);
    assert_eq!(client.channels_created(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn switching_services_replaces_channels_without_overlap() {
    let backend = Backend::new();
    let client = connected_client(&backend, &["svcA", "svcB"]).await;
    assert_eq!(client.selected_service().await, Some(svc("svcA")));

    client.select_service(&svc("svcB")).await.unwrap();
    client.select_service(&svc("svcA")).await.unwrap();

    assert_eq!(
        backend.events(),
        vec![
            ChannelEvent::Created("svcA".into()),
            ChannelEvent::Destroyed("svcA".into()),
            ChannelEvent::Created("svcB".into()),
            ChannelEvent::Destroyed("svcB".into()),
            ChannelEvent::Created("svcA".into()),
        ]
    );
    assert_eq!(backend.max_live.load(Ordering::SeqCst), 1);
    assert_eq!(client.channel_generation(), Some(3));
}

#[tokio::test(flavor = "multi_thread")]
async fn selecting_unknown_service_fails() {
    let backend = Backend::new();
    let client = connected_client(&backend, &["svcA"]).await;

    let err = client.select_service(&svc("nope")).await.unwrap_err();
    assert!(matches!(err, CoreError::UnknownEndpoint { .. }));
    assert_eq!(client.selected_service().await, Some(svc("svcA")));
}

#[tokio::test(flavor = "multi_thread")]
async fn adding_known_service_is_rejected_without_change() {
    let backend = Backend::new();
    let client = connected_client(&backend, &["svcA", "svcB"]).await;

    let err = client.add_service("svcB").await.unwrap_err();
    assert!(matches!(err, CoreError::DuplicateEndpoint { .. }));
    assert_eq!(client.service_names().await, vec!["svcA", "svcB"]);
    assert_eq!(client.selected_service().await, Some(svc("svcA")));
    assert_eq!(client.channels_created(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn adding_unreachable_service_leaves_state_untouched() {
    let backend = Backend::new();
    backend.refuse("svcX");
    let client = connected_client(&backend, &["svcA"]).await;
    let generation = client.channel_generation();

    let err = client.add_service("svcX").await.unwrap_err();
    assert!(matches!(err, CoreError::EndpointUnreachable { .. }));
    assert_eq!(client.service_names().await, vec!["svcA"]);
    assert_eq!(client.selected_service().await, Some(svc("svcA")));
    assert_eq!(client.channel_generation(), generation);
    assert_eq!(client.connection_state(), ConnectionState::Connected);
}

#[tokio::test(flavor = "multi_thread")]
async fn adding_service_selects_it_first() {
    let backend = Backend::new();
    let client = connected_client(&backend, &["svcA", "svcB"]).await;

    let added = client.add_service("svcN").await.unwrap();
    assert_eq!(added, svc("svcN"));
    assert_eq!(client.service_names().await, vec!["svcN", "svcA", "svcB"]);
    assert_eq!(client.selected_service().await, Some(svc("svcN")));
    assert_eq!(backend.live.load(Ordering::SeqCst), 1);

    // The probed channel is the live one; no reconnect needed.
    client.base_levels(&svc("svcN")).await.unwrap();
    assert_eq!(client.channels_created(), 2);
}

// ── Connection lifecycle ────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread")]
async fn connection_timeout_leaves_no_live_channel() {
    let backend = Backend::new();
    backend.hang("svcB");
    let mut cfg = config();
    cfg.connection_timeout = Duration::from_millis(150);
    let client = new_client(&backend, cfg);
    assert!(client.initialize(["svcA", "svcB"]).await.unwrap());

    let err = client.select_service(&svc("svcB")).await.unwrap_err();
    assert!(matches!(err, CoreError::ConnectionTimeout { .. }));
    assert_eq!(client.channel_generation(), None);
    assert_eq!(client.connection_state(), ConnectionState::Disconnected);
    assert_eq!(backend.live.load(Ordering::SeqCst), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn reconnect_that_never_settles_leaves_no_live_channel() {
    let backend = Backend::new();
    let mut cfg = config();
    cfg.connection_timeout = Duration::from_millis(150);
    let client = new_client(&backend, cfg);
    assert!(client.initialize(["svcA"]).await.unwrap());

    backend.strand_latest();
    let err = client.base_levels(&svc("svcA")).await.unwrap_err();
    assert!(matches!(err, CoreError::ConnectionTimeout { .. }), "{err:?}");
    assert_eq!(client.channel_generation(), None);
    assert_eq!(backend.live.load(Ordering::SeqCst), 0);
    assert_eq!(
        backend.events(),
        vec![
            ChannelEvent::Created("svcA".into()),
            ChannelEvent::Destroyed("svcA".into()),
        ]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn abandoned_connect_destroys_its_channel() {
    let backend = Backend::new();
    let client = connected_client(&backend, &["svcA", "svcB"]).await;
    backend.hang("svcB");

    let svc_b = svc("svcB");
    let switch = tokio::time::timeout(Duration::from_millis(100), client.select_service(&svc_b));
    assert!(switch.await.is_err(), "connect to a hanging service should not finish");

    assert_eq!(backend.live.load(Ordering::SeqCst), 0);
    assert_eq!(
        backend.events().last(),
        Some(&ChannelEvent::Destroyed("svcB".into()))
    );
    assert_eq!(client.channel_generation(), None);
}

#[tokio::test(flavor = "multi_thread")]
async fn reconnect_during_request_reports_lost_then_recovers() {
    let backend = Backend::new();
    let client = connected_client(&backend, &["svcA"]).await;
    backend.silence("retrieveSystemList");

    let pending = {
        let client = client.clone();
        tokio::spawn(async move { client.base_levels(&svc("svcA")).await })
    };
    backend.wait_for_requests(1).await;
    backend.bounce_latest();

    let result = pending.await.unwrap();
    assert!(matches!(result, Err(CoreError::RequestLost)), "{result:?}");

    backend.unsilence("retrieveSystemList");
    let levels = client.base_levels(&svc("svcA")).await.unwrap();
    assert_eq!(levels[0].storage_name, BaseLevel::ALL);
    assert_eq!(client.channels_created(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn dispose_releases_waiting_caller() {
    let backend = Backend::new();
    let client = connected_client(&backend, &["svcA"]).await;
    backend.silence("retrieveSystemList");

    let pending = {
        let client = client.clone();
        tokio::spawn(async move { client.base_levels(&svc("svcA")).await })
    };
    backend.wait_for_requests(1).await;

    client.dispose();
    client.dispose();
    let result = tokio::time::timeout(Duration::from_secs(2), pending)
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(result, Err(CoreError::RequestLost)));
    assert_eq!(client.connection_state(), ConnectionState::Disconnected);
    assert_eq!(backend.live.load(Ordering::SeqCst), 0);

    // Next call connects a fresh channel.
    backend.unsilence("retrieveSystemList");
    client.base_levels(&svc("svcA")).await.unwrap();
    assert_eq!(client.channels_created(), 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn request_timeout_is_reported() {
    let backend = Backend::new();
    let mut cfg = config();
    cfg.request_timeout = Some(Duration::from_millis(100));
    let client = new_client(&backend, cfg);
    client.initialize(["svcA"]).await.unwrap();
    backend.silence("retrieveSystemList");

    let err = client.base_levels(&svc("svcA")).await.unwrap_err();
    assert!(matches!(err, CoreError::RequestTimeout { .. }));
    assert_eq!(client.channel_generation(), None);

    // The answer to the abandoned request turns up after all.
    backend.reply_on(0, json!({ "value": { "system": ["stale"] } }));

    backend.unsilence("retrieveSystemList");
    let levels = client.base_levels(&svc("svcA")).await.unwrap();
    assert!(levels.iter().all(|l| l.storage_name != "stale"));
    assert_eq!(client.channels_created(), 2);
    assert_eq!(backend.live.load(Ordering::SeqCst), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn dropping_last_clone_disposes_channel() {
    let backend = Backend::new();
    {
        let client = connected_client(&backend, &["svcA"]).await;
        let _other = client.clone();
        assert_eq!(backend.live.load(Ordering::SeqCst), 1);
    }
    assert_eq!(backend.live.load(Ordering::SeqCst), 0);
}

// ── Operations ──────────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread")]
async fn base_levels_start_with_all_without_duplicates() {
    let backend = Backend::new();
    let client = connected_client(&backend, &["svcA"]).await;

    let levels = client.base_levels(&svc("svcA")).await.unwrap();
    let names: Vec<_> = levels.iter().map(|b| b.storage_name.as_str()).collect();
    assert_eq!(names, vec!["all", "BTS", "LINAC", "SR"]);
    assert!(levels.iter().all(|b| b.endpoint == svc("svcA")));
}

#[tokio::test(flavor = "multi_thread")]
async fn default_placeholder_uses_selected_service() {
    let backend = Backend::new();
    let client = connected_client(&backend, &["svcB", "svcA"]).await;

    let levels = client
        .base_levels(&ServiceEndpoint::default_endpoint())
        .await
        .unwrap();
    assert_eq!(levels[0].endpoint, svc("svcB"));
}

#[tokio::test(flavor = "multi_thread")]
async fn beamline_sets_request_the_base_level() {
    let backend = Backend::new();
    let client = connected_client(&backend, &["svcA"]).await;
    let sr = BaseLevel::new(svc("svcA"), "SR");

    let sets = client.beamline_sets(Some(&sr), &svc("svcA")).await.unwrap();
    assert_eq!(backend.last_request()["system"], "SR");
    assert_eq!(sets.len(), 2);
    assert_eq!(sets[0].config_index(), Some("3"));
    assert_eq!(sets[0].base_level.as_ref(), Some(&sr));
}

#[tokio::test(flavor = "multi_thread")]
async fn find_snapshots_sends_wildcard_patterns() {
    let backend = Backend::new();
    let client = connected_client(&backend, &["svcA"]).await;

    let query = SnapshotQuery::new(svc("svcA"), "orbit").by_comment();
    let found = client.find_snapshots(&query).await.unwrap();

    let request = backend.last_request();
    assert_eq!(request["comment"], "*orbit*");
    assert_eq!(request["user"], "*");
    assert!(request.get("start").is_none());

    assert_eq!(found.len(), 2);
    assert_eq!(found[0].beamline_set.name(), "rf");
    assert_eq!(found[1].beamline_set.name(), "orbit");
}

#[tokio::test(flavor = "multi_thread")]
async fn contents_of_set_with_snapshots_come_from_latest() {
    let backend = Backend::new();
    let client = connected_client(&backend, &["svcA"]).await;
    let orbit = set_named(&client, "orbit").await;

    let data = client.load_beamline_set_data(&orbit).await.unwrap();
    assert_eq!(data.pv_list, vec!["SR:EV11:A", "SR:EV11:B"]);
    assert_eq!(data.set, orbit);
    assert_eq!(backend.takes.load(Ordering::SeqCst), 0);
    assert_eq!(backend.saves.load(Ordering::SeqCst), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn contents_of_set_without_snapshots_come_from_discarded_take() {
    let backend = Backend::new();
    let client = connected_client(&backend, &["svcA"]).await;
    let rf = set_named(&client, "rf").await;
    assert!(client.snapshots(&rf).await.unwrap().is_empty());

    let data = client.load_beamline_set_data(&rf).await.unwrap();
    let taken = client.take_snapshot(&rf).await.unwrap();
    assert_eq!(data.pv_list, taken.names());
    assert_eq!(backend.takes.load(Ordering::SeqCst), 2);
    assert_eq!(backend.saves.load(Ordering::SeqCst), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn snapshot_values_load_by_event_id() {
    let backend = Backend::new();
    let client = connected_client(&backend, &["svcA"]).await;
    let orbit = set_named(&client, "orbit").await;

    let snapshots = client.snapshots(&orbit).await.unwrap();
    assert_eq!(snapshots[0].comment, "newer");
    let oldest = snapshots.last().unwrap();

    let values = client.load_snapshot_data(oldest).await.unwrap();
    assert_eq!(values.names(), ["SR:EV10:A", "SR:EV10:B"]);
    assert_eq!(values.timestamp(), oldest.date.unwrap());
    assert_eq!(backend.last_request()["eventid"], "10");
}

#[tokio::test(flavor = "multi_thread")]
async fn save_after_take_round_trips_metadata() {
    let backend = Backend::new();
    let client = connected_client(&backend, &["svcA"]).await;
    let orbit = set_named(&client, "orbit").await;

    let taken = client.take_snapshot(&orbit).await.unwrap();
    assert!(taken.snapshot().unwrap().date.is_none());

    let saved = client
        .save_snapshot(&taken, "golden orbit", "operator")
        .await
        .unwrap();
    let meta = saved.snapshot().unwrap();
    assert_eq!(meta.beamline_set, orbit);
    assert_eq!(meta.comment, "golden orbit");
    assert_eq!(meta.owner, "operator");
    assert!(meta.date.is_some());
    assert_eq!(saved.names(), taken.names());
    assert_eq!(backend.saves.load(Ordering::SeqCst), 1);

    let request = backend.last_request();
    assert_eq!(request["eventid"], "100");
    assert_eq!(request["desc"], "golden orbit");
}
