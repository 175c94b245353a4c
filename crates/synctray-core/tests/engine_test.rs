#![allow(clippy::unwrap_used)]
// Integration tests for the connection engine against a scripted transport.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use pretty_assertions::assert_eq;
use secrecy::SecretString;
use serde_json::{Value, json};
use tokio::sync::broadcast;
use url::Url;

use synctray_api::{ApiRequest, Error as ApiError, PinnedCertificate, Transport};
use synctray_core::{
    Connection, ConnectionEvent, ConnectionSettings, ConnectionState, CoreError, DeviceStatus,
    DirectoryStatus, ErrorCategory,
};

const OWN: &str = "OWN-DEVICE";
const PEER: &str = "PEER-DEVICE";

// ── Scripted transport ──────────────────────────────────────────────

/// Answers per URL path. One-shot responses are used first, then the
/// sticky response; a path with neither never answers.
#[derive(Default)]
struct FakeTransport {
    once: Mutex<HashMap<String, VecDeque<Result<Bytes, ApiError>>>>,
    sticky: Mutex<HashMap<String, Bytes>>,
    seen: Mutex<Vec<String>>,
}

impl FakeTransport {
    fn always(&self, path: &str, body: &Value) {
        self.sticky
            .lock()
            .unwrap()
            .insert(path.to_owned(), Bytes::from(body.to_string()));
    }

    fn once(&self, path: &str, result: Result<Value, ApiError>) {
        self.once
            .lock()
            .unwrap()
            .entry(path.to_owned())
            .or_default()
            .push_back(result.map(|body| Bytes::from(body.to_string())));
    }

    fn seen(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }

    fn answer(&self, path: &str) -> Option<Result<Bytes, ApiError>> {
        if let Some(result) = self
            .once
            .lock()
            .unwrap()
            .get_mut(path)
            .and_then(VecDeque::pop_front)
        {
            return Some(result);
        }
        self.sticky.lock().unwrap().get(path).cloned().map(Ok)
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn execute(&self, request: ApiRequest) -> Result<Bytes, ApiError> {
        let path = request.url.path().to_owned();
        let entry = match request.url.query() {
            Some(query) => format!("{} {path}?{query}", request.method()),
            None => format!("{} {path}", request.method()),
        };
        self.seen.lock().unwrap().push(entry);
        match self.answer(&path) {
            Some(result) => result,
            None => std::future::pending().await,
        }
    }

    fn pin_certificate(&self, _pinned: Option<PinnedCertificate>) -> Result<(), ApiError> {
        Ok(())
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

fn settings() -> ConnectionSettings {
    let mut settings = ConnectionSettings::new(
        Url::parse("http://127.0.0.1:8384").unwrap(),
        SecretString::from("test-key"),
    );
    // Polls answer once during bootstrap; no timers needed.
    settings.traffic_poll_interval = Duration::ZERO;
    settings.dir_stats_poll_interval = Duration::ZERO;
    settings.dev_stats_poll_interval = Duration::ZERO;
    settings.errors_poll_interval = Duration::ZERO;
    settings
}

/// Settings with the default steady-state poll cadence.
fn polling_settings() -> ConnectionSettings {
    let mut settings = settings();
    settings.traffic_poll_interval = Duration::from_millis(2000);
    settings.dir_stats_poll_interval = Duration::from_millis(5000);
    settings.dev_stats_poll_interval = Duration::from_millis(5000);
    settings.errors_poll_interval = Duration::from_millis(30_000);
    settings
}

/// How many times `entry` was requested.
fn requests_to(fake: &FakeTransport, entry: &str) -> usize {
    fake.seen().iter().filter(|s| s.as_str() == entry).count()
}

/// A daemon with one directory and one peer.
fn daemon() -> Arc<FakeTransport> {
    let fake = FakeTransport::default();
    fake.always(
        "/rest/system/config",
        &json!({
            "folders": [{ "id": "d1", "label": "Docs", "path": "/home/x/Docs" }],
            "devices": [{ "deviceID": OWN, "name": "laptop" }, { "deviceID": PEER, "name": "nas" }]
        }),
    );
    fake.always("/rest/system/status", &json!({ "myID": OWN }));
    fake.always(
        "/rest/system/connections",
        &json!({
            "total": { "inBytesTotal": 0, "outBytesTotal": 0 },
            "connections": { PEER: { "connected": true, "paused": false } }
        }),
    );
    fake.always("/rest/stats/folder", &json!({}));
    fake.always("/rest/stats/device", &json!({}));
    fake.always("/rest/system/error", &json!({ "errors": null }));
    Arc::new(fake)
}

fn state_changed(id: u64, folder: &str, to: &str) -> Value {
    json!({
        "id": id,
        "type": "StateChanged",
        "time": format!("2024-05-01T10:00:{id:02}Z"),
        "data": { "folder": folder, "from": "idle", "to": to }
    })
}

async fn next_matching(
    rx: &mut broadcast::Receiver<ConnectionEvent>,
    mut pred: impl FnMut(&ConnectionEvent) -> bool,
) -> ConnectionEvent {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let event = rx.recv().await.unwrap();
            if pred(&event) {
                return event;
            }
        }
    })
    .await
    .expect("event not observed in time")
}

async fn wait_for_state(rx: &mut broadcast::Receiver<ConnectionEvent>, state: ConnectionState) {
    next_matching(rx, |e| *e == ConnectionEvent::StatusChanged(state)).await;
}

async fn wait_for_request(fake: &FakeTransport, entry: &str) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !fake.seen().iter().any(|s| s == entry) {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("request not observed in time");
}

/// Connect and wait for the first event batch to be applied.
async fn connected(fake: &Arc<FakeTransport>) -> (Connection, broadcast::Receiver<ConnectionEvent>) {
    let conn = Connection::new(settings(), fake.clone());
    let mut rx = conn.subscribe();
    conn.connect().unwrap();
    wait_for_state(&mut rx, ConnectionState::Idle).await;
    (conn, rx)
}

// ── Bootstrap ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_empty_api_key_reports_insufficient_config() {
    let fake = daemon();
    let mut settings = settings();
    settings.api_key = SecretString::from(String::new());
    let conn = Connection::new(settings, fake.clone());
    let mut rx = conn.subscribe();

    conn.connect().unwrap();
    let event = next_matching(&mut rx, |e| matches!(e, ConnectionEvent::Error(_))).await;

    let ConnectionEvent::Error(report) = event else {
        unreachable!()
    };
    assert_eq!(report.category, ErrorCategory::OverallConnection);
    assert!(report.message.contains("API key"), "{}", report.message);
    assert_eq!(conn.state(), ConnectionState::Disconnected);
    assert!(fake.seen().is_empty());
}

#[tokio::test]
async fn test_bootstrap_populates_directories_and_devices() {
    let fake = daemon();
    fake.once("/rest/events", Ok(json!([])));

    let (conn, _rx) = connected(&fake).await;

    let dirs = conn.directories_snapshot();
    assert_eq!(dirs.len(), 1);
    assert_eq!(dirs[0].id, "d1");
    assert_eq!(dirs[0].label, "Docs");
    assert_eq!(dirs[0].status, DirectoryStatus::Unknown);

    let devices = conn.devices_snapshot();
    let own = devices.iter().find(|d| d.id == OWN).unwrap();
    let peer = devices.iter().find(|d| d.id == PEER).unwrap();
    assert_eq!(own.status, DeviceStatus::OwnDevice);
    assert_eq!(peer.status, DeviceStatus::Idle);

    assert_eq!(conn.overview().own_id, OWN);
    assert!(fake.seen().contains(&"GET /rest/events?since=0".to_owned()));
}

#[tokio::test]
async fn test_event_cursor_advances_between_polls() {
    let fake = daemon();
    fake.once("/rest/events", Ok(json!([state_changed(7, "d1", "idle")])));

    let (_conn, _rx) = connected(&fake).await;

    // The follow-up poll is issued right after the first batch.
    wait_for_request(&fake, "GET /rest/events?since=7").await;
}

// ── Aggregate state ─────────────────────────────────────────────────

#[tokio::test]
async fn test_syncing_directory_drives_synchronizing_then_completes_once() {
    let fake = daemon();
    fake.once("/rest/events", Ok(json!([state_changed(1, "d1", "syncing")])));
    fake.once("/rest/events", Ok(json!([state_changed(2, "d1", "idle")])));

    let conn = Connection::new(settings(), fake.clone());
    let mut rx = conn.subscribe();
    conn.connect().unwrap();

    wait_for_state(&mut rx, ConnectionState::Synchronizing).await;
    let completed = next_matching(&mut rx, |e| matches!(e, ConnectionEvent::SyncCompleted(_))).await;
    assert_eq!(completed, ConnectionEvent::SyncCompleted(vec!["d1".to_owned()]));
    wait_for_state(&mut rx, ConnectionState::Idle).await;

    assert_eq!(conn.directories_snapshot()[0].status, DirectoryStatus::Idle);

    // Nothing else completes without a new sync.
    conn.close().await;
    while let Ok(event) = rx.try_recv() {
        assert!(!matches!(event, ConnectionEvent::SyncCompleted(_)), "{event:?}");
    }
}

#[tokio::test]
async fn test_unknown_folder_triggers_config_refresh() {
    let fake = daemon();
    fake.once("/rest/events", Ok(json!([state_changed(1, "d9", "idle")])));

    let (conn, mut rx) = connected(&fake).await;
    next_matching(&mut rx, |e| {
        matches!(e, ConnectionEvent::NewConfig(v) if !v.is_null())
    })
    .await;

    let config_fetches = fake
        .seen()
        .iter()
        .filter(|s| s.as_str() == "GET /rest/system/config")
        .count();
    assert_eq!(config_fetches, 2);
    drop(conn);
}

// ── Failures and reconnect ──────────────────────────────────────────

#[tokio::test]
async fn test_event_failure_disconnects_and_schedules_reconnect() {
    let fake = daemon();
    fake.once("/rest/events", Ok(json!([])));
    fake.once(
        "/rest/events",
        Err(ApiError::Http {
            status: 500,
            message: "boom".into(),
        }),
    );

    let mut settings = settings();
    settings.reconnect_interval = Duration::from_millis(5000);
    let conn = Connection::new(settings, fake.clone());
    let mut rx = conn.subscribe();
    conn.connect().unwrap();

    let error = next_matching(&mut rx, |e| matches!(e, ConnectionEvent::Error(_))).await;
    let ConnectionEvent::Error(report) = error else {
        unreachable!()
    };
    assert_eq!(report.category, ErrorCategory::OverallConnection);
    assert!(report.message.starts_with("Unable to request daemon events"));

    wait_for_state(&mut rx, ConnectionState::Disconnected).await;
    let scheduled = next_matching(&mut rx, |e| {
        matches!(e, ConnectionEvent::ReconnectScheduled { .. })
    })
    .await;
    assert_eq!(
        scheduled,
        ConnectionEvent::ReconnectScheduled {
            delay: Duration::from_millis(5000),
            attempt: 1,
        }
    );
    conn.close().await;
}

#[tokio::test]
async fn test_poll_failure_does_not_disconnect() {
    let fake = daemon();
    fake.once(
        "/rest/system/connections",
        Err(ApiError::Http {
            status: 503,
            message: "busy".into(),
        }),
    );
    fake.once("/rest/events", Ok(json!([])));

    let (conn, _rx) = connected(&fake).await;
    assert_eq!(conn.state(), ConnectionState::Idle);
}

#[tokio::test]
async fn test_reconnect_resets_and_bootstraps_again() {
    let fake = daemon();
    fake.once("/rest/events", Ok(json!([state_changed(3, "d1", "idle")])));

    let (conn, mut rx) = connected(&fake).await;
    wait_for_request(&fake, "GET /rest/events?since=3").await;
    fake.once("/rest/events", Ok(json!([])));
    conn.reconnect().unwrap();

    next_matching(&mut rx, |e| matches!(e, ConnectionEvent::NewConfig(v) if v.is_null())).await;
    wait_for_state(&mut rx, ConnectionState::Reconnecting).await;
    wait_for_state(&mut rx, ConnectionState::Idle).await;

    let since_zero = fake
        .seen()
        .iter()
        .filter(|s| s.as_str() == "GET /rest/events?since=0")
        .count();
    assert_eq!(since_zero, 2);
}

#[tokio::test]
async fn test_disconnect_while_polling_settles_disconnected() {
    let fake = daemon();
    fake.once("/rest/events", Ok(json!([])));

    let (conn, mut rx) = connected(&fake).await;
    conn.disconnect().unwrap();
    wait_for_state(&mut rx, ConnectionState::Disconnected).await;
    assert_eq!(conn.state(), ConnectionState::Disconnected);
}

// ── Steady-state polling ────────────────────────────────────────────

const CONNECTIONS: &str = "GET /rest/system/connections";
const ERRORS: &str = "GET /rest/system/error";
const DIR_STATS: &str = "GET /rest/stats/folder";

#[tokio::test(start_paused = true)]
async fn test_pollers_repeat_while_connected_and_stop_on_disconnect() {
    let fake = daemon();
    // One batch, then the long poll stays open.
    fake.once("/rest/events", Ok(json!([])));

    let conn = Connection::new(polling_settings(), fake.clone());
    let mut rx = conn.subscribe();
    conn.connect().unwrap();
    wait_for_state(&mut rx, ConnectionState::Idle).await;

    tokio::time::sleep(Duration::from_secs(61)).await;

    let connections = requests_to(&fake, CONNECTIONS);
    let errors = requests_to(&fake, ERRORS);
    let dir_stats = requests_to(&fake, DIR_STATS);
    assert!(connections >= 25, "connections polled {connections} times");
    assert!((10..=14).contains(&dir_stats), "directory stats polled {dir_stats} times");
    assert_eq!(errors, 3);
    assert_eq!(conn.state(), ConnectionState::Idle);

    conn.disconnect().unwrap();
    wait_for_state(&mut rx, ConnectionState::Disconnected).await;
    let seen = fake.seen().len();

    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(fake.seen().len(), seen, "{:?}", &fake.seen()[seen..]);
    assert_eq!(conn.state(), ConnectionState::Disconnected);
}

#[tokio::test(start_paused = true)]
async fn test_event_failure_stops_pollers() {
    let fake = daemon();
    fake.once("/rest/events", Ok(json!([])));
    fake.once(
        "/rest/events",
        Err(ApiError::Http {
            status: 500,
            message: "gone".into(),
        }),
    );

    // No auto-reconnect, so nothing should talk to the daemon afterwards.
    let conn = Connection::new(polling_settings(), fake.clone());
    let mut rx = conn.subscribe();
    conn.connect().unwrap();
    wait_for_state(&mut rx, ConnectionState::Disconnected).await;
    let seen = fake.seen().len();

    tokio::time::sleep(Duration::from_secs(120)).await;

    assert_eq!(fake.seen().len(), seen, "{:?}", &fake.seen()[seen..]);
    assert_eq!(conn.state(), ConnectionState::Disconnected);
    let mut poll_errors = 0;
    while let Ok(event) = rx.try_recv() {
        if matches!(event, ConnectionEvent::Error(_)) {
            poll_errors += 1;
        }
    }
    assert_eq!(poll_errors, 0);
}

// ── Commands ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_pause_all_skips_own_device() {
    let fake = daemon();
    fake.always("/rest/system/pause", &json!({}));
    fake.once("/rest/events", Ok(json!([])));

    let (conn, mut rx) = connected(&fake).await;
    conn.pause_all().unwrap();

    let event = next_matching(&mut rx, |e| matches!(e, ConnectionEvent::PauseTriggered(_))).await;
    assert_eq!(event, ConnectionEvent::PauseTriggered(PEER.to_owned()));
    let pauses: Vec<String> = fake
        .seen()
        .into_iter()
        .filter(|s| s.starts_with("POST /rest/system/pause"))
        .collect();
    assert_eq!(pauses, vec![format!("POST /rest/system/pause?device={PEER}")]);
}

#[tokio::test]
async fn test_failed_rescan_is_a_specific_request_error() {
    let fake = daemon();
    fake.once(
        "/rest/db/scan",
        Err(ApiError::Http {
            status: 500,
            message: "no such folder".into(),
        }),
    );
    fake.once("/rest/events", Ok(json!([])));

    let (conn, mut rx) = connected(&fake).await;
    conn.rescan("d1").unwrap();

    let event = next_matching(&mut rx, |e| matches!(e, ConnectionEvent::Error(_))).await;
    let ConnectionEvent::Error(report) = event else {
        unreachable!()
    };
    assert_eq!(report.category, ErrorCategory::SpecificRequest);
    assert!(report.message.starts_with("Unable to request rescan"));
    assert_eq!(conn.state(), ConnectionState::Idle);
}

#[tokio::test]
async fn test_request_log_returns_entries() {
    let fake = daemon();
    fake.always(
        "/rest/system/log",
        &json!({ "messages": [
            { "when": "2024-05-01T10:00:00Z", "message": "started" },
            { "when": "2024-05-01T10:00:01Z", "message": "ready" }
        ]}),
    );

    let conn = Connection::new(settings(), fake.clone());
    let log = conn.request_log().await.unwrap();
    assert_eq!(log.len(), 2);
    assert_eq!(log[1].message, "ready");
}

#[tokio::test]
async fn test_interval_change_does_not_reconnect() {
    let fake = daemon();
    fake.once("/rest/events", Ok(json!([])));

    let (conn, _rx) = connected(&fake).await;
    let mut next = settings();
    next.errors_poll_interval = Duration::from_secs(60);
    assert!(!conn.connect_with(next).await.unwrap());
    assert_eq!(conn.state(), ConnectionState::Idle);
}

#[tokio::test]
async fn test_close_publishes_shutting_down_and_stops_engine() {
    let fake = daemon();
    let conn = Connection::new(settings(), fake);

    conn.close().await;
    assert_eq!(conn.state(), ConnectionState::ShuttingDown);
    assert!(matches!(conn.connect(), Err(CoreError::EngineStopped)));
}
