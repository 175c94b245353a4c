// ── Connection engine task ──
//
// The single task that owns the StateStore. Consumer commands, request
// completions and timers all arrive here and are handled one at a time;
// after each step the collected changes are published to observers.

use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use synctray_api::models::{
    self, Connections, DeviceStatistics, FolderStatistics, RawEvent, SystemConfig, SystemErrors,
    SystemLog, SystemStatus,
};
use synctray_api::{ApiRequest, Endpoint, Error as ApiError, ErrorKind, Transport};

use crate::certificate;
use crate::change::{ConnectionEvent, Outbox};
use crate::config::ConnectionSettings;
use crate::error::{CoreError, ErrorCategory, ErrorReport};
use crate::events::{EventCursor, EventProcessor, EventTarget};
use crate::model::{ConnectionState, Device, Directory, LogEntry, Notification, Overview};
use crate::notify::NotificationAggregator;
use crate::reconnect::ReconnectPolicy;
use crate::store::{StateStore, StatusTracker};
use crate::stream::Snapshot;

use super::command::{Command, Reply};
use super::requests::{
    Action, Completion, Operation, PollTimers, RequestSlots, Settled, spawn_request,
};

/// Sending halves of everything observers can watch.
pub(crate) struct Publishers {
    pub state: watch::Sender<ConnectionState>,
    pub directories: watch::Sender<Snapshot<Directory>>,
    pub devices: watch::Sender<Snapshot<Device>>,
    pub overview: watch::Sender<Overview>,
    pub notifications: watch::Sender<Arc<Vec<Notification>>>,
    pub events: broadcast::Sender<ConnectionEvent>,
}

pub(crate) struct Engine {
    settings: ConnectionSettings,
    target: Option<synctray_api::DaemonTarget>,
    transport: Arc<dyn Transport>,

    store: StateStore,
    tracker: StatusTracker,
    processor: EventProcessor,
    cursor: EventCursor,
    notifications: NotificationAggregator,
    reconnect: ReconnectPolicy,
    requests: RequestSlots,
    timers: PollTimers,
    outbox: Outbox,

    keep_polling: bool,
    reconnecting: bool,
    has_config: bool,
    has_status: bool,
    config_refresh_queued: bool,

    publish: Publishers,
    commands: mpsc::UnboundedReceiver<Command>,
    completions: mpsc::UnboundedReceiver<Completion>,
    cancel: CancellationToken,
}

impl Engine {
    pub(crate) fn new(
        settings: ConnectionSettings,
        transport: Arc<dyn Transport>,
        publish: Publishers,
        commands: mpsc::UnboundedReceiver<Command>,
        cancel: CancellationToken,
    ) -> Self {
        let (completion_tx, completions) = mpsc::unbounded_channel();
        let reconnect = ReconnectPolicy::new(settings.reconnect_interval);
        Self {
            settings,
            target: None,
            transport,
            store: StateStore::new(),
            tracker: StatusTracker::new(),
            processor: EventProcessor::new(),
            cursor: EventCursor::new(),
            notifications: NotificationAggregator::new(),
            reconnect,
            requests: RequestSlots::new(completion_tx),
            timers: PollTimers::default(),
            outbox: Outbox::default(),
            keep_polling: false,
            reconnecting: false,
            has_config: false,
            has_status: false,
            config_refresh_queued: false,
            publish,
            commands,
            completions,
            cancel,
        }
    }

    pub(crate) async fn run(mut self) {
        loop {
            let deadline = self.next_deadline();
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => break,
                command = self.commands.recv() => match command {
                    Some(Command::Close) | None => break,
                    Some(command) => self.handle_command(command),
                },
                Some(completion) = self.completions.recv() => self.handle_completion(completion),
                () = sleep_until_deadline(deadline) => self.handle_timers(),
            }
            self.flush();
        }
        self.shut_down();
    }

    // ── Commands ─────────────────────────────────────────────────────

    fn handle_command(&mut self, command: Command) {
        debug!(?command, "handling command");
        match command {
            Command::Connect => self.connect(),
            Command::ConnectWith(settings, reply) => {
                let required = self.apply_settings(*settings);
                if required {
                    self.reconnect();
                }
                let _ = reply.send(Ok(required));
            }
            Command::Disconnect => self.disconnect(),
            Command::Reconnect => self.reconnect(),
            Command::ReconnectWith(settings) => {
                self.apply_settings(*settings);
                self.reconnect();
            }
            Command::Pause(device) => self.start_action(Action::Pause(device)),
            Command::Resume(device) => self.start_action(Action::Resume(device)),
            Command::PauseAll => {
                for id in self.peer_ids() {
                    self.start_action(Action::Pause(id));
                }
            }
            Command::ResumeAll => {
                for id in self.peer_ids() {
                    self.start_action(Action::Resume(id));
                }
            }
            Command::Rescan(dir) => self.start_action(Action::Rescan(dir)),
            Command::RescanAll => {
                for id in self.store.directory_ids() {
                    self.start_action(Action::Rescan(id));
                }
            }
            Command::Restart => self.start_action(Action::Restart),
            Command::Shutdown => self.start_action(Action::Shutdown),
            Command::FetchLog(reply) => self.fetch_log(reply),
            Command::FetchQrCode(text, reply) => self.fetch_qr_code(text, reply),
            Command::MarkNotificationsRead => self.notifications.mark_read(),
            // Handled by the run loop.
            Command::Close => {}
        }
    }

    /// Start connecting unless already connected.
    fn connect(&mut self) {
        self.reconnect.disarm();
        self.reconnect.reset_tries();
        if self.is_connected() {
            debug!("already connected");
            return;
        }
        self.reconnecting = false;
        self.has_config = false;
        self.has_status = false;
        if !self.prepare_target() {
            return;
        }
        info!(url = %self.target_url(), "connecting");
        self.issue(Operation::Config);
        self.issue(Operation::Status);
        self.keep_polling = true;
    }

    fn disconnect(&mut self) {
        info!("disconnecting");
        self.keep_polling = false;
        self.reconnecting = false;
        self.has_config = false;
        self.has_status = false;
        self.config_refresh_queued = false;
        self.reconnect.disarm();
        self.reconnect.reset_tries();

        // A live event loop settles the state once its cancellation lands.
        let event_loop_live = self.requests.is_pending(Operation::Events);
        self.requests.cancel_all();
        self.timers.clear();
        if !event_loop_live {
            self.set_status(ConnectionState::Disconnected);
        }
    }

    fn reconnect(&mut self) {
        self.reconnect.disarm();
        self.reconnect.reset_tries();
        if self.requests.is_pending(Operation::Events) {
            info!("reconnecting after the event loop stops");
            self.reconnecting = true;
            self.has_config = false;
            self.has_status = false;
            self.requests.cancel_all();
            self.timers.clear();
        } else {
            self.continue_reconnecting();
        }
    }

    /// Drop everything learned from the daemon and bootstrap again.
    fn continue_reconnecting(&mut self) {
        self.outbox.push(ConnectionEvent::NewConfig(Arc::new(Value::Null)));
        self.set_status(ConnectionState::Reconnecting);
        self.keep_polling = true;
        self.reconnecting = false;
        self.cursor.reset();
        self.processor.reset();
        self.store.clear(&mut self.outbox);
        self.notifications.reset_unread();
        self.has_config = false;
        self.has_status = false;
        self.config_refresh_queued = false;
        self.requests.cancel_all();
        self.timers.clear();

        if !self.prepare_target() {
            return;
        }
        info!(url = %self.target_url(), "reconnecting");
        self.issue(Operation::Config);
        self.issue(Operation::Status);
    }

    /// Start the steady state once config and status are both known.
    fn continue_connecting(&mut self) {
        if !(self.keep_polling && self.has_config && self.has_status)
            || self.requests.is_pending(Operation::Events)
        {
            return;
        }
        self.issue(Operation::Connections);
        self.issue(Operation::DirStats);
        self.issue(Operation::DevStats);
        self.issue(Operation::Errors);

        self.cursor.reset();
        self.processor.reset();
        self.issue(Operation::Events);
    }

    /// Apply settings. Returns whether a reconnect is needed for them to
    /// take effect.
    fn apply_settings(&mut self, next: ConnectionSettings) -> bool {
        let required = self.settings.requires_reconnect(&next);
        self.reconnect.set_interval(next.reconnect_interval);
        self.settings = next;
        debug!(required, "applied connection settings");
        required
    }

    /// Validate the settings and pin the daemon certificate if needed.
    fn prepare_target(&mut self) -> bool {
        let target = match self.settings.target() {
            Ok(target) => target,
            Err(e) => {
                self.target = None;
                self.report(ErrorReport::new(e.to_string(), ErrorCategory::OverallConnection));
                return false;
            }
        };

        let pinned = certificate::pinned_for(
            target.base_url(),
            self.settings.https_cert.as_deref(),
            self.store.config_dir(),
        );
        let applied = match pinned {
            Ok(pinned) => self.transport.pin_certificate(pinned).map_err(CoreError::from),
            Err(e) => {
                self.report(ErrorReport::new(e.to_string(), ErrorCategory::OverallConnection));
                self.transport.pin_certificate(None).map_err(CoreError::from)
            }
        };
        if let Err(e) = applied {
            self.report(ErrorReport::new(e.to_string(), ErrorCategory::OverallConnection));
        }

        self.target = Some(target);
        true
    }

    fn target_url(&self) -> String {
        self.target
            .as_ref()
            .map(|t| t.base_url().to_string())
            .unwrap_or_default()
    }

    fn peer_ids(&self) -> Vec<String> {
        self.store
            .devices()
            .filter(|d| !d.is_own())
            .map(|d| d.id.clone())
            .collect()
    }

    // ── Requests ─────────────────────────────────────────────────────

    fn issue(&mut self, op: Operation) {
        let Some(ref target) = self.target else {
            return;
        };
        let timeout = if op == Operation::Events {
            self.settings.events_timeout
        } else {
            self.settings.request_timeout
        };
        match target.request(op.endpoint(self.cursor.since())) {
            Ok(request) => {
                self.timers.cancel(op);
                self.requests
                    .issue(op, Arc::clone(&self.transport), request.with_timeout(timeout));
            }
            Err(e) => {
                let err = CoreError::from(e);
                self.report(ErrorReport::from_error(
                    op.failure_context(),
                    &err,
                    ErrorCategory::OverallConnection,
                ));
            }
        }
    }

    /// Fetch the config again, coalescing with one already in flight.
    fn refresh_config(&mut self) {
        if self.requests.is_pending(Operation::Config) {
            self.config_refresh_queued = true;
        } else {
            self.issue(Operation::Config);
        }
    }

    fn schedule_poll(&mut self, op: Operation) {
        if !(self.keep_polling && self.has_config && self.has_status) {
            return;
        }
        let interval = match op {
            Operation::Connections => self.settings.traffic_poll_interval,
            Operation::DirStats => self.settings.dir_stats_poll_interval,
            Operation::DevStats => self.settings.dev_stats_poll_interval,
            Operation::Errors => self.settings.errors_poll_interval,
            Operation::Config | Operation::Status | Operation::Events => return,
        };
        if !interval.is_zero() {
            self.timers.schedule(op, Instant::now() + interval);
        }
    }

    /// Build a request outside the per-operation slots.
    fn one_off_request(&self, endpoint: Endpoint) -> Result<ApiRequest, CoreError> {
        let target = self.settings.target()?;
        Ok(target
            .request(endpoint)?
            .with_timeout(self.settings.request_timeout))
    }

    fn start_action(&mut self, action: Action) {
        let request = match self.one_off_request(action.endpoint()) {
            Ok(request) => request,
            Err(e) => {
                let report =
                    ErrorReport::from_error(action.failure_context(), &e, ErrorCategory::SpecificRequest);
                self.report(report);
                return;
            }
        };
        let tx = self.requests.sender();
        spawn_request(
            Arc::clone(&self.transport),
            request,
            self.cancel.child_token(),
            move |result| {
                let _ = tx.send(Completion::Action { action, result });
            },
        );
    }

    fn fetch_log(&mut self, reply: Reply<Vec<LogEntry>>) {
        const CONTEXT: &str = "Unable to request daemon log";
        let request = match self.one_off_request(Endpoint::Log) {
            Ok(request) => request,
            Err(e) => {
                self.report(ErrorReport::from_error(CONTEXT, &e, ErrorCategory::SpecificRequest));
                let _ = reply.send(Err(e));
                return;
            }
        };
        let tx = self.requests.sender();
        spawn_request(
            Arc::clone(&self.transport),
            request,
            self.cancel.child_token(),
            move |result| {
                let parsed = result.map_err(CoreError::from).and_then(|body| {
                    let log: SystemLog =
                        models::decode(&body).map_err(|e| CoreError::parsing("log", &e))?;
                    Ok(log
                        .messages
                        .unwrap_or_default()
                        .into_iter()
                        .map(|line| LogEntry {
                            when: line.when,
                            message: line.message,
                        })
                        .collect())
                });
                forward_reply(&tx, CONTEXT, parsed, reply);
            },
        );
    }

    fn fetch_qr_code(&mut self, text: String, reply: Reply<Bytes>) {
        const CONTEXT: &str = "Unable to request QR code";
        let request = match self.one_off_request(Endpoint::QrCode { text }) {
            Ok(request) => request,
            Err(e) => {
                self.report(ErrorReport::from_error(CONTEXT, &e, ErrorCategory::SpecificRequest));
                let _ = reply.send(Err(e));
                return;
            }
        };
        let tx = self.requests.sender();
        spawn_request(
            Arc::clone(&self.transport),
            request,
            self.cancel.child_token(),
            move |result| forward_reply(&tx, CONTEXT, result.map_err(CoreError::from), reply),
        );
    }

    // ── Completions ──────────────────────────────────────────────────

    fn handle_completion(&mut self, completion: Completion) {
        match completion {
            Completion::Operation { op, id, result } => match self.requests.settle(op, id) {
                Settled::Stale => {}
                Settled::Canceled => self.on_canceled(op),
                Settled::Current => match result {
                    Err(ApiError::Canceled) => self.on_canceled(op),
                    result => self.on_result(op, result),
                },
            },
            Completion::Action { action, result } => self.on_action(action, result),
            Completion::Report(report) => self.report(report),
        }
    }

    fn on_canceled(&mut self, op: Operation) {
        debug!(%op, "request canceled");
        if op != Operation::Events {
            return;
        }
        if self.reconnecting {
            self.continue_reconnecting();
        } else {
            self.set_status(ConnectionState::Disconnected);
        }
    }

    fn on_result(&mut self, op: Operation, result: Result<Bytes, ApiError>) {
        match op {
            Operation::Config => self.on_config(result),
            Operation::Status => self.on_status(result),
            Operation::Events => self.on_events(result),
            Operation::Connections | Operation::DirStats | Operation::DevStats | Operation::Errors => {
                self.on_poll(op, result);
            }
        }
    }

    fn on_config(&mut self, result: Result<Bytes, ApiError>) {
        match result.map_err(CoreError::from).and_then(|body| parse_config(&body)) {
            Ok((raw, config)) => {
                self.outbox.push(ConnectionEvent::NewConfig(Arc::new(raw)));
                self.store.apply_config(&config, &mut self.outbox);
                self.has_config = true;
                if self.is_connected() {
                    self.recompute();
                } else {
                    self.continue_connecting();
                }
            }
            Err(e @ CoreError::Parse { .. }) => {
                self.report(ErrorReport::from_error(
                    "Unable to parse daemon config",
                    &e,
                    ErrorCategory::Parsing,
                ));
            }
            Err(e) => {
                self.report(ErrorReport::from_error(
                    Operation::Config.failure_context(),
                    &e,
                    ErrorCategory::OverallConnection,
                ));
                self.connection_failed();
            }
        }

        if std::mem::take(&mut self.config_refresh_queued) {
            self.issue(Operation::Config);
        }
    }

    fn on_status(&mut self, result: Result<Bytes, ApiError>) {
        let parsed = result.map_err(CoreError::from).and_then(|body| {
            models::decode::<SystemStatus>(&body).map_err(|e| CoreError::parsing("status", &e))
        });
        match parsed {
            Ok(status) => {
                self.store.set_own_id(&status.my_id, &mut self.outbox);
                self.has_status = true;
                self.continue_connecting();
            }
            Err(e) => {
                let context = if matches!(e, CoreError::Parse { .. }) {
                    "Unable to parse daemon status"
                } else {
                    Operation::Status.failure_context()
                };
                self.report(ErrorReport::from_error(context, &e, ErrorCategory::OverallConnection));
            }
        }
    }

    fn on_events(&mut self, result: Result<Bytes, ApiError>) {
        match result {
            Ok(body) => match models::decode::<Vec<RawEvent>>(&body) {
                Ok(events) => self.apply_events(&events),
                Err(e) => {
                    let err = CoreError::parsing("events", &e);
                    self.report(ErrorReport::from_error(
                        "Unable to parse daemon events",
                        &err,
                        ErrorCategory::Parsing,
                    ));
                    self.connection_failed();
                    return;
                }
            },
            Err(e) if e.kind() == ErrorKind::Timeout => debug!("no new events"),
            Err(e) => {
                self.report(ErrorReport::from_error(
                    Operation::Events.failure_context(),
                    &CoreError::from(e),
                    ErrorCategory::OverallConnection,
                ));
                self.connection_failed();
                return;
            }
        }

        if self.keep_polling {
            self.issue(Operation::Events);
            self.set_status(ConnectionState::Idle);
        } else {
            self.set_status(ConnectionState::Disconnected);
        }
    }

    fn apply_events(&mut self, events: &[RawEvent]) {
        let mut target = EventTarget {
            store: &mut self.store,
            notifications: &mut self.notifications,
            outbox: &mut self.outbox,
        };
        let outcome = self.processor.apply_batch(events, &mut target);
        if let Some(id) = outcome.last_id {
            self.cursor.advance(id);
        }
        if outcome.refresh_config {
            self.refresh_config();
        }
    }

    fn on_poll(&mut self, op: Operation, result: Result<Bytes, ApiError>) {
        let now = Utc::now();
        let applied = result.map_err(CoreError::from).and_then(|body| match op {
            Operation::Connections => {
                let connections: Connections =
                    models::decode(&body).map_err(|e| CoreError::parsing("connections", &e))?;
                self.store.apply_connections(&connections, now, &mut self.outbox);
                Ok(())
            }
            Operation::DirStats => {
                let stats: FolderStatistics = models::decode(&body)
                    .map_err(|e| CoreError::parsing("directory statistics", &e))?;
                self.store.apply_folder_stats(&stats, &mut self.outbox);
                Ok(())
            }
            Operation::DevStats => {
                let stats: DeviceStatistics = models::decode(&body)
                    .map_err(|e| CoreError::parsing("device statistics", &e))?;
                self.store.apply_device_stats(&stats, &mut self.outbox);
                Ok(())
            }
            _ => {
                let errors: SystemErrors =
                    models::decode(&body).map_err(|e| CoreError::parsing("errors", &e))?;
                for (when, line) in self.store.take_new_daemon_errors(&errors, now) {
                    self.notifications.emit(when, line.message, &mut self.outbox);
                }
                Ok(())
            }
        });

        match applied {
            Ok(()) => self.recompute(),
            Err(e) => self.report(ErrorReport::from_error(
                op.failure_context(),
                &e,
                ErrorCategory::OverallConnection,
            )),
        }
        self.schedule_poll(op);
    }

    fn on_action(&mut self, action: Action, result: Result<Bytes, ApiError>) {
        match result {
            Ok(_) => {
                info!(?action, "daemon accepted command");
                let event = match action {
                    Action::Pause(id) => ConnectionEvent::PauseTriggered(id),
                    Action::Resume(id) => ConnectionEvent::ResumeTriggered(id),
                    Action::Rescan(id) => ConnectionEvent::RescanTriggered(id),
                    Action::Restart => ConnectionEvent::RestartTriggered,
                    Action::Shutdown => ConnectionEvent::ShutdownTriggered,
                };
                self.outbox.push(event);
            }
            Err(ApiError::Canceled) => {}
            Err(e) => self.report(ErrorReport::from_error(
                action.failure_context(),
                &CoreError::from(e),
                ErrorCategory::SpecificRequest,
            )),
        }
    }

    // ── Timers ───────────────────────────────────────────────────────

    fn next_deadline(&self) -> Option<Instant> {
        match (self.timers.next_deadline(), self.reconnect.deadline()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    fn handle_timers(&mut self) {
        let now = Instant::now();
        if let Some(tries) = self.reconnect.take_due(now) {
            info!(attempt = tries + 1, "auto-reconnecting");
            self.connect();
            self.reconnect.record_attempt(tries);
        }
        for op in self.timers.take_due(now) {
            self.issue(op);
        }
    }

    // ── Status ───────────────────────────────────────────────────────

    fn is_connected(&self) -> bool {
        self.tracker.state().is_connected()
    }

    fn set_status(&mut self, requested: ConnectionState) {
        let before = self.tracker.state();
        let changed = self.tracker.set_status(requested, &self.store);

        let completed = self.tracker.just_completed();
        if !completed.is_empty() {
            self.outbox.push(ConnectionEvent::SyncCompleted(completed.to_vec()));
        }
        if changed {
            let state = self.tracker.state();
            info!(from = %before, to = %state, "connection state changed");
            if state.is_connected() {
                self.reconnect.reset_tries();
            }
            self.publish.state.send_replace(state);
            self.outbox.push(ConnectionEvent::StatusChanged(state));
        }
    }

    /// Re-derive the aggregate state after a mutation.
    fn recompute(&mut self) {
        if self.is_connected() {
            self.set_status(ConnectionState::Idle);
        }
    }

    /// Mark the connection as lost, stop every poller and arm the
    /// reconnect timer.
    fn connection_failed(&mut self) {
        self.keep_polling = false;
        self.has_config = false;
        self.has_status = false;
        self.config_refresh_queued = false;
        self.requests.cancel_all();
        self.timers.clear();
        self.set_status(ConnectionState::Disconnected);
        if let Some(scheduled) = self.reconnect.arm() {
            info!(
                delay_ms = scheduled.delay.as_millis(),
                attempt = scheduled.attempt,
                "reconnect scheduled"
            );
            self.outbox.push(ConnectionEvent::ReconnectScheduled {
                delay: scheduled.delay,
                attempt: scheduled.attempt,
            });
        }
    }

    fn report(&mut self, report: ErrorReport) {
        warn!(category = %report.category, "{}", report.message);
        self.outbox.error(report);
    }

    // ── Publishing ───────────────────────────────────────────────────

    fn flush(&mut self) {
        let (events, directories_dirty, devices_dirty) = self.outbox.drain();

        if directories_dirty {
            self.publish
                .directories
                .send_replace(self.store.directories_snapshot());
        }
        if devices_dirty {
            self.publish.devices.send_replace(self.store.devices_snapshot());
        }

        let log = self.notifications.log();
        self.publish.notifications.send_if_modified(|current| {
            if current.len() == log.len() {
                return false;
            }
            *current = Arc::new(log.to_vec());
            true
        });

        let overview = self.overview();
        self.publish.overview.send_if_modified(|current| {
            if *current == overview {
                return false;
            }
            *current = overview;
            true
        });

        for event in events {
            let _ = self.publish.events.send(event);
        }
    }

    fn overview(&self) -> Overview {
        Overview {
            state: self.tracker.state(),
            own_id: self.store.own_id().to_owned(),
            config_dir: self.store.config_dir().to_owned(),
            traffic: self.store.traffic(),
            last_file: self.store.last_file().cloned(),
            has_unread_notifications: self.notifications.has_unread(),
            just_completed: self.tracker.just_completed().to_vec(),
            reconnect_tries: self.reconnect.tries(),
        }
    }

    fn shut_down(&mut self) {
        info!("connection engine stopping");
        self.keep_polling = false;
        self.requests.abort_all();
        self.timers.clear();
        self.reconnect.disarm();
        self.set_status(ConnectionState::ShuttingDown);
        self.flush();
    }
}

fn parse_config(body: &[u8]) -> Result<(Value, SystemConfig), CoreError> {
    let raw: Value = models::decode(body).map_err(|e| CoreError::parsing("config", &e))?;
    let config = SystemConfig::deserialize(&raw).map_err(|e| CoreError::Parse {
        what: "config",
        message: e.to_string(),
    })?;
    Ok((raw, config))
}

/// Deliver a reply-style result to its caller, and route failures other
/// than cancellation to observers as well.
fn forward_reply<T>(
    tx: &mpsc::UnboundedSender<Completion>,
    context: &str,
    result: Result<T, CoreError>,
    reply: Reply<T>,
) {
    if let Err(ref e) = result {
        if !e.is_canceled() {
            let report = ErrorReport::from_error(context, e, ErrorCategory::SpecificRequest);
            let _ = tx.send(Completion::Report(report));
        }
    }
    let _ = reply.send(result);
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
