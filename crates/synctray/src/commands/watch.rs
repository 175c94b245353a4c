//! Stream connection events to stdout until Ctrl-C.

use std::time::Duration;

use serde_json::{Value, json};
use tokio::sync::broadcast::error::RecvError;

use synctray_core::{ConnectionEvent, ConnectionSettings};

use crate::cli::{GlobalOpts, OutputFormat};
use crate::error::CliError;
use crate::output;

use super::session;

/// One human-readable line, or `None` for events too chatty to print.
fn describe(event: &ConnectionEvent, color: bool) -> Option<String> {
    let line = match event {
        ConnectionEvent::StatusChanged(state) => {
            format!("state      {}", output::paint_state(*state, color))
        }
        ConnectionEvent::SyncCompleted(ids) => format!("completed  {}", ids.join(", ")),
        ConnectionEvent::Error(report) => format!("error      [{}] {}", report.category, report.message),
        ConnectionEvent::Notification(n) => format!("notice     {}", n.message),
        ConnectionEvent::NewConfig(_) => "config     reloaded".into(),
        ConnectionEvent::OwnIdChanged(id) => format!("device id  {id}"),
        ConnectionEvent::PauseTriggered(id) => format!("paused     {id}"),
        ConnectionEvent::ResumeTriggered(id) => format!("resumed    {id}"),
        ConnectionEvent::RescanTriggered(id) => format!("rescan     {id}"),
        ConnectionEvent::RestartTriggered => "restart    requested".into(),
        ConnectionEvent::ShutdownTriggered => "shutdown   requested".into(),
        ConnectionEvent::ReconnectScheduled { delay, attempt } => format!(
            "reconnect  attempt {attempt} in {}",
            humantime::format_duration(Duration::from_secs(delay.as_secs()))
        ),
        ConnectionEvent::NewDirectories
        | ConnectionEvent::NewDevices
        | ConnectionEvent::DirectoryChanged { .. }
        | ConnectionEvent::DeviceChanged { .. }
        | ConnectionEvent::DownloadProgressChanged
        | ConnectionEvent::TrafficChanged(_)
        | ConnectionEvent::ConfigDirChanged(_) => return None,
    };
    Some(line)
}

/// Every event as a JSON object with a `type` tag.
fn to_json(event: &ConnectionEvent) -> Value {
    match event {
        ConnectionEvent::NewConfig(_) => json!({ "type": "new_config" }),
        ConnectionEvent::NewDirectories => json!({ "type": "new_directories" }),
        ConnectionEvent::NewDevices => json!({ "type": "new_devices" }),
        ConnectionEvent::DirectoryChanged { id, index } => {
            json!({ "type": "directory_changed", "id": id, "index": index })
        }
        ConnectionEvent::DeviceChanged { id, index } => {
            json!({ "type": "device_changed", "id": id, "index": index })
        }
        ConnectionEvent::DownloadProgressChanged => json!({ "type": "download_progress_changed" }),
        ConnectionEvent::StatusChanged(state) => json!({ "type": "status_changed", "state": state }),
        ConnectionEvent::SyncCompleted(ids) => json!({ "type": "sync_completed", "directories": ids }),
        ConnectionEvent::Error(report) => json!({ "type": "error", "error": report }),
        ConnectionEvent::Notification(n) => json!({ "type": "notification", "notification": n }),
        ConnectionEvent::TrafficChanged(t) => json!({ "type": "traffic_changed", "traffic": t }),
        ConnectionEvent::OwnIdChanged(id) => json!({ "type": "own_id_changed", "id": id }),
        ConnectionEvent::ConfigDirChanged(dir) => json!({ "type": "config_dir_changed", "path": dir }),
        ConnectionEvent::PauseTriggered(id) => json!({ "type": "pause_triggered", "id": id }),
        ConnectionEvent::ResumeTriggered(id) => json!({ "type": "resume_triggered", "id": id }),
        ConnectionEvent::RescanTriggered(id) => json!({ "type": "rescan_triggered", "id": id }),
        ConnectionEvent::RestartTriggered => json!({ "type": "restart_triggered" }),
        ConnectionEvent::ShutdownTriggered => json!({ "type": "shutdown_triggered" }),
        ConnectionEvent::ReconnectScheduled { delay, attempt } => json!({
            "type": "reconnect_scheduled",
            "delay_ms": u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            "attempt": attempt,
        }),
    }
}

pub async fn handle(settings: ConnectionSettings, global: &GlobalOpts) -> Result<(), CliError> {
    let (conn, mut events) = session::open(settings, global).await?;
    let color = output::should_color(global.color);
    let render = |event: &ConnectionEvent| match global.output {
        OutputFormat::Json | OutputFormat::JsonCompact => {
            Some(output::render_json(&to_json(event), true))
        }
        _ => describe(event, color),
    };

    loop {
        tokio::select! {
            biased;
            _ = tokio::signal::ctrl_c() => break,
            received = events.recv() => match received {
                Ok(event) => {
                    if let Some(line) = render(&event) {
                        output::print_output(&line, global.quiet);
                    }
                }
                Err(RecvError::Lagged(n)) => tracing::warn!(skipped = n, "event stream lagged"),
                Err(RecvError::Closed) => break,
            },
        }
    }

    conn.close().await;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use synctray_core::{ConnectionState, ErrorCategory, ErrorReport};

    #[test]
    fn chatty_events_are_not_described() {
        assert!(describe(&ConnectionEvent::DownloadProgressChanged, false).is_none());
        assert!(describe(&ConnectionEvent::NewDevices, false).is_none());
    }

    #[test]
    fn status_and_errors_are_described() {
        let line = describe(&ConnectionEvent::StatusChanged(ConnectionState::Idle), false).unwrap();
        assert_eq!(line, "state      Idle");

        let report = ErrorReport::new("boom", ErrorCategory::SpecificRequest);
        let line = describe(&ConnectionEvent::Error(report), false).unwrap();
        assert_eq!(line, "error      [SpecificRequest] boom");
    }

    #[test]
    fn json_lines_carry_type_tags() {
        let value = to_json(&ConnectionEvent::ReconnectScheduled {
            delay: Duration::from_millis(5000),
            attempt: 2,
        });
        assert_eq!(value["type"], "reconnect_scheduled");
        assert_eq!(value["delay_ms"], 5000);
        assert_eq!(value["attempt"], 2);

        let value = to_json(&ConnectionEvent::StatusChanged(ConnectionState::Synchronizing));
        assert_eq!(value["state"], "Synchronizing");
    }
}
