//! Opening a connection for a one-shot command.

use std::time::Duration;

use tokio::sync::broadcast::{self, error::RecvError};

use synctray_core::{
    Connection, ConnectionEvent, ConnectionSettings, CoreError, ErrorCategory,
};

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// Connect and wait until the event loop is live.
///
/// The first connection-wide error aborts. The returned receiver was
/// subscribed before connecting, so no event is missed.
pub async fn open(
    settings: ConnectionSettings,
    global: &GlobalOpts,
) -> Result<(Connection, broadcast::Receiver<ConnectionEvent>), CliError> {
    let url = settings
        .url
        .as_ref()
        .map(ToString::to_string)
        .unwrap_or_default();
    let conn = Connection::with_rest_client(settings)?;
    let mut events = conn.subscribe();
    conn.connect()?;

    let ready = async {
        loop {
            match events.recv().await {
                Ok(ConnectionEvent::StatusChanged(state)) if state.is_connected() => {
                    return Ok(());
                }
                Ok(ConnectionEvent::Error(report))
                    if report.category == ErrorCategory::OverallConnection =>
                {
                    return Err(CliError::ConnectionFailed {
                        url: url.clone(),
                        message: report.message,
                    });
                }
                Ok(_) | Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => return Err(CoreError::EngineStopped.into()),
            }
        }
    };

    tokio::time::timeout(Duration::from_secs(global.timeout), ready)
        .await
        .map_err(|_| CliError::Timeout {
            seconds: global.timeout,
        })??;
    tracing::debug!(state = %conn.state(), "connected");
    Ok((conn, events))
}

/// Collect `expected` outcomes of fire-and-forget commands.
///
/// `triggered` picks the success events; any SpecificRequest error fails
/// the whole batch.
pub async fn await_triggers(
    events: &mut broadcast::Receiver<ConnectionEvent>,
    expected: usize,
    seconds: u64,
    triggered: impl Fn(&ConnectionEvent) -> Option<String>,
) -> Result<Vec<String>, CliError> {
    let collect = async {
        let mut done = Vec::with_capacity(expected);
        while done.len() < expected {
            match events.recv().await {
                Ok(ConnectionEvent::Error(report))
                    if report.category == ErrorCategory::SpecificRequest =>
                {
                    return Err(CliError::RequestFailed {
                        message: report.message,
                    });
                }
                Ok(event) => done.extend(triggered(&event)),
                Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => return Err(CoreError::EngineStopped.into()),
            }
        }
        Ok(done)
    };

    tokio::time::timeout(Duration::from_secs(seconds), collect)
        .await
        .map_err(|_| CliError::Timeout { seconds })?
}
