//! Fire-and-forget daemon commands: rescan, pause, resume, restart, shutdown.

use synctray_core::{Connection, ConnectionEvent, ConnectionSettings};

use crate::cli::{GlobalOpts, TargetArgs};
use crate::error::CliError;
use crate::output;

use super::session;

/// What a `TargetArgs` command acts on.
#[derive(Debug, Clone, Copy)]
pub enum Target {
    /// Rescan a directory.
    Directory,
    /// Pause a device.
    Pause,
    /// Resume a device.
    Resume,
}

impl Target {
    fn resource(self) -> &'static str {
        match self {
            Self::Directory => "directory",
            Self::Pause | Self::Resume => "device",
        }
    }

    fn verb(self) -> &'static str {
        match self {
            Self::Directory => "Rescan requested for",
            Self::Pause => "Paused",
            Self::Resume => "Resumed",
        }
    }

    fn triggered(self, event: &ConnectionEvent) -> Option<String> {
        match (self, event) {
            (Self::Directory, ConnectionEvent::RescanTriggered(id))
            | (Self::Pause, ConnectionEvent::PauseTriggered(id))
            | (Self::Resume, ConnectionEvent::ResumeTriggered(id)) => Some(id.clone()),
            _ => None,
        }
    }

    /// Ids `--all` will touch; the own device is never paused or resumed.
    fn all_ids(self, conn: &Connection) -> Vec<String> {
        match self {
            Self::Directory => conn
                .directories_snapshot()
                .iter()
                .map(|d| d.id.clone())
                .collect(),
            Self::Pause | Self::Resume => conn
                .devices_snapshot()
                .iter()
                .filter(|d| !d.is_own())
                .map(|d| d.id.clone())
                .collect(),
        }
    }

    fn knows(self, conn: &Connection, id: &str) -> bool {
        match self {
            Self::Directory => conn.directories_snapshot().iter().any(|d| d.id == id),
            Self::Pause | Self::Resume => conn.devices_snapshot().iter().any(|d| d.id == id),
        }
    }

    fn send_one(self, conn: &Connection, id: &str) -> Result<(), CliError> {
        match self {
            Self::Directory => conn.rescan(id)?,
            Self::Pause => conn.pause(id)?,
            Self::Resume => conn.resume(id)?,
        }
        Ok(())
    }

    fn send_all(self, conn: &Connection) -> Result<(), CliError> {
        match self {
            Self::Directory => conn.rescan_all()?,
            Self::Pause => conn.pause_all()?,
            Self::Resume => conn.resume_all()?,
        }
        Ok(())
    }
}

pub async fn handle(
    target: Target,
    args: TargetArgs,
    settings: ConnectionSettings,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let (conn, mut events) = session::open(settings, global).await?;
    let result = run(target, args, &conn, &mut events, global).await;
    conn.close().await;

    for id in result? {
        output::print_output(&format!("{} {} {id}", target.verb(), target.resource()), global.quiet);
    }
    Ok(())
}

async fn run(
    target: Target,
    args: TargetArgs,
    conn: &Connection,
    events: &mut tokio::sync::broadcast::Receiver<ConnectionEvent>,
    global: &GlobalOpts,
) -> Result<Vec<String>, CliError> {
    let expected = if args.all {
        let ids = target.all_ids(conn);
        if ids.is_empty() {
            return Ok(ids);
        }
        target.send_all(conn)?;
        ids.len()
    } else {
        let id = args.id.unwrap_or_default();
        if !target.knows(conn, &id) {
            return Err(CliError::NotFound {
                resource_type: target.resource().into(),
                identifier: id,
            });
        }
        target.send_one(conn, &id)?;
        1
    };

    session::await_triggers(events, expected, global.timeout, |e| target.triggered(e)).await
}

/// Restart the daemon. The connection drops right after.
pub async fn restart(settings: ConnectionSettings, global: &GlobalOpts) -> Result<(), CliError> {
    daemon_command(settings, global, Connection::restart, "Daemon restart requested").await
}

/// Shut the daemon down.
pub async fn shutdown(settings: ConnectionSettings, global: &GlobalOpts) -> Result<(), CliError> {
    daemon_command(settings, global, Connection::shutdown, "Daemon shutdown requested").await
}

async fn daemon_command(
    settings: ConnectionSettings,
    global: &GlobalOpts,
    send: fn(&Connection) -> Result<(), synctray_core::CoreError>,
    message: &str,
) -> Result<(), CliError> {
    let (conn, mut events) = session::open(settings, global).await?;
    let result = match send(&conn) {
        Ok(()) => {
            session::await_triggers(&mut events, 1, global.timeout, |e| match e {
                ConnectionEvent::RestartTriggered | ConnectionEvent::ShutdownTriggered => {
                    Some(String::new())
                }
                _ => None,
            })
            .await
        }
        Err(e) => Err(e.into()),
    };
    conn.close().await;
    result?;

    output::print_output(message, global.quiet);
    Ok(())
}
