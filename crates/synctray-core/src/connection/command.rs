// ── Engine commands ──
//
// Everything a `Connection` handle asks of the engine task. Commands that
// produce a value carry a oneshot sender for the reply.

use bytes::Bytes;
use tokio::sync::oneshot;

use crate::config::ConnectionSettings;
use crate::error::CoreError;
use crate::model::LogEntry;

pub(crate) type Reply<T> = oneshot::Sender<Result<T, CoreError>>;

#[derive(Debug)]
pub(crate) enum Command {
    Connect,
    /// Apply settings, reconnecting only if needed. Replies whether a
    /// reconnect was required.
    ConnectWith(Box<ConnectionSettings>, Reply<bool>),
    Disconnect,
    Reconnect,
    ReconnectWith(Box<ConnectionSettings>),

    // ── Daemon commands ──────────────────────────────────────────────
    Pause(String),
    Resume(String),
    PauseAll,
    ResumeAll,
    Rescan(String),
    RescanAll,
    Restart,
    Shutdown,

    // ── Queries ──────────────────────────────────────────────────────
    FetchLog(Reply<Vec<LogEntry>>),
    FetchQrCode(String, Reply<Bytes>),

    MarkNotificationsRead,
    Close,
}
