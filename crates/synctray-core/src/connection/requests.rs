// ── Outstanding request bookkeeping ──
//
// Each logical operation has at most one request in flight. A request is
// a spawned task racing the transport against a cancellation token; its
// result comes back to the engine over the completion channel tagged with
// the operation and a sequence id. Completions whose id no longer matches
// the slot belong to a superseded request and are dropped.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use synctray_api::{ApiRequest, Endpoint, Error as ApiError, Transport};

use crate::error::ErrorReport;

/// A request kind with its own slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub(crate) enum Operation {
    Config,
    Status,
    Connections,
    DirStats,
    DevStats,
    Errors,
    Events,
}

impl Operation {
    pub(crate) fn endpoint(self, since: u64) -> Endpoint {
        match self {
            Self::Config => Endpoint::Config,
            Self::Status => Endpoint::Status,
            Self::Connections => Endpoint::Connections,
            Self::DirStats => Endpoint::FolderStats,
            Self::DevStats => Endpoint::DeviceStats,
            Self::Errors => Endpoint::Errors,
            Self::Events => Endpoint::Events { since },
        }
    }

    /// Prefix of the error message reported when the request fails.
    pub(crate) fn failure_context(self) -> &'static str {
        match self {
            Self::Config => "Unable to request daemon config",
            Self::Status => "Unable to request daemon status",
            Self::Connections => "Unable to request connections",
            Self::DirStats => "Unable to request directory statistics",
            Self::DevStats => "Unable to request device statistics",
            Self::Errors => "Unable to request errors",
            Self::Events => "Unable to request daemon events",
        }
    }
}

/// A fire-and-forget command whose outcome is only announced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Action {
    Pause(String),
    Resume(String),
    Rescan(String),
    Restart,
    Shutdown,
}

impl Action {
    pub(crate) fn endpoint(&self) -> Endpoint {
        match self {
            Self::Pause(device) => Endpoint::Pause {
                device: device.clone(),
            },
            Self::Resume(device) => Endpoint::Resume {
                device: device.clone(),
            },
            Self::Rescan(folder) => Endpoint::Scan {
                folder: folder.clone(),
            },
            Self::Restart => Endpoint::Restart,
            Self::Shutdown => Endpoint::Shutdown,
        }
    }

    pub(crate) fn failure_context(&self) -> &'static str {
        match self {
            Self::Pause(_) => "Unable to request pause",
            Self::Resume(_) => "Unable to request resume",
            Self::Rescan(_) => "Unable to request rescan",
            Self::Restart => "Unable to request restart",
            Self::Shutdown => "Unable to request shutdown",
        }
    }
}

/// Message from a request task back to the engine.
#[derive(Debug)]
pub(crate) enum Completion {
    Operation {
        op: Operation,
        id: u64,
        result: Result<Bytes, ApiError>,
    },
    Action {
        action: Action,
        result: Result<Bytes, ApiError>,
    },
    /// A reply-style request failed; the caller got the error directly
    /// and observers get it through the event stream.
    Report(ErrorReport),
}

/// How a completion relates to its slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Settled {
    /// Superseded by a newer request.
    Stale,
    /// The slot was canceled; the result must not be interpreted.
    Canceled,
    /// The live request of this slot.
    Current,
}

struct Pending {
    id: u64,
    cancel: CancellationToken,
    canceled: bool,
    handle: JoinHandle<()>,
}

/// One cancelable request slot per [`Operation`].
pub(crate) struct RequestSlots {
    slots: HashMap<Operation, Pending>,
    next_id: u64,
    completions: mpsc::UnboundedSender<Completion>,
}

impl RequestSlots {
    pub(crate) fn new(completions: mpsc::UnboundedSender<Completion>) -> Self {
        Self {
            slots: HashMap::new(),
            next_id: 0,
            completions,
        }
    }

    pub(crate) fn sender(&self) -> mpsc::UnboundedSender<Completion> {
        self.completions.clone()
    }

    pub(crate) fn is_pending(&self, op: Operation) -> bool {
        self.slots.contains_key(&op)
    }

    /// Start `request` in the slot of `op`, superseding any request there.
    pub(crate) fn issue(&mut self, op: Operation, transport: Arc<dyn Transport>, request: ApiRequest) {
        if let Some(previous) = self.slots.remove(&op) {
            previous.cancel.cancel();
        }
        self.next_id += 1;
        let id = self.next_id;
        let cancel = CancellationToken::new();
        let tx = self.completions.clone();
        let handle = spawn_request(transport, request, cancel.clone(), move |result| {
            let _ = tx.send(Completion::Operation { op, id, result });
        });
        self.slots.insert(
            op,
            Pending {
                id,
                cancel,
                canceled: false,
                handle,
            },
        );
    }

    /// Release the slot for a completion.
    pub(crate) fn settle(&mut self, op: Operation, id: u64) -> Settled {
        match self.slots.get(&op) {
            Some(pending) if pending.id == id => {}
            _ => return Settled::Stale,
        }
        match self.slots.remove(&op) {
            Some(pending) if pending.canceled => Settled::Canceled,
            _ => Settled::Current,
        }
    }

    /// Cancel every slot. The slots stay occupied until their canceled
    /// completions arrive.
    pub(crate) fn cancel_all(&mut self) {
        for (op, pending) in &mut self.slots {
            if !pending.canceled {
                debug!(%op, id = pending.id, "aborting request");
                pending.canceled = true;
                pending.cancel.cancel();
            }
        }
    }

    /// Tear down without waiting for completions.
    pub(crate) fn abort_all(&mut self) {
        for (_, pending) in self.slots.drain() {
            pending.cancel.cancel();
            pending.handle.abort();
        }
    }
}

/// Run `request` on a task unless `cancel` fires first, then hand the
/// outcome to `finish`.
pub(crate) fn spawn_request<F>(
    transport: Arc<dyn Transport>,
    request: ApiRequest,
    cancel: CancellationToken,
    finish: F,
) -> JoinHandle<()>
where
    F: FnOnce(Result<Bytes, ApiError>) + Send + 'static,
{
    tokio::spawn(async move {
        debug!(endpoint = %request.endpoint, url = %request.url, "sending request");
        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => Err(ApiError::Canceled),
            result = transport.execute(request) => result,
        };
        finish(result);
    })
}

// ── Poll timers ─────────────────────────────────────────────────────

/// Single-shot deadlines for the periodic polls.
#[derive(Debug, Default)]
pub(crate) struct PollTimers {
    deadlines: HashMap<Operation, Instant>,
}

impl PollTimers {
    pub(crate) fn schedule(&mut self, op: Operation, at: Instant) {
        self.deadlines.insert(op, at);
    }

    pub(crate) fn cancel(&mut self, op: Operation) {
        self.deadlines.remove(&op);
    }

    pub(crate) fn clear(&mut self) {
        self.deadlines.clear();
    }

    pub(crate) fn next_deadline(&self) -> Option<Instant> {
        self.deadlines.values().min().copied()
    }

    /// Remove and return the operations whose deadline has passed.
    pub(crate) fn take_due(&mut self, now: Instant) -> Vec<Operation> {
        let due: Vec<Operation> = self
            .deadlines
            .iter()
            .filter(|(_, at)| **at <= now)
            .map(|(op, _)| *op)
            .collect();
        for op in &due {
            self.deadlines.remove(op);
        }
        due
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use secrecy::SecretString;
    use synctray_api::{DaemonTarget, PinnedCertificate};
    use url::Url;

    use super::*;

    /// Never answers.
    struct Silent;

    #[async_trait]
    impl Transport for Silent {
        async fn execute(&self, _request: ApiRequest) -> Result<Bytes, ApiError> {
            std::future::pending::<Result<Bytes, ApiError>>().await
        }

        fn pin_certificate(&self, _pinned: Option<PinnedCertificate>) -> Result<(), ApiError> {
            Ok(())
        }
    }

    fn request() -> ApiRequest {
        DaemonTarget::new(Url::parse("http://127.0.0.1:8384").unwrap(), SecretString::from("k"))
            .request(Endpoint::Config)
            .unwrap()
    }

    async fn next_operation(rx: &mut mpsc::UnboundedReceiver<Completion>) -> (Operation, u64, bool) {
        match rx.recv().await.unwrap() {
            Completion::Operation { op, id, result } => (op, id, matches!(result, Err(ApiError::Canceled))),
            other => panic!("unexpected completion {other:?}"),
        }
    }

    #[tokio::test]
    async fn superseded_request_is_stale() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut slots = RequestSlots::new(tx);
        let transport: Arc<dyn Transport> = Arc::new(Silent);

        slots.issue(Operation::Config, transport.clone(), request());
        slots.issue(Operation::Config, transport, request());

        let (op, id, canceled) = next_operation(&mut rx).await;
        assert_eq!(op, Operation::Config);
        assert!(canceled);
        assert_eq!(slots.settle(op, id), Settled::Stale);
        assert!(slots.is_pending(Operation::Config));
    }

    #[tokio::test]
    async fn cancel_all_settles_as_canceled() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut slots = RequestSlots::new(tx);
        slots.issue(Operation::Events, Arc::new(Silent), request());

        slots.cancel_all();
        let (op, id, _) = next_operation(&mut rx).await;
        assert_eq!(slots.settle(op, id), Settled::Canceled);
        assert!(!slots.is_pending(Operation::Events));
    }

    #[tokio::test(start_paused = true)]
    async fn timers_fire_in_deadline_order() {
        let mut timers = PollTimers::default();
        let now = Instant::now();
        timers.schedule(Operation::Connections, now + Duration::from_secs(2));
        timers.schedule(Operation::Errors, now + Duration::from_secs(30));

        assert_eq!(timers.next_deadline(), Some(now + Duration::from_secs(2)));
        assert!(timers.take_due(now).is_empty());
        assert_eq!(
            timers.take_due(now + Duration::from_secs(5)),
            vec![Operation::Connections]
        );
        assert_eq!(timers.next_deadline(), Some(now + Duration::from_secs(30)));
    }
}
