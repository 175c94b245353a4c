// ── Snapshot subscriptions ──
//
// Consumers watch directory and device lists through `SnapshotStream`.
// Each published value is an immutable `Arc` snapshot; positions in it
// stay valid until the next `NewDirectories`/`NewDevices` event.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_core::Stream;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

pub type Snapshot<T> = Arc<Vec<Arc<T>>>;

/// A subscription to one entity collection.
pub struct SnapshotStream<T: Clone + Send + Sync + 'static> {
    current: Snapshot<T>,
    receiver: watch::Receiver<Snapshot<T>>,
}

impl<T: Clone + Send + Sync + 'static> SnapshotStream<T> {
    pub(crate) fn new(receiver: watch::Receiver<Snapshot<T>>) -> Self {
        let current = receiver.borrow().clone();
        Self { current, receiver }
    }

    /// The snapshot seen last by this subscription.
    pub fn current(&self) -> &Snapshot<T> {
        &self.current
    }

    /// The newest published snapshot.
    pub fn latest(&self) -> Snapshot<T> {
        self.receiver.borrow().clone()
    }

    /// Wait for the next publication. `None` once the engine has stopped.
    pub async fn changed(&mut self) -> Option<Snapshot<T>> {
        self.receiver.changed().await.ok()?;
        let snap = self.receiver.borrow_and_update().clone();
        self.current = snap.clone();
        Some(snap)
    }

    pub fn into_stream(self) -> SnapshotWatchStream<T> {
        SnapshotWatchStream {
            inner: WatchStream::new(self.receiver),
        }
    }
}

/// `Stream` adapter yielding every published snapshot, starting with the
/// current one.
pub struct SnapshotWatchStream<T: Clone + Send + Sync + 'static> {
    inner: WatchStream<Snapshot<T>>,
}

impl<T: Clone + Send + Sync + 'static> Stream for SnapshotWatchStream<T> {
    type Item = Snapshot<T>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn changed_tracks_latest_publication() {
        let (tx, rx) = watch::channel(Arc::new(Vec::<Arc<u32>>::new()));
        let mut stream = SnapshotStream::new(rx);
        assert!(stream.current().is_empty());

        tx.send(Arc::new(vec![Arc::new(7)])).unwrap();
        let snap = stream.changed().await.unwrap();
        assert_eq!(*snap[0], 7);
        assert_eq!(stream.current().len(), 1);

        drop(tx);
        assert!(stream.changed().await.is_none());
    }

    #[test]
    fn watch_stream_yields_current_then_updates() {
        let (tx, rx) = watch::channel(Arc::new(vec![Arc::new(1_u32)]));
        let mut stream = tokio_test::task::spawn(SnapshotStream::new(rx).into_stream());

        let first = tokio_test::assert_ready!(stream.poll_next()).unwrap();
        assert_eq!(*first[0], 1);
        tokio_test::assert_pending!(stream.poll_next());

        tx.send(Arc::new(vec![Arc::new(2)])).unwrap();
        assert!(stream.is_woken());
        let next = tokio_test::assert_ready!(stream.poll_next()).unwrap();
        assert_eq!(*next[0], 2);

        drop(tx);
        assert_eq!(tokio_test::assert_ready!(stream.poll_next()), None);
    }
}
