// ── Reactive condition stream ──
//
// Subscription type for consuming device condition changes from the store.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures_core::Stream;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use crate::store::DeviceCondition;

/// A subscription to the device condition.
///
/// Provides both point-in-time snapshot access and change notification via
/// [`changed()`](Self::changed) or by converting into a `Stream`.
pub struct ConditionStream {
    current: DeviceCondition,
    receiver: watch::Receiver<DeviceCondition>,
}

impl ConditionStream {
    pub(crate) fn new(receiver: watch::Receiver<DeviceCondition>) -> Self {
        let current = receiver.borrow().clone();
        Self { current, receiver }
    }

    /// The snapshot captured at creation (or at the last `changed()`).
    pub fn current(&self) -> &DeviceCondition {
        &self.current
    }

    /// The latest snapshot, which may be newer than `current()`.
    pub fn latest(&self) -> DeviceCondition {
        self.receiver.borrow().clone()
    }

    /// Wait for the next change. `None` once the store is dropped.
    pub async fn changed(&mut self) -> Option<DeviceCondition> {
        self.receiver.changed().await.ok()?;
        let snap = self.receiver.borrow_and_update().clone();
        self.current = snap.clone();
        Some(snap)
    }

    /// Consume a pending change without waiting. `true` if one was pending.
    pub fn take_change(&mut self) -> bool {
        if !self.receiver.has_changed().unwrap_or(false) {
            return false;
        }
        self.current = self.receiver.borrow_and_update().clone();
        true
    }

    pub fn into_stream(self) -> ConditionWatchStream {
        ConditionWatchStream {
            inner: WatchStream::new(self.receiver),
        }
    }
}

/// `Stream` adapter yielding a snapshot each time the condition changes.
pub struct ConditionWatchStream {
    inner: WatchStream<DeviceCondition>,
}

impl Stream for ConditionWatchStream {
    type Item = DeviceCondition;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}
