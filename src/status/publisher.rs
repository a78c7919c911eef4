//! Status publisher and subscriber registry.

use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use tokio::sync::broadcast;

use crate::backends::{BackendAdapter, BackendId, HealthStatus};
use crate::lifecycle::schedule::{RecurringTask, Reschedule};

/// Health of every backend, keyed by identity.
pub type StatusMap = BTreeMap<BackendId, HealthStatus>;

type Callback = Arc<dyn Fn(&StatusMap) + Send + Sync>;

#[derive(Default)]
struct Registry {
    next_id: AtomicU64,
    subscribers: Mutex<BTreeMap<u64, Callback>>,
}

impl Registry {
    fn subscribers(&self) -> MutexGuard<'_, BTreeMap<u64, Callback>> {
        self.subscribers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_registered(&self, id: u64) -> bool {
        self.subscribers().contains_key(&id)
    }

    fn broadcast(&self, status: &StatusMap) -> usize {
        let snapshot: Vec<(u64, Callback)> = self
            .subscribers()
            .iter()
            .map(|(id, callback)| (*id, callback.clone()))
            .collect();

        let mut delivered = 0;
        for (id, callback) in snapshot {
            // An earlier callback in this round may have removed this one.
            if !self.is_registered(id) {
                continue;
            }
            match catch_unwind(AssertUnwindSafe(|| callback(status))) {
                Ok(()) => delivered += 1,
                Err(_) => tracing::warn!(subscriber = id, "Status subscriber panicked"),
            }
        }
        delivered
    }
}

/// Handle returned by [`StatusPublisher::subscribe`].
///
/// Dropping the handle does not unsubscribe.
#[derive(Clone)]
pub struct Subscription {
    id: u64,
    registry: Weak<Registry>,
}

impl Subscription {
    /// Stop receiving broadcasts. Safe to call repeatedly and from inside the
    /// subscriber's own callback. Returns true on the call that removed it.
    pub fn unsubscribe(&self) -> bool {
        match self.registry.upgrade() {
            Some(registry) => registry.subscribers().remove(&self.id).is_some(),
            None => false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.registry
            .upgrade()
            .is_some_and(|registry| registry.is_registered(self.id))
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

/// Periodically pushes a status map to subscribers.
pub struct StatusPublisher {
    adapters: Vec<Arc<dyn BackendAdapter>>,
    registry: Arc<Registry>,
}

impl StatusPublisher {
    pub fn new(adapters: Vec<Arc<dyn BackendAdapter>>) -> Self {
        Self {
            adapters,
            registry: Arc::new(Registry::default()),
        }
    }

    /// Snapshot every adapter plus the offline pseudo-backend.
    pub fn current_status(&self) -> StatusMap {
        let mut status: StatusMap = self
            .adapters
            .iter()
            .map(|adapter| (adapter.id(), adapter.status()))
            .collect();
        status.insert(BackendId::Offline, HealthStatus::offline());
        status
    }

    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&StatusMap) + Send + Sync + 'static,
    {
        let id = self.registry.next_id.fetch_add(1, Ordering::Relaxed);
        self.registry.subscribers().insert(id, Arc::new(callback));
        tracing::debug!(subscriber = id, "Status subscriber registered");
        Subscription {
            id,
            registry: Arc::downgrade(&self.registry),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.registry.subscribers().len()
    }

    /// Broadcast one snapshot now. Returns the number of callbacks invoked.
    pub fn publish(&self) -> usize {
        let status = self.current_status();
        self.registry.broadcast(&status)
    }

    /// Publish on a fixed period until shutdown.
    pub fn spawn(self: &Arc<Self>, period: Duration, shutdown: broadcast::Receiver<()>) -> RecurringTask {
        let publisher = self.clone();
        RecurringTask::spawn("status-publisher", period, shutdown, move || {
            let delivered = publisher.publish();
            tracing::trace!(delivered, "Status broadcast");
            std::future::ready(Reschedule::Keep)
        })
    }
}

impl std::fmt::Debug for StatusPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusPublisher")
            .field("adapters", &self.adapters.len())
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}
