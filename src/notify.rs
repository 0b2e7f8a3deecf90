//! Notification channel for transient user-facing messages.
//!
//! DESIGN
//! ======
//! Notifications are kept in insertion order. Each one may own a single
//! auto-dismiss timer: a spawned task that sleeps for the configured TTL and
//! then removes the notification. The task's `AbortHandle` is stored with
//! the entry, so `dismiss` aborts the timer in the same critical section that
//! removes the entry. Removal is keyed by a never-reused UUID, so a timer
//! that already woke up finds nothing to remove and does nothing.
//!
//! Timers hold only a `Weak` reference to the queue; dropping the last
//! `NotificationCenter` lets pending timers finish as no-ops.

use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::Serialize;
use tokio::sync::broadcast;
use tokio::task::AbortHandle;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::ErrorCode;

const EVENT_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Success,
    Error,
    Info,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub id: Uuid,
    pub kind: NotificationKind,
    pub message: String,
    /// Milliseconds since the Unix epoch.
    pub created_at: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DismissReason {
    Manual,
    Expired,
    Cleared,
}

/// Change feed for views that render the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationEvent {
    Shown(Notification),
    Dismissed { id: Uuid, reason: DismissReason },
}

struct Entry {
    notification: Notification,
    timer: Option<AbortHandle>,
}

#[derive(Default)]
struct Queue {
    entries: Vec<Entry>,
}

/// Process-wide notification queue. Clones share the same queue.
#[derive(Clone)]
pub struct NotificationCenter {
    queue: Arc<Mutex<Queue>>,
    events: broadcast::Sender<NotificationEvent>,
    ttl: Duration,
}

impl NotificationCenter {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { queue: Arc::new(Mutex::new(Queue::default())), events, ttl }
    }

    /// Push a notification that auto-dismisses after the default TTL.
    pub fn push(&self, kind: NotificationKind, message: impl Into<String>) -> Uuid {
        self.push_with(kind, message, Some(self.ttl))
    }

    /// Push a notification with an explicit lifetime; `None` keeps it until dismissed.
    ///
    /// Auto-dismissal needs a tokio runtime. Outside one the notification is
    /// kept until dismissed.
    pub fn push_with(&self, kind: NotificationKind, message: impl Into<String>, ttl: Option<Duration>) -> Uuid {
        let notification = Notification { id: Uuid::new_v4(), kind, message: message.into(), created_at: now_ms() };
        let id = notification.id;

        let mut queue = lock(&self.queue);
        let timer = ttl.and_then(|ttl| self.spawn_timer(id, ttl));
        queue.entries.push(Entry { notification: notification.clone(), timer });
        drop(queue);

        debug!(%id, ?kind, "notification shown");
        let _ = self.events.send(NotificationEvent::Shown(notification));
        id
    }

    pub fn success(&self, message: impl Into<String>) -> Uuid {
        self.push(NotificationKind::Success, message)
    }

    pub fn error(&self, message: impl Into<String>) -> Uuid {
        self.push(NotificationKind::Error, message)
    }

    pub fn info(&self, message: impl Into<String>) -> Uuid {
        self.push(NotificationKind::Info, message)
    }

    pub fn warning(&self, message: impl Into<String>) -> Uuid {
        self.push(NotificationKind::Warning, message)
    }

    /// Push an error notification carrying the error's user-facing message.
    pub fn error_from(&self, err: &(impl ErrorCode + ?Sized)) -> Uuid {
        self.error(err.user_message())
    }

    /// Remove a notification and cancel its timer. Returns `false` if it was
    /// already gone.
    pub fn dismiss(&self, id: Uuid) -> bool {
        remove(&self.queue, &self.events, id, DismissReason::Manual)
    }

    /// Dismiss everything, cancelling all timers.
    pub fn clear(&self) {
        let drained = std::mem::take(&mut lock(&self.queue).entries);
        for entry in drained {
            if let Some(timer) = entry.timer {
                timer.abort();
            }
            let _ = self
                .events
                .send(NotificationEvent::Dismissed { id: entry.notification.id, reason: DismissReason::Cleared });
        }
    }

    /// Snapshot in insertion order.
    #[must_use]
    pub fn list(&self) -> Vec<Notification> {
        lock(&self.queue)
            .entries
            .iter()
            .map(|e| e.notification.clone())
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        lock(&self.queue).entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<NotificationEvent> {
        self.events.subscribe()
    }

    fn spawn_timer(&self, id: Uuid, ttl: Duration) -> Option<AbortHandle> {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(%id, "no tokio runtime; notification will not auto-dismiss");
            return None;
        };
        let queue: Weak<Mutex<Queue>> = Arc::downgrade(&self.queue);
        let events = self.events.clone();
        let task = runtime.spawn(async move {
            tokio::time::sleep(ttl).await;
            if let Some(queue) = queue.upgrade() {
                remove(&queue, &events, id, DismissReason::Expired);
            }
        });
        Some(task.abort_handle())
    }
}

fn remove(
    queue: &Mutex<Queue>,
    events: &broadcast::Sender<NotificationEvent>,
    id: Uuid,
    reason: DismissReason,
) -> bool {
    let mut queue = lock(queue);
    let Some(pos) = queue.entries.iter().position(|e| e.notification.id == id) else {
        return false;
    };
    let entry = queue.entries.remove(pos);
    drop(queue);

    if let Some(timer) = entry.timer {
        timer.abort();
    }
    debug!(%id, ?reason, "notification dismissed");
    let _ = events.send(NotificationEvent::Dismissed { id, reason });
    true
}

fn lock(queue: &Mutex<Queue>) -> MutexGuard<'_, Queue> {
    queue.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

pub(crate) fn now_ms() -> i64 {
    let Ok(dur) = SystemTime::now().duration_since(UNIX_EPOCH) else {
        return 0;
    };
    i64::try_from(dur.as_millis()).unwrap_or(0)
}

#[cfg(test)]
#[path = "notify_test.rs"]
mod tests;
