//! Cross-tab change notification channel.
//!
//! Models origin-wide storage with change events: a write from one tab is
//! announced to every *other* tab subscribed to that key. The publisher
//! never hears its own write, and rewriting an identical value produces no
//! event (tabs observe transitions, not content).

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::AbortHandle;
use tracing::{debug, trace, warn};
use uuid::Uuid;

use super::{FileStore, KeyValueStore, MemoryStore, StorageError};

/// Default polling period of [`FileChannel`].
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);

// ============================================================================
// Types
// ============================================================================

/// Identifies one tab on a shared channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TabId(Uuid);

impl TabId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TabId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A change observed on the shared store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageChange {
    pub key: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
}

/// Callback invoked for each observed change.
pub type ChangeHandler = Arc<dyn Fn(&StorageChange) + Send + Sync>;

/// Token returned by [`CrossTabChannel::on_change`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    pub(crate) fn from_raw(raw: u64) -> Self {
        Self(raw)
    }
}

/// Publish/subscribe view of origin-wide storage for one tab.
pub trait CrossTabChannel: Send + Sync {
    /// Writes `value` under `key` and notifies the other tabs.
    fn publish(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Reads the current value of `key`.
    fn read(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Calls `handler` whenever another tab changes `key`.
    fn on_change(&self, key: &str, handler: ChangeHandler) -> SubscriptionId;

    /// Cancels a subscription. Returns false if it was unknown.
    fn unsubscribe(&self, id: SubscriptionId) -> bool;
}

// ============================================================================
// ChannelHub / TabChannel
// ============================================================================

struct Subscriber {
    id: SubscriptionId,
    tab: TabId,
    key: String,
    handler: ChangeHandler,
}

/// In-process origin shared by several [`TabChannel`]s.
///
/// Notifications are delivered synchronously, on the publisher's thread,
/// after the write has completed.
pub struct ChannelHub {
    store: Arc<dyn KeyValueStore>,
    subscribers: Mutex<Vec<Subscriber>>,
    next_id: AtomicU64,
}

impl ChannelHub {
    /// Creates a hub over `store`.
    pub fn new(store: Arc<dyn KeyValueStore>) -> Arc<Self> {
        Arc::new(Self {
            store,
            subscribers: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        })
    }

    /// Creates a hub over a fresh [`MemoryStore`].
    pub fn in_memory() -> Arc<Self> {
        Self::new(Arc::new(MemoryStore::new()))
    }

    /// Opens a new tab on this hub.
    pub fn open_tab(self: &Arc<Self>) -> TabChannel {
        TabChannel {
            id: TabId::new(),
            hub: self.clone(),
        }
    }

    /// The backing store shared by every tab.
    pub fn store(&self) -> Arc<dyn KeyValueStore> {
        self.store.clone()
    }

    /// Number of live subscriptions across all tabs.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }

    fn publish_from(&self, origin: TabId, key: &str, value: &str) -> Result<(), StorageError> {
        // A failed read only loses the old value; the write still decides.
        let old_value = self.store.get(key).unwrap_or_default();
        self.store.set(key, value)?;

        if old_value.as_deref() == Some(value) {
            trace!(key, "value unchanged, no change event");
            return Ok(());
        }

        let change = StorageChange {
            key: key.to_string(),
            old_value,
            new_value: Some(value.to_string()),
        };
        let handlers: Vec<ChangeHandler> = self
            .subscribers
            .lock()
            .iter()
            .filter(|s| s.tab != origin && s.key == key)
            .map(|s| s.handler.clone())
            .collect();

        debug!(key, %origin, listeners = handlers.len(), "broadcasting change");
        for handler in handlers {
            handler(&change);
        }
        Ok(())
    }

    fn subscribe(&self, tab: TabId, key: &str, handler: ChangeHandler) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.subscribers.lock().push(Subscriber {
            id,
            tab,
            key: key.to_string(),
            handler,
        });
        id
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.subscribers.lock();
        let before = subscribers.len();
        subscribers.retain(|s| s.id != id);
        subscribers.len() != before
    }
}

impl fmt::Debug for ChannelHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelHub")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

/// One tab's handle on a [`ChannelHub`].
#[derive(Debug, Clone)]
pub struct TabChannel {
    id: TabId,
    hub: Arc<ChannelHub>,
}

impl TabChannel {
    /// Identifier of this tab.
    pub fn id(&self) -> TabId {
        self.id
    }
}

impl CrossTabChannel for TabChannel {
    fn publish(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.hub.publish_from(self.id, key, value)
    }

    fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.hub.store.get(key)
    }

    fn on_change(&self, key: &str, handler: ChangeHandler) -> SubscriptionId {
        self.hub.subscribe(self.id, key, handler)
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.hub.unsubscribe(id)
    }
}

// ============================================================================
// FileChannel
// ============================================================================

/// Channel shared between processes through a [`FileStore`].
///
/// Each subscription runs a tokio task that polls the key and reports
/// transitions that were not caused by this channel's own writes.
/// Subscribing requires a running tokio runtime.
pub struct FileChannel {
    store: Arc<FileStore>,
    poll_interval: Duration,
    own_writes: Arc<Mutex<HashMap<String, String>>>,
    pollers: Mutex<HashMap<SubscriptionId, AbortHandle>>,
    next_id: AtomicU64,
}

impl FileChannel {
    pub fn new(store: Arc<FileStore>) -> Self {
        Self {
            store,
            poll_interval: DEFAULT_POLL_INTERVAL,
            own_writes: Arc::new(Mutex::new(HashMap::new())),
            pollers: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Sets how often subscriptions poll the file.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.pollers.lock().len()
    }
}

impl fmt::Debug for FileChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileChannel")
            .field("path", &self.store.path())
            .field("poll_interval", &self.poll_interval)
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

impl CrossTabChannel for FileChannel {
    fn publish(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.own_writes
            .lock()
            .insert(key.to_string(), value.to_string());
        self.store.set(key, value)
    }

    fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.store.get(key)
    }

    fn on_change(&self, key: &str, handler: ChangeHandler) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let store = self.store.clone();
        let own_writes = self.own_writes.clone();
        let key = key.to_string();
        let period = self.poll_interval;

        let task = tokio::spawn(async move {
            let mut last_seen = store.get(&key).unwrap_or_else(|e| {
                warn!(key = %key, error = %e, "initial channel read failed");
                None
            });
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                ticker.tick().await;
                let current = match store.get(&key) {
                    Ok(value) => value,
                    Err(e) => {
                        warn!(key = %key, error = %e, "channel poll failed");
                        continue;
                    }
                };
                if current == last_seen {
                    continue;
                }
                let ours = own_writes.lock().get(&key).cloned();
                let change = StorageChange {
                    key: key.clone(),
                    old_value: last_seen.take(),
                    new_value: current.clone(),
                };
                last_seen = current;
                if change.new_value.is_some() && change.new_value == ours {
                    trace!(key = %key, "ignoring own write");
                    continue;
                }
                debug!(key = %key, "observed change from another process");
                handler(&change);
            }
        });

        self.pollers.lock().insert(id, task.abort_handle());
        id
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        match self.pollers.lock().remove(&id) {
            Some(abort) => {
                abort.abort();
                true
            }
            None => false,
        }
    }
}

impl Drop for FileChannel {
    fn drop(&mut self) {
        for (_, abort) in self.pollers.lock().drain() {
            abort.abort();
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
