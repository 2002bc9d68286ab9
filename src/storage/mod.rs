//! Key-value storage and the cross-tab channel built on it.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐      ┌──────────────────┐
//! │  KeyValueStore   │◀─────│   ChannelHub     │  in-process "origin"
//! │  (MemoryStore,   │      │   └ TabChannel   │  one per tab
//! │   FileStore)     │◀─────│   FileChannel    │  across processes
//! └──────────────────┘      └──────────────────┘
//! ```
//!
//! A persistent store plays the role of origin-wide storage (credential
//! token, broadcast record); a second store plays the page-scoped transient
//! store cleared on logout.

mod channel;
mod error;
mod file;
mod memory;

pub use channel::{
    ChangeHandler, ChannelHub, CrossTabChannel, FileChannel, StorageChange, SubscriptionId,
    TabChannel, TabId, DEFAULT_POLL_INTERVAL,
};
pub use error::StorageError;
pub use file::FileStore;
pub use memory::MemoryStore;

/// String key-value store with browser `Storage` semantics.
pub trait KeyValueStore: Send + Sync {
    /// Returns the value stored under `key`.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Stores `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Removes `key`. Removing a missing key succeeds.
    fn remove(&self, key: &str) -> Result<(), StorageError>;

    /// Removes every key.
    fn clear(&self) -> Result<(), StorageError>;
}
