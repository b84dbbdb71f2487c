//! Contract of the synchronized document store the whole room runs on.
//!
//! Every participant (host, controllers, game engines) only ever talks to the
//! other participants through this interface: path-scoped subscriptions push
//! the current value and every later change, and writes are blind merges with
//! last-write-wins semantics.

pub mod channel;
pub mod memory;
pub mod paths;
#[cfg(test)]
pub(crate) mod testing;
mod tree;

use futures::future::BoxFuture;
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::sync::watch;

pub use self::memory::MemoryStore;

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Live view over one path of the store.
///
/// Holds the current value and is notified on every change below or above the
/// subscribed path. Intermediate values may be coalesced: readers always see
/// the latest state. Dropping the receiver unsubscribes.
pub type Subscription = watch::Receiver<Option<Value>>;

/// Error raised by store backends.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The path is empty in the middle or contains a reserved character.
    #[error("invalid store path `{0}`")]
    InvalidPath(String),
    /// A typed value could not be encoded into the document format.
    #[error("failed to encode value: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Abstraction over the shared key-value tree.
pub trait SharedStore: Send + Sync {
    /// One-shot read of the value at `path`.
    fn get(&self, path: &str) -> BoxFuture<'static, StoreResult<Option<Value>>>;
    /// Subscribe to `path`; the receiver starts with the current value.
    fn subscribe(&self, path: &str) -> BoxFuture<'static, StoreResult<Subscription>>;
    /// Merge `fields` into `path`. Keys are slash-separated paths relative to
    /// `path`, `null` deletes, and all keys land atomically.
    fn update(&self, path: &str, fields: Map<String, Value>) -> BoxFuture<'static, StoreResult<()>>;
    /// Replace the subtree at `path`; `null` deletes it.
    fn set(&self, path: &str, value: Value) -> BoxFuture<'static, StoreResult<()>>;
}

/// Borrow the value at a slash-separated `path` below `root`.
pub fn value_at<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let segments = paths::segments(path).ok()?;
    tree::lookup(root, &segments)
}

/// Encode a typed value for a store write.
pub fn to_value<T: Serialize + ?Sized>(value: &T) -> StoreResult<Value> {
    Ok(serde_json::to_value(value)?)
}
