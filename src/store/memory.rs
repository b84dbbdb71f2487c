//! In-process [`SharedStore`] backed by a JSON tree and watch channels.

use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::{Map, Value};
use tokio::sync::{RwLock, watch};
use tracing::trace;

use super::{SharedStore, StoreResult, Subscription, paths, tree};

/// Shared in-memory document. Cloning yields another handle to the same tree.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<Tree>>,
}

#[derive(Default)]
struct Tree {
    root: Value,
    watchers: Vec<Watcher>,
}

struct Watcher {
    segments: Vec<String>,
    tx: watch::Sender<Option<Value>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Tree {
    /// Apply every write, then notify each affected watcher once.
    fn apply(&mut self, writes: Vec<(Vec<String>, Value)>) {
        let touched: Vec<Vec<String>> = writes.iter().map(|(path, _)| path.clone()).collect();
        for (path, value) in writes {
            tree::write(&mut self.root, &path, value);
        }

        self.watchers.retain(|watcher| !watcher.tx.is_closed());
        for watcher in &self.watchers {
            if !touched
                .iter()
                .any(|path| tree::overlaps(path, &watcher.segments))
            {
                continue;
            }

            let current = tree::lookup(&self.root, &watcher.segments).cloned();
            watcher.tx.send_if_modified(|slot| {
                if *slot == current {
                    false
                } else {
                    *slot = current;
                    true
                }
            });
        }
    }
}

impl SharedStore for MemoryStore {
    fn get(&self, path: &str) -> BoxFuture<'static, StoreResult<Option<Value>>> {
        let inner = self.inner.clone();
        let segments = paths::segments(path);
        Box::pin(async move {
            let segments = segments?;
            let tree = inner.read().await;
            Ok(tree::lookup(&tree.root, &segments).cloned())
        })
    }

    fn subscribe(&self, path: &str) -> BoxFuture<'static, StoreResult<Subscription>> {
        let inner = self.inner.clone();
        let segments = paths::segments(path);
        Box::pin(async move {
            let segments = segments?;
            let mut tree = inner.write().await;
            let current = tree::lookup(&tree.root, &segments).cloned();
            let (tx, rx) = watch::channel(current);
            tree.watchers.push(Watcher { segments, tx });
            Ok(rx)
        })
    }

    fn update(&self, path: &str, fields: Map<String, Value>) -> BoxFuture<'static, StoreResult<()>> {
        let inner = self.inner.clone();
        let base = paths::segments(path);
        let relative: StoreResult<Vec<(Vec<String>, Value)>> = fields
            .into_iter()
            .map(|(key, value)| Ok((paths::segments(&key)?, value)))
            .collect();
        let path = path.to_string();
        Box::pin(async move {
            let base = base?;
            let writes = relative?
                .into_iter()
                .map(|(key, value)| {
                    let mut full = base.clone();
                    full.extend(key);
                    (full, value)
                })
                .collect::<Vec<_>>();
            trace!(%path, fields = writes.len(), "store update");
            inner.write().await.apply(writes);
            Ok(())
        })
    }

    fn set(&self, path: &str, value: Value) -> BoxFuture<'static, StoreResult<()>> {
        let inner = self.inner.clone();
        let segments = paths::segments(path);
        let path = path.to_string();
        Box::pin(async move {
            let segments = segments?;
            trace!(%path, "store set");
            inner.write().await.apply(vec![(segments, value)]);
            Ok(())
        })
    }
}
