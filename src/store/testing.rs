//! Store doubles used by unit tests.

use std::sync::{Arc, Mutex};

use futures::future::BoxFuture;
use serde_json::{Map, Value};

use super::{MemoryStore, SharedStore, StoreResult, Subscription};

/// Memory store that records the path of every write it receives.
#[derive(Clone, Default)]
pub(crate) struct RecordingStore {
    inner: MemoryStore,
    writes: Arc<Mutex<Vec<String>>>,
}

impl RecordingStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn write_count(&self) -> usize {
        self.writes.lock().unwrap().len()
    }

    fn record(&self, path: &str) {
        self.writes.lock().unwrap().push(path.to_string());
    }
}

impl SharedStore for RecordingStore {
    fn get(&self, path: &str) -> BoxFuture<'static, StoreResult<Option<Value>>> {
        self.inner.get(path)
    }

    fn subscribe(&self, path: &str) -> BoxFuture<'static, StoreResult<Subscription>> {
        self.inner.subscribe(path)
    }

    fn update(&self, path: &str, fields: Map<String, Value>) -> BoxFuture<'static, StoreResult<()>> {
        self.record(path);
        self.inner.update(path, fields)
    }

    fn set(&self, path: &str, value: Value) -> BoxFuture<'static, StoreResult<()>> {
        self.record(path);
        self.inner.set(path, value)
    }
}
