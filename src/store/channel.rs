//! One-shot event channels: producers append uniquely keyed entries, a single
//! consumer acts on each key and deletes it.

use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use super::{SharedStore, StoreResult, paths, to_value};

/// Room-scoped channels carrying fire-and-forget signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventChannel {
    /// Emoji reactions, consumed by the host display.
    Reactions,
    /// Attack/heal actions, consumed by the boss engine.
    BossActions,
    /// Beat taps, consumed by the rhythm engine.
    RhythmHits,
}

impl EventChannel {
    /// Field name of the channel inside the room document.
    pub fn key(self) -> &'static str {
        match self {
            EventChannel::Reactions => "reactions",
            EventChannel::BossActions => "bossActions",
            EventChannel::RhythmHits => "rhythmHits",
        }
    }

    /// Path of one event, relative to the room document.
    pub fn entry(self, event_id: &str) -> String {
        format!("{}/{event_id}", self.key())
    }
}

/// Build a fresh event key. The millisecond prefix keeps keys roughly time ordered.
pub fn new_event_id(now_ms: i64) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{now_ms:013}-{}", &suffix[..8])
}

/// Append `payload` to `channel`, returning the generated key.
pub async fn push<T: Serialize>(
    store: &dyn SharedStore,
    code: &str,
    channel: EventChannel,
    payload: &T,
    now_ms: i64,
) -> StoreResult<String> {
    let event_id = new_event_id(now_ms);
    let path = format!("{}/{}", paths::room(code), channel.entry(&event_id));
    store.set(&path, to_value(payload)?).await?;
    Ok(event_id)
}

/// Delete a consumed event.
pub async fn consume(
    store: &dyn SharedStore,
    code: &str,
    channel: EventChannel,
    event_id: &str,
) -> StoreResult<()> {
    let path = format!("{}/{}", paths::room(code), channel.entry(event_id));
    store.set(&path, Value::Null).await
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn concurrent_pushes_coexist_until_consumed() {
        let store = MemoryStore::new();
        let first = push(&store, "ABCD", EventChannel::Reactions, &json!({"emoji": "🎉"}), 1)
            .await
            .unwrap();
        let second = push(&store, "ABCD", EventChannel::Reactions, &json!({"emoji": "🔥"}), 1)
            .await
            .unwrap();
        assert_ne!(first, second);

        let pending = store.get("rooms/ABCD/reactions").await.unwrap().unwrap();
        assert_eq!(pending.as_object().unwrap().len(), 2);

        consume(&store, "ABCD", EventChannel::Reactions, &first)
            .await
            .unwrap();
        let pending = store.get("rooms/ABCD/reactions").await.unwrap().unwrap();
        assert!(pending.get(&first).is_none());
        assert!(pending.get(&second).is_some());
    }
}
