//! The shared world store.
//!
//! Holds one document per entity. Documents are usually objects but any JSON
//! value is accepted. Every `set`/`merge` notifies the hub with the
//! entity's full post-mutation document while the write lock is still held, so
//! observers see notifications for an entity in the order its mutations were
//! applied and never see a half-written document.

use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::document::{Document, World, empty_document, field_count, insert_field};
use crate::error::WorldError;
use crate::hub::{NotificationHub, Observer};

/// Cloneable handle to the process-wide document store.
#[derive(Clone, Default)]
pub struct WorldStore {
    space: Arc<RwLock<World>>,
    hub: NotificationHub,
}

impl WorldStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The entity's current document, or `{}` if it was never written.
    pub async fn get(&self, entity: &str) -> Document {
        let space = self.space.read().await;
        space.get(entity).cloned().unwrap_or_else(empty_document)
    }

    /// Replace the entity's document wholesale.
    pub async fn set(&self, entity: &str, document: Document) {
        let mut space = self.space.write().await;
        debug!(entity, fields = field_count(&document), "Setting entity");
        space.insert(entity.to_string(), document);
        self.notify_locked(&space, entity).await;
    }

    /// Set one field of the entity's document, creating the entity if needed.
    ///
    /// A stored document that is not an object is replaced by `{key: value}`.
    ///
    /// Observers receive the whole merged document, never the single field.
    pub async fn merge(&self, entity: &str, key: &str, value: Value) {
        let mut space = self.space.write().await;
        debug!(entity, key, "Merging field into entity");
        let document = space.entry(entity.to_string()).or_insert_with(empty_document);
        insert_field(document, key, value);
        self.notify_locked(&space, entity).await;
    }

    /// Merge every field of `fields` in iteration order, one notification each.
    pub async fn merge_all(&self, entity: &str, fields: Map<String, Value>) -> Document {
        for (key, value) in fields {
            self.merge(entity, &key, value).await;
        }
        self.get(entity).await
    }

    /// Remove every entity. Observers are not notified.
    pub async fn clear(&self) {
        let mut space = self.space.write().await;
        let removed = space.len();
        space.clear();
        info!(removed, "World cleared");
    }

    /// Snapshot of every entity.
    pub async fn world(&self) -> World {
        self.space.read().await.clone()
    }

    /// The world snapshot serialized as a JSON object.
    pub async fn world_json(&self) -> Result<String, WorldError> {
        let space = self.space.read().await;
        Ok(serde_json::to_string(&*space)?)
    }

    /// Number of entities currently stored.
    pub async fn len(&self) -> usize {
        self.space.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.space.read().await.is_empty()
    }

    /// The hub observers are registered on.
    pub fn observers(&self) -> &NotificationHub {
        &self.hub
    }

    /// Shorthand for `observers().register(..)`.
    pub async fn add_observer(&self, observer: Arc<dyn Observer>) {
        self.hub.register(observer).await;
    }

    async fn notify_locked(&self, space: &World, entity: &str) {
        if let Some(document) = space.get(entity) {
            self.hub.notify(entity, document).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::single_field;
    use anyhow::Result;
    use serde_json::json;
    use std::sync::Mutex;

    fn recording_store() -> (WorldStore, Arc<Mutex<Vec<(String, Value)>>>) {
        let store = WorldStore::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        (store, seen)
    }

    async fn record(store: &WorldStore, seen: &Arc<Mutex<Vec<(String, Value)>>>) {
        let seen = Arc::clone(seen);
        store
            .add_observer(Arc::new(move |entity: &str, document: &Document| -> Result<()> {
                seen.lock()
                    .unwrap()
                    .push((entity.to_string(), document.clone()));
                Ok(())
            }))
            .await;
    }

    #[tokio::test]
    async fn test_get_unknown_entity_is_empty() {
        let store = WorldStore::new();
        assert_eq!(store.get("ghost").await, json!({}));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_set_replaces_wholesale() {
        let store = WorldStore::new();
        store.set("ball", json!({"x": 1, "y": 2})).await;
        store.set("ball", json!({"z": 3})).await;
        assert_eq!(store.get("ball").await, json!({"z": 3}));
    }

    #[tokio::test]
    async fn test_set_twice_is_idempotent() {
        let store = WorldStore::new();
        store.set("ball", json!({"x": 1})).await;
        store.set("ball", json!({"x": 1})).await;
        assert_eq!(store.len().await, 1);
        assert_eq!(store.get("ball").await, json!({"x": 1}));
    }

    #[tokio::test]
    async fn test_merge_overwrites_one_key() {
        let store = WorldStore::new();
        store.set("ball", json!({"x": 1, "y": 2})).await;
        store.merge("ball", "y", json!(9)).await;
        assert_eq!(store.get("ball").await, json!({"x": 1, "y": 9}));
    }

    #[tokio::test]
    async fn test_set_accepts_any_json_value() {
        let store = WorldStore::new();
        for value in [json!(3), json!(null), json!([1, 2]), json!("paddle")] {
            store.set("ball", value.clone()).await;
            assert_eq!(store.get("ball").await, value);
        }
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_merge_into_scalar_replaces_it() {
        let (store, seen) = recording_store();
        record(&store, &seen).await;

        store.set("ball", json!(3)).await;
        store.merge("ball", "x", json!(1)).await;
        assert_eq!(store.get("ball").await, json!({"x": 1}));
        assert_eq!(seen.lock().unwrap()[1].1, json!({"x": 1}));
    }

    #[tokio::test]
    async fn test_merge_on_absent_entity_equals_set() {
        let merged = WorldStore::new();
        merged.merge("paddle1", "x", json!(5)).await;

        let set = WorldStore::new();
        set.set("paddle1", single_field("x", json!(5))).await;

        assert_eq!(merged.get("paddle1").await, set.get("paddle1").await);
    }

    #[tokio::test]
    async fn test_sequence_matches_left_fold() {
        let store = WorldStore::new();
        store.merge("e", "a", json!(1)).await;
        store.merge("e", "b", json!(2)).await;
        store.set("e", json!({"c": 3})).await;
        store.merge("e", "a", json!(4)).await;
        store.merge("e", "c", json!(null)).await;
        assert_eq!(store.get("e").await, json!({"c": null, "a": 4}));
    }

    #[tokio::test]
    async fn test_merge_notifies_with_full_document() {
        let (store, seen) = recording_store();
        record(&store, &seen).await;

        store.set("ball", json!({"x": 1, "y": 2})).await;
        store.merge("ball", "y", json!(9)).await;

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0], ("ball".to_string(), json!({"x": 1, "y": 2})));
        assert_eq!(seen[1], ("ball".to_string(), json!({"x": 1, "y": 9})));
    }

    #[tokio::test]
    async fn test_merge_all_notifies_per_field() {
        let (store, seen) = recording_store();
        record(&store, &seen).await;

        let fields = json!({"x": 1, "y": 2}).as_object().cloned().unwrap();
        let result = store.merge_all("ball", fields).await;
        assert_eq!(result, json!({"x": 1, "y": 2}));

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[1].1, json!({"x": 1, "y": 2}));
    }

    #[tokio::test]
    async fn test_clear_empties_world_without_notifying() {
        let (store, seen) = recording_store();
        store.set("ball", json!({"x": 1})).await;
        store.set("paddle1", json!({"y": 1})).await;
        record(&store, &seen).await;

        store.clear().await;
        assert!(store.world().await.is_empty());
        assert_eq!(store.world_json().await.unwrap(), "{}");
        assert!(seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failing_observer_keeps_mutation() {
        let store = WorldStore::new();
        store
            .add_observer(Arc::new(|_: &str, _: &Document| -> Result<()> {
                anyhow::bail!("observer down")
            }))
            .await;

        store.set("ball", json!({"x": 1})).await;
        assert_eq!(store.get("ball").await, json!({"x": 1}));
    }

    #[tokio::test]
    async fn test_world_snapshot_json() {
        let store = WorldStore::new();
        store.set("paddle1", json!({"x": 5})).await;
        let json: Value = serde_json::from_str(&store.world_json().await.unwrap()).unwrap();
        assert_eq!(json, json!({"paddle1": {"x": 5}}));
    }

    #[tokio::test]
    async fn test_concurrent_merges_are_not_lost() {
        let store = WorldStore::new();
        let mut handles = Vec::new();
        for i in 0..32 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.merge("counter", &format!("k{i}"), json!(i)).await;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(field_count(&store.get("counter").await), 32);
    }
}
