//! In-memory, write-through cache of world objects.
//!
//! Grounded on `wrldbldr-engine-adapters/src/infrastructure/
//! world_state_manager.rs`'s `DashMap`-backed per-key state, generalized
//! from per-world runtime state to per-object cached documents.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::{DashMap, DashSet};
use gaia_domain::{GValue, Object, ObjectId, Revision};
use gaia_ports::{StoreError, WorldStorePort};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, warn};

/// Default write-back period.
pub const DEFAULT_WRITE_BACK_INTERVAL: Duration = Duration::from_secs(60);

/// Default dirty-count threshold that forces an out-of-cycle write-back.
pub const DEFAULT_DIRTY_THRESHOLD: usize = 200;

pub struct WorldCache {
    objects: DashMap<ObjectId, Object>,
    dirty: DashSet<ObjectId>,
    /// Guards the write-back pass itself so two workers never race a flush.
    write_back_lock: AsyncMutex<()>,
    /// Per-object write lock; held briefly around `set_attr`'s
    /// read-modify-write so concurrent writers to the same `(object, name)`
    /// serialize rather than interleave.
    object_locks: DashMap<ObjectId, Arc<AsyncMutex<()>>>,
    store: Arc<dyn WorldStorePort>,
    dirty_threshold: AtomicUsize,
}

impl WorldCache {
    pub fn new(store: Arc<dyn WorldStorePort>) -> Self {
        Self {
            objects: DashMap::new(),
            dirty: DashSet::new(),
            write_back_lock: AsyncMutex::new(()),
            object_locks: DashMap::new(),
            store,
            dirty_threshold: AtomicUsize::new(DEFAULT_DIRTY_THRESHOLD),
        }
    }

    pub fn with_dirty_threshold(self, threshold: usize) -> Self {
        self.dirty_threshold.store(threshold, Ordering::Relaxed);
        self
    }

    /// Returns the cached copy if present, otherwise fetches from the
    /// store, installs it, and returns it.
    pub async fn get(&self, id: &ObjectId) -> Result<Object, StoreError> {
        if let Some(obj) = self.objects.get(id) {
            return Ok(obj.clone());
        }
        let fetched = self.store.fetch(id).await?;
        self.objects.insert(id.clone(), fetched.clone());
        Ok(fetched)
    }

    /// Updates the cache unconditionally and marks the object dirty;
    /// write-back happens on the periodic schedule or once the dirty count
    /// crosses the configured threshold.
    pub fn put(&self, object: Object) {
        let id = object.id.clone();
        self.objects.insert(id.clone(), object);
        self.dirty.insert(id);
    }

    pub async fn delete(&self, id: &ObjectId) -> Result<(), StoreError> {
        let prior_revision = self.objects.get(id).and_then(|o| o.revision.clone());
        self.store.delete_by_id(id, prior_revision.as_ref()).await?;
        self.objects.remove(id);
        self.dirty.remove(id);
        Ok(())
    }

    /// Evicts a cache-only object (the transient per-session user) without
    /// touching the store.
    pub fn evict_local(&self, id: &ObjectId) {
        self.objects.remove(id);
        self.dirty.remove(id);
    }

    pub fn should_flush(&self) -> bool {
        self.dirty.len() >= self.dirty_threshold.load(Ordering::Relaxed)
    }

    /// Returns every object with its own `attribute` set: the union of
    /// objects the store's `index` already knows about and objects resident
    /// in the cache only (just created, loaded from a world file, or edited
    /// at runtime and not yet flushed). Store-only hits are installed into
    /// the cache so the next lookup is local; a cache-resident copy always
    /// wins over the store's possibly-stale one. Lets callers like
    /// `TickScheduler` enumerate against the cache — the authoritative view
    /// of live object state — instead of the store directly.
    pub async fn list_with_own_attribute(&self, index: &str, attribute: &str) -> Result<Vec<Object>, StoreError> {
        let persisted = self.store.list_by_index(index, "true").await?;
        for object in persisted {
            self.objects.entry(object.id.clone()).or_insert(object);
        }
        Ok(self
            .objects
            .iter()
            .filter(|entry| entry.value().attributes.contains_key(attribute))
            .map(|entry| entry.value().clone())
            .collect())
    }

    /// Inheritance-resolved attribute read: breadth-first over the object
    /// and its parents, left to right, first definition wins. A visited set
    /// makes diamond inheritance safe and the first visit definitive.
    /// Returns `Ok(None)` for "absent" (distinct from a stored `Null`).
    pub async fn get_attribute(&self, id: &ObjectId, name: &str) -> Result<Option<GValue>, StoreError> {
        let mut visited = HashSet::new();
        let mut queue = VecDeque::new();
        queue.push_back(id.clone());
        visited.insert(id.clone());

        while let Some(current) = queue.pop_front() {
            let object = self.get(&current).await?;
            if let Some(value) = object.attributes.get(name) {
                return Ok(Some(value.clone()));
            }
            for parent in &object.parents {
                if visited.insert(parent.clone()) {
                    queue.push_back(parent.clone());
                }
            }
        }
        Ok(None)
    }

    /// Writes directly on `id`, never its parents, serialized per-object so
    /// concurrent writers to the same `(object, name)` don't interleave.
    pub async fn set_attribute(&self, id: &ObjectId, name: &str, value: GValue) -> Result<(), StoreError> {
        let lock = self.object_lock(id);
        let _guard = lock.lock().await;
        let mut object = self.get(id).await?;
        object.set_attribute(name, value);
        self.put(object);
        Ok(())
    }

    fn object_lock(&self, id: &ObjectId) -> Arc<AsyncMutex<()>> {
        self.object_locks
            .entry(id.clone())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    /// Flushes every dirty object to the store, retrying a revision
    /// conflict once by refetching and re-applying before surfacing a
    /// `StoreConflict`-shaped failure.
    pub async fn flush(&self) {
        let _guard = self.write_back_lock.lock().await;
        let dirty_ids: Vec<ObjectId> = self.dirty.iter().map(|e| e.key().clone()).collect();
        for id in dirty_ids {
            let Some(object) = self.objects.get(&id).map(|o| o.clone()) else {
                self.dirty.remove(&id);
                continue;
            };
            match self.store.store(&object, object.revision.as_ref()).await {
                Ok(new_revision) => {
                    if let Some(mut entry) = self.objects.get_mut(&id) {
                        entry.revision = Some(new_revision);
                    }
                    self.dirty.remove(&id);
                }
                Err(StoreError::RevisionConflict { .. }) => {
                    warn!(object = %id, "revision conflict on write-back, retrying once");
                    match self.store.store(&object, None).await {
                        Ok(new_revision) => {
                            if let Some(mut entry) = self.objects.get_mut(&id) {
                                entry.revision = Some(new_revision);
                            }
                            self.dirty.remove(&id);
                        }
                        Err(err) => warn!(object = %id, error = %err, "write-back retry failed, leaving dirty"),
                    }
                }
                Err(err) => {
                    debug!(object = %id, error = %err, "write-back failed, leaving dirty for next cycle");
                }
            }
        }
    }

    /// Runs forever, flushing on a fixed `interval` and also immediately
    /// whenever `should_flush` reports the dirty count has crossed the
    /// configured threshold between ticks. Intended to be driven from a
    /// `tokio::spawn`'d task joined via `tokio::select!` in the composition
    /// root's run loop, the same shape as `TickScheduler::run`.
    pub async fn run_write_back(&self, interval: Duration) {
        let poll = Duration::from_secs(1).min(interval);
        let mut since_last_flush = Duration::ZERO;
        loop {
            tokio::time::sleep(poll).await;
            since_last_flush += poll;
            if self.should_flush() || since_last_flush >= interval {
                self.flush().await;
                since_last_flush = Duration::ZERO;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct FakeStore {
        objects: Mutex<HashMap<ObjectId, Object>>,
    }

    #[async_trait]
    impl WorldStorePort for FakeStore {
        async fn fetch(&self, id: &ObjectId) -> Result<Object, StoreError> {
            self.objects
                .lock()
                .unwrap()
                .get(id)
                .cloned()
                .ok_or_else(|| StoreError::NotFound {
                    entity: "object",
                    id: id.to_string(),
                })
        }

        async fn store(&self, object: &Object, _prior: Option<&Revision>) -> Result<Revision, StoreError> {
            let revision = Revision::new("1");
            let mut stored = object.clone();
            stored.revision = Some(revision.clone());
            self.objects.lock().unwrap().insert(object.id.clone(), stored);
            Ok(revision)
        }

        async fn delete_by_id(&self, id: &ObjectId, _prior: Option<&Revision>) -> Result<(), StoreError> {
            self.objects.lock().unwrap().remove(id);
            Ok(())
        }

        async fn list_by_index(&self, _name: &str, _key: &str) -> Result<Vec<Object>, StoreError> {
            Ok(self.objects.lock().unwrap().values().cloned().collect())
        }
    }

    fn cache_with(objects: Vec<Object>) -> WorldCache {
        let mut map = HashMap::new();
        for obj in objects {
            map.insert(obj.id.clone(), obj);
        }
        let store = Arc::new(FakeStore {
            objects: Mutex::new(map),
        });
        WorldCache::new(store)
    }

    fn object(id: &str, parents: Vec<&str>) -> Object {
        Object::new(ObjectId::new(id), id).with_parents(parents.into_iter().map(ObjectId::new).collect())
    }

    #[tokio::test]
    async fn inheritance_resolution_follows_bfs_scenario_from_spec() {
        let mut d = object("#d", vec![]);
        d.set_attribute("color", GValue::string("red"));
        let b = object("#b", vec!["#d"]);
        let c = object("#c", vec!["#d"]);
        let a = object("#a", vec!["#b", "#c"]);
        let cache = cache_with(vec![a, b, c, d]);

        let resolved = cache.get_attribute(&ObjectId::new("#a"), "color").await.unwrap();
        assert_eq!(resolved, Some(GValue::string("red")));
    }

    #[tokio::test]
    async fn closer_ancestor_in_bfs_order_wins_over_farther_one() {
        let d = object("#d", vec![]);
        let b = object("#b", vec!["#d"]);
        let mut c = object("#c", vec!["#d"]);
        c.set_attribute("color", GValue::string("blue"));
        let a = object("#a", vec!["#b", "#c"]);
        let cache = cache_with(vec![a, b, c, d]);

        let resolved = cache.get_attribute(&ObjectId::new("#a"), "color").await.unwrap();
        assert_eq!(resolved, Some(GValue::string("blue")));
    }

    #[tokio::test]
    async fn absent_attribute_differs_from_stored_null() {
        let mut room = object("#room", vec![]);
        room.set_attribute("notes", GValue::Null);
        let cache = cache_with(vec![room]);

        assert_eq!(
            cache.get_attribute(&ObjectId::new("#room"), "notes").await.unwrap(),
            Some(GValue::Null)
        );
        assert_eq!(
            cache.get_attribute(&ObjectId::new("#room"), "missing").await.unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn diamond_inheritance_does_not_loop() {
        let d = object("#d", vec!["#a"]); // deliberately cyclic-looking via shared ancestor chain
        let b = object("#b", vec!["#d"]);
        let c = object("#c", vec!["#d"]);
        let a = object("#a", vec!["#b", "#c"]);
        let cache = cache_with(vec![a, b, c, d]);

        let resolved = cache.get_attribute(&ObjectId::new("#a"), "nonexistent").await.unwrap();
        assert_eq!(resolved, None);
    }

    #[tokio::test]
    async fn set_then_get_within_one_call_sees_the_write() {
        let room = object("#room", vec![]);
        let cache = cache_with(vec![room]);
        cache
            .set_attribute(&ObjectId::new("#room"), "color", GValue::string("green"))
            .await
            .unwrap();
        let resolved = cache.get_attribute(&ObjectId::new("#room"), "color").await.unwrap();
        assert_eq!(resolved, Some(GValue::string("green")));
    }

    #[tokio::test]
    async fn put_marks_dirty_until_flush() {
        let cache = cache_with(vec![]);
        cache.put(object("#x", vec![]));
        assert!(cache.dirty.contains(&ObjectId::new("#x")));
        cache.flush().await;
        assert!(!cache.dirty.contains(&ObjectId::new("#x")));
    }
}
