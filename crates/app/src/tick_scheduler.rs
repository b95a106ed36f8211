//! Periodic driver for `on_tick` attributes.
//!
//! Only objects with their *own* `on_tick` attribute are scheduled —
//! inherited `on_tick` does not auto-schedule, keeping tick cost
//! proportional to the number of objects that actually opted in.

use std::sync::Arc;
use std::time::Duration;

use gaia_glang::interpreter::EvalContext;
use gaia_glang::{parse, Host, Signal};
use tracing::warn;

use crate::world_cache::WorldCache;

/// Default tick period.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(1);

/// The index name the store is expected to maintain: objects whose own
/// attribute map contains `on_tick`. `gaia-adapters`'s document store keeps
/// this current on every `store()` call. Used only to seed the cache with
/// objects it hasn't been asked for yet — the sweep itself enumerates the
/// cache, not the store.
pub const ON_TICK_INDEX: &str = "has_attribute:on_tick";

pub struct TickScheduler {
    cache: Arc<WorldCache>,
    host: Arc<dyn Host>,
    interval: Duration,
}

impl TickScheduler {
    pub fn new(cache: Arc<WorldCache>, host: Arc<dyn Host>) -> Self {
        Self {
            cache,
            host,
            interval: DEFAULT_TICK_INTERVAL,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Runs forever, firing one tick sweep per `interval`. Intended to be
    /// driven from a `tokio::spawn`'d task joined via `tokio::select!` in
    /// the composition root's run loop.
    pub async fn run(&self) {
        let mut ticker = tokio::time::interval(self.interval);
        loop {
            ticker.tick().await;
            self.sweep().await;
        }
    }

    async fn sweep(&self) {
        let objects = match self.cache.list_with_own_attribute(ON_TICK_INDEX, "on_tick").await {
            Ok(objects) => objects,
            Err(err) => {
                warn!(error = %err, "tick sweep could not list on_tick objects");
                return;
            }
        };

        for object in objects {
            let Some(source) = object.attributes.get("on_tick").map(|v| v.to_gstring()) else {
                continue;
            };
            let node = match parse(&source) {
                Ok(node) => node,
                Err(err) => {
                    warn!(object = %object.id, error = %err, "on_tick parse failure");
                    continue;
                }
            };
            let mut ctx = EvalContext::top_level(object.id.clone(), object.id.clone(), object.id.clone());
            match gaia_glang::eval(&node, &mut ctx, self.host.as_ref()).await {
                Ok(_) | Err(Signal::Return(_)) => {}
                Err(Signal::Error(err)) => {
                    warn!(object = %object.id, error = %err, "on_tick invocation failed");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use gaia_domain::{GValue, Object, ObjectId};
    use gaia_glang::GError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingHost(AtomicUsize);

    #[async_trait]
    impl Host for CountingHost {
        async fn get_attr(&self, _: &ObjectId, _: &str) -> Result<Option<GValue>, GError> {
            Ok(None)
        }
        async fn set_attr(&self, _: &ObjectId, _: &str, _: GValue) -> Result<(), GError> {
            Ok(())
        }
        async fn get_object(&self, reference: &str, ctx: &EvalContext) -> Result<ObjectId, GError> {
            let _ = ctx;
            Ok(ObjectId::new(reference))
        }
        async fn send(&self, _: &ObjectId, _: GValue) -> Result<(), GError> {
            Ok(())
        }
        fn log(&self, _message: &str) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
        async fn load(&self, _: &str, _: &ObjectId, _: &str, _: &EvalContext) -> Result<(), GError> {
            Ok(())
        }
        async fn actor_has_role(&self, _: &ObjectId, _: &str) -> Result<bool, GError> {
            Ok(false)
        }
    }

    struct FakeStore(Vec<Object>);

    #[async_trait]
    impl WorldStorePort for FakeStore {
        async fn fetch(&self, id: &ObjectId) -> Result<Object, gaia_ports::StoreError> {
            self.0
                .iter()
                .find(|o| &o.id == id)
                .cloned()
                .ok_or_else(|| gaia_ports::StoreError::NotFound {
                    entity: "object",
                    id: id.to_string(),
                })
        }
        async fn store(&self, _: &Object, _: Option<&gaia_domain::Revision>) -> Result<gaia_domain::Revision, gaia_ports::StoreError> {
            Ok(gaia_domain::Revision::new("1"))
        }
        async fn delete_by_id(&self, _: &ObjectId, _: Option<&gaia_domain::Revision>) -> Result<(), gaia_ports::StoreError> {
            Ok(())
        }
        async fn list_by_index(&self, _name: &str, _key: &str) -> Result<Vec<Object>, gaia_ports::StoreError> {
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn sweep_invokes_on_tick_for_every_indexed_object() {
        let mut obj = Object::new(ObjectId::new("#clock"), "a clock");
        obj.set_attribute("on_tick", GValue::Source("[log \"tick\"]".into()));
        let cache = Arc::new(WorldCache::new(Arc::new(FakeStore(vec![obj]))));
        let host = Arc::new(CountingHost(AtomicUsize::new(0)));
        let scheduler = TickScheduler::new(cache, host.clone());
        scheduler.sweep().await;
        assert_eq!(host.0.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn sweep_continues_past_a_failing_object() {
        let mut broken = Object::new(ObjectId::new("#broken"), "broken");
        broken.set_attribute("on_tick", GValue::Source("[unknown_fn]".into()));
        let mut ok = Object::new(ObjectId::new("#ok"), "ok");
        ok.set_attribute("on_tick", GValue::Source("[log \"fine\"]".into()));
        let cache = Arc::new(WorldCache::new(Arc::new(FakeStore(vec![broken, ok]))));
        let host = Arc::new(CountingHost(AtomicUsize::new(0)));
        let scheduler = TickScheduler::new(cache, host.clone());
        scheduler.sweep().await;
        assert_eq!(host.0.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn sweep_fires_for_a_cache_only_object_never_persisted() {
        let cache = Arc::new(WorldCache::new(Arc::new(FakeStore(vec![]))));
        let mut obj = Object::new(ObjectId::new("#runtime"), "a runtime object");
        obj.set_attribute("on_tick", GValue::Source("[log \"tick\"]".into()));
        cache.put(obj);
        let host = Arc::new(CountingHost(AtomicUsize::new(0)));
        let scheduler = TickScheduler::new(cache, host.clone());
        scheduler.sweep().await;
        assert_eq!(host.0.load(Ordering::SeqCst), 1);
    }
}
