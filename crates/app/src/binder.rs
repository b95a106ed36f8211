//! Resolves a recognition to where its handler lives, and constructs the
//! interpreter context for Game-mode commands.

use gaia_domain::ObjectId;

use crate::recognizer::{Mode, Recognition, SynonymTable};
use crate::world_cache::WorldCache;

/// The id of the engine-wide command dispatch object, searched last in the
/// Game-mode attribute lookup chain.
pub const GLOBAL_COMMANDS_OBJECT: &str = "#commands";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindResult {
    /// User/Admin mode: a fixed in-engine handler, named by the verb
    /// (login/quit/who/commands/shutdown/create/password/roles/reload/...).
    EngineHandler { verb: String, args: String },
    /// Game mode: invoke `attr` on `executor`, with `this` = `executor`.
    GameInvocation {
        executor: ObjectId,
        attr: String,
        args: String,
    },
    /// No object in the search chain defines `cmd_<verb>` (or no in-engine
    /// handler matches the verb).
    NotFound,
}

pub struct Binder<'a> {
    cache: &'a WorldCache,
    synonyms: &'a SynonymTable,
}

impl<'a> Binder<'a> {
    pub fn new(cache: &'a WorldCache, synonyms: &'a SynonymTable) -> Self {
        Self { cache, synonyms }
    }

    /// `actor` is the character (or transient user) driving the command;
    /// `location` its current room; `transient_user` the session-scoped
    /// unembodied-user object, if this session has not embodied a
    /// character.
    pub async fn bind(
        &self,
        recognition: &Recognition,
        actor: &ObjectId,
        location: &ObjectId,
        transient_user: Option<&ObjectId>,
    ) -> BindResult {
        match recognition.mode {
            Mode::Admin | Mode::User => BindResult::EngineHandler {
                verb: recognition.verb.clone(),
                args: recognition.args.clone(),
            },
            Mode::Game => {
                // Try the verb as typed, then, if it's a registered synonym,
                // its canonical verb's attribute too.
                let mut attr_names = vec![format!("cmd_{}", recognition.verb)];
                if let Some(canonical) = self.synonyms.canonical_of(&recognition.verb) {
                    let canonical_attr = format!("cmd_{canonical}");
                    if !attr_names.contains(&canonical_attr) {
                        attr_names.push(canonical_attr);
                    }
                }

                let search_order: Vec<ObjectId> = recognition
                    .resolved_objects
                    .first()
                    .cloned()
                    .into_iter()
                    .chain(std::iter::once(location.clone()))
                    .chain(std::iter::once(actor.clone()))
                    .chain(transient_user.cloned())
                    .chain(std::iter::once(ObjectId::new(GLOBAL_COMMANDS_OBJECT)))
                    .collect();

                for candidate in search_order {
                    for attr_name in &attr_names {
                        if let Ok(Some(_)) = self.cache.get_attribute(&candidate, attr_name).await {
                            return BindResult::GameInvocation {
                                executor: candidate,
                                attr: attr_name.clone(),
                                args: recognition.args.clone(),
                            };
                        }
                    }
                }
                BindResult::NotFound
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gaia_domain::{GValue, Object};
    use std::sync::Arc;

    fn cache_with(objects: Vec<Object>) -> WorldCache {
        use async_trait::async_trait;
        use gaia_ports::{StoreError, WorldStorePort};
        use std::collections::HashMap;
        use std::sync::Mutex;

        struct FakeStore(Mutex<HashMap<ObjectId, Object>>);

        #[async_trait]
        impl WorldStorePort for FakeStore {
            async fn fetch(&self, id: &ObjectId) -> Result<Object, StoreError> {
                self.0.lock().unwrap().get(id).cloned().ok_or_else(|| StoreError::NotFound {
                    entity: "object",
                    id: id.to_string(),
                })
            }
            async fn store(&self, o: &Object, _: Option<&gaia_domain::Revision>) -> Result<gaia_domain::Revision, StoreError> {
                self.0.lock().unwrap().insert(o.id.clone(), o.clone());
                Ok(gaia_domain::Revision::new("1"))
            }
            async fn delete_by_id(&self, id: &ObjectId, _: Option<&gaia_domain::Revision>) -> Result<(), StoreError> {
                self.0.lock().unwrap().remove(id);
                Ok(())
            }
            async fn list_by_index(&self, _: &str, _: &str) -> Result<Vec<Object>, StoreError> {
                Ok(Vec::new())
            }
        }

        let mut map = HashMap::new();
        for o in objects {
            map.insert(o.id.clone(), o);
        }
        WorldCache::new(Arc::new(FakeStore(Mutex::new(map))))
    }

    fn recognition(verb: &str, resolved: Vec<ObjectId>) -> Recognition {
        Recognition {
            mode: Mode::Game,
            verb: verb.to_string(),
            args: String::new(),
            raw: verb.to_string(),
            resolved_objects: resolved,
        }
    }

    #[tokio::test]
    async fn scenario_two_binds_to_room_cmd_look() {
        let mut room = Object::new(ObjectId::new("#r"), "a room");
        room.set_attribute("cmd_look", GValue::Source("[send @actor [get_attr @executor \"description\"]]".into()));
        room.set_attribute("description", GValue::string("A quiet room."));
        let player = Object::new(ObjectId::new("#p"), "player");
        let cache = cache_with(vec![room, player]);
        let synonyms = SynonymTable::default();
        let binder = Binder::new(&cache, &synonyms);

        let result = binder
            .bind(&recognition("look", vec![]), &ObjectId::new("#p"), &ObjectId::new("#r"), None)
            .await;
        assert_eq!(
            result,
            BindResult::GameInvocation {
                executor: ObjectId::new("#r"),
                attr: "cmd_look".to_string(),
                args: String::new(),
            }
        );
    }

    #[tokio::test]
    async fn not_found_when_nothing_in_chain_defines_the_verb() {
        let room = Object::new(ObjectId::new("#r"), "a room");
        let player = Object::new(ObjectId::new("#p"), "player");
        let cache = cache_with(vec![room, player]);
        let synonyms = SynonymTable::default();
        let binder = Binder::new(&cache, &synonyms);

        let result = binder
            .bind(&recognition("dance", vec![]), &ObjectId::new("#p"), &ObjectId::new("#r"), None)
            .await;
        assert_eq!(result, BindResult::NotFound);
    }

    #[tokio::test]
    async fn direct_object_is_searched_before_location() {
        let room = Object::new(ObjectId::new("#r"), "a room");
        let mut lamp = Object::new(ObjectId::new("#lamp"), "a lamp");
        lamp.set_attribute("cmd_take", GValue::Source("[log \"taken\"]".into()));
        let player = Object::new(ObjectId::new("#p"), "player");
        let cache = cache_with(vec![room, lamp, player]);
        let synonyms = SynonymTable::default();
        let binder = Binder::new(&cache, &synonyms);

        let result = binder
            .bind(
                &recognition("take", vec![ObjectId::new("#lamp")]),
                &ObjectId::new("#p"),
                &ObjectId::new("#r"),
                None,
            )
            .await;
        assert_eq!(
            result,
            BindResult::GameInvocation {
                executor: ObjectId::new("#lamp"),
                attr: "cmd_take".to_string(),
                args: String::new(),
            }
        );
    }

    #[tokio::test]
    async fn registered_synonym_resolves_to_the_canonical_verbs_attribute() {
        let room = Object::new(ObjectId::new("#r"), "a room");
        let mut lamp = Object::new(ObjectId::new("#lamp"), "a lamp");
        lamp.set_attribute("cmd_take", GValue::Source("[log \"taken\"]".into()));
        let player = Object::new(ObjectId::new("#p"), "player");
        let cache = cache_with(vec![room, lamp, player]);
        let synonyms = SynonymTable::default();
        synonyms.register("get", "take");
        let binder = Binder::new(&cache, &synonyms);

        let result = binder
            .bind(
                &recognition("get", vec![ObjectId::new("#lamp")]),
                &ObjectId::new("#p"),
                &ObjectId::new("#r"),
                None,
            )
            .await;
        assert_eq!(
            result,
            BindResult::GameInvocation {
                executor: ObjectId::new("#lamp"),
                attr: "cmd_take".to_string(),
                args: String::new(),
            }
        );
    }
}
