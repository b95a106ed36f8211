//! The `Object`: GAIA's single building block. Rooms, items, characters and
//! the system objects that hold shared verbs are all instances of this same
//! type, distinguished only by their attributes and location.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{AccountId, ObjectId, Revision};
use crate::value::GValue;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Object {
    pub id: ObjectId,
    pub display_name: String,
    pub description: String,
    /// Ordered to make multiple-inheritance resolution deterministic: a BFS
    /// over this list (left to right) and then each parent's own parents.
    pub parents: Vec<ObjectId>,
    pub attributes: BTreeMap<String, GValue>,
    pub location: Option<ObjectId>,
    pub contents: BTreeSet<ObjectId>,
    pub owner: Option<AccountId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Set by the store on read, threaded back in on write for optimistic
    /// conflict detection. `None` for an object that has never been stored.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub revision: Option<Revision>,
}

impl Object {
    pub fn new(id: ObjectId, display_name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            display_name: display_name.into(),
            description: String::new(),
            parents: Vec::new(),
            attributes: BTreeMap::new(),
            location: None,
            contents: BTreeSet::new(),
            owner: None,
            created_at: now,
            updated_at: now,
            revision: None,
        }
    }

    pub fn with_parents(mut self, parents: Vec<ObjectId>) -> Self {
        self.parents = parents;
        self
    }

    pub fn with_location(mut self, location: ObjectId) -> Self {
        self.location = Some(location);
        self
    }

    pub fn set_attribute(&mut self, name: impl Into<String>, value: GValue) {
        self.attributes.insert(name.into(), value);
        self.touch();
    }

    pub fn remove_attribute(&mut self, name: &str) -> Option<GValue> {
        let removed = self.attributes.remove(name);
        if removed.is_some() {
            self.touch();
        }
        removed
    }

    /// Look up an attribute defined directly on this object, ignoring
    /// inheritance. Inheritance resolution lives in `gaia-app`'s world cache
    /// because it needs access to every ancestor, not just this object.
    pub fn own_attribute(&self, name: &str) -> Option<&GValue> {
        self.attributes.get(name)
    }

    pub fn enter(&mut self, child: ObjectId) {
        self.contents.insert(child);
        self.touch();
    }

    pub fn leave(&mut self, child: &ObjectId) {
        self.contents.remove(child);
        self.touch();
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
