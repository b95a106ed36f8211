//! Shared test doubles used by more than one module's unit tests.
#![cfg(test)]

use async_trait::async_trait;
use gaia_domain::{Object, ObjectId, Revision};
use gaia_ports::{StoreError, WorldStorePort};

/// A store that has nothing and accepts nothing; useful when a test only
/// exercises cache-local state and never expects a store round-trip.
pub struct NullStore;

#[async_trait]
impl WorldStorePort for NullStore {
    async fn fetch(&self, id: &ObjectId) -> Result<Object, StoreError> {
        Err(StoreError::NotFound {
            entity: "object",
            id: id.to_string(),
        })
    }

    async fn store(&self, _object: &Object, _prior: Option<&Revision>) -> Result<Revision, StoreError> {
        Ok(Revision::new("1"))
    }

    async fn delete_by_id(&self, _id: &ObjectId, _prior: Option<&Revision>) -> Result<(), StoreError> {
        Ok(())
    }

    async fn list_by_index(&self, _name: &str, _key: &str) -> Result<Vec<Object>, StoreError> {
        Ok(Vec::new())
    }
}
