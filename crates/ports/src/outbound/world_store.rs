//! Document-store contract the world cache writes through to.
//!
//! Grounded on `wrldbldr-engine-ports/src/outbound/repository_port.rs`'s
//! trait shape, adapted for a document + JSON payload + optimistic-revision
//! backend (as in `sqlite_queue.rs`) rather than a graph store: fetch/store/
//! delete/list-by-index over opaque documents.

use async_trait::async_trait;
use gaia_domain::{Object, ObjectId, Revision};
use thiserror::Error;

#[cfg(feature = "testing")]
use mockall::automock;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("revision conflict on {id}: expected {expected}, store has {actual}")]
    RevisionConflict {
        id: String,
        expected: String,
        actual: String,
    },

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

#[cfg_attr(feature = "testing", automock)]
#[async_trait]
pub trait WorldStorePort: Send + Sync {
    async fn fetch(&self, id: &ObjectId) -> Result<Object, StoreError>;

    /// Writes `object` if `prior_revision` still matches the stored
    /// revision (or the object is new and `prior_revision` is `None`).
    /// Returns the new revision on success.
    async fn store(&self, object: &Object, prior_revision: Option<&Revision>) -> Result<Revision, StoreError>;

    async fn delete_by_id(&self, id: &ObjectId, prior_revision: Option<&Revision>) -> Result<(), StoreError>;

    async fn list_by_index(&self, name: &str, key: &str) -> Result<Vec<Object>, StoreError>;
}
