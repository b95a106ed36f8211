//! The interpreter's view of the world: a narrow async port that everything
//! a G program can touch (attribute reads/writes, messaging, object
//! resolution, logging) goes through. `gaia-app` implements this against the
//! world cache; tests implement it against an in-memory stand-in.

use async_trait::async_trait;
use gaia_domain::{GValue, ObjectId};

use crate::error::GError;
use crate::interpreter::EvalContext;

#[async_trait]
pub trait Host: Send + Sync {
    /// Inheritance-resolved read. `Ok(None)` means absent (distinct from a
    /// stored `GValue::Null`).
    async fn get_attr(&self, object: &ObjectId, name: &str) -> Result<Option<GValue>, GError>;

    /// Writes on the referenced object only, never its parents.
    async fn set_attr(&self, object: &ObjectId, name: &str, value: GValue) -> Result<(), GError>;

    /// Resolves `#id`, `@this`, `@actor`, `@executor` and bare symbols bound
    /// to an object reference in the current frame.
    async fn get_object(&self, reference: &str, ctx: &EvalContext) -> Result<ObjectId, GError>;

    /// Delivers `payload` to `target`'s `on_message`, following inheritance
    /// the same way any other attribute read does.
    async fn send(&self, target: &ObjectId, payload: GValue) -> Result<(), GError>;

    /// Appends a line to the server log at info level.
    fn log(&self, message: &str);

    /// Administrator-only: read G source from `path` and assign it to the
    /// attribute named `attr_name` on `target`, replacing prior content.
    async fn load(
        &self,
        path: &str,
        target: &ObjectId,
        attr_name: &str,
        ctx: &EvalContext,
    ) -> Result<(), GError>;

    /// True if the actor driving this invocation holds `role` (or higher).
    async fn actor_has_role(&self, actor: &ObjectId, role: &str) -> Result<bool, GError>;
}
