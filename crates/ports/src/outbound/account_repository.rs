//! Document-store contract for accounts, indexed by login and by role.

use async_trait::async_trait;
use gaia_domain::{Account, AccountId, Revision, Role};

#[cfg(feature = "testing")]
use mockall::automock;

use super::world_store::StoreError;

#[cfg_attr(feature = "testing", automock)]
#[async_trait]
pub trait AccountRepositoryPort: Send + Sync {
    async fn fetch(&self, id: &AccountId) -> Result<Account, StoreError>;

    async fn fetch_by_login(&self, login: &str) -> Result<Account, StoreError>;

    async fn store(&self, account: &Account, prior_revision: Option<&Revision>) -> Result<Revision, StoreError>;

    async fn list_by_role(&self, role: Role) -> Result<Vec<Account>, StoreError>;
}
