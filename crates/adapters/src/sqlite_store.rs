//! Document-store adapter backing [`WorldStorePort`] and
//! [`AccountRepositoryPort`] with SQLite.
//!
//! Grounded on `wrldbldr-engine-adapters/src/infrastructure/queues/
//! sqlite_queue.rs`'s shape — a `SqlitePool`, `CREATE TABLE IF NOT EXISTS` +
//! `CREATE INDEX IF NOT EXISTS` bootstrap in the constructor, and the
//! `sqlx::query(...).bind(...).execute/fetch_one/fetch_optional/fetch_all
//! (&pool).await.map_err(...)` idiom throughout — generalized from a queue
//! table to a document-with-optimistic-revision table, per §6's "two
//! document collections" contract.
//!
//! The teacher's queue has one table per concern; the world side here needs
//! a second table (`object_attribute_index`) because `WorldStorePort::
//! list_by_index` must answer "has_attribute:<name>" queries (the tick
//! scheduler's `ON_TICK_INDEX`) without a full table scan over JSON bodies.
//! The index is kept current by `store()`: every write deletes the prior
//! rows for that object and reinserts one row per attribute name the object
//! owns directly (inherited attributes never enter the index, matching
//! §4.7's "own attribute map" rule).

use async_trait::async_trait;
use chrono::Utc;
use gaia_domain::{Account, AccountId, Object, ObjectId, Revision, Role};
use gaia_ports::{AccountRepositoryPort, StoreError, WorldStorePort};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

async fn ensure_world_schema(pool: &SqlitePool) -> Result<(), StoreError> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS world_objects (
            id TEXT PRIMARY KEY,
            body_json TEXT NOT NULL,
            revision TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(db_err)?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS object_attribute_index (
            attribute_name TEXT NOT NULL,
            object_id TEXT NOT NULL,
            PRIMARY KEY (attribute_name, object_id)
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(db_err)?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_attribute_index_name ON object_attribute_index(attribute_name)")
        .execute(pool)
        .await
        .map_err(db_err)?;

    Ok(())
}

async fn ensure_account_schema(pool: &SqlitePool) -> Result<(), StoreError> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS accounts (
            id TEXT PRIMARY KEY,
            body_json TEXT NOT NULL,
            revision TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(db_err)?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS account_login_index (
            login TEXT PRIMARY KEY,
            account_id TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(db_err)?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS account_role_index (
            role TEXT NOT NULL,
            account_id TEXT NOT NULL,
            PRIMARY KEY (role, account_id)
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(db_err)?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_account_role ON account_role_index(role)")
        .execute(pool)
        .await
        .map_err(db_err)?;

    Ok(())
}

fn db_err(err: sqlx::Error) -> StoreError {
    StoreError::Unavailable(err.to_string())
}

fn role_key(role: Role) -> &'static str {
    match role {
        Role::Player => "player",
        Role::Builder => "builder",
        Role::Wizard => "wizard",
        Role::Admin => "admin",
    }
}

pub struct SqliteWorldStore {
    pool: SqlitePool,
}

impl SqliteWorldStore {
    pub async fn new(pool: SqlitePool) -> Result<Self, StoreError> {
        ensure_world_schema(&pool).await?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl WorldStorePort for SqliteWorldStore {
    async fn fetch(&self, id: &ObjectId) -> Result<Object, StoreError> {
        let row = sqlx::query("SELECT body_json, revision FROM world_objects WHERE id = ?")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
            .ok_or_else(|| StoreError::NotFound { entity: "object", id: id.to_string() })?;

        let body_json: String = row.get("body_json");
        let revision: String = row.get("revision");
        let mut object: Object = serde_json::from_str(&body_json).map_err(|e| StoreError::Unavailable(e.to_string()))?;
        object.revision = Some(Revision::new(revision));
        Ok(object)
    }

    async fn store(&self, object: &Object, prior_revision: Option<&Revision>) -> Result<Revision, StoreError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let current: Option<String> = sqlx::query_scalar("SELECT revision FROM world_objects WHERE id = ?")
            .bind(object.id.as_str())
            .fetch_optional(&mut *tx)
            .await
            .map_err(db_err)?;

        if let Some(actual) = &current {
            if let Some(expected) = prior_revision {
                if actual != expected.as_str() {
                    return Err(StoreError::RevisionConflict {
                        id: object.id.to_string(),
                        expected: expected.to_string(),
                        actual: actual.clone(),
                    });
                }
            }
        }

        let new_revision = Uuid::new_v4().to_string();
        let mut body = object.clone();
        body.revision = None;
        let body_json = serde_json::to_string(&body).map_err(|e| StoreError::Unavailable(e.to_string()))?;
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            r#"
            INSERT INTO world_objects (id, body_json, revision, updated_at) VALUES (?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET body_json = excluded.body_json, revision = excluded.revision, updated_at = excluded.updated_at
            "#,
        )
        .bind(object.id.as_str())
        .bind(&body_json)
        .bind(&new_revision)
        .bind(&now)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        sqlx::query("DELETE FROM object_attribute_index WHERE object_id = ?")
            .bind(object.id.as_str())
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

        for name in object.attributes.keys() {
            sqlx::query("INSERT INTO object_attribute_index (attribute_name, object_id) VALUES (?, ?)")
                .bind(name)
                .bind(object.id.as_str())
                .execute(&mut *tx)
                .await
                .map_err(db_err)?;
        }

        tx.commit().await.map_err(db_err)?;
        Ok(Revision::new(new_revision))
    }

    async fn delete_by_id(&self, id: &ObjectId, prior_revision: Option<&Revision>) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let current: Option<String> = sqlx::query_scalar("SELECT revision FROM world_objects WHERE id = ?")
            .bind(id.as_str())
            .fetch_optional(&mut *tx)
            .await
            .map_err(db_err)?;

        if let (Some(actual), Some(expected)) = (&current, prior_revision) {
            if actual != expected.as_str() {
                return Err(StoreError::RevisionConflict {
                    id: id.to_string(),
                    expected: expected.to_string(),
                    actual: actual.clone(),
                });
            }
        }

        sqlx::query("DELETE FROM world_objects WHERE id = ?")
            .bind(id.as_str())
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        sqlx::query("DELETE FROM object_attribute_index WHERE object_id = ?")
            .bind(id.as_str())
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

        tx.commit().await.map_err(db_err)?;
        Ok(())
    }

    /// Only `"has_attribute:<name>"` indices are supported (the tick
    /// scheduler's `ON_TICK_INDEX` is the sole caller); any other index name
    /// returns an empty result rather than a full scan.
    async fn list_by_index(&self, name: &str, key: &str) -> Result<Vec<Object>, StoreError> {
        let Some(attribute) = name.strip_prefix("has_attribute:") else {
            return Ok(Vec::new());
        };
        if key != "true" {
            return Ok(Vec::new());
        }

        let rows = sqlx::query(
            r#"
            SELECT o.body_json, o.revision
            FROM world_objects o
            JOIN object_attribute_index a ON o.id = a.object_id
            WHERE a.attribute_name = ?
            "#,
        )
        .bind(attribute)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.into_iter()
            .map(|row| {
                let body_json: String = row.get("body_json");
                let revision: String = row.get("revision");
                let mut object: Object =
                    serde_json::from_str(&body_json).map_err(|e| StoreError::Unavailable(e.to_string()))?;
                object.revision = Some(Revision::new(revision));
                Ok(object)
            })
            .collect()
    }
}

pub struct SqliteAccountStore {
    pool: SqlitePool,
}

impl SqliteAccountStore {
    pub async fn new(pool: SqlitePool) -> Result<Self, StoreError> {
        ensure_account_schema(&pool).await?;
        Ok(Self { pool })
    }

    async fn fetch_by_id_str(&self, id: &str) -> Result<Account, StoreError> {
        let row = sqlx::query("SELECT body_json, revision FROM accounts WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
            .ok_or_else(|| StoreError::NotFound { entity: "account", id: id.to_string() })?;

        let body_json: String = row.get("body_json");
        let revision: String = row.get("revision");
        let mut account: Account = serde_json::from_str(&body_json).map_err(|e| StoreError::Unavailable(e.to_string()))?;
        account.revision = Some(Revision::new(revision));
        Ok(account)
    }
}

#[async_trait]
impl AccountRepositoryPort for SqliteAccountStore {
    async fn fetch(&self, id: &AccountId) -> Result<Account, StoreError> {
        self.fetch_by_id_str(&id.to_string()).await
    }

    async fn fetch_by_login(&self, login: &str) -> Result<Account, StoreError> {
        let account_id: String = sqlx::query_scalar("SELECT account_id FROM account_login_index WHERE login = ?")
            .bind(login)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
            .ok_or_else(|| StoreError::NotFound { entity: "account", id: login.to_string() })?;
        self.fetch_by_id_str(&account_id).await
    }

    async fn store(&self, account: &Account, prior_revision: Option<&Revision>) -> Result<Revision, StoreError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        let id_str = account.id.to_string();

        let current: Option<String> = sqlx::query_scalar("SELECT revision FROM accounts WHERE id = ?")
            .bind(&id_str)
            .fetch_optional(&mut *tx)
            .await
            .map_err(db_err)?;

        if let Some(actual) = &current {
            if let Some(expected) = prior_revision {
                if actual != expected.as_str() {
                    return Err(StoreError::RevisionConflict {
                        id: id_str,
                        expected: expected.to_string(),
                        actual: actual.clone(),
                    });
                }
            }
        }

        let new_revision = Uuid::new_v4().to_string();
        let mut body = account.clone();
        body.revision = None;
        let body_json = serde_json::to_string(&body).map_err(|e| StoreError::Unavailable(e.to_string()))?;
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            r#"
            INSERT INTO accounts (id, body_json, revision, updated_at) VALUES (?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET body_json = excluded.body_json, revision = excluded.revision, updated_at = excluded.updated_at
            "#,
        )
        .bind(&id_str)
        .bind(&body_json)
        .bind(&new_revision)
        .bind(&now)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        sqlx::query("INSERT OR REPLACE INTO account_login_index (login, account_id) VALUES (?, ?)")
            .bind(&account.login)
            .bind(&id_str)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

        sqlx::query("DELETE FROM account_role_index WHERE account_id = ?")
            .bind(&id_str)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

        for role in &account.roles {
            sqlx::query("INSERT INTO account_role_index (role, account_id) VALUES (?, ?)")
                .bind(role_key(*role))
                .bind(&id_str)
                .execute(&mut *tx)
                .await
                .map_err(db_err)?;
        }

        tx.commit().await.map_err(db_err)?;
        Ok(Revision::new(new_revision))
    }

    async fn list_by_role(&self, role: Role) -> Result<Vec<Account>, StoreError> {
        let ids: Vec<String> = sqlx::query_scalar("SELECT account_id FROM account_role_index WHERE role = ?")
            .bind(role_key(role))
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;

        let mut accounts = Vec::with_capacity(ids.len());
        for id in ids {
            accounts.push(self.fetch_by_id_str(&id).await?);
        }
        Ok(accounts)
    }
}

/// Opens (creating if missing, per `?mode=rwc`) the shared SQLite pool used
/// by both stores.
pub async fn connect(database_url: &str) -> Result<SqlitePool, StoreError> {
    SqlitePool::connect(database_url).await.map_err(db_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gaia_domain::GValue;

    async fn pool() -> SqlitePool {
        connect("sqlite::memory:").await.unwrap()
    }

    #[tokio::test]
    async fn round_trips_an_object_through_the_store() {
        let pool = pool().await;
        let store = SqliteWorldStore::new(pool).await.unwrap();
        let mut object = Object::new(ObjectId::new("#room"), "a room");
        object.set_attribute("description", GValue::string("dim and dusty"));

        let revision = store.store(&object, None).await.unwrap();
        let fetched = store.fetch(&ObjectId::new("#room")).await.unwrap();
        assert_eq!(fetched.display_name, "a room");
        assert_eq!(fetched.revision, Some(revision));
    }

    #[tokio::test]
    async fn stale_revision_is_rejected() {
        let pool = pool().await;
        let store = SqliteWorldStore::new(pool).await.unwrap();
        let object = Object::new(ObjectId::new("#x"), "x");
        let first = store.store(&object, None).await.unwrap();
        store.store(&object, Some(&first)).await.unwrap();

        let result = store.store(&object, Some(&first)).await;
        assert!(matches!(result, Err(StoreError::RevisionConflict { .. })));
    }

    #[tokio::test]
    async fn list_by_index_finds_objects_with_the_attribute() {
        let pool = pool().await;
        let store = SqliteWorldStore::new(pool).await.unwrap();
        let mut ticking = Object::new(ObjectId::new("#clock"), "a clock");
        ticking.set_attribute("on_tick", GValue::Source("[log \"tick\"]".into()));
        let plain = Object::new(ObjectId::new("#rock"), "a rock");
        store.store(&ticking, None).await.unwrap();
        store.store(&plain, None).await.unwrap();

        let found = store.list_by_index("has_attribute:on_tick", "true").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, ObjectId::new("#clock"));
    }

    #[tokio::test]
    async fn account_round_trips_by_login_and_role() {
        let pool = pool().await;
        let store = SqliteAccountStore::new(pool).await.unwrap();
        let mut account = Account::new("alice", "hash");
        account.roles.insert(Role::Builder);

        store.store(&account, None).await.unwrap();
        let fetched = store.fetch_by_login("alice").await.unwrap();
        assert_eq!(fetched.id, account.id);

        let builders = store.list_by_role(Role::Builder).await.unwrap();
        assert_eq!(builders.len(), 1);
    }
}
