//! Accounts: the login identity behind one or more embodiable characters.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{AccountId, ObjectId, Revision};

/// Authority granted to an account, independent of which character it is
/// currently embodying.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum Role {
    #[default]
    Player,
    Builder,
    Wizard,
    Admin,
}

impl Role {
    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }

    pub fn can_build(&self) -> bool {
        matches!(self, Role::Builder | Role::Wizard | Role::Admin)
    }

    pub fn can_administer(&self) -> bool {
        matches!(self, Role::Wizard | Role::Admin)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Role::Player => "player",
            Role::Builder => "builder",
            Role::Wizard => "wizard",
            Role::Admin => "admin",
        };
        write!(f, "{label}")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub login: String,
    pub password_hash: String,
    pub display_name: String,
    pub characters: Vec<ObjectId>,
    pub roles: BTreeSet<Role>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub revision: Option<Revision>,
}

impl Account {
    pub fn new(login: impl Into<String>, password_hash: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: AccountId::new(),
            login: login.into(),
            password_hash: password_hash.into(),
            display_name: String::new(),
            characters: Vec::new(),
            roles: BTreeSet::from([Role::Player]),
            created_at: now,
            updated_at: now,
            revision: None,
        }
    }

    pub fn highest_role(&self) -> Role {
        self.roles.iter().max().copied().unwrap_or_default()
    }

    pub fn has_character(&self, object_id: &ObjectId) -> bool {
        self.characters.iter().any(|c| c == object_id)
    }
}
