use std::sync::{
    atomic::{AtomicU64, AtomicUsize, Ordering},
    PoisonError, RwLock,
};

use async_trait::async_trait;
use tracing::*;

use super::{StoreError, StoreResult, UserStore};
use crate::config::IdentityConfig;
use crate::user::{User, UserFields};

const FIREBASE_ID_COLUMN: &str = "firebase_id";

/// Process-local [`UserStore`] backed by a vector.
///
/// Records are kept in insertion order and lookups return the first match.
/// Identifier uniqueness is not enforced, so two racing creates for the same
/// subject both succeed, exactly like an unconstrained table would.
#[derive(Debug)]
pub struct MemoryUserStore {
    users: RwLock<Vec<UserFields>>,
    firebase_id_column: String,
    next_id: AtomicU64,
    writes: AtomicUsize,
}

impl Default for MemoryUserStore {
    fn default() -> Self {
        Self::with_firebase_id_column(FIREBASE_ID_COLUMN)
    }
}

impl MemoryUserStore {
    /// Creates an empty store knowing the `id`, `firebase_id`, `email` and
    /// `remember_token` columns.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty store whose dedicated identifier column matches the
    /// configured one.
    pub fn for_config(config: &IdentityConfig) -> Self {
        match config.identifier().name() {
            "id" => Self::default(),
            column => Self::with_firebase_id_column(column),
        }
    }

    fn with_firebase_id_column(column: impl Into<String>) -> Self {
        MemoryUserStore {
            users: RwLock::new(Vec::new()),
            firebase_id_column: column.into(),
            next_id: AtomicU64::new(1),
            writes: AtomicUsize::new(0),
        }
    }

    /// Seeds a record without counting it as a write.
    pub fn insert(&self, fields: UserFields) {
        self.users
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(fields);
    }

    /// Number of creates and updates performed through [`UserStore::persist`].
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.users
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether the store holds no records.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of all stored records.
    pub fn all(&self) -> Vec<UserFields> {
        self.users
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn column_value<'a>(&self, fields: &'a UserFields, column: &str) -> StoreResult<Option<&'a str>> {
        let value = match column {
            c if c == self.firebase_id_column => fields.firebase_id.as_deref(),
            "id" => fields.id.as_deref(),
            "email" => Some(fields.email.as_str()),
            "remember_token" => fields.remember_token.as_deref(),
            other => return Err(StoreError::UnknownColumn(other.to_owned())),
        };
        Ok(value)
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_one_where(&self, column: &str, value: &str) -> StoreResult<Option<User>> {
        let users = self.users.read().unwrap_or_else(PoisonError::into_inner);

        for fields in users.iter() {
            if self.column_value(fields, column)? == Some(value) {
                return Ok(Some(User::from_persisted(fields.clone())));
            }
        }

        Ok(None)
    }

    async fn persist(&self, user: &mut User) -> StoreResult<()> {
        let mut users = self.users.write().unwrap_or_else(PoisonError::into_inner);

        if user.exists() {
            let id = user.fields().id.clone().unwrap_or_default();
            let slot = users
                .iter_mut()
                .find(|stored| stored.id.as_deref() == Some(id.as_str()))
                .ok_or(StoreError::RecordNotFound(id))?;
            *slot = user.fields().clone();
        } else {
            if user.fields().id.is_none() {
                let id = self.next_id.fetch_add(1, Ordering::SeqCst);
                user.fields_mut().id = Some(id.to_string());
            }
            users.push(user.fields().clone());
        }

        self.writes.fetch_add(1, Ordering::SeqCst);
        debug!(id = ?user.fields().id, "Persisted user in memory store");
        Ok(())
    }
}
