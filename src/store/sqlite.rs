use async_trait::async_trait;
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use tracing::*;

use super::{StoreError, StoreResult, UserStore};
use crate::config::{validate_column, ConfigError, CredentialPolicy, IdentityConfig};
use crate::user::{User, UserFields};

const DEFAULT_TABLE: &str = "users";

/// [`UserStore`] backed by a SQLite table through `sqlx`.
///
/// Column names come from the [`IdentityConfig`] and are validated as plain
/// identifiers before they are interpolated into SQL. Values are always bound.
///
/// The remember token column is only read or written when the permissive
/// policy configures one, so tables without it work under any other policy.
#[derive(Debug, Clone)]
pub struct SqliteUserStore {
    pool: SqlitePool,
    table: String,
    firebase_id_column: Option<String>,
    remember_token_column: Option<String>,
}

impl SqliteUserStore {
    /// Creates a store over the `users` table.
    pub fn new(pool: SqlitePool, config: &IdentityConfig) -> SqliteUserStore {
        let firebase_id_column = match config.identifier().name() {
            "id" => None,
            column => Some(column.to_owned()),
        };

        let remember_token_column = match config.policy() {
            CredentialPolicy::Permissive {
                remember_token: Some(column),
                ..
            } => Some(column.name().to_owned()),
            _ => None,
        };

        SqliteUserStore {
            pool,
            table: DEFAULT_TABLE.to_owned(),
            firebase_id_column,
            remember_token_column,
        }
    }

    /// Uses another table name.
    pub fn with_table(mut self, table: impl Into<String>) -> Result<SqliteUserStore, ConfigError> {
        let table = table.into();
        validate_column(&table)?;
        self.table = table;
        Ok(self)
    }

    /// Creates the user table if it does not exist yet.
    ///
    /// The identifier column carries no unique constraint.
    pub async fn ensure_schema(&self) -> StoreResult<()> {
        let firebase_id = self
            .firebase_id_column
            .as_ref()
            .map(|c| format!("{c} TEXT, "))
            .unwrap_or_default();

        let remember = self
            .remember_token_column
            .as_ref()
            .map(|c| format!(", {c} TEXT"))
            .unwrap_or_default();

        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {table} (\
                id TEXT PRIMARY KEY, {firebase_id}\
                email TEXT NOT NULL, name TEXT, picture TEXT{remember})",
            table = self.table,
        );

        sqlx::query(&sql)
            .execute(&self.pool)
            .await
            .map_err(StoreError::backend)?;
        Ok(())
    }

    fn known_column(&self, column: &str) -> bool {
        matches!(column, "id" | "email" | "name" | "picture")
            || self.firebase_id_column.as_deref() == Some(column)
            || self.remember_token_column.as_deref() == Some(column)
    }

    fn select_list(&self) -> String {
        let firebase_id = self.firebase_id_column.as_deref().unwrap_or("NULL");
        let remember = self.remember_token_column.as_deref().unwrap_or("NULL");
        format!("id, {firebase_id} AS firebase_id, email, name, picture, {remember} AS remember_token")
    }

    fn row_to_fields(row: &SqliteRow) -> Result<UserFields, sqlx::Error> {
        Ok(UserFields {
            id: row.try_get("id")?,
            firebase_id: row.try_get("firebase_id")?,
            email: row.try_get("email")?,
            name: row.try_get("name")?,
            picture: row.try_get("picture")?,
            remember_token: row.try_get("remember_token")?,
        })
    }

    async fn insert(&self, user: &mut User) -> StoreResult<()> {
        let (columns, placeholders) = match &self.firebase_id_column {
            Some(c) => (format!("{c}, "), "?, "),
            None => (String::new(), ""),
        };
        let (remember, remember_placeholder) = match &self.remember_token_column {
            Some(c) => (format!(", {c}"), ", ?"),
            None => (String::new(), ""),
        };

        let sql = format!(
            "INSERT INTO {table} (id, {columns}email, name, picture{remember}) \
             VALUES (COALESCE(?, lower(hex(randomblob(16)))), {placeholders}?, ?, ?{remember_placeholder}) \
             RETURNING id",
            table = self.table,
        );

        let fields = user.fields();
        let mut query = sqlx::query(&sql).bind(fields.id.clone());
        if self.firebase_id_column.is_some() {
            query = query.bind(fields.firebase_id.clone());
        }

        query = query
            .bind(fields.email.clone())
            .bind(fields.name.clone())
            .bind(fields.picture.clone());
        if self.remember_token_column.is_some() {
            query = query.bind(fields.remember_token.clone());
        }

        let row = query
            .fetch_one(&self.pool)
            .await
            .map_err(StoreError::backend)?;

        let id: String = row.try_get("id").map_err(StoreError::backend)?;
        user.fields_mut().id = Some(id);
        Ok(())
    }

    async fn update(&self, user: &User) -> StoreResult<()> {
        let firebase_id = self
            .firebase_id_column
            .as_ref()
            .map(|c| format!("{c} = ?, "))
            .unwrap_or_default();

        let remember = self
            .remember_token_column
            .as_ref()
            .map(|c| format!(", {c} = ?"))
            .unwrap_or_default();

        let sql = format!(
            "UPDATE {table} SET {firebase_id}email = ?, name = ?, picture = ?{remember} \
             WHERE id = ?",
            table = self.table,
        );

        let fields = user.fields();
        let mut query = sqlx::query(&sql);
        if self.firebase_id_column.is_some() {
            query = query.bind(fields.firebase_id.clone());
        }

        query = query
            .bind(fields.email.clone())
            .bind(fields.name.clone())
            .bind(fields.picture.clone());
        if self.remember_token_column.is_some() {
            query = query.bind(fields.remember_token.clone());
        }

        let result = query
            .bind(fields.id.clone())
            .execute(&self.pool)
            .await
            .map_err(StoreError::backend)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::RecordNotFound(
                fields.id.clone().unwrap_or_default(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl UserStore for SqliteUserStore {
    async fn find_one_where(&self, column: &str, value: &str) -> StoreResult<Option<User>> {
        if !self.known_column(column) {
            return Err(StoreError::UnknownColumn(column.to_owned()));
        }

        let sql = format!(
            "SELECT {select} FROM {table} WHERE {column} = ? LIMIT 1",
            select = self.select_list(),
            table = self.table,
        );

        let row = sqlx::query(&sql)
            .bind(value)
            .fetch_optional(&self.pool)
            .await
            .map_err(StoreError::backend)?;

        row.as_ref()
            .map(Self::row_to_fields)
            .transpose()
            .map(|fields| fields.map(User::from_persisted))
            .map_err(StoreError::backend)
    }

    async fn persist(&self, user: &mut User) -> StoreResult<()> {
        if user.exists() {
            self.update(user).await?;
        } else {
            self.insert(user).await?;
        }

        debug!(table = %self.table, id = ?user.fields().id, "Persisted user");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;
    use crate::password::PasswordCipher;
    use crate::resolver::IdentityResolver;
    use crate::subject::Authenticatable;
    use crate::verifier::ClaimsMap;
    use actix_rt::test;
    use serde_json::{json, Value};
    use sqlx::sqlite::SqlitePoolOptions;

    async fn pool() -> SqlitePool {
        // a single connection keeps the in-memory database alive and shared
        SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap()
    }

    async fn store(config: &IdentityConfig) -> SqliteUserStore {
        let store = SqliteUserStore::new(pool().await, config);
        store.ensure_schema().await.unwrap();
        store
    }

    fn claims(value: Value) -> ClaimsMap {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    /// Counts writes reaching the wrapped store.
    struct CountingStore {
        inner: SqliteUserStore,
        writes: AtomicUsize,
    }

    impl CountingStore {
        fn new(inner: SqliteUserStore) -> Arc<CountingStore> {
            Arc::new(CountingStore {
                inner,
                writes: AtomicUsize::new(0),
            })
        }

        fn writes(&self) -> usize {
            self.writes.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl UserStore for CountingStore {
        async fn find_one_where(&self, column: &str, value: &str) -> StoreResult<Option<User>> {
            self.inner.find_one_where(column, value).await
        }

        async fn persist(&self, user: &mut User) -> StoreResult<()> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            self.inner.persist(user).await
        }
    }

    #[test]
    async fn creates_and_finds_by_dedicated_column() {
        let config = IdentityConfig::builder()
            .identifier_column("firebase_uid")
            .build()
            .unwrap();
        let store = store(&config).await;

        let mut user = User::new();
        user.fields_mut().firebase_id = Some("uid".into());
        user.fields_mut().email = "a@example.com".into();
        store.persist(&mut user).await.unwrap();
        assert!(user.fields().id.is_some());

        let found = store
            .find_one_where("firebase_uid", "uid")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.fields(), user.fields());
        assert!(found.exists());
    }

    #[test]
    async fn updates_existing_row() {
        let store = store(&IdentityConfig::default()).await;

        let mut user = User::new();
        user.fields_mut().id = Some("uid".into());
        user.fields_mut().email = "old@example.com".into();
        store.persist(&mut user).await.unwrap();
        user.sync_original();

        user.fields_mut().name = Some("New Name".into());
        store.persist(&mut user).await.unwrap();

        let found = store.find_one_where("id", "uid").await.unwrap().unwrap();
        assert_eq!(found.fields().name.as_deref(), Some("New Name"));
        assert_eq!(found.fields().firebase_id, None);
    }

    #[test]
    async fn rejects_unknown_column() {
        let store = store(&IdentityConfig::default()).await;
        let result = store.find_one_where("password", "x").await;
        assert!(matches!(result, Err(StoreError::UnknownColumn(_))));

        let result = store.find_one_where("remember_token", "x").await;
        assert!(matches!(result, Err(StoreError::UnknownColumn(_))));
    }

    #[test]
    async fn rejects_invalid_table_name() {
        let store = store(&IdentityConfig::default()).await;
        assert!(store.with_table("users; --").is_err());
    }

    #[test]
    async fn works_without_remember_token_column() {
        let pool = pool().await;
        sqlx::query(
            "CREATE TABLE users (id TEXT PRIMARY KEY, email TEXT NOT NULL, name TEXT, picture TEXT)",
        )
        .execute(&pool)
        .await
        .unwrap();

        let store = SqliteUserStore::new(pool, &IdentityConfig::default());
        let resolver = IdentityResolver::new(Arc::new(store.clone()), IdentityConfig::default());

        let user = resolver
            .resolve_by_claims(&claims(json!({
                "sub": "firebase-uid",
                "email": "test@example.com",
                "name": "Test User"
            })))
            .await
            .unwrap();
        assert_eq!(user.auth_identifier(), Some("firebase-uid"));

        let user = resolver
            .resolve_by_claims(&claims(json!({
                "sub": "firebase-uid",
                "email": "test@example.com",
                "name": "Renamed"
            })))
            .await
            .unwrap();
        assert_eq!(user.name.as_deref(), Some("Renamed"));

        let found = store
            .find_one_where("id", "firebase-uid")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.fields().name.as_deref(), Some("Renamed"));
        assert_eq!(found.fields().remember_token, None);
    }

    #[test]
    async fn resolver_creates_row_under_dedicated_column() {
        let config = IdentityConfig::builder()
            .identifier_column("firebase_uid")
            .build()
            .unwrap();
        let store = CountingStore::new(store(&config).await);
        let resolver = IdentityResolver::new(store.clone(), config);

        let user = resolver
            .resolve_by_claims(&claims(json!({
                "sub": "firebase-uid",
                "email": "test@example.com",
                "picture": "https://example.com/a.png"
            })))
            .await
            .unwrap();

        assert_eq!(user.auth_identifier(), Some("firebase-uid"));
        assert!(user.id.is_some());
        assert_ne!(user.id.as_deref(), Some("firebase-uid"));
        assert_eq!(store.writes(), 1);

        let found = store
            .inner
            .find_one_where("firebase_uid", "firebase-uid")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.fields().id, user.id);
        assert_eq!(found.fields().picture.as_deref(), Some("https://example.com/a.png"));
    }

    #[test]
    async fn resolver_skips_update_for_unchanged_claims() {
        let config = IdentityConfig::default();
        let store = CountingStore::new(store(&config).await);
        let resolver = IdentityResolver::new(store.clone(), config);
        let claims = claims(json!({
            "sub": "firebase-uid",
            "email": "test@example.com",
            "name": "Test User"
        }));

        let first = resolver.resolve_by_claims(&claims).await.unwrap();
        let second = resolver.resolve_by_claims(&claims).await.unwrap();

        assert_eq!(store.writes(), 1);
        assert_eq!(first.id, second.id);
        assert_eq!(second.name.as_deref(), Some("Test User"));
    }

    #[test]
    async fn resolver_updates_row_when_claims_change() {
        let config = IdentityConfig::default();
        let store = CountingStore::new(store(&config).await);
        let resolver = IdentityResolver::new(store.clone(), config);

        resolver
            .resolve_by_claims(&claims(json!({
                "sub": "firebase-uid",
                "email": "old@example.com",
                "name": "Old Name"
            })))
            .await
            .unwrap();
        resolver
            .resolve_by_claims(&claims(json!({
                "sub": "firebase-uid",
                "email": "new@example.com"
            })))
            .await
            .unwrap();

        assert_eq!(store.writes(), 2);
        let found = store
            .inner
            .find_one_where("id", "firebase-uid")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.fields().email, "new@example.com");
        assert_eq!(found.fields().name.as_deref(), Some("Old Name"));
    }

    #[test]
    async fn resolver_round_trips_remember_token() {
        let config = IdentityConfig::builder()
            .permissive(PasswordCipher::from_key(&PasswordCipher::generate_key()).unwrap())
            .remember_token_column("remember_me")
            .build()
            .unwrap();
        let store = CountingStore::new(store(&config).await);
        let resolver = IdentityResolver::new(store.clone(), config);

        let mut user = resolver
            .resolve_by_claims(&claims(json!({
                "sub": "firebase-uid",
                "email": "test@example.com"
            })))
            .await
            .unwrap();
        resolver
            .update_remember_token(&mut user, "token-123".into())
            .await
            .unwrap();

        let found = resolver
            .retrieve_by_token("firebase-uid", "token-123")
            .await
            .unwrap();
        assert!(found.is_some());
        assert!(resolver
            .retrieve_by_token("firebase-uid", "other-token")
            .await
            .unwrap()
            .is_none());
        assert_eq!(store.writes(), 2);
    }
}
