use std::sync::Arc;

use subtle::ConstantTimeEq;
use tracing::*;

use crate::claims::{transform_claims, Attributes, Claims};
use crate::config::{CredentialPolicy, IdentityConfig};
use crate::store::UserStore;
use crate::subject::{AuthenticatedUser, Authenticatable};
use crate::user::User;
use crate::verifier::ClaimsMap;
use crate::{Error, Result};

/// Resolves verified Firebase claims into persisted users.
///
/// Resolution is a plain lookup followed by a create or an update. The two
/// steps do not share a transaction, so concurrent first logins for the same
/// subject can create duplicate records unless the store rejects them.
#[derive(Clone)]
pub struct IdentityResolver {
    store: Arc<dyn UserStore>,
    config: Arc<IdentityConfig>,
}

impl std::fmt::Debug for IdentityResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityResolver")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl IdentityResolver {
    /// Creates a resolver over the given store.
    pub fn new(store: Arc<dyn UserStore>, config: IdentityConfig) -> IdentityResolver {
        IdentityResolver {
            store,
            config: Arc::new(config),
        }
    }

    /// The configuration users are resolved with.
    pub fn config(&self) -> &IdentityConfig {
        &self.config
    }

    /// Finds or creates the user for a verified claims map.
    ///
    /// Fails with [`Error::MissingClaim`] before touching the store when `sub`
    /// or `email` is absent. Performs at most one write.
    pub async fn resolve_by_claims(&self, claims: &ClaimsMap) -> Result<AuthenticatedUser> {
        let claims = Claims::from_map(claims)?;
        let attributes = transform_claims(&claims);
        self.update_or_create_user(claims.sub, &attributes).await
    }

    /// Applies `attributes` to the user matching `identifier`, creating it if absent.
    ///
    /// An existing user is only written back when an attribute changed.
    pub async fn update_or_create_user(
        &self,
        identifier: String,
        attributes: &Attributes,
    ) -> Result<AuthenticatedUser> {
        let column = self.config.identifier();

        if let Some(mut user) = self.store.find_one_where(column.name(), &identifier).await? {
            user.fill(attributes);

            if user.is_dirty() {
                debug!(column = column.name(), %identifier, "Updating user from claims");
                self.store.persist(&mut user).await?;
                user.sync_original();
            } else {
                debug!(column = column.name(), %identifier, "User is up to date");
            }

            return Ok(self.bind(user));
        }

        let mut user = User::new();
        user.fill(attributes);
        column.set(user.fields_mut(), identifier.clone());

        debug!(column = column.name(), %identifier, "Creating user from claims");
        self.store.persist(&mut user).await?;
        user.sync_original();

        Ok(self.bind(user))
    }

    /// Looks up a user by identifier without writing.
    pub async fn retrieve_by_id(&self, identifier: &str) -> Result<Option<AuthenticatedUser>> {
        let user = self
            .store
            .find_one_where(self.config.identifier().name(), identifier)
            .await?;
        Ok(user.map(|u| self.bind(u)))
    }

    /// Looks up a user by identifier and "remember me" token.
    ///
    /// Returns `None` when no remember token column is configured or the
    /// stored token does not match. Tokens are compared in constant time.
    pub async fn retrieve_by_token(
        &self,
        identifier: &str,
        token: &str,
    ) -> Result<Option<AuthenticatedUser>> {
        if matches!(self.config.policy(), CredentialPolicy::Strict) {
            return Err(Error::NotSupported("remember token"));
        }

        let Some(user) = self.retrieve_by_id(identifier).await? else {
            return Ok(None);
        };

        let is_match = user
            .remember_token()?
            .is_some_and(|stored| stored.as_bytes().ct_eq(token.as_bytes()).into());
        Ok(is_match.then_some(user))
    }

    /// Sets and persists the "remember me" token.
    pub async fn update_remember_token(
        &self,
        user: &mut AuthenticatedUser,
        token: String,
    ) -> Result<()> {
        user.set_remember_token(token)?;
        self.save(user).await?;
        Ok(())
    }

    /// Persists pending changes. Returns whether a write happened.
    pub async fn save(&self, user: &mut AuthenticatedUser) -> Result<bool> {
        let user = user.user_mut();
        if !user.is_dirty() {
            return Ok(false);
        }

        self.store.persist(user).await?;
        user.sync_original();
        Ok(true)
    }

    fn bind(&self, user: User) -> AuthenticatedUser {
        AuthenticatedUser::new(user, Arc::clone(&self.config))
    }
}
