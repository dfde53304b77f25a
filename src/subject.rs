use std::ops::Deref;
use std::sync::Arc;

use serde::Serialize;

use crate::config::{CredentialPolicy, IdentityConfig, RememberTokenColumn};
use crate::user::{User, UserFields};
use crate::{Error, Result};

/// Capability set a session or guard layer needs from an authenticated user.
pub trait Authenticatable {
    /// Name of the column holding the unique identifier.
    fn auth_identifier_name(&self) -> &str;

    /// Value of the unique identifier.
    fn auth_identifier(&self) -> Option<&str>;

    /// Password credential for the user.
    ///
    /// Under the permissive policy this is a reversible encoding of the
    /// identifier, never a secret.
    fn auth_password(&self) -> Result<String>;

    /// Token value for the "remember me" session.
    fn remember_token(&self) -> Result<Option<&str>>;

    /// Sets the token value for the "remember me" session.
    fn set_remember_token(&mut self, value: String) -> Result<()>;

    /// Column name of the "remember me" token.
    fn remember_token_name(&self) -> Result<Option<&str>>;
}

/// A resolved [`User`] bound to the configuration it was resolved with.
///
/// Dereferences to the underlying [`UserFields`] and serializes as the user.
#[derive(Clone, Debug, Serialize)]
#[serde(transparent)]
pub struct AuthenticatedUser {
    user: User,
    #[serde(skip)]
    config: Arc<IdentityConfig>,
}

impl AuthenticatedUser {
    pub(crate) fn new(user: User, config: Arc<IdentityConfig>) -> AuthenticatedUser {
        AuthenticatedUser { user, config }
    }

    /// The underlying user record.
    pub fn user(&self) -> &User {
        &self.user
    }

    pub(crate) fn user_mut(&mut self) -> &mut User {
        &mut self.user
    }

    /// Consumes the wrapper and returns the user record.
    pub fn into_user(self) -> User {
        self.user
    }

    fn remember_token_column(&self, operation: &'static str) -> Result<Option<&RememberTokenColumn>> {
        match self.config.policy() {
            CredentialPolicy::Strict => Err(Error::NotSupported(operation)),
            CredentialPolicy::Permissive { remember_token, .. } => Ok(remember_token.as_ref()),
        }
    }
}

impl Deref for AuthenticatedUser {
    type Target = UserFields;

    fn deref(&self) -> &Self::Target {
        self.user.fields()
    }
}

impl Authenticatable for AuthenticatedUser {
    fn auth_identifier_name(&self) -> &str {
        self.config.identifier().name()
    }

    fn auth_identifier(&self) -> Option<&str> {
        self.config.identifier().get(self.user.fields())
    }

    fn auth_password(&self) -> Result<String> {
        match self.config.policy() {
            CredentialPolicy::Strict => Err(Error::NotSupported("password authentication")),
            CredentialPolicy::Permissive { cipher, .. } => {
                let identifier = self.auth_identifier().unwrap_or_default();
                Ok(cipher.encrypt(identifier)?)
            }
        }
    }

    fn remember_token(&self) -> Result<Option<&str>> {
        let column = self.remember_token_column("remember token")?;
        Ok(column.and_then(|c| c.get(self.user.fields())))
    }

    fn set_remember_token(&mut self, value: String) -> Result<()> {
        let column = self.remember_token_column("remember token")?.cloned();
        if let Some(column) = column {
            column.set(self.user.fields_mut(), value);
        }
        Ok(())
    }

    fn remember_token_name(&self) -> Result<Option<&str>> {
        let column = self.remember_token_column("remember token")?;
        Ok(column.map(RememberTokenColumn::name))
    }
}
