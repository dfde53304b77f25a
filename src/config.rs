use std::env;

use thiserror::Error;

use crate::password::PasswordCipher;
use crate::user::UserFields;

/// Environment variable holding the identifier column name.
pub const IDENTIFIER_COLUMN_ENV: &str = "FIREBASE_IDENTIFIER_COLUMN";
/// Environment variable selecting the credential policy (`strict` or `permissive`).
pub const CREDENTIAL_POLICY_ENV: &str = "FIREBASE_CREDENTIAL_POLICY";
/// Environment variable holding the remember token column name.
pub const REMEMBER_TOKEN_COLUMN_ENV: &str = "FIREBASE_REMEMBER_TOKEN_COLUMN";
/// Environment variable holding the base64-encoded pseudo-password key.
pub const PASSWORD_KEY_ENV: &str = "FIREBASE_PASSWORD_KEY";

/// Errors raised while building an [`IdentityConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Column names must match `[A-Za-z_][A-Za-z0-9_]*`.
    #[error("invalid column name `{0}`")]
    InvalidColumnName(String),

    /// The credential policy is neither `strict` nor `permissive`.
    #[error("unknown credential policy `{0}`, expected `strict` or `permissive`")]
    InvalidPolicy(String),

    /// A remember token column was configured under the strict policy.
    #[error("a remember token column requires the permissive credential policy")]
    RememberTokenRequiresPermissive,

    /// The permissive policy was selected without a pseudo-password key.
    #[error("the permissive credential policy requires `FIREBASE_PASSWORD_KEY`")]
    MissingPasswordKey,

    /// A configured column would overwrite another user column.
    #[error("column `{0}` is already used by another user field")]
    ColumnConflict(String),

    /// The pseudo-password key could not be parsed.
    #[error(transparent)]
    InvalidPasswordKey(#[from] crate::password::CredentialError),
}

/// Columns every user record carries besides the configurable ones.
const PROFILE_COLUMNS: [&str; 3] = ["email", "name", "picture"];

pub(crate) fn validate_column(name: &str) -> Result<(), ConfigError> {
    let mut chars = name.chars();
    let valid = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');

    if valid {
        Ok(())
    } else {
        Err(ConfigError::InvalidColumnName(name.to_owned()))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum IdentifierField {
    Id,
    FirebaseId,
}

/// The column matched against the token's `sub` claim.
///
/// The column `id` maps onto [`UserFields::id`]; any other name maps onto the
/// dedicated [`UserFields::firebase_id`] slot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IdentifierColumn {
    name: String,
    field: IdentifierField,
}

impl IdentifierColumn {
    /// Default identifier column.
    pub const DEFAULT: &'static str = "id";

    /// Resolves the accessor for a column name.
    pub fn new(name: impl Into<String>) -> Result<IdentifierColumn, ConfigError> {
        let name = name.into();
        validate_column(&name)?;

        let field = if name == Self::DEFAULT {
            IdentifierField::Id
        } else {
            IdentifierField::FirebaseId
        };

        Ok(IdentifierColumn { name, field })
    }

    /// Column name as passed to the user store.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Reads the identifier from a user record.
    pub fn get<'a>(&self, fields: &'a UserFields) -> Option<&'a str> {
        match self.field {
            IdentifierField::Id => fields.id.as_deref(),
            IdentifierField::FirebaseId => fields.firebase_id.as_deref(),
        }
    }

    /// Writes the identifier onto a user record.
    pub fn set(&self, fields: &mut UserFields, value: String) {
        match self.field {
            IdentifierField::Id => fields.id = Some(value),
            IdentifierField::FirebaseId => fields.firebase_id = Some(value),
        }
    }
}

impl Default for IdentifierColumn {
    fn default() -> Self {
        IdentifierColumn {
            name: Self::DEFAULT.to_owned(),
            field: IdentifierField::Id,
        }
    }
}

/// The column storing the "remember me" token, mapped onto [`UserFields::remember_token`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RememberTokenColumn {
    name: String,
}

impl RememberTokenColumn {
    /// Validates the column name.
    pub fn new(name: impl Into<String>) -> Result<RememberTokenColumn, ConfigError> {
        let name = name.into();
        validate_column(&name)?;
        Ok(RememberTokenColumn { name })
    }

    /// Column name as passed to the user store.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Reads the token from a user record.
    pub fn get<'a>(&self, fields: &'a UserFields) -> Option<&'a str> {
        fields.remember_token.as_deref()
    }

    /// Writes the token onto a user record.
    pub fn set(&self, fields: &mut UserFields, value: String) {
        fields.remember_token = Some(value);
    }
}

/// How credential and remember-me operations behave for Firebase users.
#[derive(Clone, Debug, Default)]
pub enum CredentialPolicy {
    /// No password and no remember-me support; every such operation fails
    /// with [`Error::NotSupported`](crate::Error::NotSupported).
    #[default]
    Strict,

    /// A reversible pseudo-password is derived from the identifier, and
    /// remember tokens are stored when a column is configured.
    Permissive {
        /// Cipher used for the pseudo-password.
        cipher: PasswordCipher,
        /// Remember token column, `None` disables remember-me.
        remember_token: Option<RememberTokenColumn>,
    },
}

/// Deployment configuration for resolving Firebase users.
#[derive(Clone, Debug, Default)]
pub struct IdentityConfig {
    identifier: IdentifierColumn,
    policy: CredentialPolicy,
}

impl IdentityConfig {
    /// Starts a builder with the default `id` column and the strict policy.
    pub fn builder() -> IdentityConfigBuilder {
        IdentityConfigBuilder::default()
    }

    /// Loads the configuration from `FIREBASE_*` environment variables.
    pub fn from_env() -> Result<IdentityConfig, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Loads the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<IdentityConfig, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut builder = IdentityConfig::builder();

        if let Some(column) = lookup(IDENTIFIER_COLUMN_ENV) {
            builder = builder.identifier_column(column);
        }

        let policy = lookup(CREDENTIAL_POLICY_ENV).unwrap_or_else(|| "strict".to_owned());
        match policy.trim().to_ascii_lowercase().as_str() {
            "strict" => {}
            "permissive" => {
                let key = lookup(PASSWORD_KEY_ENV).ok_or(ConfigError::MissingPasswordKey)?;
                builder = builder.permissive(PasswordCipher::from_key(&key)?);
            }
            _ => return Err(ConfigError::InvalidPolicy(policy)),
        }

        if let Some(column) = lookup(REMEMBER_TOKEN_COLUMN_ENV) {
            builder = builder.remember_token_column(column);
        }

        builder.build()
    }

    /// The identifier column accessor.
    pub fn identifier(&self) -> &IdentifierColumn {
        &self.identifier
    }

    /// The credential policy.
    pub fn policy(&self) -> &CredentialPolicy {
        &self.policy
    }
}

/// Builder for [`IdentityConfig`]. Column names are validated in [`build`](Self::build).
#[derive(Debug, Default)]
pub struct IdentityConfigBuilder {
    identifier_column: Option<String>,
    cipher: Option<PasswordCipher>,
    remember_token_column: Option<String>,
}

impl IdentityConfigBuilder {
    /// Sets the column matched against the `sub` claim.
    #[must_use]
    pub fn identifier_column(mut self, column: impl Into<String>) -> Self {
        self.identifier_column = Some(column.into());
        self
    }

    /// Switches to the permissive policy using the given pseudo-password cipher.
    #[must_use]
    pub fn permissive(mut self, cipher: PasswordCipher) -> Self {
        self.cipher = Some(cipher);
        self
    }

    /// Sets the remember token column. Only valid with [`permissive`](Self::permissive).
    #[must_use]
    pub fn remember_token_column(mut self, column: impl Into<String>) -> Self {
        self.remember_token_column = Some(column.into());
        self
    }

    /// Validates and builds the configuration.
    pub fn build(self) -> Result<IdentityConfig, ConfigError> {
        let identifier = match self.identifier_column {
            Some(column) => IdentifierColumn::new(column)?,
            None => IdentifierColumn::default(),
        };

        if PROFILE_COLUMNS.contains(&identifier.name()) {
            return Err(ConfigError::ColumnConflict(identifier.name.clone()));
        }

        let remember_token = self
            .remember_token_column
            .map(RememberTokenColumn::new)
            .transpose()?;

        if let Some(column) = &remember_token {
            let name = column.name();
            if name == IdentifierColumn::DEFAULT
                || name == identifier.name()
                || PROFILE_COLUMNS.contains(&name)
            {
                return Err(ConfigError::ColumnConflict(column.name.clone()));
            }
        }

        let policy = match (self.cipher, remember_token) {
            (Some(cipher), remember_token) => CredentialPolicy::Permissive {
                cipher,
                remember_token,
            },
            (None, None) => CredentialPolicy::Strict,
            (None, Some(_)) => return Err(ConfigError::RememberTokenRequiresPermissive),
        };

        Ok(IdentityConfig { identifier, policy })
    }
}
