/// A crate-wide result type alias using the custom [`Error`] enum.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for resolving Firebase identities into users.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A required claim (`sub` or `email`) is absent from the verified token.
    #[error("missing required claim `{0}`")]
    MissingClaim(&'static str),

    /// A consumed claim holds an array or object instead of a scalar value.
    #[error("claim `{0}` must be a string, number or boolean")]
    InvalidClaim(&'static str),

    /// A credential or remember-me operation was invoked under the strict policy.
    #[error("{0} is not supported for Firebase users")]
    NotSupported(&'static str),

    /// The user store failed to look up or persist a record.
    #[error(transparent)]
    Store(#[from] crate::store::StoreError),

    /// The token verifier rejected the ID token.
    #[error(transparent)]
    Verification(#[from] crate::verifier::VerificationError),

    /// The pseudo-password could not be encrypted or decrypted.
    #[error(transparent)]
    Credential(#[from] crate::password::CredentialError),

    /// The identity configuration is invalid.
    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),
}
