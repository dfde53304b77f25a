use thiserror::Error;

/// Result alias for [`UserStore`](super::UserStore) operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Errors raised by a [`UserStore`](super::UserStore) implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store does not know the requested column.
    #[error("unknown user column `{0}`")]
    UnknownColumn(String),

    /// An update targeted a record that is no longer in the store.
    #[error("user record `{0}` no longer exists")]
    RecordNotFound(String),

    /// The backend failed to read or write.
    #[error("user store backend failure: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl StoreError {
    /// Wraps a backend-specific error.
    pub fn backend(err: impl std::error::Error + Send + Sync + 'static) -> StoreError {
        StoreError::Backend(Box::new(err))
    }
}
