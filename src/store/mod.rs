//! Persistence seam for user records.

mod error;
mod memory;
#[cfg(feature = "sqlite")]
mod sqlite;

pub use error::*;
pub use memory::*;
#[cfg(feature = "sqlite")]
pub use sqlite::*;

use async_trait::async_trait;

use crate::user::User;

/// Storage backend for user records.
///
/// Implementations rely on the backend's own atomicity for single reads and
/// writes. No locking spans a lookup and the following write.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Returns the first record whose `column` equals `value` exactly.
    ///
    /// At most one record is expected to match. If several do, only the first
    /// one is returned.
    async fn find_one_where(&self, column: &str, value: &str) -> StoreResult<Option<User>>;

    /// Creates the record if it does not [exist](User::exists) yet, otherwise
    /// updates it.
    ///
    /// On create, a store-managed primary key is written back onto the record
    /// when none is set. Callers mark the record as persisted afterwards.
    async fn persist(&self, user: &mut User) -> StoreResult<()>;
}
