//! Principal store trait for dependency injection and testing.
//!
//! The session subsystem treats the store as a keyed document store: a
//! principal, including its nested session list, is saved as one unit and
//! guarded by an optimistic version check.

use async_trait::async_trait;
use thiserror::Error;

use crate::models::user::{LoginKey, Principal, PrincipalUpdate};
use crate::types::UserId;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The stored version no longer matches the version that was read.
    #[error("principal was modified concurrently")]
    Conflict,
    /// A unique key (email or mobile) already belongs to another principal.
    #[error("duplicate unique key: {0}")]
    Duplicate(String),
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Repository trait for principal records.
///
/// Use `MockPrincipalStore` in unit tests to script store behaviour.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PrincipalStore: Send + Sync {
    /// Find a principal by ID.
    async fn find_by_id(&self, id: UserId) -> StoreResult<Option<Principal>>;

    /// Find a principal by email or mobile number.
    async fn find_by_unique_key(&self, key: &LoginKey) -> StoreResult<Option<Principal>>;

    /// Upsert the whole principal document, sessions included.
    ///
    /// Succeeds only if the stored version equals `principal.version` (a new
    /// record must carry version 0). Returns the stored record with its
    /// version incremented.
    async fn save(&self, principal: &Principal) -> StoreResult<Principal>;

    /// Update scalar fields without touching the session list.
    async fn update_fields(
        &self,
        id: UserId,
        update: PrincipalUpdate,
    ) -> StoreResult<Option<Principal>>;

    /// List principals ordered by creation time, with the total count.
    async fn list(&self, limit: i64, offset: i64) -> StoreResult<(Vec<Principal>, i64)>;
}
