pub mod memory;
pub mod mongo;

use async_trait::async_trait;
use mongodb::bson::oid::ObjectId;

use crate::{
    errors::AppError,
    models::{refresh_token::RefreshTokenRecord, user::User},
};

/// Durable record of issued refresh tokens, keyed by token digest and by
/// owning user. Every operation is atomic with respect to a single record;
/// the session service never assumes cross-record transactions.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Exact-match lookup by token digest, regardless of revocation or
    /// expiry. Callers check `is_active` themselves.
    async fn find_by_token_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<RefreshTokenRecord>, AppError>;

    /// All currently active records for a user, for mass revocation.
    async fn find_active_by_user(
        &self,
        user_id: ObjectId,
    ) -> Result<Vec<RefreshTokenRecord>, AppError>;

    /// Rejects a duplicate token digest with a conflict error.
    async fn insert(&self, record: RefreshTokenRecord) -> Result<(), AppError>;

    /// Replaces the stored record. An unknown id is a conflict error, never
    /// a silent upsert.
    async fn update(&self, record: &RefreshTokenRecord) -> Result<(), AppError>;

    /// Housekeeping sweep: removes every record whose expiry has passed.
    /// Returns the number of records removed. Not part of the request path.
    async fn purge_expired(&self) -> Result<u64, AppError>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn get_by_email(&self, email: &str) -> Result<Option<User>, AppError>;
    async fn get_by_id(&self, id: ObjectId) -> Result<Option<User>, AppError>;

    /// Persists a credential replacement. The user must already exist.
    async fn save(&self, user: &User) -> Result<(), AppError>;
}
