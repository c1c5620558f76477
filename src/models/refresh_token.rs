use mongodb::bson::{oid::ObjectId, DateTime as BsonDateTime};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;

/// One issued refresh session. The plaintext token is never stored; the
/// record is keyed by its SHA-256 digest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshTokenRecord {
    #[serde(rename = "_id")]
    pub id: ObjectId,

    pub user_id: ObjectId,
    pub jti: String,

    pub token_hash: String,

    pub created_at: BsonDateTime,
    pub expires_at: BsonDateTime,

    pub revoked_at: Option<BsonDateTime>,
    /// Digest of the token that superseded this one during rotation.
    /// Set once, only by rotation, never by logout or mass revocation.
    pub replaced_by: Option<String>,
}

impl RefreshTokenRecord {
    /// Rejects an expiry that is not strictly in the future.
    pub fn new(
        user_id: ObjectId,
        jti: String,
        token_hash: String,
        expires_at: BsonDateTime,
    ) -> Result<Self, AppError> {
        Self::with_id(ObjectId::new(), user_id, jti, token_hash, expires_at)
    }

    /// Construction with a caller-chosen id, for seed and test fixtures.
    pub fn with_id(
        id: ObjectId,
        user_id: ObjectId,
        jti: String,
        token_hash: String,
        expires_at: BsonDateTime,
    ) -> Result<Self, AppError> {
        let now = BsonDateTime::now();
        if expires_at <= now {
            return Err(AppError::Validation(
                "refresh token expiry must be in the future".into(),
            ));
        }

        Ok(Self {
            id,
            user_id,
            jti,
            token_hash,
            created_at: now,
            expires_at,
            revoked_at: None,
            replaced_by: None,
        })
    }

    pub fn is_active(&self) -> bool {
        self.is_active_at(BsonDateTime::now())
    }

    /// Active ⇔ not revoked and not yet expired at `now`.
    pub fn is_active_at(&self, now: BsonDateTime) -> bool {
        self.revoked_at.is_none() && now < self.expires_at
    }

    /// Marks the record revoked. Idempotent: an already-revoked record keeps
    /// its original `revoked_at`.
    pub fn revoke(&mut self) {
        if self.revoked_at.is_none() {
            self.revoked_at = Some(BsonDateTime::now());
        }
    }

    /// Revocation caused by rotation: records the successor's digest.
    /// `replaced_by` is set at most once; a second rotation attempt on the
    /// same record leaves the original pointer intact.
    pub fn revoke_rotated(&mut self, successor_hash: String) {
        if self.replaced_by.is_none() {
            self.replaced_by = Some(successor_hash);
        }
        self.revoke();
    }
}
