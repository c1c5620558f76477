//! Session lifecycle: login, refresh rotation, logout, revocation, password
//! reset. All token state lives in the session store; nothing is cached
//! across calls; every validation re-reads the store.
//!
//! Operations commit state in single store calls, so a dropped (cancelled)
//! future aborts before the next mutation is persisted.

use std::{collections::HashMap, sync::Arc};

use mongodb::bson::{oid::ObjectId, DateTime as BsonDateTime};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::{
    auth::{
        jwt::sha256_hex,
        tokens::{IssuedTokens, TokenIssuer},
    },
    errors::AppError,
    models::{refresh_token::RefreshTokenRecord, user::UserPublic},
    password::CredentialHasher,
    store::{SessionStore, UserStore},
};

#[derive(Debug)]
pub struct LoginOutput {
    pub tokens: IssuedTokens,
    pub user: UserPublic,
}

pub struct SessionService {
    sessions: Arc<dyn SessionStore>,
    users: Arc<dyn UserStore>,
    credentials: Arc<dyn CredentialHasher>,
    tokens: Arc<dyn TokenIssuer>,

    // Serializes read-modify-write sequences on one user's sessions. Two
    // concurrent logins for the same user must not both observe "no active
    // sessions"; the same lock makes rotation one-shot under racing
    // refresh calls. The map only ever grows, one entry per user seen.
    user_locks: Mutex<HashMap<ObjectId, Arc<Mutex<()>>>>,
}

impl SessionService {
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        users: Arc<dyn UserStore>,
        credentials: Arc<dyn CredentialHasher>,
        tokens: Arc<dyn TokenIssuer>,
    ) -> Self {
        Self {
            sessions,
            users,
            credentials,
            tokens,
            user_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Verifies credentials and opens the user's sole active session.
    ///
    /// Unknown email and wrong password are deliberately indistinguishable.
    /// On success every previously active session is revoked, durably,
    /// before the new refresh token is persisted.
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginOutput, AppError> {
        let email = email.trim().to_lowercase();
        if email.is_empty() {
            return Err(AppError::Validation("email is required".into()));
        }
        if password.trim().is_empty() {
            return Err(AppError::Validation("password is required".into()));
        }

        let user = self
            .users
            .get_by_email(&email)
            .await?
            .ok_or(AppError::InvalidCredentials)?;

        if !self.credentials.verify(password, &user.password_hash)? {
            return Err(AppError::InvalidCredentials);
        }

        let _guard = self.lock_user(user.id).await;

        self.revoke_all_locked(user.id).await?;

        let issued = self.tokens.issue(user.id)?;
        self.persist_issued(user.id, &issued).await?;

        tracing::info!(user_id = %user.id.to_hex(), "login succeeded, prior sessions revoked");

        Ok(LoginOutput {
            tokens: issued,
            user: user.into(),
        })
    }

    /// Rotates a refresh token: the presented record is revoked with a
    /// forward pointer to its successor, then the successor is persisted.
    /// Rotation is one-shot: a rotated token can never be redeemed again,
    /// so reuse of one is a theft signal that fails here.
    pub async fn refresh(&self, presented: &str) -> Result<IssuedTokens, AppError> {
        if presented.trim().is_empty() {
            return Err(AppError::Validation("refresh token is required".into()));
        }

        // every check below collapses into Unauthorized; the caller learns
        // nothing about which one failed
        let user_id = self
            .tokens
            .validate_refresh(presented)
            .map_err(|_| AppError::Unauthorized)?;

        let _guard = self.lock_user(user_id).await;

        let token_hash = sha256_hex(presented);
        let mut current = self
            .sessions
            .find_by_token_hash(&token_hash)
            .await?
            .ok_or(AppError::Unauthorized)?;

        if current.user_id != user_id || !current.is_active() {
            return Err(AppError::Unauthorized);
        }

        let user = self
            .users
            .get_by_id(user_id)
            .await?
            .ok_or(AppError::Unauthorized)?;

        let issued = self.tokens.issue(user.id)?;

        // revoke-then-insert: a crash in between loses the session rather
        // than leaving two active ones
        current.revoke_rotated(sha256_hex(&issued.refresh_token));
        self.sessions.update(&current).await?;
        self.persist_issued(user.id, &issued).await?;

        Ok(issued)
    }

    /// Idempotent best-effort logout. A missing or already-inactive record
    /// yields `false`; an active one is revoked (no successor pointer) and
    /// the call returns `true`.
    pub async fn logout(&self, presented: &str) -> Result<bool, AppError> {
        if presented.trim().is_empty() {
            return Err(AppError::Validation("refresh token is required".into()));
        }

        let token_hash = sha256_hex(presented);
        let Some(record) = self.sessions.find_by_token_hash(&token_hash).await? else {
            return Ok(false);
        };

        let _guard = self.lock_user(record.user_id).await;

        // re-read under the lock; a rotation may have won the race
        let Some(mut record) = self.sessions.find_by_token_hash(&token_hash).await? else {
            return Ok(false);
        };
        if !record.is_active() {
            return Ok(false);
        }

        record.revoke();
        self.sessions.update(&record).await?;
        Ok(true)
    }

    /// "Log out everywhere": revokes every currently active session of the
    /// user. Already-revoked records are left untouched.
    pub async fn revoke_all_sessions(&self, user_id: ObjectId) -> Result<(), AppError> {
        let _guard = self.lock_user(user_id).await;
        self.revoke_all_locked(user_id).await
    }

    /// Replaces the stored credential. Existing sessions stay active; a
    /// caller wanting a clean slate calls `revoke_all_sessions` as well.
    pub async fn reset_password(&self, email: &str, new_password: &str) -> Result<bool, AppError> {
        let email = email.trim().to_lowercase();
        if email.is_empty() {
            return Err(AppError::Validation("email is required".into()));
        }
        if new_password.trim().is_empty() {
            return Err(AppError::Validation("password is required".into()));
        }

        let mut user = self
            .users
            .get_by_email(&email)
            .await?
            .ok_or(AppError::NotFound)?;

        user.password_hash = self.credentials.hash(new_password)?;
        self.users.save(&user).await?;

        tracing::info!(user_id = %user.id.to_hex(), "password reset");
        Ok(true)
    }

    /// Housekeeping sweep over fully expired records. Not on the request
    /// path; driven by an interval task at startup.
    pub async fn purge_expired_sessions(&self) -> Result<u64, AppError> {
        self.sessions.purge_expired().await
    }

    async fn revoke_all_locked(&self, user_id: ObjectId) -> Result<(), AppError> {
        let active = self.sessions.find_active_by_user(user_id).await?;
        for mut record in active {
            record.revoke();
            self.sessions.update(&record).await?;
        }
        Ok(())
    }

    async fn persist_issued(
        &self,
        user_id: ObjectId,
        issued: &IssuedTokens,
    ) -> Result<(), AppError> {
        let record = RefreshTokenRecord::new(
            user_id,
            issued.refresh_jti.clone(),
            sha256_hex(&issued.refresh_token),
            BsonDateTime::from_millis(issued.expires_at.timestamp_millis()),
        )?;
        self.sessions.insert(record).await
    }

    async fn lock_user(&self, user_id: ObjectId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.user_locks.lock().await;
            locks.entry(user_id).or_default().clone()
        };
        lock.lock_owned().await
    }
}
