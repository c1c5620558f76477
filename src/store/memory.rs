//! In-process reference stores: coarse-locked maps, used by tests and seeds.

use std::collections::HashMap;

use async_trait::async_trait;
use mongodb::bson::{oid::ObjectId, DateTime as BsonDateTime};
use tokio::sync::RwLock;

use crate::{
    errors::AppError,
    models::{refresh_token::RefreshTokenRecord, user::User},
    store::{SessionStore, UserStore},
};

/// Reference session store. A single write lock around the map gives the
/// atomic per-record read-modify-write the contract requires.
#[derive(Default)]
pub struct MemorySessionStore {
    // keyed by token digest
    records: RwLock<HashMap<String, RefreshTokenRecord>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn find_by_token_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<RefreshTokenRecord>, AppError> {
        Ok(self.records.read().await.get(token_hash).cloned())
    }

    async fn find_active_by_user(
        &self,
        user_id: ObjectId,
    ) -> Result<Vec<RefreshTokenRecord>, AppError> {
        let records = self.records.read().await;
        Ok(records
            .values()
            .filter(|r| r.user_id == user_id && r.is_active())
            .cloned()
            .collect())
    }

    async fn insert(&self, record: RefreshTokenRecord) -> Result<(), AppError> {
        let mut records = self.records.write().await;
        if records.contains_key(&record.token_hash) {
            return Err(AppError::Conflict("duplicate refresh token".into()));
        }
        records.insert(record.token_hash.clone(), record);
        Ok(())
    }

    async fn update(&self, record: &RefreshTokenRecord) -> Result<(), AppError> {
        let mut records = self.records.write().await;
        match records.get_mut(&record.token_hash) {
            Some(existing) if existing.id == record.id => {
                *existing = record.clone();
                Ok(())
            }
            _ => Err(AppError::Conflict(format!(
                "update of unknown refresh token record {}",
                record.id.to_hex()
            ))),
        }
    }

    async fn purge_expired(&self) -> Result<u64, AppError> {
        let now = BsonDateTime::now();
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|_, r| now < r.expires_at);
        Ok((before - records.len()) as u64)
    }
}

#[derive(Default)]
pub struct MemoryUserStore {
    users: RwLock<HashMap<ObjectId, User>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a user, id included, the way fixtures do.
    pub async fn seed(&self, user: User) {
        self.users.write().await.insert(user.id, user);
    }

    /// Fixture companion to `seed`.
    pub async fn remove(&self, id: ObjectId) {
        self.users.write().await.remove(&id);
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn get_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        // linear scan; the reference store holds a handful of seeded users
        let users = self.users.read().await;
        Ok(users.values().find(|u| u.email == email).cloned())
    }

    async fn get_by_id(&self, id: ObjectId) -> Result<Option<User>, AppError> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn save(&self, user: &User) -> Result<(), AppError> {
        let mut users = self.users.write().await;
        match users.get_mut(&user.id) {
            Some(existing) => {
                *existing = user.clone();
                Ok(())
            }
            None => Err(AppError::Conflict(format!(
                "save of unknown user {}",
                user.id.to_hex()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn future(secs: i64) -> BsonDateTime {
        BsonDateTime::from_millis(BsonDateTime::now().timestamp_millis() + secs * 1000)
    }

    fn record(user_id: ObjectId, hash: &str) -> RefreshTokenRecord {
        RefreshTokenRecord::new(user_id, "jti".into(), hash.into(), future(3600)).unwrap()
    }

    #[tokio::test]
    async fn insert_rejects_duplicate_token() {
        let store = MemorySessionStore::new();
        let user = ObjectId::new();
        store.insert(record(user, "h1")).await.unwrap();

        let dup = store.insert(record(user, "h1")).await;
        assert!(matches!(dup, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn update_of_unknown_record_fails_loudly() {
        let store = MemorySessionStore::new();
        let rec = record(ObjectId::new(), "h1");
        assert!(matches!(
            store.update(&rec).await,
            Err(AppError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn find_active_skips_revoked_records() {
        let store = MemorySessionStore::new();
        let user = ObjectId::new();

        let mut revoked = record(user, "h1");
        revoked.revoke();
        store.insert(revoked).await.unwrap();
        store.insert(record(user, "h2")).await.unwrap();
        store.insert(record(ObjectId::new(), "h3")).await.unwrap();

        let active = store.find_active_by_user(user).await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].token_hash, "h2");
    }

    #[tokio::test]
    async fn purge_removes_only_expired_records() {
        let store = MemorySessionStore::new();
        let user = ObjectId::new();
        store.insert(record(user, "h1")).await.unwrap();

        // expired row planted directly; construction forbids past expiry
        let mut stale = record(user, "h2");
        stale.expires_at = BsonDateTime::from_millis(BsonDateTime::now().timestamp_millis() - 1000);
        {
            let mut records = store.records.write().await;
            records.insert(stale.token_hash.clone(), stale);
        }

        assert_eq!(store.purge_expired().await.unwrap(), 1);
        assert!(store.find_by_token_hash("h1").await.unwrap().is_some());
        assert!(store.find_by_token_hash("h2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn user_save_requires_existing_user() {
        let store = MemoryUserStore::new();
        let user = User::new("a@b.c".into(), "A".into(), "hash".into());
        assert!(store.save(&user).await.is_err());

        store.seed(user.clone()).await;
        let mut updated = user;
        updated.password_hash = "hash2".into();
        store.save(&updated).await.unwrap();

        let found = store.get_by_email("a@b.c").await.unwrap().unwrap();
        assert_eq!(found.password_hash, "hash2");
    }
}
