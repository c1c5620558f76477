//! Production stores backed by mongodb collections. Unique indexes on
//! `token_hash` and `jti` (created at startup, see `AppState::new`) make
//! duplicate insertion a store-level conflict rather than a race.

use async_trait::async_trait;
use futures_util::TryStreamExt;
use mongodb::{
    bson::{doc, oid::ObjectId, DateTime as BsonDateTime},
    error::{ErrorKind, WriteFailure},
    Collection,
};

use crate::{
    errors::AppError,
    models::{refresh_token::RefreshTokenRecord, user::User},
    store::{SessionStore, UserStore},
};

const DUPLICATE_KEY: i32 = 11000;

fn is_duplicate_key(e: &mongodb::error::Error) -> bool {
    matches!(
        *e.kind,
        ErrorKind::Write(WriteFailure::WriteError(ref we)) if we.code == DUPLICATE_KEY
    )
}

pub struct MongoSessionStore {
    records: Collection<RefreshTokenRecord>,
}

impl MongoSessionStore {
    pub fn new(records: Collection<RefreshTokenRecord>) -> Self {
        Self { records }
    }
}

#[async_trait]
impl SessionStore for MongoSessionStore {
    async fn find_by_token_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<RefreshTokenRecord>, AppError> {
        Ok(self
            .records
            .find_one(doc! { "token_hash": token_hash })
            .await?)
    }

    async fn find_active_by_user(
        &self,
        user_id: ObjectId,
    ) -> Result<Vec<RefreshTokenRecord>, AppError> {
        let cursor = self
            .records
            .find(doc! {
                "user_id": user_id,
                "revoked_at": null,
                "expires_at": { "$gt": BsonDateTime::now() },
            })
            .await?;

        Ok(cursor.try_collect().await?)
    }

    async fn insert(&self, record: RefreshTokenRecord) -> Result<(), AppError> {
        self.records.insert_one(record).await.map_err(|e| {
            if is_duplicate_key(&e) {
                AppError::Conflict("duplicate refresh token".into())
            } else {
                e.into()
            }
        })?;
        Ok(())
    }

    async fn update(&self, record: &RefreshTokenRecord) -> Result<(), AppError> {
        let result = self
            .records
            .replace_one(doc! { "_id": record.id }, record)
            .await?;

        if result.matched_count == 0 {
            return Err(AppError::Conflict(format!(
                "update of unknown refresh token record {}",
                record.id.to_hex()
            )));
        }
        Ok(())
    }

    async fn purge_expired(&self) -> Result<u64, AppError> {
        let result = self
            .records
            .delete_many(doc! { "expires_at": { "$lt": BsonDateTime::now() } })
            .await?;
        Ok(result.deleted_count)
    }
}

pub struct MongoUserStore {
    users: Collection<User>,
}

impl MongoUserStore {
    pub fn new(users: Collection<User>) -> Self {
        Self { users }
    }
}

#[async_trait]
impl UserStore for MongoUserStore {
    async fn get_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        Ok(self.users.find_one(doc! { "email": email }).await?)
    }

    async fn get_by_id(&self, id: ObjectId) -> Result<Option<User>, AppError> {
        Ok(self.users.find_one(doc! { "_id": id }).await?)
    }

    async fn save(&self, user: &User) -> Result<(), AppError> {
        let result = self.users.replace_one(doc! { "_id": user.id }, user).await?;
        if result.matched_count == 0 {
            return Err(AppError::Conflict(format!(
                "save of unknown user {}",
                user.id.to_hex()
            )));
        }
        Ok(())
    }
}
