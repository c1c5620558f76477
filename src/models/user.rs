use mongodb::bson::{oid::ObjectId, DateTime as BsonDateTime};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: ObjectId,

    pub email: String,
    pub name: String,
    pub avatar: Option<String>,

    pub password_hash: String,
    pub created_at: BsonDateTime,
}

impl User {
    pub fn new(email: String, name: String, password_hash: String) -> Self {
        Self::with_id(ObjectId::new(), email, name, password_hash)
    }

    /// Construction with a caller-chosen id, for seed and test fixtures.
    pub fn with_id(id: ObjectId, email: String, name: String, password_hash: String) -> Self {
        Self {
            id,
            email,
            name,
            avatar: None,
            password_hash,
            created_at: BsonDateTime::now(),
        }
    }
}

/// Caller-facing user summary. Carries no credential material.
#[derive(Debug, Clone, Serialize)]
pub struct UserPublic {
    pub id: String,
    pub email: String,
    pub name: String,
    pub avatar: Option<String>,
    pub created_at: String,
}

impl From<User> for UserPublic {
    fn from(u: User) -> Self {
        Self {
            id: u.id.to_hex(),
            email: u.email,
            name: u.name,
            avatar: u.avatar,
            created_at: bson_to_rfc3339(u.created_at),
        }
    }
}

fn bson_to_rfc3339(dt: BsonDateTime) -> String {
    let ms = dt.timestamp_millis();
    let secs = ms / 1000;
    let nsec = ((ms % 1000) * 1_000_000) as u32;
    let chrono_dt = chrono::DateTime::<chrono::Utc>::from_timestamp(secs, nsec)
        .unwrap_or_else(|| chrono::DateTime::<chrono::Utc>::from_timestamp(0, 0).unwrap());
    chrono_dt.to_rfc3339()
}
