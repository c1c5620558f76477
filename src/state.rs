use std::sync::Arc;

use mongodb::{
    options::{ClientOptions, IndexOptions},
    Client, Collection, IndexModel,
};

use crate::{
    auth::{
        jwt::Keys,
        tokens::{JwtTokenIssuer, TokenIssuer},
    },
    config::Config,
    models::{refresh_token::RefreshTokenRecord, user::User},
    password::{Argon2Credential, CredentialHasher},
    services::session_service::SessionService,
    store::{
        mongo::{MongoSessionStore, MongoUserStore},
        SessionStore, UserStore,
    },
};

pub struct AppState {
    pub sessions: Arc<SessionService>,
    pub users: Arc<dyn UserStore>,
    pub keys: Keys,
    pub cfg: Arc<Config>,
}

impl AppState {
    pub async fn new(cfg: &Config) -> mongodb::error::Result<Self> {
        let mut opts = ClientOptions::parse(&cfg.mongodb_uri).await?;
        opts.app_name = Some("auth-sessions".to_string());
        let client = Client::with_options(opts)?;
        let db = client.database(&cfg.db_name);

        let users: Collection<User> = db.collection("users");
        let refresh_tokens: Collection<RefreshTokenRecord> = db.collection("refresh_tokens");

        let email_index = IndexModel::builder()
            .keys(mongodb::bson::doc! { "email": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();
        let _ = users.create_index(email_index).await?;

        let hash_index = IndexModel::builder()
            .keys(mongodb::bson::doc! { "token_hash": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();
        let _ = refresh_tokens.create_index(hash_index).await?;

        // jti unique
        let jti_index = IndexModel::builder()
            .keys(mongodb::bson::doc! { "jti": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();
        let _ = refresh_tokens.create_index(jti_index).await?;

        let user_store: Arc<dyn UserStore> = Arc::new(MongoUserStore::new(users));
        let session_store: Arc<dyn SessionStore> = Arc::new(MongoSessionStore::new(refresh_tokens));
        let credentials: Arc<dyn CredentialHasher> = Arc::new(Argon2Credential);
        let issuer: Arc<dyn TokenIssuer> = Arc::new(JwtTokenIssuer::new(
            &cfg.jwt_secret,
            cfg.jwt_access_ttl_seconds,
            cfg.jwt_refresh_ttl_seconds,
        ));

        let sessions = Arc::new(SessionService::new(
            session_store,
            Arc::clone(&user_store),
            credentials,
            issuer,
        ));

        Ok(Self {
            sessions,
            users: user_store,
            keys: Keys::new(&cfg.jwt_secret),
            cfg: Arc::new(cfg.clone()),
        })
    }
}
