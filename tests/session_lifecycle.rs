//! Integration tests for the session lifecycle: login, refresh rotation,
//! logout, mass revocation and password reset, driven end-to-end over the
//! in-memory reference stores with the real argon2 and JWT capabilities.

use std::sync::Arc;

use mongodb::bson::oid::ObjectId;

use auth_sessions::auth::jwt::sha256_hex;
use auth_sessions::auth::tokens::{JwtTokenIssuer, TokenIssuer};
use auth_sessions::errors::AppError;
use auth_sessions::models::user::User;
use auth_sessions::password::{Argon2Credential, CredentialHasher};
use auth_sessions::services::session_service::SessionService;
use auth_sessions::store::memory::{MemorySessionStore, MemoryUserStore};
use auth_sessions::store::{SessionStore, UserStore};

const EMAIL: &str = "ada@example.com";
const PASSWORD: &str = "correct horse battery";

struct Harness {
    service: Arc<SessionService>,
    sessions: Arc<MemorySessionStore>,
    users: Arc<MemoryUserStore>,
    user_id: ObjectId,
}

/// Seeds one user and wires the service over the in-memory stores.
async fn setup() -> Harness {
    let sessions = Arc::new(MemorySessionStore::new());
    let users = Arc::new(MemoryUserStore::new());

    let password_hash = Argon2Credential.hash(PASSWORD).expect("hash test password");
    let user = User::new(EMAIL.into(), "Ada".into(), password_hash);
    let user_id = user.id;
    users.seed(user).await;

    let service = Arc::new(SessionService::new(
        Arc::clone(&sessions) as Arc<dyn SessionStore>,
        Arc::clone(&users) as Arc<dyn UserStore>,
        Arc::new(Argon2Credential),
        Arc::new(JwtTokenIssuer::new("test-secret", 900, 3600)),
    ));

    Harness {
        service,
        sessions,
        users,
        user_id,
    }
}

#[tokio::test]
async fn login_returns_pair_and_user_summary() {
    let h = setup().await;

    let out = h.service.login(EMAIL, PASSWORD).await.expect("login");
    assert_eq!(out.user.email, EMAIL);
    assert_eq!(out.user.name, "Ada");
    assert_eq!(out.tokens.token_type, "Bearer");
    assert_ne!(out.tokens.access_token, out.tokens.refresh_token);

    let active = h.sessions.find_active_by_user(h.user_id).await.unwrap();
    assert_eq!(active.len(), 1, "login opens exactly one session");
}

#[tokio::test]
async fn empty_credentials_are_validation_errors() {
    let h = setup().await;

    assert!(matches!(
        h.service.login("", PASSWORD).await,
        Err(AppError::Validation(_))
    ));
    assert!(matches!(
        h.service.login(EMAIL, "   ").await,
        Err(AppError::Validation(_))
    ));
    assert!(matches!(
        h.service.refresh("  ").await,
        Err(AppError::Validation(_))
    ));
    assert!(matches!(
        h.service.logout("").await,
        Err(AppError::Validation(_))
    ));
}

#[tokio::test]
async fn credential_failures_are_indistinguishable() {
    let h = setup().await;

    let unknown = h
        .service
        .login("unknown@example.com", "anything-goes")
        .await
        .unwrap_err();
    let wrong = h.service.login(EMAIL, "wrongpassword").await.unwrap_err();

    assert!(matches!(unknown, AppError::InvalidCredentials));
    assert!(matches!(wrong, AppError::InvalidCredentials));
    assert_eq!(unknown.to_string(), wrong.to_string());
    assert_eq!(unknown.to_string(), "invalid email or password");
}

#[tokio::test]
async fn second_login_revokes_first_session() {
    let h = setup().await;

    let first = h.service.login(EMAIL, PASSWORD).await.unwrap();
    let second = h.service.login(EMAIL, PASSWORD).await.unwrap();

    let active = h.sessions.find_active_by_user(h.user_id).await.unwrap();
    assert_eq!(active.len(), 1, "only the most recent session is active");

    assert!(matches!(
        h.service.refresh(&first.tokens.refresh_token).await,
        Err(AppError::Unauthorized)
    ));
    h.service
        .refresh(&second.tokens.refresh_token)
        .await
        .expect("latest session still refreshes");
}

#[tokio::test]
async fn rotation_is_one_shot() {
    let h = setup().await;

    let login = h.service.login(EMAIL, PASSWORD).await.unwrap();
    let refresh1 = login.tokens.refresh_token;

    let rotated = h.service.refresh(&refresh1).await.expect("first rotation");

    // reuse of the rotated token is a theft signal and must fail
    assert!(matches!(
        h.service.refresh(&refresh1).await,
        Err(AppError::Unauthorized)
    ));

    h.service
        .refresh(&rotated.refresh_token)
        .await
        .expect("successor token is valid");
}

#[tokio::test]
async fn rotation_links_successor_record() {
    let h = setup().await;

    let login = h.service.login(EMAIL, PASSWORD).await.unwrap();
    let refresh1 = login.tokens.refresh_token;
    let rotated = h.service.refresh(&refresh1).await.unwrap();

    let old = h
        .sessions
        .find_by_token_hash(&sha256_hex(&refresh1))
        .await
        .unwrap()
        .expect("rotated record is retained, not deleted");

    assert!(old.revoked_at.is_some());
    assert_eq!(
        old.replaced_by.as_deref(),
        Some(sha256_hex(&rotated.refresh_token).as_str())
    );

    let new = h
        .sessions
        .find_by_token_hash(&sha256_hex(&rotated.refresh_token))
        .await
        .unwrap()
        .expect("successor record persisted");
    assert!(new.is_active());
    assert!(new.replaced_by.is_none());
}

#[tokio::test]
async fn logout_is_idempotent() {
    let h = setup().await;

    let login = h.service.login(EMAIL, PASSWORD).await.unwrap();
    let token = login.tokens.refresh_token;

    assert!(h.service.logout(&token).await.unwrap());
    assert!(!h.service.logout(&token).await.unwrap());

    // the token never becomes active again
    assert!(matches!(
        h.service.refresh(&token).await,
        Err(AppError::Unauthorized)
    ));

    let record = h
        .sessions
        .find_by_token_hash(&sha256_hex(&token))
        .await
        .unwrap()
        .unwrap();
    assert!(record.revoked_at.is_some());
    assert!(record.replaced_by.is_none(), "logout sets no successor");
}

#[tokio::test]
async fn logout_of_unknown_token_is_false_not_an_error() {
    let h = setup().await;
    assert!(!h.service.logout("never-issued").await.unwrap());
}

#[tokio::test]
async fn refresh_rejects_foreign_and_malformed_tokens() {
    let h = setup().await;
    h.service.login(EMAIL, PASSWORD).await.unwrap();

    assert!(matches!(
        h.service.refresh("not-a-jwt").await,
        Err(AppError::Unauthorized)
    ));

    // validly signed elsewhere, unknown to this deployment
    let foreign = JwtTokenIssuer::new("other-secret", 900, 3600)
        .issue(h.user_id)
        .map(|t| t.refresh_token)
        .unwrap();
    assert!(matches!(
        h.service.refresh(&foreign).await,
        Err(AppError::Unauthorized)
    ));
}

#[tokio::test]
async fn refresh_fails_when_user_no_longer_exists() {
    let h = setup().await;

    let login = h.service.login(EMAIL, PASSWORD).await.unwrap();
    h.users.remove(h.user_id).await;

    assert!(matches!(
        h.service.refresh(&login.tokens.refresh_token).await,
        Err(AppError::Unauthorized)
    ));
}

#[tokio::test]
async fn revoke_all_sessions_clears_active_records() {
    let h = setup().await;

    let login = h.service.login(EMAIL, PASSWORD).await.unwrap();
    h.service.revoke_all_sessions(h.user_id).await.unwrap();

    assert!(h
        .sessions
        .find_active_by_user(h.user_id)
        .await
        .unwrap()
        .is_empty());
    assert!(matches!(
        h.service.refresh(&login.tokens.refresh_token).await,
        Err(AppError::Unauthorized)
    ));

    // per-token idempotent: a second sweep is a no-op, not an error
    h.service.revoke_all_sessions(h.user_id).await.unwrap();
}

#[tokio::test]
async fn concurrent_logins_leave_one_active_session() {
    let h = setup().await;

    let (a, b) = tokio::join!(
        h.service.login(EMAIL, PASSWORD),
        h.service.login(EMAIL, PASSWORD),
    );
    a.expect("first concurrent login");
    b.expect("second concurrent login");

    let active = h.sessions.find_active_by_user(h.user_id).await.unwrap();
    assert_eq!(
        active.len(),
        1,
        "mass-revoke-then-issue must serialize per user"
    );
}

#[tokio::test]
async fn reset_password_replaces_credential() {
    let h = setup().await;

    assert!(matches!(
        h.service
            .reset_password("nobody@example.com", "whatever-new")
            .await,
        Err(AppError::NotFound)
    ));

    let login = h.service.login(EMAIL, PASSWORD).await.unwrap();

    let reset = h
        .service
        .reset_password(EMAIL, "brand new password")
        .await
        .unwrap();
    assert!(reset);

    assert!(matches!(
        h.service.login(EMAIL, PASSWORD).await,
        Err(AppError::InvalidCredentials)
    ));
    h.service
        .login(EMAIL, "brand new password")
        .await
        .expect("new credential works");

    // reference behavior: reset alone does not revoke existing sessions
    let record = h
        .sessions
        .find_by_token_hash(&sha256_hex(&login.tokens.refresh_token))
        .await
        .unwrap()
        .unwrap();
    assert!(record.revoked_at.is_none());
}

#[tokio::test]
async fn full_lifecycle_scenario() {
    let h = setup().await;

    // login → {access, refresh1}
    let login = h.service.login(EMAIL, PASSWORD).await.unwrap();
    let refresh1 = login.tokens.refresh_token;

    // refresh1 → refresh2, refresh1 revoked and linked forward
    let second = h.service.refresh(&refresh1).await.unwrap();
    let refresh2 = second.refresh_token;
    let old = h
        .sessions
        .find_by_token_hash(&sha256_hex(&refresh1))
        .await
        .unwrap()
        .unwrap();
    assert!(old.revoked_at.is_some());
    assert_eq!(old.replaced_by.as_deref(), Some(sha256_hex(&refresh2).as_str()));

    // replaying refresh1 is unauthorized
    assert!(matches!(
        h.service.refresh(&refresh1).await,
        Err(AppError::Unauthorized)
    ));

    // refresh2 → refresh3
    let third = h.service.refresh(&refresh2).await.unwrap();
    let refresh3 = third.refresh_token;

    // logout ends the chain
    assert!(h.service.logout(&refresh3).await.unwrap());
    assert!(matches!(
        h.service.refresh(&refresh3).await,
        Err(AppError::Unauthorized)
    ));
}
