use axum::{extract::State, Json};
use mongodb::bson::oid::ObjectId;
use std::sync::Arc;

use crate::{
    auth::jwt::AuthClaims,
    dto::auth::{
        LoginRequest, LoginResponse, RefreshRequest, RefreshResponse, ResetPasswordRequest,
    },
    errors::AppError,
    models::user::UserPublic,
    state::AppState,
};

pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let out = state.sessions.login(&req.email, &req.password).await?;

    Ok(Json(LoginResponse {
        access_token: out.tokens.access_token,
        refresh_token: out.tokens.refresh_token,
        token_type: out.tokens.token_type,
        expires_at: out.tokens.expires_at,
        user: out.user,
    }))
}

pub async fn refresh(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RefreshRequest>,
) -> Result<Json<RefreshResponse>, AppError> {
    let issued = state.sessions.refresh(&req.refresh_token).await?;

    Ok(Json(RefreshResponse {
        access_token: issued.access_token,
        refresh_token: issued.refresh_token,
        token_type: issued.token_type,
        expires_at: issued.expires_at,
    }))
}

pub async fn logout(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RefreshRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let revoked = state.sessions.logout(&req.refresh_token).await?;
    Ok(Json(serde_json::json!({ "revoked": revoked })))
}

pub async fn reset_password(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ResetPasswordRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let reset = state
        .sessions
        .reset_password(&req.email, &req.new_password)
        .await?;
    Ok(Json(serde_json::json!({ "reset": reset })))
}

pub async fn me(
    State(state): State<Arc<AppState>>,
    AuthClaims(claims): AuthClaims,
) -> Result<Json<UserPublic>, AppError> {
    let user_id = ObjectId::parse_str(&claims.sub).map_err(|_| AppError::Unauthorized)?;
    let user = state
        .users
        .get_by_id(user_id)
        .await?
        .ok_or(AppError::NotFound)?;

    Ok(Json(user.into()))
}
