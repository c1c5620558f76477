use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::{handlers::auth as auth_handlers, state::AppState};

pub fn app_router(state: Arc<AppState>) -> Router {
    let auth = Router::new()
        .route("/login", post(auth_handlers::login))
        .route("/refresh", post(auth_handlers::refresh))
        .route("/logout", post(auth_handlers::logout))
        .route("/reset-password", post(auth_handlers::reset_password))
        .route("/me", get(auth_handlers::me));

    Router::new().nest("/auth", auth).with_state(state)
}
