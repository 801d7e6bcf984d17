//! Session endpoints.
//!
//! - GET `/me` - Identity attached by the gate
//! - POST `/logout` - Record the logout; tokens stay valid until they expire
//! - POST `/refresh` - Exchange a refresh token for a new access token

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    middleware,
    response::IntoResponse,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};

use super::envelope::Envelope;
use super::error::{ApiError, ResultExt};
use crate::audit::{ActivityRecorder, NewActivity, RequestOrigin};
use crate::auth::{Auth, HasAuthBackend};
use crate::cli::ClientIpHeader;
use crate::db::Database;
use crate::impl_has_auth_backend;
use crate::jwt::TokenService;
use crate::rate_limit::{RateLimitConfig, rate_limit_refresh};

#[derive(Clone)]
pub struct AuthState {
    pub db: Database,
    pub tokens: Arc<TokenService>,
    pub ip_header: Option<ClientIpHeader>,
    pub recorder: ActivityRecorder,
    pub rate_limit: RateLimitConfig,
}

impl_has_auth_backend!(AuthState);

pub fn router(state: AuthState) -> Router {
    let refresh_router = Router::new()
        .route("/refresh", post(refresh))
        .with_state(state.clone())
        .layer(middleware::from_fn_with_state(
            state.rate_limit.clone(),
            rate_limit_refresh,
        ));

    Router::new()
        .route("/me", get(me))
        .route("/logout", post(logout))
        .with_state(state)
        .merge(refresh_router)
}

async fn me(auth: Auth) -> impl IntoResponse {
    Envelope::data(auth.into_inner())
}

async fn logout(
    State(state): State<AuthState>,
    auth: Auth,
    origin: RequestOrigin,
) -> impl IntoResponse {
    state
        .recorder
        .record(
            Some(auth.user_id),
            &origin,
            NewActivity::new("LOGOUT").entity("user", auth.user_id),
        )
        .await;

    info!(user_id = auth.user_id, "User logged out");
    Envelope::message("Logged out successfully")
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest {
    refresh_token: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshResponse {
    access_token: String,
    token_type: &'static str,
    expires_in: u64,
}

/// Issue a new access token carrying the user's current role.
async fn refresh(
    State(state): State<AuthState>,
    origin: RequestOrigin,
    payload: Result<Json<RefreshRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(payload) = payload.map_err(|_| ApiError::bad_request("Refresh token is required"))?;

    let claims = state
        .tokens()
        .verify_refresh_token(&payload.refresh_token)
        .map_err(|_| ApiError::unauthorized("Invalid or expired refresh token"))?;

    let user = state
        .db()
        .users()
        .get_by_id(claims.user_id)
        .await
        .db_err("Failed to load user")?
        .filter(|user| user.active)
        .ok_or_else(|| ApiError::unauthorized("User not found or inactive"))?;

    let access = state
        .tokens()
        .issue_access_token(user.id, user.role)
        .map_err(|e| {
            error!(user_id = user.id, error = %e, "Failed to issue access token");
            ApiError::internal("Failed to generate token")
        })?;

    state
        .recorder
        .record(
            Some(user.id),
            &origin,
            NewActivity::new("TOKEN_REFRESH").entity("user", user.id),
        )
        .await;

    Ok(Envelope::data(RefreshResponse {
        access_token: access.token,
        token_type: "Bearer",
        expires_in: access.duration,
    }))
}
