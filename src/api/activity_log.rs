//! Activity log read endpoints. Admin only.

use axum::{
    Router,
    extract::{Path, State, rejection::PathRejection},
    middleware,
    response::IntoResponse,
    routing::get,
};
use std::sync::Arc;

use super::envelope::Envelope;
use super::error::{ApiError, ResultExt};
use crate::auth::{AdminOnly, Auth, authorize_admin, protect};
use crate::cli::ClientIpHeader;
use crate::db::Database;
use crate::impl_has_auth_backend;
use crate::jwt::TokenService;

#[derive(Clone)]
pub struct ActivityLogState {
    pub db: Database,
    pub tokens: Arc<TokenService>,
    pub ip_header: Option<ClientIpHeader>,
}

impl_has_auth_backend!(ActivityLogState);

pub fn router(state: ActivityLogState) -> Router {
    Router::new()
        .route("/", get(list_recent))
        .route("/user/{user_id}", get(list_by_user))
        .route_layer(middleware::from_fn(authorize_admin))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            protect::<ActivityLogState>,
        ))
        .with_state(state)
}

/// Newest entries first, capped.
async fn list_recent(
    State(state): State<ActivityLogState>,
    _auth: Auth<AdminOnly>,
) -> Result<impl IntoResponse, ApiError> {
    let entries = state
        .db
        .activity()
        .list_recent()
        .await
        .db_err("Failed to list activity")?;

    Ok(Envelope::data(entries))
}

async fn list_by_user(
    State(state): State<ActivityLogState>,
    _auth: Auth<AdminOnly>,
    user_id: Result<Path<i64>, PathRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Path(user_id) = user_id.map_err(|_| ApiError::bad_request("Invalid user ID"))?;

    let entries = state
        .db
        .activity()
        .list_by_user(user_id)
        .await
        .db_err("Failed to list activity")?;

    Ok(Envelope::data(entries))
}
