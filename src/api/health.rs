use axum::{Router, middleware, response::IntoResponse, routing::get};
use serde::Serialize;
use std::sync::Arc;

use super::envelope::Envelope;
use crate::auth::{OptionalAuth, optional_auth};
use crate::cli::ClientIpHeader;
use crate::db::Database;
use crate::impl_has_auth_backend;
use crate::jwt::TokenService;

#[derive(Clone)]
pub struct HealthState {
    pub db: Database,
    pub tokens: Arc<TokenService>,
    pub ip_header: Option<ClientIpHeader>,
}

impl_has_auth_backend!(HealthState);

pub fn router(state: HealthState) -> Router {
    Router::new()
        .route("/", get(health))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            optional_auth::<HealthState>,
        ))
        .with_state(state)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    authenticated_as: Option<String>,
}

async fn health(OptionalAuth(auth): OptionalAuth) -> impl IntoResponse {
    Envelope::data(HealthResponse {
        status: "OK",
        version: env!("CARGO_PKG_VERSION"),
        authenticated_as: auth.map(|ctx| ctx.user.username),
    })
}
