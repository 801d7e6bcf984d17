mod activity_log;
mod auth;
mod envelope;
mod error;
mod health;

use axum::Router;
use std::sync::Arc;

use crate::audit::ActivityRecorder;
use crate::cli::ClientIpHeader;
use crate::db::Database;
use crate::jwt::TokenService;
use crate::rate_limit::RateLimitConfig;

pub use envelope::Envelope;
pub use error::{ApiError, ResultExt};

/// Create the API router. Must be called within a Tokio runtime, since it
/// starts the rate limiter pruning task.
pub fn create_api_router(
    db: Database,
    tokens: Arc<TokenService>,
    ip_header: Option<ClientIpHeader>,
) -> Router {
    let rate_limit = RateLimitConfig::new(ip_header);
    rate_limit.spawn_pruning();

    let auth_state = auth::AuthState {
        db: db.clone(),
        tokens: tokens.clone(),
        ip_header,
        recorder: ActivityRecorder::new(db.clone()),
        rate_limit,
    };

    let activity_log_state = activity_log::ActivityLogState {
        db: db.clone(),
        tokens: tokens.clone(),
        ip_header,
    };

    let health_state = health::HealthState {
        db,
        tokens,
        ip_header,
    };

    Router::new()
        .nest("/auth", auth::router(auth_state))
        .nest("/activity-log", activity_log::router(activity_log_state))
        .nest("/health", health::router(health_state))
}
