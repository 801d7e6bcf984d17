pub mod api;
pub mod audit;
pub mod auth;
pub mod cli;
pub mod db;
pub mod jwt;
pub mod rate_limit;

use api::{ApiError, create_api_router};
use axum::Router;
use cli::ClientIpHeader;
use db::Database;
use jwt::TokenService;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

pub struct ServerConfig {
    /// Database connection (cloneable, uses connection pool internally)
    pub db: Database,
    /// Secret for signing tokens
    pub jwt_secret: Vec<u8>,
    /// Header carrying the client IP when running behind a reverse proxy
    pub ip_header: Option<ClientIpHeader>,
}

/// Create the application router with the given configuration.
pub fn create_app(config: &ServerConfig) -> Router {
    let tokens = Arc::new(TokenService::new(&config.jwt_secret));

    Router::new()
        .nest(
            "/api",
            create_api_router(config.db.clone(), tokens, config.ip_header),
        )
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
}

async fn not_found() -> ApiError {
    ApiError::not_found("Route not found")
}

/// Run the server on the given listener. This function blocks until the server exits.
pub async fn run_server(config: ServerConfig, listener: TcpListener) -> Result<(), std::io::Error> {
    let app = create_app(&config);
    let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, make_service).await
}
