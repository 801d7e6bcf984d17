//! The request gate: bearer verification, identity lookup, and the
//! router-level middlewares built on it.
//!
//! Each request moves through: header → token → identity lookup → attach.
//! Any failure short-circuits with a `GateError`; the handler never runs.

use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::{debug, error, warn};

use super::bearer::bearer_token;
use super::errors::GateError;
use super::state::HasAuthBackend;
use super::types::{Anonymous, AuthContext};

/// Authenticate a request from its headers.
///
/// Token verification is CPU-only; the identity lookup is the single await point.
pub async fn authenticate<S>(headers: &HeaderMap, state: &S) -> Result<AuthContext, GateError>
where
    S: HasAuthBackend + Sync,
{
    let token = bearer_token(headers).ok_or(GateError::MissingCredentials)?;

    let claims = state.tokens().verify_access_token(token).map_err(|e| {
        debug!(error = %e, "Rejected bearer token");
        GateError::InvalidToken
    })?;
    // verify_access_token guarantees an embedded role
    let role = claims.role.ok_or(GateError::InvalidToken)?;

    let user = state
        .db()
        .users()
        .get_by_id(claims.user_id)
        .await
        .map_err(|e| {
            error!(user_id = claims.user_id, error = %e, "Failed to load user");
            GateError::Internal
        })?
        .filter(|user| user.active)
        .ok_or(GateError::UserNotFoundOrInactive)?;

    if user.role != role {
        warn!(
            user_id = user.id,
            token_role = %role,
            stored_role = %user.role,
            "Token role differs from stored role, using token role"
        );
    }

    Ok(AuthContext {
        user_id: claims.user_id,
        role,
        user,
    })
}

/// Middleware that rejects unauthenticated requests and attaches `AuthContext`.
pub async fn protect<S>(State(state): State<S>, mut request: Request, next: Next) -> Response
where
    S: HasAuthBackend + Clone + Send + Sync + 'static,
{
    match authenticate(request.headers(), &state).await {
        Ok(ctx) => {
            request.extensions_mut().insert(ctx);
            next.run(request).await
        }
        Err(e) => e.into_response(),
    }
}

/// Middleware that attaches `AuthContext` when possible and never rejects.
pub async fn optional_auth<S>(State(state): State<S>, mut request: Request, next: Next) -> Response
where
    S: HasAuthBackend + Clone + Send + Sync + 'static,
{
    match authenticate(request.headers(), &state).await {
        Ok(ctx) => {
            request.extensions_mut().insert(ctx);
        }
        Err(e) => {
            debug!(reason = %e, "Continuing without identity");
            request.extensions_mut().insert(Anonymous);
        }
    }
    next.run(request).await
}

/// Middleware that admits only the privileged role. Must be layered inside `protect`.
pub async fn authorize_admin(request: Request, next: Next) -> Response {
    let verdict = match request.extensions().get::<AuthContext>() {
        Some(ctx) => ctx.authorize_admin(),
        None => Err(GateError::MissingCredentials),
    };

    match verdict {
        Ok(()) => next.run(request).await,
        Err(e) => e.into_response(),
    }
}
