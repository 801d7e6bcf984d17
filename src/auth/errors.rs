//! Request gate error types.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::api::Envelope;
use crate::db::Role;

/// Terminal gate outcome other than "authenticated".
///
/// Every variant short-circuits the request before any handler runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateError {
    /// Missing `Authorization` header or not of the form `Bearer <token>`
    MissingCredentials,
    /// Malformed, badly signed, expired or wrongly typed token
    InvalidToken,
    /// Token is valid but the user no longer exists or was deactivated
    UserNotFoundOrInactive,
    /// Authenticated but not the privileged role
    AdminRequired,
    /// Authenticated but role is not in the route's allow-list
    RoleNotAllowed(Role),
    /// Identity store failure during lookup
    Internal,
}

impl GateError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            GateError::MissingCredentials
            | GateError::InvalidToken
            | GateError::UserNotFoundOrInactive => StatusCode::UNAUTHORIZED,
            GateError::AdminRequired | GateError::RoleNotAllowed(_) => StatusCode::FORBIDDEN,
            GateError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn message(&self) -> String {
        match self {
            GateError::MissingCredentials => "Authentication required. Please log in.".into(),
            GateError::InvalidToken => "Invalid or expired token. Please log in again.".into(),
            GateError::UserNotFoundOrInactive => "User not found or inactive".into(),
            GateError::AdminRequired => "Access denied. Admin privileges required.".into(),
            GateError::RoleNotAllowed(role) => {
                format!("User role {} is not authorized to access this route", role)
            }
            // Store error text is logged where it happens, never returned.
            GateError::Internal => "Authentication error".into(),
        }
    }
}

impl std::fmt::Display for GateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message())
    }
}

impl std::error::Error for GateError {}

impl IntoResponse for GateError {
    fn into_response(self) -> Response {
        (self.status_code(), Envelope::failure(self.message())).into_response()
    }
}
