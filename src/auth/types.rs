//! Authenticated request context.

use serde::Serialize;

use super::errors::GateError;
use crate::db::{Role, User};

/// The single privileged role checked by `authorize_admin`.
pub const PRIVILEGED_ROLE: Role = Role::Admin;

/// Identity attached to a request once the gate lets it through.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthContext {
    /// Identity projection loaded at request time
    pub user: User,
    /// User ID from the verified token
    pub user_id: i64,
    /// Role embedded in the verified token
    #[serde(rename = "userRole")]
    pub role: Role,
}

impl AuthContext {
    /// Pass only if the attached role is in `allowed`.
    pub fn authorize(&self, allowed: &[Role]) -> Result<(), GateError> {
        if allowed.contains(&self.role) {
            Ok(())
        } else {
            Err(GateError::RoleNotAllowed(self.role))
        }
    }

    /// Pass only for the privileged role.
    pub fn authorize_admin(&self) -> Result<(), GateError> {
        if self.role == PRIVILEGED_ROLE {
            Ok(())
        } else {
            Err(GateError::AdminRequired)
        }
    }
}

/// Marker left in request extensions when `optional_auth` ran and the
/// request continued without an identity.
#[derive(Debug, Clone, Copy)]
pub struct Anonymous;
