//! Bearer-token authentication with role-based access control.
//!
//! Stateless access tokens (24 h) carry the user ID and role. Every request
//! re-loads the identity record, so deactivating a user locks out all of
//! their outstanding tokens on the next request even though the tokens
//! themselves cannot be revoked.

mod bearer;
mod errors;
mod extractors;
mod gate;
mod ip;
mod state;
mod types;

pub use bearer::{BEARER_PREFIX, bearer_token};
pub use errors::GateError;
pub use extractors::{AdminOnly, AnyRole, Auth, ClinicalStaff, OptionalAuth, RoleConstraint};
pub use gate::{authenticate, authorize_admin, optional_auth, protect};
pub use ip::{HasHeadersAndExtensions, extract_client_ip};
pub use state::HasAuthBackend;
pub use types::{Anonymous, AuthContext, PRIVILEGED_ROLE};
