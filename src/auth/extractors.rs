//! Axum extractors for authentication.

use std::marker::PhantomData;

use axum::{extract::FromRequestParts, http::request::Parts};

use super::errors::GateError;
use super::gate::authenticate;
use super::state::HasAuthBackend;
use super::types::{Anonymous, AuthContext};
use crate::db::Role;

/// Role policy checked by `Auth<R>` after authentication.
pub trait RoleConstraint {
    fn check(ctx: &AuthContext) -> Result<(), GateError>;
}

/// Any authenticated, active user.
pub struct AnyRole;

impl RoleConstraint for AnyRole {
    fn check(_ctx: &AuthContext) -> Result<(), GateError> {
        Ok(())
    }
}

/// Only the privileged role.
pub struct AdminOnly;

impl RoleConstraint for AdminOnly {
    fn check(ctx: &AuthContext) -> Result<(), GateError> {
        ctx.authorize_admin()
    }
}

/// Admins and doctors.
pub struct ClinicalStaff;

impl RoleConstraint for ClinicalStaff {
    fn check(ctx: &AuthContext) -> Result<(), GateError> {
        ctx.authorize(&[Role::Admin, Role::Doctor])
    }
}

/// Extractor for handlers that require an authenticated user satisfying `R`.
///
/// Reuses the context attached by `protect` when that layer ran; the token is
/// only verified here when no gate layer is in front of the route.
pub struct Auth<R: RoleConstraint = AnyRole>(pub AuthContext, PhantomData<R>);

impl<R: RoleConstraint> Auth<R> {
    pub fn into_inner(self) -> AuthContext {
        self.0
    }
}

impl<R: RoleConstraint> std::ops::Deref for Auth<R> {
    type Target = AuthContext;

    fn deref(&self) -> &AuthContext {
        &self.0
    }
}

impl<S, R> FromRequestParts<S> for Auth<R>
where
    S: HasAuthBackend + Send + Sync,
    R: RoleConstraint,
{
    type Rejection = GateError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let ctx = match parts.extensions.get::<AuthContext>() {
            Some(ctx) => ctx.clone(),
            None => authenticate(&parts.headers, state).await?,
        };
        R::check(&ctx)?;
        Ok(Auth(ctx, PhantomData))
    }
}

/// Optional authentication extractor - never fails.
/// Useful for endpoints that personalize output when a valid token is present.
pub struct OptionalAuth(pub Option<AuthContext>);

impl<S> FromRequestParts<S> for OptionalAuth
where
    S: HasAuthBackend + Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(ctx) = parts.extensions.get::<AuthContext>() {
            return Ok(OptionalAuth(Some(ctx.clone())));
        }
        if parts.extensions.get::<Anonymous>().is_some() {
            return Ok(OptionalAuth(None));
        }
        Ok(OptionalAuth(authenticate(&parts.headers, state).await.ok()))
    }
}
