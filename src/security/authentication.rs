//! Authentication stage.
//!
//! Resolves the caller from an optional `Authorization: Bearer <token>`
//! header and attaches an [`Identity`] to the request. No header means
//! anonymous; a malformed header, or a token that does not resolve to a live
//! session, is rejected with one uniform 401.

use std::sync::Arc;

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::data::{User, UserStore};
use crate::http::response::ApiError;
use crate::observability::metrics;

/// The resolved caller of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    Anonymous,
    Authenticated(User),
}

impl Identity {
    pub fn is_anonymous(&self) -> bool {
        matches!(self, Identity::Anonymous)
    }

    pub fn user(&self) -> Option<&User> {
        match self {
            Identity::Anonymous => None,
            Identity::Authenticated(user) => Some(user),
        }
    }
}

/// Handlers downstream of [`authenticate`] can take `Identity` as an argument.
impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Identity>()
            .cloned()
            .ok_or_else(|| ApiError::internal("identity missing from request context"))
    }
}

#[derive(Clone)]
pub struct AuthState {
    users: Arc<dyn UserStore>,
}

impl AuthState {
    pub fn new(users: Arc<dyn UserStore>) -> Self {
        Self { users }
    }
}

pub async fn authenticate(State(state): State<AuthState>, mut req: Request, next: Next) -> Response {
    let mut response = match resolve_identity(state.users.as_ref(), req.headers()) {
        Ok(identity) => {
            req.extensions_mut().insert(identity);
            next.run(req).await
        }
        Err(err) => err.into_response(),
    };

    response
        .headers_mut()
        .append(header::VARY, HeaderValue::from_static("Authorization"));
    response
}

/// Map request headers to an identity, consulting `users` only when a
/// well-formed bearer token is present.
pub fn resolve_identity(users: &dyn UserStore, headers: &HeaderMap) -> Result<Identity, ApiError> {
    let Some(value) = headers.get(header::AUTHORIZATION) else {
        return Ok(Identity::Anonymous);
    };

    let Some(token) = bearer_token(value) else {
        metrics::record_auth_failure("malformed");
        return Err(ApiError::InvalidAuthenticationToken);
    };

    match users.resolve_user_by_token(token) {
        Ok(Some(user)) => Ok(Identity::Authenticated(user)),
        Ok(None) => {
            metrics::record_auth_failure("unresolved");
            Err(ApiError::InvalidAuthenticationToken)
        }
        Err(err) => Err(ApiError::internal(err)),
    }
}

fn bearer_token(value: &HeaderValue) -> Option<&str> {
    let value = value.to_str().ok()?;
    let mut parts = value.split(' ');
    match (parts.next(), parts.next(), parts.next()) {
        (Some("Bearer"), Some(token), None) if !token.is_empty() => Some(token),
        _ => None,
    }
}
