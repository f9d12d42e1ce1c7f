//! Authentication seam.
//!
//! Credentials are verified outside this service. An [`Authenticator`] only
//! turns request headers into an opaque user id; [`require_auth`] rejects
//! requests without one and stores [`AuthenticatedUser`] in the request
//! extensions for handlers to extract.

use crate::{errors::AppError, models::object_key::is_key_safe_user_id, state::AppState};
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{HeaderMap, HeaderName, header::InvalidHeaderName, request::Parts},
    middleware::Next,
    response::Response,
};

/// Resolves the caller's user id from request headers.
pub trait Authenticator: Send + Sync {
    fn authenticate(&self, headers: &HeaderMap) -> Option<String>;
}

/// Trusts a header populated by the upstream identity gateway.
///
/// Ids that could not form a single object-key segment (see
/// [`is_key_safe_user_id`]) are treated as absent.
pub struct TrustedHeaderAuthenticator {
    header: HeaderName,
}

impl TrustedHeaderAuthenticator {
    pub fn new(header: &str) -> Result<Self, InvalidHeaderName> {
        Ok(Self {
            header: HeaderName::try_from(header)?,
        })
    }
}

impl Authenticator for TrustedHeaderAuthenticator {
    fn authenticate(&self, headers: &HeaderMap) -> Option<String> {
        headers
            .get(&self.header)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|user_id| is_key_safe_user_id(user_id))
            .map(str::to_owned)
    }
}

/// The authenticated caller.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: String,
}

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Self>()
            .cloned()
            .ok_or_else(AppError::unauthorized)
    }
}

/// Route middleware: 401 unless the authenticator yields a user id.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let user_id = state
        .authenticator
        .authenticate(request.headers())
        .ok_or_else(AppError::unauthorized)?;

    request.extensions_mut().insert(AuthenticatedUser { user_id });
    Ok(next.run(request).await)
}
