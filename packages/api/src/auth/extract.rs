//! Request extractor for authenticated routes.

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use store::User;

use super::token::Claims;
use crate::error::ApiError;
use crate::state::AppState;

/// The signed-in user behind a `Authorization: Bearer` token.
///
/// Any failure (no header, bad signature, expired, pending second factor,
/// unknown user) rejects with [`ApiError::AccessDenied`].
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user: User,
    pub claims: Claims,
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers).ok_or_else(|| {
            tracing::debug!("Missing bearer token for {}", parts.uri.path());
            ApiError::AccessDenied
        })?;
        state.authenticate(token).await
    }
}

pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}
