use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts},
};

use super::state::AppState;
use crate::error::AppError;
use crate::services::{attendance::Caller, identity};

/// Pulls the token out of an `Authorization: Bearer <token>` header value
pub fn bearer_token(value: &str) -> Option<&str> {
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// Resolves the bearer token on every request that asks for a `Caller`.
#[async_trait]
impl FromRequestParts<AppState> for Caller {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(bearer_token)
            .ok_or(AppError::Unauthorized)?;

        let user = identity::resolve(&state.pool, &state.identity, token).await?;

        Ok(Caller::from(&user))
    }
}
