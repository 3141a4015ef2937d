use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::middleware::state::AppState;
use crate::error::{AppError, Result};
use crate::models::CheckInToken;
use crate::services::{
    attendance::{self, Caller},
    check_in, qr_generator,
};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueRequest {
    pub ttl_seconds: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedToken {
    pub token: String,
    pub check_in_url: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl IssuedToken {
    pub fn new(token: CheckInToken, base_url: &str) -> Result<Self> {
        let url = check_in::check_in_url(base_url, &token.token)?;

        Ok(Self {
            check_in_url: url.into(),
            token: token.token,
            issued_at: token.issued_at,
            expires_at: token.expires_at,
        })
    }
}

async fn issue(
    State(state): State<AppState>,
    caller: Caller,
    body: Option<Json<IssueRequest>>,
) -> Result<(StatusCode, Json<IssuedToken>)> {
    let req = body.map(|Json(req)| req).unwrap_or_default();
    let ttl = req.ttl_seconds.map(check_in::ttl_from_seconds).transpose()?;

    let token =
        attendance::request_check_in_token(&state.pool, &caller, &state.check_in, ttl).await?;

    Ok((
        StatusCode::CREATED,
        Json(IssuedToken::new(token, &state.check_in.base_url)?),
    ))
}

async fn revoke(
    State(state): State<AppState>,
    caller: Caller,
    Path(token): Path<String>,
) -> Result<StatusCode> {
    attendance::revoke_check_in_token(&state.pool, &caller, &token).await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Check-in URL of a token the caller issued
async fn owned_check_in_url(state: &AppState, caller: &Caller, token: &str) -> Result<String> {
    if !caller.is_teacher() {
        return Err(AppError::Forbidden(
            "Only teachers can render check-in codes".to_string(),
        ));
    }

    let token = check_in::find_owned(&state.pool, caller.user_id, token).await?;
    let url = check_in::check_in_url(&state.check_in.base_url, &token.token)?;

    Ok(url.into())
}

async fn qr_svg(
    State(state): State<AppState>,
    caller: Caller,
    Path(token): Path<String>,
) -> Result<Response> {
    let url = owned_check_in_url(&state, &caller, &token).await?;
    let svg = qr_generator::generate_qr_svg(&url)?;

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "image/svg+xml")],
        svg,
    )
        .into_response())
}

async fn qr_png(
    State(state): State<AppState>,
    caller: Caller,
    Path(token): Path<String>,
) -> Result<Response> {
    let url = owned_check_in_url(&state, &caller, &token).await?;
    let png = qr_generator::generate_qr_png(&url)?;

    Ok((StatusCode::OK, [(header::CONTENT_TYPE, "image/png")], png).into_response())
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/check-in/tokens", post(issue))
        .route("/check-in/tokens/:token", delete(revoke))
        .route("/check-in/tokens/:token/qr.svg", get(qr_svg))
        .route("/check-in/tokens/:token/qr.png", get(qr_png))
}
