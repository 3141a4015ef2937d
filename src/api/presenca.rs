use axum::{
    extract::{Path, State},
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::chamada::AlunoView;
use crate::api::middleware::state::AppState;
use crate::error::Result;
use crate::services::attendance::{self, Caller};

#[derive(Debug, Default, Deserialize)]
pub struct RedeemRequest {
    pub nome: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PresenceResponse {
    pub message: &'static str,
    pub aluno: AlunoView,
}

async fn record_presence(
    State(state): State<AppState>,
    caller: Caller,
    Path((name, matricula)): Path<(String, String)>,
) -> Result<Json<PresenceResponse>> {
    let entry =
        attendance::record_presence(&state.pool, &caller, &name, Some(matricula.as_str())).await?;

    Ok(Json(PresenceResponse {
        message: "Presence recorded",
        aluno: entry.into(),
    }))
}

/// Check-in through a scanned token. The body is optional.
async fn redeem(
    State(state): State<AppState>,
    caller: Caller,
    Path(token): Path<String>,
    body: Option<Json<RedeemRequest>>,
) -> Result<Json<PresenceResponse>> {
    let req = body.map(|Json(req)| req).unwrap_or_default();

    let entry = attendance::redeem_check_in(
        &state.pool,
        &caller,
        &state.check_in,
        &token,
        req.nome.as_deref(),
    )
    .await?;

    Ok(Json(PresenceResponse {
        message: "Check-in recorded",
        aluno: entry.into(),
    }))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/presenca/:name/:matricula", post(record_presence))
        .route("/presenca_aluno/:token", post(redeem))
}
