use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::api::auth::UserView;
use crate::api::check_in::IssuedToken;
use crate::api::middleware::state::AppState;
use crate::error::{AppError, Result};
use crate::models::User;
use crate::services::attendance::{self, Caller};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileResponse {
    pub user: UserView,
    #[serde(flatten)]
    pub check_in: Option<IssuedToken>,
}

/// Profile of the caller. Teachers also get their current check-in token so
/// the client can show its QR code straight away; repeated calls reuse it.
async fn me(State(state): State<AppState>, caller: Caller) -> Result<Json<ProfileResponse>> {
    let user = User::find_by_id(&state.pool, caller.user_id)
        .await?
        .ok_or(AppError::Unauthorized)?;

    let check_in = if caller.is_teacher() {
        let token =
            attendance::current_check_in_token(&state.pool, &caller, &state.check_in).await?;
        Some(IssuedToken::new(token, &state.check_in.base_url)?)
    } else {
        None
    };

    Ok(Json(ProfileResponse {
        user: UserView::from(&user),
        check_in,
    }))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/user/me", get(me))
}
