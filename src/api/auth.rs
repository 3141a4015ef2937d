use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::middleware::state::AppState;
use crate::error::Result;
use crate::models::{Role, User};
use crate::services::identity::{self, Authenticated, Registration};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(alias = "registrationNumber")]
    pub matricula: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SigninRequest {
    pub name: String,
    pub email: String,
    pub student_number: String,
    pub password: String,
    #[serde(default)]
    pub is_teacher: bool,
}

/// Public view of a user account
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: Uuid,
    pub nome: String,
    pub matricula: String,
    pub email: String,
    pub is_teacher: bool,
}

impl From<&User> for UserView {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            nome: user.display_name.clone(),
            matricula: user.registration_number.clone(),
            email: user.email.clone(),
            is_teacher: user.is_teacher(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub message: &'static str,
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user: UserView,
}

impl AuthResponse {
    fn new(message: &'static str, auth: Authenticated) -> Self {
        Self {
            message,
            user: UserView::from(&auth.user),
            token: auth.token,
            expires_at: auth.expires_at,
        }
    }
}

async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<AuthResponse>> {
    let auth =
        identity::authenticate(&state.pool, &state.identity, &req.matricula, &req.password).await?;

    tracing::info!(user_id = %auth.user.id, "User logged in");

    Ok(Json(AuthResponse::new("Login successful", auth)))
}

async fn signin(
    State(state): State<AppState>,
    Json(req): Json<SigninRequest>,
) -> Result<(StatusCode, Json<AuthResponse>)> {
    let user = identity::register(
        &state.pool,
        &state.identity,
        Registration {
            display_name: req.name,
            registration_number: req.student_number,
            email: req.email,
            password: req.password,
            role: if req.is_teacher {
                Role::Teacher
            } else {
                Role::Student
            },
        },
    )
    .await?;

    let auth = identity::issue_bearer_token(&state.identity, &user)?;

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse::new("User created", auth)),
    ))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/login", post(login))
        .route("/signin", post(signin))
}
