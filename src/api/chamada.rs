use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get},
    Json, Router,
};
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;

use crate::api::middleware::state::AppState;
use crate::error::{AppError, Result};
use crate::models::{Role, RosterEntry};
use crate::services::attendance::{self, Caller};

const ENROLL_ACTION: &str = "Adicionar";

#[derive(Debug, Deserialize)]
pub struct EnrollRequest {
    pub nome: String,
    pub matricula: String,
    #[serde(rename = "type")]
    pub action: Option<String>,
}

/// One roster line as the client renders it
#[derive(Debug, Serialize)]
pub struct AlunoView {
    pub nome: String,
    pub matricula: String,
    pub presencas: i64,
}

impl From<RosterEntry> for AlunoView {
    fn from(entry: RosterEntry) -> Self {
        Self {
            nome: entry.student_name,
            matricula: entry.student_registration_number,
            presencas: entry.presence_count,
        }
    }
}

/// Roster keyed by student name, in enrollment order.
#[derive(Debug)]
pub struct Alunos(Vec<RosterEntry>);

impl Serialize for Alunos {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct Line<'a> {
            matricula: &'a str,
            presencas: i64,
        }

        serializer.collect_map(self.0.iter().map(|entry| {
            (
                entry.student_name.as_str(),
                Line {
                    matricula: &entry.student_registration_number,
                    presencas: entry.presence_count,
                },
            )
        }))
    }
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum ChamadaResponse {
    Teacher { alunos: Alunos },
    Student { teachers: BTreeMap<String, i64> },
}

#[derive(Debug, Serialize)]
pub struct EnrollResponse {
    pub message: &'static str,
    pub aluno: AlunoView,
}

#[derive(Debug, Serialize)]
pub struct TotalsResponse {
    pub teachers: BTreeMap<String, i64>,
}

async fn view_chamada(
    State(state): State<AppState>,
    caller: Caller,
) -> Result<Json<ChamadaResponse>> {
    let response = match caller.role {
        Role::Teacher => ChamadaResponse::Teacher {
            alunos: Alunos(attendance::view_own_roster(&state.pool, &caller).await?),
        },
        Role::Student => ChamadaResponse::Student {
            teachers: attendance::view_aggregate(&state.pool, &caller).await?,
        },
    };

    Ok(Json(response))
}

async fn enroll(
    State(state): State<AppState>,
    caller: Caller,
    Json(req): Json<EnrollRequest>,
) -> Result<(StatusCode, Json<EnrollResponse>)> {
    if let Some(action) = req.action.as_deref() {
        if action != ENROLL_ACTION {
            return Err(AppError::Validation(format!(
                "Unsupported roster action: {}",
                action
            )));
        }
    }

    let entry = attendance::enroll_student(&state.pool, &caller, &req.nome, &req.matricula).await?;

    Ok((
        StatusCode::CREATED,
        Json(EnrollResponse {
            message: "Student enrolled",
            aluno: entry.into(),
        }),
    ))
}

async fn remove(
    State(state): State<AppState>,
    caller: Caller,
    Path(name): Path<String>,
) -> Result<StatusCode> {
    attendance::remove_student(&state.pool, &caller, &name).await?;

    Ok(StatusCode::NO_CONTENT)
}

async fn class_totals(
    State(state): State<AppState>,
    caller: Caller,
) -> Result<Json<TotalsResponse>> {
    let teachers = attendance::view_class_totals(&state.pool, &caller).await?;

    Ok(Json(TotalsResponse { teachers }))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/chamada", get(view_chamada).post(enroll))
        .route("/chamada/totais", get(class_totals))
        .route("/chamada/:name", delete(remove))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn entry(id: i64, name: &str, reg: &str, count: i64) -> RosterEntry {
        RosterEntry {
            id,
            teacher_id: Uuid::nil(),
            student_name: name.to_string(),
            student_registration_number: reg.to_string(),
            presence_count: count,
            enrolled_at: Utc::now(),
        }
    }

    #[test]
    fn test_alunos_keep_enrollment_order() {
        let response = ChamadaResponse::Teacher {
            alunos: Alunos(vec![entry(1, "Zeca", "9", 2), entry(2, "Alice", "1", 0)]),
        };

        let json = serde_json::to_string(&response).unwrap();
        assert_eq!(
            json,
            r#"{"alunos":{"Zeca":{"matricula":"9","presencas":2},"Alice":{"matricula":"1","presencas":0}}}"#
        );
    }

    #[test]
    fn test_student_view_shape() {
        let response = ChamadaResponse::Student {
            teachers: BTreeMap::from([("Ana".to_string(), 3)]),
        };

        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            serde_json::json!({ "teachers": { "Ana": 3 } })
        );
    }
}
