//! Role-gated attendance operations.
//!
//! Every operation takes the resolved [`Caller`] explicitly; validation and
//! role checks run before any roster read or write.

use chrono::{Duration, Utc};
use sqlx::SqlitePool;
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::{
    check_in_token::CheckInToken, roster_entry::RosterEntry, user::User, Role,
};
use crate::services::{check_in, check_in::CheckInSettings, roster};

/// Identity of the authenticated user making a call
#[derive(Debug, Clone, PartialEq)]
pub struct Caller {
    pub user_id: Uuid,
    pub display_name: String,
    pub registration_number: String,
    pub role: Role,
}

impl From<&User> for Caller {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.id,
            display_name: user.display_name.clone(),
            registration_number: user.registration_number.clone(),
            role: user.role,
        }
    }
}

impl Caller {
    pub fn is_teacher(&self) -> bool {
        self.role == Role::Teacher
    }

    fn require_teacher(&self) -> Result<Uuid> {
        match self.role {
            Role::Teacher => Ok(self.user_id),
            Role::Student => Err(AppError::Forbidden(
                "Only teachers can perform this operation".to_string(),
            )),
        }
    }

    fn require_student(&self) -> Result<()> {
        match self.role {
            Role::Student => Ok(()),
            Role::Teacher => Err(AppError::Forbidden(
                "Only students can perform this operation".to_string(),
            )),
        }
    }
}

fn required(field: &str, value: &str) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::Validation(format!("{} is required", field)));
    }
    Ok(value.to_string())
}

pub async fn enroll_student(
    pool: &SqlitePool,
    caller: &Caller,
    student_name: &str,
    registration_number: &str,
) -> Result<RosterEntry> {
    let teacher_id = caller.require_teacher()?;
    let student_name = required("nome", student_name)?;
    let registration_number = required("matricula", registration_number)?;

    if let Some(user) = User::find_by_registration_number(pool, &registration_number).await? {
        if user.is_teacher() {
            return Err(AppError::Validation(format!(
                "Registration number {} belongs to a teacher",
                registration_number
            )));
        }
    }

    roster::enroll(pool, teacher_id, &student_name, &registration_number).await
}

pub async fn remove_student(pool: &SqlitePool, caller: &Caller, student_name: &str) -> Result<()> {
    let teacher_id = caller.require_teacher()?;
    let student_name = required("nome", student_name)?;

    roster::remove(pool, teacher_id, &student_name).await
}

pub async fn record_presence(
    pool: &SqlitePool,
    caller: &Caller,
    student_name: &str,
    registration_number: Option<&str>,
) -> Result<RosterEntry> {
    let teacher_id = caller.require_teacher()?;
    let student_name = required("nome", student_name)?;

    roster::increment_presence(pool, teacher_id, &student_name, registration_number).await
}

pub async fn view_own_roster(pool: &SqlitePool, caller: &Caller) -> Result<Vec<RosterEntry>> {
    let teacher_id = caller.require_teacher()?;
    roster::list_roster(pool, teacher_id).await
}

/// The calling student's presence count under each teacher
pub async fn view_aggregate(pool: &SqlitePool, caller: &Caller) -> Result<BTreeMap<String, i64>> {
    caller.require_student()?;
    roster::presence_by_teacher_for_student(pool, &caller.registration_number).await
}

/// Class-wide presence totals per teacher
pub async fn view_class_totals(
    pool: &SqlitePool,
    caller: &Caller,
) -> Result<BTreeMap<String, i64>> {
    caller.require_student()?;
    roster::aggregate_by_teacher(pool).await
}

pub async fn request_check_in_token(
    pool: &SqlitePool,
    caller: &Caller,
    settings: &CheckInSettings,
    ttl: Option<Duration>,
) -> Result<CheckInToken> {
    let teacher_id = caller.require_teacher()?;
    check_in::issue(pool, teacher_id, ttl, settings).await
}

/// Token to display for the teacher's current lesson, reused while fresh
pub async fn current_check_in_token(
    pool: &SqlitePool,
    caller: &Caller,
    settings: &CheckInSettings,
) -> Result<CheckInToken> {
    let teacher_id = caller.require_teacher()?;
    check_in::current_or_issue(pool, teacher_id, settings).await
}

pub async fn revoke_check_in_token(
    pool: &SqlitePool,
    caller: &Caller,
    token_value: &str,
) -> Result<()> {
    let teacher_id = caller.require_teacher()?;
    check_in::revoke(pool, teacher_id, token_value).await
}

/// Records one presence on the roster of the teacher who issued the token.
///
/// A student may only check themselves in and is matched by registration
/// number; a teacher must name the student. The increment is guarded by the
/// token's validity inside a single statement, so a token that expires or is
/// revoked concurrently aborts the whole redemption.
pub async fn redeem_check_in(
    pool: &SqlitePool,
    caller: &Caller,
    settings: &CheckInSettings,
    token_value: &str,
    student_name: Option<&str>,
) -> Result<RosterEntry> {
    let token_value = token_value.trim();
    if token_value.is_empty() {
        return Err(AppError::InvalidToken);
    }
    let student_name = student_name.map(|name| required("nome", name)).transpose()?;
    let registration_number = match caller.role {
        Role::Student => Some(caller.registration_number.as_str()),
        Role::Teacher if student_name.is_none() => {
            return Err(AppError::Validation("nome is required".to_string()))
        }
        Role::Teacher => None,
    };

    let mut tx = pool.begin().await?;

    let updated = RosterEntry::increment_with_check_in_token(
        &mut tx,
        token_value,
        student_name.as_deref(),
        registration_number,
        settings.single_use,
        Utc::now().timestamp_millis(),
    )
    .await?;

    let Some(entry) = updated else {
        // Nothing was written; work out why and roll back.
        let teacher_id =
            check_in::redeem(&mut *tx, token_value, settings.single_use, Utc::now()).await?;

        let named_entry = match &student_name {
            Some(name) => RosterEntry::find_by_name(&mut *tx, teacher_id, name).await?,
            None => None,
        };
        let err = match named_entry {
            Some(_) => AppError::Forbidden("Students can only check themselves in".to_string()),
            None => AppError::NotFound(format!(
                "{} is not enrolled with this teacher",
                student_name.as_deref().unwrap_or(&caller.display_name)
            )),
        };
        tx.rollback().await?;
        return Err(err);
    };

    CheckInToken::mark_redeemed(&mut tx, token_value).await?;
    tx.commit().await?;

    tracing::info!(
        teacher_id = %entry.teacher_id,
        student = %entry.student_registration_number,
        presence_count = entry.presence_count,
        "Check-in redeemed"
    );

    Ok(entry)
}
