//! Per-teacher rosters and presence counters.
//!
//! Authorization is the caller's job; every function here trusts the
//! `teacher_id` it is given.

use sqlx::SqlitePool;
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::roster_entry::{CreateRosterEntryData, RosterEntry};

fn not_enrolled(student_name: &str) -> AppError {
    AppError::NotFound(format!("Student {} not found", student_name))
}

/// Rejects duplicates by name or by registration number; never merges.
pub async fn enroll(
    pool: &SqlitePool,
    teacher_id: Uuid,
    student_name: &str,
    registration_number: &str,
) -> Result<RosterEntry> {
    if let Some(existing) =
        RosterEntry::find_conflicting(pool, teacher_id, student_name, registration_number).await?
    {
        return Err(AppError::AlreadyEnrolled(format!(
            "Student {} ({}) is already enrolled",
            existing.student_name, existing.student_registration_number
        )));
    }

    let entry = RosterEntry::create(
        pool,
        CreateRosterEntryData {
            teacher_id,
            student_name: student_name.to_string(),
            student_registration_number: registration_number.to_string(),
        },
    )
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(ref db) if db.is_unique_violation() => AppError::AlreadyEnrolled(
            format!("Student {} is already enrolled", student_name),
        ),
        other => AppError::Database(other),
    })?;

    tracing::info!(
        teacher_id = %teacher_id,
        student = %entry.student_registration_number,
        "Student enrolled"
    );

    Ok(entry)
}

pub async fn remove(pool: &SqlitePool, teacher_id: Uuid, student_name: &str) -> Result<()> {
    if !RosterEntry::delete_by_name(pool, teacher_id, student_name).await? {
        return Err(not_enrolled(student_name));
    }

    tracing::info!(teacher_id = %teacher_id, student_name = %student_name, "Student removed");

    Ok(())
}

pub async fn increment_presence(
    pool: &SqlitePool,
    teacher_id: Uuid,
    student_name: &str,
    registration_number: Option<&str>,
) -> Result<RosterEntry> {
    let entry =
        RosterEntry::increment_presence(pool, teacher_id, student_name, registration_number)
            .await?
            .ok_or_else(|| not_enrolled(student_name))?;

    tracing::info!(
        teacher_id = %teacher_id,
        student = %entry.student_registration_number,
        presence_count = entry.presence_count,
        "Presence recorded"
    );

    Ok(entry)
}

pub async fn list_roster(pool: &SqlitePool, teacher_id: Uuid) -> Result<Vec<RosterEntry>> {
    Ok(RosterEntry::list_by_teacher(pool, teacher_id).await?)
}

/// Teacher name -> total presences across all of that teacher's students.
///
/// Teachers sharing a display name are merged under that name.
pub async fn aggregate_by_teacher(pool: &SqlitePool) -> Result<BTreeMap<String, i64>> {
    let mut totals = BTreeMap::new();
    for row in RosterEntry::totals_by_teacher(pool).await? {
        *totals.entry(row.teacher_name).or_insert(0) += row.presence_count;
    }
    Ok(totals)
}

/// Teacher name -> presences of one student under that teacher
pub async fn presence_by_teacher_for_student(
    pool: &SqlitePool,
    registration_number: &str,
) -> Result<BTreeMap<String, i64>> {
    let mut counts = BTreeMap::new();
    for row in RosterEntry::list_for_student(pool, registration_number).await? {
        *counts.entry(row.teacher_name).or_insert(0) += row.presence_count;
    }
    Ok(counts)
}
