use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, Sqlite, SqlitePool};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct RosterEntry {
    #[serde(skip_serializing)]
    pub id: i64,
    pub teacher_id: Uuid,
    pub student_name: String,
    pub student_registration_number: String,
    pub presence_count: i64,
    pub enrolled_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateRosterEntryData {
    pub teacher_id: Uuid,
    pub student_name: String,
    pub student_registration_number: String,
}

/// Presence count of one student under one teacher, labelled by teacher name.
#[derive(Debug, Clone, FromRow)]
pub struct TeacherPresence {
    pub teacher_name: String,
    pub presence_count: i64,
}

impl RosterEntry {
    pub async fn create(
        pool: &SqlitePool,
        data: CreateRosterEntryData,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO roster_entries (teacher_id, student_name, student_registration_number, presence_count, enrolled_at)
            VALUES (?, ?, ?, 0, ?)
            RETURNING *
            "#,
        )
        .bind(data.teacher_id)
        .bind(&data.student_name)
        .bind(&data.student_registration_number)
        .bind(Utc::now())
        .fetch_one(pool)
        .await
    }

    /// Finds an entry that collides with either the name or the registration
    /// number within one teacher's roster.
    pub async fn find_conflicting(
        pool: &SqlitePool,
        teacher_id: Uuid,
        student_name: &str,
        student_registration_number: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM roster_entries
            WHERE teacher_id = ?
              AND (student_name = ? OR student_registration_number = ?)
            LIMIT 1
            "#,
        )
        .bind(teacher_id)
        .bind(student_name)
        .bind(student_registration_number)
        .fetch_optional(pool)
        .await
    }

    pub async fn find_by_name<'e, E>(
        executor: E,
        teacher_id: Uuid,
        student_name: &str,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Self>(
            "SELECT * FROM roster_entries WHERE teacher_id = ? AND student_name = ?",
        )
        .bind(teacher_id)
        .bind(student_name)
        .fetch_optional(executor)
        .await
    }

    /// Hard delete; returns whether a row was removed
    pub async fn delete_by_name(
        pool: &SqlitePool,
        teacher_id: Uuid,
        student_name: &str,
    ) -> Result<bool, sqlx::Error> {
        let result =
            sqlx::query("DELETE FROM roster_entries WHERE teacher_id = ? AND student_name = ?")
                .bind(teacher_id)
                .bind(student_name)
                .execute(pool)
                .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Atomically increments the presence counter of one entry.
    ///
    /// When `student_registration_number` is given it must match the entry too.
    pub async fn increment_presence(
        pool: &SqlitePool,
        teacher_id: Uuid,
        student_name: &str,
        student_registration_number: Option<&str>,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"
            UPDATE roster_entries
            SET presence_count = presence_count + 1
            WHERE teacher_id = ?
              AND student_name = ?
              AND (? IS NULL OR student_registration_number = ?)
            RETURNING *
            "#,
        )
        .bind(teacher_id)
        .bind(student_name)
        .bind(student_registration_number)
        .bind(student_registration_number)
        .fetch_optional(pool)
        .await
    }

    /// Increments one entry on the roster of whichever teacher issued `token`,
    /// but only while the token is live at the moment of the write. The entry
    /// is matched by every filter that is `Some`. Returns `None` when the guard
    /// or the entry lookup fails.
    pub async fn increment_with_check_in_token(
        conn: &mut sqlx::SqliteConnection,
        token: &str,
        student_name: Option<&str>,
        student_registration_number: Option<&str>,
        single_use: bool,
        now_ms: i64,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"
            UPDATE roster_entries
            SET presence_count = presence_count + 1
            WHERE (? IS NULL OR student_name = ?)
              AND (? IS NULL OR student_registration_number = ?)
              AND teacher_id = (
                  SELECT teacher_id FROM check_in_tokens
                  WHERE token = ?
                    AND revoked_at_ms IS NULL
                    AND expires_at_ms > ?
                    AND (consumed = 0 OR ? = 0)
              )
            RETURNING *
            "#,
        )
        .bind(student_name)
        .bind(student_name)
        .bind(student_registration_number)
        .bind(student_registration_number)
        .bind(token)
        .bind(now_ms)
        .bind(single_use)
        .fetch_optional(&mut *conn)
        .await
    }

    /// Lists a teacher's roster in enrollment order
    pub async fn list_by_teacher(
        pool: &SqlitePool,
        teacher_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            "SELECT * FROM roster_entries WHERE teacher_id = ? ORDER BY id ASC",
        )
        .bind(teacher_id)
        .fetch_all(pool)
        .await
    }

    /// Presence counts of one student across every teacher that enrolled them
    pub async fn list_for_student(
        pool: &SqlitePool,
        student_registration_number: &str,
    ) -> Result<Vec<TeacherPresence>, sqlx::Error> {
        sqlx::query_as::<_, TeacherPresence>(
            r#"
            SELECT u.display_name AS teacher_name, r.presence_count AS presence_count
            FROM roster_entries r
            JOIN users u ON u.id = r.teacher_id
            WHERE r.student_registration_number = ?
            ORDER BY u.display_name ASC
            "#,
        )
        .bind(student_registration_number)
        .fetch_all(pool)
        .await
    }

    /// Total presences per teacher, summed over all their students
    pub async fn totals_by_teacher(pool: &SqlitePool) -> Result<Vec<TeacherPresence>, sqlx::Error> {
        sqlx::query_as::<_, TeacherPresence>(
            r#"
            SELECT u.display_name AS teacher_name,
                   COALESCE(SUM(r.presence_count), 0) AS presence_count
            FROM users u
            LEFT JOIN roster_entries r ON r.teacher_id = u.id
            WHERE u.role = 'teacher'
            GROUP BY u.id
            ORDER BY u.display_name ASC
            "#,
        )
        .fetch_all(pool)
        .await
    }
}
