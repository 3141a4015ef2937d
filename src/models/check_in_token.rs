use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;
use sqlx::{FromRow, Sqlite, SqlitePool};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenStatus {
    Active,
    Consumed,
    Expired,
    Revoked,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckInToken {
    pub token: String,
    pub teacher_id: Uuid,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub consumed: bool,
    pub redemption_count: i64,
}

#[derive(FromRow)]
struct CheckInTokenRow {
    token: String,
    teacher_id: Uuid,
    issued_at_ms: i64,
    expires_at_ms: i64,
    revoked_at_ms: Option<i64>,
    consumed: bool,
    redemption_count: i64,
}

fn from_millis(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms).single().unwrap_or_default()
}

impl From<CheckInTokenRow> for CheckInToken {
    fn from(row: CheckInTokenRow) -> Self {
        Self {
            token: row.token,
            teacher_id: row.teacher_id,
            issued_at: from_millis(row.issued_at_ms),
            expires_at: from_millis(row.expires_at_ms),
            revoked_at: row.revoked_at_ms.map(from_millis),
            consumed: row.consumed,
            redemption_count: row.redemption_count,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CreateCheckInTokenData {
    pub token: String,
    pub teacher_id: Uuid,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl CheckInToken {
    /// Expiry wins over every other state.
    pub fn status(&self, now: DateTime<Utc>, single_use: bool) -> TokenStatus {
        if self.expires_at <= now {
            TokenStatus::Expired
        } else if self.revoked_at.is_some() {
            TokenStatus::Revoked
        } else if single_use && self.consumed {
            TokenStatus::Consumed
        } else {
            TokenStatus::Active
        }
    }

    pub async fn create(
        pool: &SqlitePool,
        data: CreateCheckInTokenData,
    ) -> Result<Self, sqlx::Error> {
        let row = sqlx::query_as::<_, CheckInTokenRow>(
            r#"
            INSERT INTO check_in_tokens (token, teacher_id, issued_at_ms, expires_at_ms)
            VALUES (?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(&data.token)
        .bind(data.teacher_id)
        .bind(data.issued_at.timestamp_millis())
        .bind(data.expires_at.timestamp_millis())
        .fetch_one(pool)
        .await?;

        Ok(row.into())
    }

    pub async fn find<'e, E>(executor: E, token: &str) -> Result<Option<Self>, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = Sqlite>,
    {
        let row = sqlx::query_as::<_, CheckInTokenRow>(
            "SELECT * FROM check_in_tokens WHERE token = ?",
        )
        .bind(token)
        .fetch_optional(executor)
        .await?;

        Ok(row.map(Into::into))
    }

    /// Newest redeemable token of a teacher that is still live at `live_until`
    pub async fn find_latest_live(
        pool: &SqlitePool,
        teacher_id: Uuid,
        live_until: DateTime<Utc>,
        single_use: bool,
    ) -> Result<Option<Self>, sqlx::Error> {
        let row = sqlx::query_as::<_, CheckInTokenRow>(
            r#"
            SELECT * FROM check_in_tokens
            WHERE teacher_id = ?
              AND revoked_at_ms IS NULL
              AND expires_at_ms > ?
              AND (consumed = 0 OR ? = 0)
            ORDER BY expires_at_ms DESC
            LIMIT 1
            "#,
        )
        .bind(teacher_id)
        .bind(live_until.timestamp_millis())
        .bind(single_use)
        .fetch_optional(pool)
        .await?;

        Ok(row.map(Into::into))
    }

    /// Revokes a token owned by `teacher_id`; returns false if no such token
    pub async fn revoke(
        pool: &SqlitePool,
        token: &str,
        teacher_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE check_in_tokens
            SET revoked_at_ms = COALESCE(revoked_at_ms, ?)
            WHERE token = ? AND teacher_id = ?
            "#,
        )
        .bind(now.timestamp_millis())
        .bind(token)
        .bind(teacher_id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn mark_redeemed(
        conn: &mut sqlx::SqliteConnection,
        token: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE check_in_tokens
            SET consumed = 1, redemption_count = redemption_count + 1
            WHERE token = ?
            "#,
        )
        .bind(token)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Deletes tokens that expired before `cutoff`
    pub async fn delete_expired_before(
        pool: &SqlitePool,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM check_in_tokens WHERE expires_at_ms < ?")
            .bind(cutoff.timestamp_millis())
            .execute(pool)
            .await?;

        Ok(result.rows_affected())
    }
}
