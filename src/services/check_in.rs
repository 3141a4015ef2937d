use chrono::{DateTime, Duration, Utc};
use ring::rand::{SecureRandom, SystemRandom};
use sqlx::{Sqlite, SqlitePool};
use url::Url;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::check_in_token::{CheckInToken, CreateCheckInTokenData, TokenStatus};

const TOKEN_BYTES: usize = 32;

pub const MIN_TTL_SECONDS: i64 = 1;
pub const MAX_TTL_SECONDS: i64 = 24 * 60 * 60;

#[derive(Debug, Clone)]
pub struct CheckInSettings {
    pub default_ttl: Duration,
    pub single_use: bool,
    pub base_url: String,
}

/// 32 random bytes, hex encoded
pub fn generate_token_value() -> Result<String> {
    let mut bytes = [0u8; TOKEN_BYTES];
    SystemRandom::new()
        .fill(&mut bytes)
        .map_err(|_| AppError::Internal(anyhow::anyhow!("Failed to generate check-in token")))?;

    Ok(hex::encode(bytes))
}

/// Builds `<base>/presenca_aluno/<token>`, the payload encoded in the QR code.
pub fn check_in_url(base_url: &str, token: &str) -> Result<Url> {
    let mut url = Url::parse(base_url)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Invalid check-in base URL: {e}")))?;

    url.path_segments_mut()
        .map_err(|_| AppError::Internal(anyhow::anyhow!("Check-in base URL cannot be a base")))?
        .pop_if_empty()
        .push("presenca_aluno")
        .push(token);

    Ok(url)
}

fn ttl_out_of_bounds() -> AppError {
    AppError::Validation(format!(
        "Check-in token lifetime must be between {} and {} seconds",
        MIN_TTL_SECONDS, MAX_TTL_SECONDS
    ))
}

/// Converts a client-supplied lifetime, rejecting it before it can overflow.
pub fn ttl_from_seconds(seconds: i64) -> Result<Duration> {
    if !(MIN_TTL_SECONDS..=MAX_TTL_SECONDS).contains(&seconds) {
        return Err(ttl_out_of_bounds());
    }
    Duration::try_seconds(seconds).ok_or_else(ttl_out_of_bounds)
}

pub async fn issue(
    pool: &SqlitePool,
    teacher_id: Uuid,
    ttl: Option<Duration>,
    settings: &CheckInSettings,
) -> Result<CheckInToken> {
    let ttl = ttl.unwrap_or(settings.default_ttl);
    if ttl < Duration::seconds(MIN_TTL_SECONDS) || ttl > Duration::seconds(MAX_TTL_SECONDS) {
        return Err(ttl_out_of_bounds());
    }

    let issued_at = Utc::now();
    let token = CheckInToken::create(
        pool,
        CreateCheckInTokenData {
            token: generate_token_value()?,
            teacher_id,
            issued_at,
            expires_at: issued_at + ttl,
        },
    )
    .await?;

    tracing::info!(
        teacher_id = %teacher_id,
        expires_at = %token.expires_at,
        "Check-in token issued"
    );

    Ok(token)
}

/// Returns the teacher's newest live token if at least half of the default
/// lifetime remains on it, otherwise issues a new one.
pub async fn current_or_issue(
    pool: &SqlitePool,
    teacher_id: Uuid,
    settings: &CheckInSettings,
) -> Result<CheckInToken> {
    let live_until = Utc::now() + settings.default_ttl / 2;
    if let Some(token) =
        CheckInToken::find_latest_live(pool, teacher_id, live_until, settings.single_use).await?
    {
        return Ok(token);
    }

    issue(pool, teacher_id, None, settings).await
}

/// Validates a token and returns the teacher whose roster it is scoped to.
///
/// Does not touch the roster.
pub async fn redeem<'e, E>(
    executor: E,
    token_value: &str,
    single_use: bool,
    now: DateTime<Utc>,
) -> Result<Uuid>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let token = CheckInToken::find(executor, token_value)
        .await?
        .ok_or(AppError::InvalidToken)?;

    match token.status(now, single_use) {
        TokenStatus::Active => Ok(token.teacher_id),
        TokenStatus::Expired => Err(AppError::Expired),
        TokenStatus::Revoked | TokenStatus::Consumed => Err(AppError::InvalidToken),
    }
}

/// Revokes a token. Tokens of other teachers are reported as not found.
pub async fn revoke(pool: &SqlitePool, teacher_id: Uuid, token_value: &str) -> Result<()> {
    if !CheckInToken::revoke(pool, token_value, teacher_id, Utc::now()).await? {
        return Err(AppError::NotFound("Check-in token not found".to_string()));
    }

    tracing::info!(teacher_id = %teacher_id, "Check-in token revoked");

    Ok(())
}

/// Loads a token only if `teacher_id` issued it
pub async fn find_owned(
    pool: &SqlitePool,
    teacher_id: Uuid,
    token_value: &str,
) -> Result<CheckInToken> {
    CheckInToken::find(pool, token_value)
        .await?
        .filter(|token| token.teacher_id == teacher_id)
        .ok_or_else(|| AppError::NotFound("Check-in token not found".to_string()))
}
