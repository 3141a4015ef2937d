use chrono::{Duration, Utc};
use sqlx::SqlitePool;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};

use crate::models::check_in_token::CheckInToken;

/// Expired tokens are kept this long so late scans still get `Expired`
/// rather than `InvalidToken`.
const GRACE_PERIOD_HOURS: i64 = 24;

/// Background job that deletes check-in tokens expired for longer than the
/// grace period. Redemption already rejects expired tokens, so this only
/// bounds table growth.
pub async fn sweep_expired_tokens(pool: &SqlitePool) -> Result<u64, sqlx::Error> {
    let cutoff = Utc::now() - Duration::hours(GRACE_PERIOD_HOURS);
    let deleted = CheckInToken::delete_expired_before(pool, cutoff).await?;

    tracing::info!(deleted, "Expired check-in tokens swept");

    Ok(deleted)
}

/// Starts a scheduler running [`sweep_expired_tokens`] on `schedule`
/// (six-field cron, seconds first).
pub async fn start(pool: SqlitePool, schedule: &str) -> Result<JobScheduler, JobSchedulerError> {
    let scheduler = JobScheduler::new().await?;

    let job = Job::new_async(schedule, move |_uuid, _lock| {
        let pool = pool.clone();
        Box::pin(async move {
            if let Err(e) = sweep_expired_tokens(&pool).await {
                tracing::error!(error = %e, "Check-in token sweep failed");
            }
        })
    })?;

    scheduler.add(job).await?;
    scheduler.start().await?;

    tracing::info!(schedule, "Check-in token sweeper scheduled");

    Ok(scheduler)
}
