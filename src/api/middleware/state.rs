use axum::extract::FromRef;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::services::{check_in::CheckInSettings, identity::IdentitySettings};

/// Application state shared by every handler
#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub config: Config,
    pub identity: IdentitySettings,
    pub check_in: CheckInSettings,
}

impl AppState {
    pub fn new(pool: SqlitePool, config: Config) -> Self {
        Self {
            identity: config.identity_settings(),
            check_in: config.check_in_settings(),
            pool,
            config,
        }
    }
}

impl FromRef<AppState> for SqlitePool {
    fn from_ref(state: &AppState) -> SqlitePool {
        state.pool.clone()
    }
}
