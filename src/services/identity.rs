use chrono::{DateTime, Duration, Utc};
use secrecy::{ExposeSecret, Secret};
use sqlx::SqlitePool;
use std::num::NonZeroU32;

use crate::error::{AppError, Result};
use crate::models::user::{CreateUserData, Role, User};
use crate::services::{bearer, password};

#[derive(Debug, Clone)]
pub struct IdentitySettings {
    pub token_secret: Secret<String>,
    pub token_ttl: Duration,
    pub password_iterations: NonZeroU32,
}

#[derive(Debug, Clone)]
pub struct Registration {
    pub display_name: String,
    pub registration_number: String,
    pub email: String,
    pub password: String,
    pub role: Role,
}

/// Result of a successful login
#[derive(Debug, Clone)]
pub struct Authenticated {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user: User,
}

fn required(field: &str, value: &str) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::Validation(format!("{} is required", field)));
    }
    Ok(value.to_string())
}

pub async fn register(
    pool: &SqlitePool,
    settings: &IdentitySettings,
    registration: Registration,
) -> Result<User> {
    let display_name = required("name", &registration.display_name)?;
    let registration_number = required("registration number", &registration.registration_number)?;
    let email = required("email", &registration.email)?;
    if registration.password.is_empty() {
        return Err(AppError::Validation("password is required".to_string()));
    }

    if User::find_by_registration_number(pool, &registration_number)
        .await?
        .is_some()
    {
        return Err(AppError::DuplicateRegistration(format!(
            "Registration number {} is already registered",
            registration_number
        )));
    }

    let password_hash = password::hash_password(&registration.password, settings.password_iterations)
        .map_err(|e| AppError::Internal(e.into()))?;

    let user = User::create(
        pool,
        CreateUserData {
            display_name,
            registration_number,
            email,
            password_hash,
            role: registration.role,
        },
    )
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(ref db) if db.is_unique_violation() => {
            AppError::DuplicateRegistration(
                "Registration number or email is already registered".to_string(),
            )
        }
        other => AppError::Database(other),
    })?;

    tracing::info!(user_id = %user.id, role = ?user.role, "User registered");

    Ok(user)
}

pub fn issue_bearer_token(settings: &IdentitySettings, user: &User) -> Result<Authenticated> {
    let now = Utc::now();
    let claims = bearer::Claims::for_user(user, now, settings.token_ttl);
    let token = bearer::sign(&claims, settings.token_secret.expose_secret().as_bytes())
        .map_err(|e| AppError::Internal(e.into()))?;

    Ok(Authenticated {
        token,
        expires_at: now + settings.token_ttl,
        user: user.clone(),
    })
}

pub async fn authenticate(
    pool: &SqlitePool,
    settings: &IdentitySettings,
    registration_number: &str,
    secret: &str,
) -> Result<Authenticated> {
    let Some(user) = User::find_by_registration_number(pool, registration_number.trim()).await?
    else {
        password::dummy_verify(secret, settings.password_iterations);
        tracing::info!("Login attempt for unknown registration number");
        return Err(AppError::InvalidCredentials);
    };

    let valid = password::verify_password(secret, &user.password_hash).map_err(|e| {
        tracing::error!(user_id = %user.id, error = %e, "Stored password hash unreadable");
        AppError::InvalidCredentials
    })?;

    if !valid {
        tracing::info!(user_id = %user.id, "Login attempt with wrong password");
        return Err(AppError::InvalidCredentials);
    }

    issue_bearer_token(settings, &user)
}

/// Validates a bearer token and loads the user it names.
pub async fn resolve(pool: &SqlitePool, settings: &IdentitySettings, token: &str) -> Result<User> {
    let claims = bearer::verify(
        token,
        settings.token_secret.expose_secret().as_bytes(),
        Utc::now(),
    )
    .map_err(|e| {
        tracing::debug!(error = %e, "Bearer token rejected");
        AppError::Unauthorized
    })?;

    User::find_by_id(pool, claims.sub)
        .await?
        .ok_or(AppError::Unauthorized)
}
