//! Stateless bearer tokens.
//!
//! Format: `base64url(claims JSON) "." base64url(HMAC-SHA256(claims part))`.
//! Tokens are not individually revocable; they die at `exp`.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Utc};
use ring::hmac;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::user::{Role, User};

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum BearerError {
    #[error("Malformed token")]
    Malformed,

    #[error("Bad token signature")]
    BadSignature,

    #[error("Token expired")]
    Expired,

    #[error("Claims serialization failed")]
    Serialization,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub role: Role,
    pub name: String,
    pub reg: String,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn for_user(user: &User, issued_at: DateTime<Utc>, ttl: chrono::Duration) -> Self {
        Self {
            sub: user.id,
            role: user.role,
            name: user.display_name.clone(),
            reg: user.registration_number.clone(),
            iat: issued_at.timestamp(),
            exp: (issued_at + ttl).timestamp(),
        }
    }
}

pub fn sign(claims: &Claims, secret: &[u8]) -> Result<String, BearerError> {
    let payload = serde_json::to_vec(claims).map_err(|_| BearerError::Serialization)?;
    let payload = URL_SAFE_NO_PAD.encode(payload);

    let key = hmac::Key::new(hmac::HMAC_SHA256, secret);
    let tag = hmac::sign(&key, payload.as_bytes());

    Ok(format!("{}.{}", payload, URL_SAFE_NO_PAD.encode(tag.as_ref())))
}

/// Verifies signature first, then expiry.
pub fn verify(token: &str, secret: &[u8], now: DateTime<Utc>) -> Result<Claims, BearerError> {
    let (payload, signature) = token.split_once('.').ok_or(BearerError::Malformed)?;
    let signature = URL_SAFE_NO_PAD
        .decode(signature)
        .map_err(|_| BearerError::Malformed)?;

    let key = hmac::Key::new(hmac::HMAC_SHA256, secret);
    hmac::verify(&key, payload.as_bytes(), &signature).map_err(|_| BearerError::BadSignature)?;

    let payload = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|_| BearerError::Malformed)?;
    let claims: Claims = serde_json::from_slice(&payload).map_err(|_| BearerError::Malformed)?;

    if claims.exp <= now.timestamp() {
        return Err(BearerError::Expired);
    }

    Ok(claims)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn claims(now: DateTime<Utc>) -> Claims {
        Claims {
            sub: Uuid::new_v4(),
            role: Role::Teacher,
            name: "Ana".to_string(),
            reg: "T-001".to_string(),
            iat: now.timestamp(),
            exp: (now + Duration::hours(24)).timestamp(),
        }
    }

    #[test]
    fn test_valid_token_verifies() {
        let now = Utc::now();
        let claims = claims(now);
        let token = sign(&claims, b"secret").unwrap();

        assert_eq!(verify(&token, b"secret", now).unwrap(), claims);
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let now = Utc::now();
        let token = sign(&claims(now), b"secret").unwrap();

        assert_eq!(
            verify(&token, b"other", now),
            Err(BearerError::BadSignature)
        );
    }

    #[test]
    fn test_tampered_payload_rejected() {
        let now = Utc::now();
        let token = sign(&claims(now), b"secret").unwrap();
        let (_, signature) = token.split_once('.').unwrap();

        let mut forged = claims(now);
        forged.role = Role::Student;
        let forged_payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&forged).unwrap());
        let forged_token = format!("{}.{}", forged_payload, signature);

        assert_eq!(
            verify(&forged_token, b"secret", now),
            Err(BearerError::BadSignature)
        );
    }

    #[test]
    fn test_expired_token_rejected() {
        let now = Utc::now();
        let token = sign(&claims(now), b"secret").unwrap();

        assert_eq!(
            verify(&token, b"secret", now + Duration::hours(25)),
            Err(BearerError::Expired)
        );
    }

    #[test]
    fn test_garbage_rejected() {
        let now = Utc::now();
        assert_eq!(verify("no-dot", b"secret", now), Err(BearerError::Malformed));
        assert_eq!(verify("a.!!!", b"secret", now), Err(BearerError::Malformed));
    }
}
