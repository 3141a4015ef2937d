use ring::digest;
use ring::pbkdf2;
use ring::rand::{SecureRandom, SystemRandom};
use std::num::NonZeroU32;

static ALGORITHM: pbkdf2::Algorithm = pbkdf2::PBKDF2_HMAC_SHA256;
const SALT_LEN: usize = 16;
const CREDENTIAL_LEN: usize = digest::SHA256_OUTPUT_LEN;
const SCHEME: &str = "pbkdf2-sha256";

#[derive(thiserror::Error, Debug)]
pub enum PasswordError {
    #[error("Failed to generate salt")]
    SaltGeneration,

    #[error("Malformed password hash")]
    MalformedHash,
}

/// Hashes a password secret.
///
/// Format: `pbkdf2-sha256$<iterations>$<salt hex>$<hash hex>`
pub fn hash_password(secret: &str, iterations: NonZeroU32) -> Result<String, PasswordError> {
    let mut salt = [0u8; SALT_LEN];
    SystemRandom::new()
        .fill(&mut salt)
        .map_err(|_| PasswordError::SaltGeneration)?;

    let mut credential = [0u8; CREDENTIAL_LEN];
    pbkdf2::derive(ALGORITHM, iterations, &salt, secret.as_bytes(), &mut credential);

    Ok(format!(
        "{}${}${}${}",
        SCHEME,
        iterations,
        hex::encode(salt),
        hex::encode(credential)
    ))
}

/// Checks a secret against a stored hash in constant time.
pub fn verify_password(secret: &str, encoded: &str) -> Result<bool, PasswordError> {
    let mut parts = encoded.split('$');
    let (Some(SCHEME), Some(iterations), Some(salt), Some(credential), None) = (
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
    ) else {
        return Err(PasswordError::MalformedHash);
    };

    let iterations: NonZeroU32 = iterations.parse().map_err(|_| PasswordError::MalformedHash)?;
    let salt = hex::decode(salt).map_err(|_| PasswordError::MalformedHash)?;
    let credential = hex::decode(credential).map_err(|_| PasswordError::MalformedHash)?;

    Ok(pbkdf2::verify(ALGORITHM, iterations, &salt, secret.as_bytes(), &credential).is_ok())
}

/// Burns the same work as a real verification, for unknown accounts.
pub fn dummy_verify(secret: &str, iterations: NonZeroU32) {
    let mut credential = [0u8; CREDENTIAL_LEN];
    pbkdf2::derive(
        ALGORITHM,
        iterations,
        &[0u8; SALT_LEN],
        secret.as_bytes(),
        &mut credential,
    );
}
