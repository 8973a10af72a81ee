//! Credential hashing and account-lockout policy.
//!
//! Passwords are stored as Argon2 PHC strings. The complexity policy is
//! intentionally relaxed (minimum length only); the lockout numbers mirror
//! the legacy portal's identity options.

use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use password_hash::{PasswordHash, SaltString};

use crate::error::{AppError, AppResult};

/// Minimum accepted password length. No character-class requirements.
pub const MIN_PASSWORD_LEN: usize = 5;

/// Failed sign-in attempts before an account locks.
pub const MAX_FAILED_ATTEMPTS: u32 = 10;

/// How long a locked account stays locked, in minutes.
pub const LOCKOUT_MINUTES: i64 = 60;

/// Validate a candidate password against the portal policy.
pub fn check_password_policy(password: &str) -> AppResult<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::user(
            "password_too_short".to_string(),
            format!("password must be at least {} characters", MIN_PASSWORD_LEN),
        ));
    }
    Ok(())
}

pub fn hash_password(password: &str) -> AppResult<String> {
    let mut salt_bytes = [0u8; 16];
    getrandom::getrandom(&mut salt_bytes)
        .map_err(|e| AppError::internal("salt".to_string(), e.to_string()))?;
    let salt = SaltString::encode_b64(&salt_bytes)
        .map_err(|e| AppError::internal("salt_b64".to_string(), e.to_string()))?;
    let argon2 = Argon2::default();
    let phc = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::internal("hash".to_string(), e.to_string()))?
        .to_string();
    Ok(phc)
}

pub fn verify_password(hash: &str, password: &str) -> bool {
    if let Ok(parsed) = PasswordHash::new(hash) {
        let argon2 = Argon2::default();
        argon2.verify_password(password.as_bytes(), &parsed).is_ok()
    } else {
        false
    }
}
