use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2, ParamsBuilder,
};
use rand::RngCore;
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use zeroize::Zeroize;
use crate::error::{AppError, Result};

/// The memory cost for Argon2 in MB.
const ARGON2_MEMORY_MB: u32 = 19;
/// The number of iterations for Argon2.
const ARGON2_ITERATIONS: u32 = 3;
/// The parallelism factor for Argon2.
const ARGON2_PARALLELISM: u32 = 6;
/// Legacy salt length in raw bytes (stored hex-encoded).
const LEGACY_SALT_BYTES: usize = 16;

/// A stored password credential.
///
/// `Legacy` rows predate the Argon2 migration and carry a fast
/// `sha256(password || salt)` digest. They verify, but the login flow
/// re-hashes them to `Modern` on the next successful authentication.
#[derive(Debug, Clone)]
pub enum StoredCredential {
    /// A fast salted hash inherited from the previous system.
    Legacy { hash: String, salt: String },
    /// An Argon2id PHC string.
    Modern { hash: String },
}

/// The outcome of verifying a password against a stored credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerifyOutcome {
    /// Whether the password matched.
    pub valid: bool,
    /// Whether the credential should be upgraded to the modern hash.
    pub needs_rehash: bool,
}

/// Hashes a password using Argon2id.
///
/// # Arguments
///
/// * `password` - The password to hash.
///
/// # Returns
///
/// A `Result` containing the PHC-formatted hash.
pub fn hash_password(password: &str) -> Result<String> {
    let mut password_bytes = password.as_bytes().to_vec();

    let mut salt_bytes = [0u8; 16];
    OsRng.fill_bytes(&mut salt_bytes);

    let salt = SaltString::encode_b64(&salt_bytes)
        .map_err(|e| AppError::Crypto(format!("Salt encoding error: {}", e)))?;

    let argon2 = Argon2::new(
        argon2::Algorithm::Argon2id,
        argon2::Version::V0x13,
        ParamsBuilder::new()
            .m_cost(ARGON2_MEMORY_MB * 1024)
            .t_cost(ARGON2_ITERATIONS)
            .p_cost(ARGON2_PARALLELISM)
            .build()
            .map_err(|e| AppError::Crypto(format!("Argon2 params: {}", e)))?,
    );

    let password_hash = argon2
        .hash_password(&password_bytes, &salt)
        .map_err(|e| AppError::Crypto(format!("Argon2 hash error: {}", e)))?
        .to_string();

    password_bytes.zeroize();
    tracing::debug!("Password hashed successfully with Argon2");
    Ok(password_hash)
}

/// Verifies a password against an Argon2 hash.
fn verify_modern(password: &str, hash: &str) -> Result<bool> {
    let mut password_bytes = password.as_bytes().to_vec();
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| AppError::Crypto(format!("Hash parse error: {}", e)))?;
    let argon2 = Argon2::default();
    let result = argon2
        .verify_password(&password_bytes, &parsed_hash)
        .is_ok();

    password_bytes.zeroize();
    Ok(result)
}

/// Computes the legacy digest `hex(sha256(password || salt))`.
///
/// # Arguments
///
/// * `password` - The password to hash.
/// * `salt` - A hex-encoded salt, or `None` to generate a fresh one.
///
/// # Returns
///
/// A `Result` containing `(hash, salt)`.
pub fn hash_with_salt(password: &str, salt: Option<&str>) -> Result<(String, String)> {
    let salt = match salt {
        Some(s) => s.to_string(),
        None => {
            let mut salt_bytes = [0u8; LEGACY_SALT_BYTES];
            OsRng.fill_bytes(&mut salt_bytes);
            hex::encode(salt_bytes)
        }
    };

    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    hasher.update(salt.as_bytes());
    let hash = hex::encode(hasher.finalize());

    Ok((hash, salt))
}

/// Verifies a password against a legacy salted hash in constant time.
pub fn verify_with_salt(password: &str, hash: &str, salt: &str) -> Result<bool> {
    let (candidate, _) = hash_with_salt(password, Some(salt))?;
    Ok(constant_time_eq(&candidate, hash))
}

/// Verifies a password against a stored credential of either variant.
///
/// # Returns
///
/// A `Result` containing the outcome. A matching `Legacy` credential is
/// flagged for re-hashing so the caller can migrate it to Argon2.
pub fn verify_credential(password: &str, credential: &StoredCredential) -> Result<VerifyOutcome> {
    match credential {
        StoredCredential::Modern { hash } => Ok(VerifyOutcome {
            valid: verify_modern(password, hash)?,
            needs_rehash: false,
        }),
        StoredCredential::Legacy { hash, salt } => {
            let valid = verify_with_salt(password, hash, salt)?;
            Ok(VerifyOutcome { valid, needs_rehash: valid })
        }
    }
}

/// Constant-time string equality for secret material.
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}
