use rand::RngCore;
use rand::rngs::OsRng;

/// The size of a CSRF token in raw bytes (hex doubles it on the wire).
pub const CSRF_TOKEN_BYTES: usize = 32;

/// Generates `n` cryptographically random bytes, hex-encoded.
pub fn generate_token(n: usize) -> String {
    let mut bytes = vec![0u8; n];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Generates a new random CSRF token.
pub fn generate_csrf_token() -> String {
    generate_token(CSRF_TOKEN_BYTES)
}

/// Generates a numeric verification code of `digits` decimal digits.
pub fn generate_verification_code(digits: usize) -> String {
    (0..digits)
        .map(|_| char::from(b'0' + (OsRng.next_u32() % 10) as u8))
        .collect()
}
