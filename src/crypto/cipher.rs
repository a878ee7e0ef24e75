use aes_gcm::{
    aead::{Aead, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use aes_gcm::aead::rand_core::RngCore;
use base64::{Engine as _, engine::general_purpose};
use zeroize::{Zeroize, ZeroizeOnDrop};
use crate::error::{AppError, Result};

/// The size of the AES-256 key in bytes.
pub const KEY_SIZE: usize = 32;
/// The size of the AES-GCM nonce in bytes.
pub const NONCE_SIZE: usize = 12;
/// Separates ciphertext from nonce inside an envelope.
const ENVELOPE_SEPARATOR: &str = "::";

/// A secure key wrapper that ensures the key is zeroized on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SecureKey([u8; KEY_SIZE]);

impl SecureKey {
    /// Creates a new `SecureKey` from a byte array.
    pub fn new(key: [u8; KEY_SIZE]) -> Self {
        Self(key)
    }

    /// Returns a reference to the key as a byte slice.
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

/// Encrypts and decrypts persisted PII fields with a process-wide key.
///
/// The wire form is `base64(ciphertext) :: base64(nonce)`; a fresh random
/// nonce is drawn for every call.
pub struct FieldCipher {
    key: SecureKey,
}

impl FieldCipher {
    /// Creates a new `FieldCipher`.
    ///
    /// # Arguments
    ///
    /// * `key` - The raw key material from configuration.
    ///
    /// # Returns
    ///
    /// A `Result` containing the cipher. A key of the wrong length is a
    /// fatal configuration error, never a silent downgrade.
    pub fn new(key: &[u8]) -> Result<Self> {
        let key: [u8; KEY_SIZE] = key.try_into().map_err(|_| {
            AppError::Configuration(format!(
                "Encryption key must be {} bytes, got {}",
                KEY_SIZE,
                key.len()
            ))
        })?;
        Ok(Self { key: SecureKey::new(key) })
    }

    /// Encrypts a plaintext field value.
    ///
    /// # Arguments
    ///
    /// * `plaintext` - The value to encrypt. Empty input yields empty output.
    ///
    /// # Returns
    ///
    /// A `Result` containing the envelope string.
    pub fn encrypt(&self, plaintext: &str) -> Result<String> {
        if plaintext.is_empty() {
            return Ok(String::new());
        }

        let cipher = Aes256Gcm::new(self.key.as_bytes().into());

        let nonce_bytes = generate_nonce();
        let nonce = Nonce::from(nonce_bytes);

        let ciphertext = cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|e| AppError::Crypto(format!("Encryption failed: {}", e)))?;

        Ok(format!(
            "{}{}{}",
            general_purpose::STANDARD.encode(ciphertext),
            ENVELOPE_SEPARATOR,
            general_purpose::STANDARD.encode(nonce_bytes)
        ))
    }

    /// Decrypts an envelope produced by [`FieldCipher::encrypt`].
    ///
    /// # Returns
    ///
    /// A `Result` containing the plaintext. Malformed envelopes and AEAD
    /// failures are errors; `decrypt_or_empty` is the fail-closed form.
    pub fn try_decrypt(&self, envelope: &str) -> Result<String> {
        if envelope.is_empty() {
            return Ok(String::new());
        }

        let mut parts = envelope.split(ENVELOPE_SEPARATOR);
        let (ct_b64, nonce_b64) = match (parts.next(), parts.next(), parts.next()) {
            (Some(ct), Some(nonce), None) => (ct, nonce),
            _ => {
                return Err(AppError::Crypto(
                    "Envelope does not split into ciphertext and nonce".to_string(),
                ));
            }
        };

        let ciphertext = general_purpose::STANDARD
            .decode(ct_b64)
            .map_err(|e| AppError::Crypto(format!("Invalid ciphertext encoding: {}", e)))?;
        let nonce_bytes: [u8; NONCE_SIZE] = general_purpose::STANDARD
            .decode(nonce_b64)
            .map_err(|e| AppError::Crypto(format!("Invalid nonce encoding: {}", e)))?
            .try_into()
            .map_err(|_| AppError::Crypto("Nonce has wrong length".to_string()))?;

        let cipher = Aes256Gcm::new(self.key.as_bytes().into());
        let nonce = Nonce::from(nonce_bytes);

        let plaintext = cipher
            .decrypt(&nonce, ciphertext.as_slice())
            .map_err(|e| AppError::Crypto(format!("Decryption failed: {}", e)))?;

        String::from_utf8(plaintext)
            .map_err(|e| AppError::Crypto(format!("Decrypted field is not UTF-8: {}", e)))
    }

    /// Fail-closed decryption for persisted PII: any failure is logged and
    /// yields an empty string instead of surfacing ciphertext or an error to
    /// the caller's output.
    pub fn decrypt_or_empty(&self, envelope: &str) -> String {
        match self.try_decrypt(envelope) {
            Ok(plaintext) => plaintext,
            Err(e) => {
                tracing::error!("❌ Field decryption failed closed: {}", e);
                String::new()
            }
        }
    }
}

/// Generates a new random AES-GCM nonce.
pub fn generate_nonce() -> [u8; NONCE_SIZE] {
    let mut nonce = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce);
    nonce
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cipher() -> FieldCipher {
        FieldCipher::new(&[7u8; KEY_SIZE]).unwrap()
    }

    #[test]
    fn roundtrip_preserves_plaintext() {
        let cipher = cipher();
        for value in ["maria.santos@example.org", "+55 11 91234-5678", "ward 7, bed 3"] {
            let envelope = cipher.encrypt(value).unwrap();
            assert_ne!(envelope, value);
            assert_eq!(cipher.try_decrypt(&envelope).unwrap(), value);
        }
    }

    #[test]
    fn empty_input_is_passed_through() {
        let cipher = cipher();
        assert_eq!(cipher.encrypt("").unwrap(), "");
        assert_eq!(cipher.try_decrypt("").unwrap(), "");
        assert_eq!(cipher.decrypt_or_empty(""), "");
    }

    #[test]
    fn fresh_nonce_per_call() {
        let cipher = cipher();
        let a = cipher.encrypt("same value").unwrap();
        let b = cipher.encrypt("same value").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn malformed_envelope_fails_closed() {
        let cipher = cipher();
        assert_eq!(cipher.decrypt_or_empty("no-separator"), "");
        assert_eq!(cipher.decrypt_or_empty("a::b::c"), "");
        assert_eq!(cipher.decrypt_or_empty("!!not-base64!!::AAAA"), "");
    }

    #[test]
    fn tampered_ciphertext_fails_closed() {
        let cipher = cipher();
        let envelope = cipher.encrypt("blood type AB-").unwrap();
        let mut tampered = envelope.into_bytes();
        tampered[0] = if tampered[0] == b'A' { b'B' } else { b'A' };
        let tampered = String::from_utf8(tampered).unwrap();
        assert_eq!(cipher.decrypt_or_empty(&tampered), "");
    }

    #[test]
    fn wrong_key_length_is_rejected_at_construction() {
        assert!(FieldCipher::new(&[0u8; 16]).is_err());
        assert!(FieldCipher::new(&[0u8; 33]).is_err());
    }
}
