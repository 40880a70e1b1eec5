//! At-rest encryption for upstream portal credentials (C5).
//!
//! The key derivation is pinned to PBKDF2-HMAC-SHA256 with 100,000
//! iterations and a fixed default salt — these constants are load-bearing
//! for backward compatibility with ciphertexts produced before this
//! rewrite, and must not be changed independently of a migration.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Key, Nonce,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

/// Iteration count for the PBKDF2-HMAC-SHA256 key derivation. Preserved
/// exactly from the upstream collector's `_setup_decryption` for ciphertext
/// compatibility; do not raise without a re-encryption migration.
pub const PBKDF2_ITERATIONS: u32 = 100_000;
const KEY_LENGTH_BYTES: usize = 32;
const NONCE_LENGTH_BYTES: usize = 12;

/// Default salt used when `ENCRYPTION_SALT` is not set, matching the
/// upstream collector's fallback constant.
pub const DEFAULT_SALT: &str = "blacklist-regtech-salt-2025";

#[derive(Error, Debug)]
pub enum VaultError {
    #[error("base64 decode failed: {0}")]
    Encoding(#[from] base64::DecodeError),
    #[error("ciphertext too short to contain a nonce")]
    Truncated,
    #[error("decryption failed: integrity check failed or wrong master key")]
    Decryption,
    #[error("credential envelope was not valid JSON: {0}")]
    EnvelopeJson(#[from] serde_json::Error),
    #[error("decrypted envelope did not contain a password field")]
    MissingPasswordField,
}

#[derive(Serialize, Deserialize)]
struct PasswordEnvelope {
    password: String,
}

/// Derives the AES-256-GCM key from the process-wide master secret and salt.
fn derive_key(master_key: &str, salt: &str) -> [u8; KEY_LENGTH_BYTES] {
    let mut derived = [0u8; KEY_LENGTH_BYTES];
    pbkdf2_hmac::<Sha256>(
        master_key.as_bytes(),
        salt.as_bytes(),
        PBKDF2_ITERATIONS,
        &mut derived,
    );
    derived
}

/// Encrypts `password` into a single base64 string: `nonce || ciphertext`.
/// The plaintext is first wrapped in a `{"password": "..."}` JSON envelope
/// so the decrypt path can validate the field name rather than trust a bare
/// string.
pub fn encrypt_password(
    password: &str,
    master_key: &str,
    salt: &str,
) -> Result<String, VaultError> {
    let envelope = serde_json::to_vec(&PasswordEnvelope {
        password: password.to_string(),
    })?;

    let key_bytes = derive_key(master_key, salt);
    let key = Key::<Aes256Gcm>::from_slice(&key_bytes);
    let cipher = Aes256Gcm::new(key);

    let mut nonce_bytes = [0u8; NONCE_LENGTH_BYTES];
    rand::thread_rng().fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, envelope.as_ref())
        .map_err(|_| VaultError::Decryption)?;

    let mut combined = Vec::with_capacity(NONCE_LENGTH_BYTES + ciphertext.len());
    combined.extend_from_slice(&nonce_bytes);
    combined.extend_from_slice(&ciphertext);
    Ok(BASE64.encode(combined))
}

/// Decrypts a ciphertext produced by [`encrypt_password`] (or by the
/// original Python collector's compatible scheme) back to plaintext.
pub fn decrypt_password(
    ciphertext_base64: &str,
    master_key: &str,
    salt: &str,
) -> Result<String, VaultError> {
    let combined = BASE64.decode(ciphertext_base64)?;
    if combined.len() < NONCE_LENGTH_BYTES {
        return Err(VaultError::Truncated);
    }
    let (nonce_bytes, ciphertext) = combined.split_at(NONCE_LENGTH_BYTES);

    let key_bytes = derive_key(master_key, salt);
    let key = Key::<Aes256Gcm>::from_slice(&key_bytes);
    let cipher = Aes256Gcm::new(key);
    let nonce = Nonce::from_slice(nonce_bytes);

    let plaintext = cipher
        .decrypt(nonce, ciphertext)
        .map_err(|_| VaultError::Decryption)?;

    let envelope: PasswordEnvelope = serde_json::from_slice(&plaintext)
        .map_err(|_| VaultError::MissingPasswordField)?;
    Ok(envelope.password)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encrypt_then_decrypt_round_trips() {
        let ciphertext = encrypt_password("hunter2", "master-secret", DEFAULT_SALT).unwrap();
        let plaintext = decrypt_password(&ciphertext, "master-secret", DEFAULT_SALT).unwrap();
        assert_eq!(plaintext, "hunter2");
    }

    #[test]
    fn decrypt_with_wrong_master_key_fails() {
        let ciphertext = encrypt_password("hunter2", "master-secret", DEFAULT_SALT).unwrap();
        let result = decrypt_password(&ciphertext, "wrong-secret", DEFAULT_SALT);
        assert!(matches!(result, Err(VaultError::Decryption)));
    }

    #[test]
    fn decrypt_truncated_ciphertext_is_an_error_not_a_panic() {
        let result = decrypt_password("YQ==", "master-secret", DEFAULT_SALT);
        assert!(matches!(result, Err(VaultError::Truncated)));
    }

    #[test]
    fn two_encryptions_of_the_same_password_differ() {
        let a = encrypt_password("hunter2", "master-secret", DEFAULT_SALT).unwrap();
        let b = encrypt_password("hunter2", "master-secret", DEFAULT_SALT).unwrap();
        assert_ne!(a, b, "nonce must be freshly random per encryption");
    }
}
