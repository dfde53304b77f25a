//! Reversible pseudo-password for Firebase users.
//!
//! Firebase identities carry no password. Under the permissive credential
//! policy the identifier is encrypted with AES-256-GCM to hand the session
//! layer a non-empty credential. It is not a secret and must never be used
//! to authenticate anyone.

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::prelude::BASE64_STANDARD;
use base64::Engine;
use thiserror::Error;

const NONCE_LEN: usize = 12;
const KEY_LEN: usize = 32;

/// Errors that can occur while encoding or decoding a pseudo-password.
#[derive(Debug, Error)]
pub enum CredentialError {
    /// The key is not valid base64 or not 32 bytes long.
    #[error("password key must be a base64-encoded 32-byte key")]
    InvalidKey,

    /// The AEAD encryption failed.
    #[error("failed to encrypt pseudo-password")]
    EncryptionFailed,

    /// The ciphertext is malformed, tampered with, or encrypted under another key.
    #[error("failed to decrypt pseudo-password")]
    DecryptionFailed,
}

/// AES-256-GCM cipher used to derive pseudo-passwords from identifiers.
///
/// Output is `base64(nonce || ciphertext)` with a random 12-byte nonce, so two
/// encodings of the same identifier differ but decrypt to the same value.
#[derive(Clone)]
pub struct PasswordCipher {
    cipher: Aes256Gcm,
}

impl std::fmt::Debug for PasswordCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordCipher")
            .field("cipher", &"<redacted>")
            .finish()
    }
}

impl PasswordCipher {
    /// Creates a cipher from a base64-encoded 32-byte key.
    pub fn from_key(key: &str) -> Result<PasswordCipher, CredentialError> {
        let bytes = BASE64_STANDARD
            .decode(key.trim())
            .map_err(|_| CredentialError::InvalidKey)?;

        if bytes.len() != KEY_LEN {
            return Err(CredentialError::InvalidKey);
        }

        let key = Key::<Aes256Gcm>::from_slice(&bytes);
        Ok(PasswordCipher {
            cipher: Aes256Gcm::new(key),
        })
    }

    /// Generates a random base64-encoded key suitable for [`PasswordCipher::from_key`].
    pub fn generate_key() -> String {
        let key = Aes256Gcm::generate_key(OsRng);
        BASE64_STANDARD.encode(key)
    }

    /// Encrypts the identifier into a pseudo-password.
    pub fn encrypt(&self, identifier: &str) -> Result<String, CredentialError> {
        let nonce = Aes256Gcm::generate_nonce(OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, identifier.as_bytes())
            .map_err(|_| CredentialError::EncryptionFailed)?;

        let mut combined = nonce.to_vec();
        combined.extend_from_slice(&ciphertext);
        Ok(BASE64_STANDARD.encode(combined))
    }

    /// Recovers the identifier from a pseudo-password.
    pub fn decrypt(&self, encoded: &str) -> Result<String, CredentialError> {
        let combined = BASE64_STANDARD
            .decode(encoded)
            .map_err(|_| CredentialError::DecryptionFailed)?;

        if combined.len() < NONCE_LEN {
            return Err(CredentialError::DecryptionFailed);
        }

        let (nonce, ciphertext) = combined.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| CredentialError::DecryptionFailed)?;

        String::from_utf8(plaintext).map_err(|_| CredentialError::DecryptionFailed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cipher() -> PasswordCipher {
        PasswordCipher::from_key(&PasswordCipher::generate_key()).unwrap()
    }

    #[test]
    fn decrypts_to_identifier() {
        let cipher = cipher();
        let encoded = cipher.encrypt("firebase-uid").unwrap();

        assert_ne!(encoded, "firebase-uid");
        assert_eq!(cipher.decrypt(&encoded).unwrap(), "firebase-uid");
    }

    #[test]
    fn random_nonce_changes_ciphertext() {
        let cipher = cipher();
        let first = cipher.encrypt("uid").unwrap();
        let second = cipher.encrypt("uid").unwrap();

        assert_ne!(first, second);
        assert_eq!(cipher.decrypt(&second).unwrap(), "uid");
    }

    #[test]
    fn rejects_short_key() {
        let key = BASE64_STANDARD.encode([0u8; 16]);
        assert!(matches!(
            PasswordCipher::from_key(&key),
            Err(CredentialError::InvalidKey)
        ));
    }

    #[test]
    fn rejects_foreign_ciphertext() {
        let encoded = cipher().encrypt("uid").unwrap();
        assert!(matches!(
            cipher().decrypt(&encoded),
            Err(CredentialError::DecryptionFailed)
        ));
        assert!(matches!(
            cipher().decrypt("not base64!"),
            Err(CredentialError::DecryptionFailed)
        ));
    }
}
