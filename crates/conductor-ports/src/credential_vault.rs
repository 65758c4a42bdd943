//! At-rest encryption for `CloudCredentialProvider` secrets. Ambient stack —
//! carried regardless of the cloud plug-ins themselves being out of scope.

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::Engine;
use pbkdf2::pbkdf2_hmac;
use sha2::{Digest, Sha256};
use thiserror::Error;

const PBKDF2_ROUNDS: u32 = 100_000;
const NONCE_LEN: usize = 12;

#[derive(Debug, Error)]
pub enum VaultError {
    #[error("encryption failed")]
    Encrypt,
    #[error("decryption failed (wrong key or corrupted ciphertext)")]
    Decrypt,
    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("ciphertext too short to contain a nonce")]
    Truncated,
}

/// Encrypts/decrypts credential blobs with AES-256-GCM.
pub struct CredentialVault {
    key: [u8; 32],
}

impl CredentialVault {
    /// Derive a key directly from a passphrase via SHA-256.
    pub fn from_passphrase(passphrase: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(passphrase.as_bytes());
        let digest = hasher.finalize();
        let mut key = [0u8; 32];
        key.copy_from_slice(&digest);
        Self { key }
    }

    /// Derive a key from a passphrase and salt via PBKDF2-HMAC-SHA256.
    pub fn from_passphrase_salted(passphrase: &str, salt: &[u8]) -> Self {
        let mut key = [0u8; 32];
        pbkdf2_hmac::<Sha256>(passphrase.as_bytes(), salt, PBKDF2_ROUNDS, &mut key);
        Self { key }
    }

    pub fn generate_salt() -> [u8; 16] {
        use rand::RngCore;
        let mut salt = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut salt);
        salt
    }

    pub fn encrypt_string(&self, plaintext: &str) -> Result<String, VaultError> {
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&self.key));
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|_| VaultError::Encrypt)?;
        let mut combined = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        combined.extend_from_slice(&nonce);
        combined.extend_from_slice(&ciphertext);
        Ok(base64::engine::general_purpose::STANDARD.encode(combined))
    }

    pub fn decrypt_string(&self, encoded: &str) -> Result<String, VaultError> {
        let combined = base64::engine::general_purpose::STANDARD.decode(encoded)?;
        if combined.len() < NONCE_LEN {
            return Err(VaultError::Truncated);
        }
        let (nonce_bytes, ciphertext) = combined.split_at(NONCE_LEN);
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&self.key));
        let plaintext = cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|_| VaultError::Decrypt)?;
        String::from_utf8(plaintext).map_err(|_| VaultError::Decrypt)
    }

    /// Re-encrypt a payload under a new vault, for key rotation.
    pub fn re_encrypt(&self, new_vault: &CredentialVault, encoded: &str) -> Result<String, VaultError> {
        let plaintext = self.decrypt_string(encoded)?;
        new_vault.encrypt_string(&plaintext)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encrypt_decrypt_roundtrip() {
        let vault = CredentialVault::from_passphrase("hunter2");
        let encrypted = vault.encrypt_string("super-secret-token").unwrap();
        assert_ne!(encrypted, "super-secret-token");
        assert_eq!(vault.decrypt_string(&encrypted).unwrap(), "super-secret-token");
    }

    #[test]
    fn different_keys_fail_to_decrypt() {
        let a = CredentialVault::from_passphrase("one");
        let b = CredentialVault::from_passphrase("two");
        let encrypted = a.encrypt_string("secret").unwrap();
        assert!(b.decrypt_string(&encrypted).is_err());
    }

    #[test]
    fn pbkdf2_derivation_is_deterministic_per_salt() {
        let salt = CredentialVault::generate_salt();
        let a = CredentialVault::from_passphrase_salted("pw", &salt);
        let b = CredentialVault::from_passphrase_salted("pw", &salt);
        let encrypted = a.encrypt_string("x").unwrap();
        assert_eq!(b.decrypt_string(&encrypted).unwrap(), "x");
    }

    #[test]
    fn key_rotation_preserves_plaintext() {
        let old = CredentialVault::from_passphrase("old");
        let new = CredentialVault::from_passphrase("new");
        let encrypted = old.encrypt_string("rotate-me").unwrap();
        let rotated = old.re_encrypt(&new, &encrypted).unwrap();
        assert_eq!(new.decrypt_string(&rotated).unwrap(), "rotate-me");
    }
}
