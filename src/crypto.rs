//! The process-wide symmetric key for passes.
//!
//! The key is either supplied directly (`EQR_PASS_KEY`) or derived as
//! SHA-256 of the application secret, so the same configuration always
//! yields the same key and passes survive restarts.
//!
//! Sealed format: nonce_12bytes || ciphertext || tag_16bytes

use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, Key, KeyInit, Nonce};
use base64::engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine;
use rand::RngCore;
use sha2::{Digest, Sha256};
use zeroize::Zeroize;

use crate::config::{Config, KeySource, PASS_KEY};
use crate::error::{EqrError, EqrResult};

const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;
const KEY_LEN: usize = 32;

/// 32 bytes of AES-256-GCM key material.
#[derive(Clone)]
pub struct PassKey {
    key: [u8; KEY_LEN],
}

impl Drop for PassKey {
    fn drop(&mut self) {
        self.key.zeroize();
    }
}

impl PassKey {
    pub fn from_config(config: &Config) -> EqrResult<Self> {
        match &config.key_source {
            KeySource::Explicit(encoded) => Self::from_encoded(encoded),
            KeySource::Secret(secret) => Ok(Self::derive(secret)),
        }
    }

    /// Hashes an application secret into key material.
    pub fn derive(secret: &str) -> Self {
        let digest = Sha256::digest(secret.as_bytes());
        let mut key = [0u8; KEY_LEN];
        key.copy_from_slice(&digest);

        Self { key }
    }

    pub fn from_encoded(encoded: &str) -> EqrResult<Self> {
        let encoded = encoded.trim();
        let bytes = URL_SAFE
            .decode(encoded)
            .or_else(|_| URL_SAFE_NO_PAD.decode(encoded))
            .map_err(|_| EqrError::Configuration(format!("{} is not base64url", PASS_KEY)))?;
        if bytes.len() != KEY_LEN {
            return Err(EqrError::Configuration(format!(
                "{} decodes to {} bytes (expected {KEY_LEN})",
                PASS_KEY,
                bytes.len()
            )));
        }

        let mut key = [0u8; KEY_LEN];
        key.copy_from_slice(&bytes);
        Ok(Self { key })
    }

    pub fn cipher(&self) -> PassCipher {
        PassCipher {
            cipher: Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&self.key)),
        }
    }
}

/// Authenticated encryption over the pass key. Read-only once built,
/// so one instance is shared by every request.
#[derive(Clone)]
pub struct PassCipher {
    cipher: Aes256Gcm,
}

impl PassCipher {
    /// Encrypt plaintext → nonce || ciphertext || tag
    pub fn seal(&self, plaintext: &[u8]) -> Option<Vec<u8>> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self.cipher.encrypt(nonce, plaintext).ok()?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        sealed.extend_from_slice(&nonce_bytes);
        sealed.extend_from_slice(&ciphertext);
        Some(sealed)
    }

    /// Decrypt nonce || ciphertext || tag → plaintext. `None` for short
    /// input, the wrong key, or any tampering.
    pub fn open(&self, sealed: &[u8]) -> Option<Vec<u8>> {
        if sealed.len() < NONCE_LEN + TAG_LEN {
            return None;
        }

        let (nonce, ciphertext) = sealed.split_at(NONCE_LEN);
        self.cipher.decrypt(Nonce::from_slice(nonce), ciphertext).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derivation_is_deterministic() {
        let first = PassKey::derive("hunter2").cipher();
        let second = PassKey::derive("hunter2").cipher();

        let sealed = first.seal(b"member 12345678901").unwrap();
        assert_eq!(second.open(&sealed).unwrap(), b"member 12345678901");
    }

    #[test]
    fn nonces_differ_between_seals() {
        let cipher = PassKey::derive("hunter2").cipher();
        assert_ne!(cipher.seal(b"same").unwrap(), cipher.seal(b"same").unwrap());
    }

    #[test]
    fn wrong_key_cannot_open() {
        let sealed = PassKey::derive("hunter2").cipher().seal(b"payload").unwrap();
        assert!(PassKey::derive("hunter3").cipher().open(&sealed).is_none());
        assert!(PassKey::derive("hunter2").cipher().open(&sealed[..20]).is_none());
    }

    #[test]
    fn explicit_key_must_be_32_bytes() {
        let encoded = URL_SAFE.encode([7u8; 32]);
        assert!(PassKey::from_encoded(&encoded).is_ok());
        assert!(PassKey::from_encoded(encoded.trim_end_matches('=')).is_ok());
        assert!(matches!(
            PassKey::from_encoded(&URL_SAFE.encode([7u8; 16])),
            Err(EqrError::Configuration(_))
        ));
        assert!(PassKey::from_encoded("not base64 at all!").is_err());
    }

    #[test]
    fn config_selects_key_source() {
        let from_secret = PassKey::from_config(&Config::with_secret("hunter2")).unwrap();
        let sealed = from_secret.cipher().seal(b"x").unwrap();
        assert!(PassKey::derive("hunter2").cipher().open(&sealed).is_some());
    }
}
