//! Passwords the v2 client stored for pre-Cells (P8) servers.
//!
//! A stored value is either plaintext or `$AJXP_ENC$` followed by base64 of
//! `salt(16) || nonce(12) || ciphertext`, sealed with AES-256-GCM under a key
//! derived by PBKDF2-HMAC-SHA256 from the client-wide legacy secret.

use crate::core::config::MigrateConfig;
use crate::core::error::LegacyError;
use aes_gcm::aead::rand_core::RngCore;
use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{AeadCore, Aes256Gcm, Nonce};
use base64::Engine;
use pbkdf2::pbkdf2_hmac;
use sha2::Sha256;
use tracing::warn;

pub const LEGACY_MARKER: &str = "$AJXP_ENC$";

const SALT_LEN: usize = 16;
const NONCE_LEN: usize = 12;
const KEY_LEN: usize = 32;

#[derive(Debug, Clone)]
pub struct LegacyCipher {
    secret: String,
    iterations: u32,
}

impl LegacyCipher {
    pub fn new(secret: &str, iterations: u32) -> Self {
        Self {
            secret: secret.to_string(),
            iterations,
        }
    }

    pub fn from_config(config: &MigrateConfig) -> Self {
        Self::new(&config.legacy_secret, config.kdf_iterations)
    }

    fn derive_key(&self, salt: &[u8]) -> [u8; KEY_LEN] {
        let mut key = [0u8; KEY_LEN];
        pbkdf2_hmac::<Sha256>(self.secret.as_bytes(), salt, self.iterations, &mut key);
        key
    }

    /// Produces a marker-prefixed value the way the v2 client stored it.
    pub fn encrypt(&self, plaintext: &str) -> Result<String, LegacyError> {
        let mut salt = [0u8; SALT_LEN];
        OsRng.fill_bytes(&mut salt);
        let key = self.derive_key(&salt);
        let cipher =
            Aes256Gcm::new_from_slice(&key).map_err(|e| LegacyError::Decrypt(e.to_string()))?;
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|e| LegacyError::Decrypt(e.to_string()))?;

        let mut combined = salt.to_vec();
        combined.extend_from_slice(&nonce);
        combined.extend_from_slice(&ciphertext);
        Ok(format!(
            "{}{}",
            LEGACY_MARKER,
            base64::engine::general_purpose::STANDARD.encode(&combined)
        ))
    }

    /// Decrypts a marker-prefixed value.
    pub fn decrypt(&self, stored: &str) -> Result<String, LegacyError> {
        let encoded = stored
            .strip_prefix(LEGACY_MARKER)
            .ok_or_else(|| LegacyError::Decrypt("missing legacy marker".to_string()))?;
        let combined = base64::engine::general_purpose::STANDARD
            .decode(encoded.trim())
            .map_err(|e| LegacyError::Decrypt(format!("bad base64: {}", e)))?;
        if combined.len() <= SALT_LEN + NONCE_LEN {
            return Err(LegacyError::Decrypt("payload too short".to_string()));
        }
        let (salt, rest) = combined.split_at(SALT_LEN);
        let (nonce_bytes, ciphertext) = rest.split_at(NONCE_LEN);

        let key = self.derive_key(salt);
        let cipher =
            Aes256Gcm::new_from_slice(&key).map_err(|e| LegacyError::Decrypt(e.to_string()))?;
        let plaintext = cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|_| LegacyError::Decrypt("authentication failed".to_string()))?;
        String::from_utf8(plaintext).map_err(|_| LegacyError::Decrypt("bad utf8".to_string()))
    }

    /// Plaintext passes through, marked values are decrypted, and any failure is
    /// logged and reported as absent.
    pub fn resolve_password(&self, stored: Option<&str>) -> Option<String> {
        let stored = stored?;
        if !stored.starts_with(LEGACY_MARKER) {
            return Some(stored.to_string());
        }
        match self.decrypt(stored) {
            Ok(plain) => Some(plain),
            Err(e) => {
                warn!(error = %e, "dropping unreadable legacy password");
                None
            }
        }
    }
}
