use aes_gcm::aead::{rand_core::RngCore, Aead, OsRng};
use aes_gcm::{Aes256Gcm, KeyInit, Nonce};
use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine;
use pbkdf2::pbkdf2_hmac;
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::error::StoreError;

pub const DEFAULT_PBKDF2_ITERATIONS: u32 = 200_000;
const ENVELOPE_VERSION: u8 = 1;
const SALT_LEN: usize = 16;
const IV_LEN: usize = 12;
const TAG_LEN: usize = 16;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CryptoEnvelope {
    pub v: u8,
    pub salt: String,
    pub iv: String,
    pub tag: String,
    pub data: String,
}

/// A derived AES-256 key plus the salt it came from.
#[derive(Clone)]
pub struct SealKey {
    salt: Vec<u8>,
    key: [u8; 32],
}

impl std::fmt::Debug for SealKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SealKey")
            .field("salt", &encode_b64(self.salt.as_slice()))
            .finish_non_exhaustive()
    }
}

impl SealKey {
    pub fn generate(password: &str, iterations: u32) -> Self {
        let mut salt = [0u8; SALT_LEN];
        OsRng.fill_bytes(&mut salt);
        Self {
            key: derive_key(password, &salt, iterations),
            salt: salt.to_vec(),
        }
    }

    pub fn for_envelope(
        password: &str,
        envelope: &CryptoEnvelope,
        iterations: u32,
    ) -> Result<Self, StoreError> {
        let salt = decode_b64(envelope.salt.as_str())?;
        if salt.is_empty() {
            return Err(StoreError::Decrypt("envelope salt is empty".to_string()));
        }
        Ok(Self {
            key: derive_key(password, salt.as_slice(), iterations),
            salt,
        })
    }

    pub fn salt(&self) -> &[u8] {
        self.salt.as_slice()
    }

    /// True when `envelope` was sealed under this key's salt.
    pub fn matches(&self, envelope: &CryptoEnvelope) -> bool {
        decode_b64(envelope.salt.as_str()).is_ok_and(|salt| salt == self.salt)
    }

    pub fn seal(&self, text: &str) -> Result<CryptoEnvelope, StoreError> {
        let mut iv = [0u8; IV_LEN];
        OsRng.fill_bytes(&mut iv);
        let cipher = Aes256Gcm::new_from_slice(self.key.as_slice())
            .map_err(|err| StoreError::Decrypt(err.to_string()))?;
        let nonce = Nonce::from_slice(&iv);
        let encrypted = cipher
            .encrypt(nonce, text.as_bytes())
            .map_err(|err| StoreError::Decrypt(err.to_string()))?;

        if encrypted.len() < TAG_LEN {
            return Err(StoreError::Decrypt(
                "encryption output too short".to_string(),
            ));
        }
        let (data, tag) = encrypted.split_at(encrypted.len() - TAG_LEN);

        Ok(CryptoEnvelope {
            v: ENVELOPE_VERSION,
            salt: encode_b64(self.salt.as_slice()),
            iv: encode_b64(&iv),
            tag: encode_b64(tag),
            data: encode_b64(data),
        })
    }

    pub fn open(&self, envelope: &CryptoEnvelope) -> Result<String, StoreError> {
        let iv = decode_b64(envelope.iv.as_str())?;
        let tag = decode_b64(envelope.tag.as_str())?;
        let data = decode_b64(envelope.data.as_str())?;
        if iv.len() != IV_LEN || tag.len() != TAG_LEN {
            return Err(StoreError::Decrypt("malformed envelope".to_string()));
        }

        let cipher = Aes256Gcm::new_from_slice(self.key.as_slice())
            .map_err(|err| StoreError::Decrypt(err.to_string()))?;
        let nonce = Nonce::from_slice(iv.as_slice());
        let mut combined = Vec::with_capacity(data.len() + tag.len());
        combined.extend_from_slice(data.as_slice());
        combined.extend_from_slice(tag.as_slice());

        let decrypted = cipher
            .decrypt(nonce, combined.as_slice())
            .map_err(|_| StoreError::Decrypt("wrong password or corrupt data".to_string()))?;
        String::from_utf8(decrypted).map_err(|err| StoreError::Decrypt(err.to_string()))
    }
}

fn derive_key(password: &str, salt: &[u8], iterations: u32) -> [u8; 32] {
    let mut key = [0u8; 32];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, iterations.max(1), &mut key);
    key
}

fn decode_b64(value: &str) -> Result<Vec<u8>, StoreError> {
    B64.decode(value)
        .map_err(|err| StoreError::Decrypt(err.to_string()))
}

fn encode_b64(bytes: &[u8]) -> String {
    B64.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FAST: u32 = 1_000;

    #[test]
    fn sealed_text_opens_with_key_rederived_from_envelope() {
        let key = SealKey::generate("hunter2", FAST);
        let envelope = key.seal(r#"{"worker-list":[]}"#).unwrap();
        assert_eq!(envelope.v, 1);

        let reopened = SealKey::for_envelope("hunter2", &envelope, FAST).unwrap();
        assert_eq!(reopened.salt(), key.salt());
        assert_eq!(reopened.open(&envelope).unwrap(), r#"{"worker-list":[]}"#);
    }

    #[test]
    fn wrong_password_is_a_decrypt_error() {
        let envelope = SealKey::generate("right", FAST).seal("payload").unwrap();
        let wrong = SealKey::for_envelope("wrong", &envelope, FAST).unwrap();
        assert!(matches!(wrong.open(&envelope), Err(StoreError::Decrypt(_))));
    }

    #[test]
    fn truncated_tag_is_rejected() {
        let key = SealKey::generate("pw", FAST);
        let mut envelope = key.seal("payload").unwrap();
        envelope.tag = encode_b64(&[1, 2, 3]);
        assert!(matches!(key.open(&envelope), Err(StoreError::Decrypt(_))));
    }
}
