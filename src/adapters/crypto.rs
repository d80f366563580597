//! AES-256-GCM with per-realm keys.
//!
//! Realm key: HKDF-SHA256(master_key, salt = `KDF_SALT`, info = `KDF_INFO` || realm_id).
//! Envelope: `v1:` + base64(nonce(12) || ciphertext || tag(16)), with the realm id as AAD.

use crate::domain::Encrypted;
use crate::services::crypto_service::{ContentCipher, CryptoError};
use aes_gcm::aead::{Aead, KeyInit, OsRng, Payload, rand_core::RngCore};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use dashmap::DashMap;
use hkdf::Hkdf;
use sha2::Sha256;
use uuid::Uuid;

pub const KEY_SIZE: usize = 32;
const NONCE_SIZE: usize = 12;
const TAG_SIZE: usize = 16;
const ENVELOPE_PREFIX: &str = "v1:";
const KDF_SALT: &[u8] = b"courier:content:v1";
const KDF_INFO: &[u8] = b"courier:realm:";

pub struct RealmCipher {
    master_key: [u8; KEY_SIZE],
    ciphers: DashMap<Uuid, Aes256Gcm>,
}

impl std::fmt::Debug for RealmCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealmCipher").field("cached_realms", &self.ciphers.len()).finish_non_exhaustive()
    }
}

impl RealmCipher {
    #[must_use]
    pub fn new(master_key: [u8; KEY_SIZE]) -> Self {
        Self { master_key, ciphers: DashMap::new() }
    }

    /// Builds a cipher from a base64-encoded 32-byte key.
    ///
    /// # Errors
    /// Returns `CryptoError::InvalidKey` if the key is not valid base64 or not 32 bytes.
    pub fn from_base64(encoded: &str) -> Result<Self, CryptoError> {
        let bytes = BASE64.decode(encoded.trim()).map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
        let key: [u8; KEY_SIZE] = bytes
            .try_into()
            .map_err(|b: Vec<u8>| CryptoError::InvalidKey(format!("expected {KEY_SIZE} bytes, got {}", b.len())))?;
        Ok(Self::new(key))
    }

    /// Generates a random master key, base64-encoded.
    #[must_use]
    pub fn generate_key() -> String {
        let mut key = [0u8; KEY_SIZE];
        OsRng.fill_bytes(&mut key);
        BASE64.encode(key)
    }

    fn cipher_for(&self, realm_id: Uuid) -> Result<Aes256Gcm, CryptoError> {
        if let Some(cipher) = self.ciphers.get(&realm_id) {
            return Ok(cipher.clone());
        }

        let hk = Hkdf::<Sha256>::new(Some(KDF_SALT), &self.master_key);
        let mut info = Vec::with_capacity(KDF_INFO.len() + 16);
        info.extend_from_slice(KDF_INFO);
        info.extend_from_slice(realm_id.as_bytes());

        let mut realm_key = [0u8; KEY_SIZE];
        hk.expand(&info, &mut realm_key).map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
        let cipher = Aes256Gcm::new_from_slice(&realm_key).map_err(|e| CryptoError::InvalidKey(e.to_string()));
        realm_key.fill(0);
        let cipher = cipher?;

        self.ciphers.insert(realm_id, cipher.clone());
        Ok(cipher)
    }
}

impl ContentCipher for RealmCipher {
    fn encrypt(&self, plaintext: &str, realm_id: Uuid) -> Result<Encrypted, CryptoError> {
        let cipher = self.cipher_for(realm_id)?;

        let mut nonce_bytes = [0u8; NONCE_SIZE];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, Payload { msg: plaintext.as_bytes(), aad: realm_id.as_bytes() })
            .map_err(|_| CryptoError::Encryption)?;

        let mut out = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&ciphertext);
        Ok(Encrypted::new(format!("{ENVELOPE_PREFIX}{}", BASE64.encode(out))))
    }

    fn decrypt(&self, envelope: &Encrypted, realm_id: Uuid) -> Result<String, CryptoError> {
        let encoded = envelope.as_str().strip_prefix(ENVELOPE_PREFIX).ok_or(CryptoError::InvalidEnvelope)?;
        let bytes = BASE64.decode(encoded).map_err(|_| CryptoError::InvalidEnvelope)?;
        if bytes.len() < NONCE_SIZE + TAG_SIZE {
            return Err(CryptoError::InvalidEnvelope);
        }

        let (nonce_bytes, ciphertext) = bytes.split_at(NONCE_SIZE);
        let cipher = self.cipher_for(realm_id)?;
        let plaintext = cipher
            .decrypt(Nonce::from_slice(nonce_bytes), Payload { msg: ciphertext, aad: realm_id.as_bytes() })
            .map_err(|_| CryptoError::Decryption)?;

        String::from_utf8(plaintext).map_err(|_| CryptoError::InvalidUtf8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::sender::{ProviderKind, Sender, SenderSettings};
    use crate::domain::variable::{Variable, Variables};
    use crate::error::AppError;
    use crate::services::crypto_service::CryptoService;
    use std::sync::Arc;

    fn cipher() -> RealmCipher {
        RealmCipher::from_base64(&RealmCipher::generate_key()).unwrap()
    }

    #[test]
    fn test_roundtrip_same_realm() {
        let cipher = cipher();
        let realm = Uuid::new_v4();

        for plaintext in ["Hello, Welcome! Token: abc123", "é✓ unicode", "x"] {
            let envelope = cipher.encrypt(plaintext, realm).unwrap();
            assert_ne!(envelope.as_str(), plaintext);
            assert_eq!(cipher.decrypt(&envelope, realm).unwrap(), plaintext);
        }
    }

    #[test]
    fn test_wrong_realm_fails() {
        let cipher = cipher();
        let envelope = cipher.encrypt("secret", Uuid::new_v4()).unwrap();

        assert_eq!(cipher.decrypt(&envelope, Uuid::new_v4()), Err(CryptoError::Decryption));
    }

    #[test]
    fn test_wrong_master_key_fails() {
        let realm = Uuid::new_v4();
        let envelope = cipher().encrypt("secret", realm).unwrap();

        assert!(cipher().decrypt(&envelope, realm).is_err());
    }

    #[test]
    fn test_nonce_is_fresh_per_encryption() {
        let cipher = cipher();
        let realm = Uuid::new_v4();
        assert_ne!(cipher.encrypt("same", realm).unwrap(), cipher.encrypt("same", realm).unwrap());
    }

    #[test]
    fn test_tampered_envelope_is_rejected() {
        let cipher = cipher();
        let realm = Uuid::new_v4();
        let envelope = cipher.encrypt("secret", realm).unwrap();

        let mut bytes = BASE64.decode(&envelope.as_str()[ENVELOPE_PREFIX.len()..]).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0x01;
        let tampered = Encrypted::new(format!("{ENVELOPE_PREFIX}{}", BASE64.encode(bytes)));

        assert_eq!(cipher.decrypt(&tampered, realm), Err(CryptoError::Decryption));
        assert_eq!(cipher.decrypt(&Encrypted::new("plain".into()), realm), Err(CryptoError::InvalidEnvelope));
        assert_eq!(cipher.decrypt(&Encrypted::new("v1:AAAA".into()), realm), Err(CryptoError::InvalidEnvelope));
    }

    #[test]
    fn test_invalid_master_key() {
        assert!(matches!(RealmCipher::from_base64("not base64!"), Err(CryptoError::InvalidKey(_))));
        assert!(matches!(RealmCipher::from_base64("AAAA"), Err(CryptoError::InvalidKey(_))));
    }

    #[test]
    fn test_service_variables_roundtrip() {
        let service = CryptoService::new(Arc::new(cipher()));
        let realm = Uuid::new_v4();
        let variables: Variables = [
            Variable { key: "Token".into(), value: "abc123".into() },
            Variable { key: "Name".into(), value: "Jane".into() },
        ]
        .into_iter()
        .collect();

        let encrypted = service.encrypt_variables(&variables, realm).unwrap();
        assert_eq!(encrypted.len(), 2);
        assert_ne!(encrypted.get("Token").unwrap().as_str(), "abc123");
        assert_eq!(service.decrypt_variables(&encrypted, realm).unwrap(), variables);
    }

    #[test]
    fn test_service_settings_must_match_provider() {
        let service = CryptoService::new(Arc::new(cipher()));
        let realm = Uuid::new_v4();
        let settings = SenderSettings::SendGridEmail { api_key: "SG.key".into() };
        let mut sender = Sender {
            id: Uuid::new_v4(),
            realm_id: realm,
            unique_name: "notifications".into(),
            provider: ProviderKind::SendGridEmail,
            email_address: Some("noreply@example.com".into()),
            phone_number: None,
            display_name: None,
            settings: service.encrypt_settings(&settings, realm).unwrap(),
        };

        assert_eq!(service.decrypt_settings(&sender).unwrap(), settings);

        sender.provider = ProviderKind::TwilioSms;
        assert!(matches!(service.decrypt_settings(&sender), Err(AppError::Internal(_))));
    }
}
