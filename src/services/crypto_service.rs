use crate::domain::Encrypted;
use crate::domain::sender::{Sender, SenderSettings};
use crate::domain::variable::{EncryptedVariables, Variable, Variables};
use crate::error::{AppError, Result};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CryptoError {
    #[error("invalid master key: {0}")]
    InvalidKey(String),
    #[error("malformed ciphertext envelope")]
    InvalidEnvelope,
    #[error("encryption failed")]
    Encryption,
    #[error("decryption failed")]
    Decryption,
    #[error("decrypted content is not valid UTF-8")]
    InvalidUtf8,
}

/// Realm-scoped symmetric encryption capability.
///
/// An envelope produced for one realm must not decrypt under another.
pub trait ContentCipher: Send + Sync + std::fmt::Debug {
    /// # Errors
    /// Returns `CryptoError::Encryption` if the cipher fails.
    fn encrypt(&self, plaintext: &str, realm_id: Uuid) -> std::result::Result<Encrypted, CryptoError>;

    /// # Errors
    /// Returns `CryptoError::Decryption` for tampered envelopes or a realm mismatch.
    fn decrypt(&self, envelope: &Encrypted, realm_id: Uuid) -> std::result::Result<String, CryptoError>;
}

#[derive(Clone, Debug)]
pub struct CryptoService {
    cipher: Arc<dyn ContentCipher>,
}

impl CryptoService {
    #[must_use]
    pub fn new(cipher: Arc<dyn ContentCipher>) -> Self {
        Self { cipher }
    }

    /// # Errors
    /// Returns `AppError::Crypto` if encryption fails.
    pub fn encrypt(&self, plaintext: &str, realm_id: Uuid) -> Result<Encrypted> {
        Ok(self.cipher.encrypt(plaintext, realm_id)?)
    }

    /// # Errors
    /// Returns `AppError::Crypto` if the envelope does not decrypt for `realm_id`.
    pub fn decrypt(&self, envelope: &Encrypted, realm_id: Uuid) -> Result<String> {
        Ok(self.cipher.decrypt(envelope, realm_id)?)
    }

    /// Encrypts every value, keeping keys in clear.
    ///
    /// # Errors
    /// Returns `AppError::Crypto` if any value fails to encrypt.
    #[tracing::instrument(level = "debug", skip(self, variables), fields(count = variables.len()))]
    pub fn encrypt_variables(&self, variables: &Variables, realm_id: Uuid) -> Result<EncryptedVariables> {
        variables
            .iter()
            .map(|(key, value)| -> Result<(String, Encrypted)> { Ok((key.to_string(), self.encrypt(value, realm_id)?)) })
            .collect()
    }

    /// # Errors
    /// Returns `AppError::Crypto` if any value fails to decrypt.
    pub fn decrypt_variables(&self, variables: &EncryptedVariables, realm_id: Uuid) -> Result<Variables> {
        variables
            .iter()
            .map(|(key, value)| -> Result<Variable> { Ok(Variable { key: key.to_string(), value: self.decrypt(value, realm_id)? }) })
            .collect()
    }

    /// # Errors
    /// Returns `AppError::Serialization` or `AppError::Crypto` on failure.
    pub fn encrypt_settings(&self, settings: &SenderSettings, realm_id: Uuid) -> Result<Encrypted> {
        let json = serde_json::to_string(settings)?;
        self.encrypt(&json, realm_id)
    }

    /// Decrypts a sender's provider settings and checks they match its provider.
    ///
    /// # Errors
    /// Returns `AppError::Crypto` if decryption fails, `AppError::Serialization` if the
    /// settings are malformed, or `AppError::Internal` on a provider mismatch.
    #[tracing::instrument(level = "debug", skip(self, sender), fields(sender_id = %sender.id))]
    pub fn decrypt_settings(&self, sender: &Sender) -> Result<SenderSettings> {
        let json = self.decrypt(&sender.settings, sender.realm_id)?;
        let settings: SenderSettings = serde_json::from_str(&json)?;
        if settings.provider() != sender.provider {
            return Err(AppError::Internal(format!(
                "Sender {} is bound to {} but its settings are for {}",
                sender.id,
                sender.provider,
                settings.provider()
            )));
        }
        Ok(settings)
    }
}
