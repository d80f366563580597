use crate::domain::message::ResultData;
use crate::domain::recipient::{Recipient, RecipientType};
use crate::domain::sender::{ProviderKind, SenderSettings, SenderSnapshot};
use crate::domain::template::Content;
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Provider {0} is not registered")]
    Unsupported(ProviderKind),
    #[error("Invalid provider settings: {0}")]
    InvalidSettings(String),
    #[error("Message rejected by handler: {0}")]
    InvalidMessage(String),
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Provider call timed out after {0:?}")]
    Timeout(Duration),
    #[error("Provider call aborted: {0}")]
    Aborted(String),
    #[error("External service error: {0}")]
    Other(#[from] anyhow::Error),
}

impl ProviderError {
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Unsupported(_) => "ProviderNotSupported",
            Self::InvalidSettings(_) => "InvalidProviderSettings",
            Self::InvalidMessage(_) => "InvalidMessage",
            Self::Transport(_) => "TransportError",
            Self::Timeout(_) => "Timeout",
            Self::Aborted(_) => "Aborted",
            Self::Other(_) => "ProviderError",
        }
    }

    /// JSON object stored under the `Error` result key.
    #[must_use]
    pub fn to_structured(&self) -> String {
        json!({ "code": self.code(), "message": self.to_string() }).to_string()
    }
}

/// Normalized outcome of one provider call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendResult {
    pub succeeded: bool,
    pub data: ResultData,
}

impl SendResult {
    #[must_use]
    pub const fn success(data: ResultData) -> Self {
        Self { succeeded: true, data }
    }

    #[must_use]
    pub const fn failure(data: ResultData) -> Self {
        Self { succeeded: false, data }
    }
}

impl From<&ProviderError> for SendResult {
    fn from(error: &ProviderError) -> Self {
        Self::failure(ResultData::new().with("Error", error.to_structured()))
    }
}

/// A compiled message ready for a provider. Holds plaintext; never persisted.
#[derive(Debug, Clone)]
pub struct OutboundMessage {
    pub message_id: Uuid,
    pub realm_id: Uuid,
    pub sender: SenderSnapshot,
    pub subject: String,
    pub body: Content,
    pub recipients: Vec<Recipient>,
}

impl OutboundMessage {
    pub fn recipients_of(&self, recipient_type: RecipientType) -> impl Iterator<Item = &Recipient> {
        self.recipients.iter().filter(move |r| r.recipient_type == recipient_type)
    }
}

/// Builds a handler from decrypted sender settings.
pub trait ProviderStrategy: Send + Sync + std::fmt::Debug {
    fn provider(&self) -> ProviderKind;

    /// # Errors
    /// Returns `ProviderError::InvalidSettings` if the settings do not belong to this provider.
    fn execute(&self, settings: SenderSettings) -> Result<Arc<dyn MessageHandler>, ProviderError>;
}

#[async_trait]
pub trait MessageHandler: Send + Sync + std::fmt::Debug {
    /// Sends one message. A provider-side rejection is an `Ok` failed result;
    /// `Err` is reserved for local validation and transport problems.
    ///
    /// # Errors
    /// Returns `ProviderError::InvalidMessage` if the message cannot be sent by this handler.
    async fn send(&self, message: &OutboundMessage) -> Result<SendResult, ProviderError>;
}
