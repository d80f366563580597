use crate::services::crypto_service::CryptoError;
use crate::services::template::TemplateError;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid request: {0}")]
    Validation(String),
    #[error("Sender not found: {0}")]
    SenderNotFound(String),
    #[error("Template not found: {0}")]
    TemplateNotFound(String),
    #[error("SMS messages require a plain text template, but template '{template}' has content type '{content_type}'")]
    InvalidSmsContentType { template: String, content_type: String },
    #[error("Users not found: {}", join_ids(.0))]
    UsersNotFound(Vec<Uuid>),
    #[error("Recipients are missing the contact required by the sender: {}", join_ids(.0))]
    MissingRecipientContacts(Vec<Uuid>),
    #[error("At least one 'To' recipient is required")]
    ToRecipientMissing,
    #[error("Message {0} has already completed")]
    MessageAlreadyCompleted(Uuid),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Request cancelled after {} message(s) were sent", .sent.len())]
    Cancelled { sent: Vec<Uuid> },
    #[error("Failed to persist messages after {} send(s): {source}", .sent.len())]
    NotPersisted {
        sent: Vec<Uuid>,
        #[source]
        source: Box<AppError>,
    },
    #[error("Encryption error: {0}")]
    Crypto(#[from] CryptoError),
    #[error("Template error: {0}")]
    Template(#[from] TemplateError),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, AppError>;

fn join_ids(ids: &[Uuid]) -> String {
    ids.iter().map(Uuid::to_string).collect::<Vec<_>>().join(", ")
}

impl AppError {
    /// Stable machine-readable code, used in logs and metric labels.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "Validation",
            Self::SenderNotFound(_) => "SenderNotFound",
            Self::TemplateNotFound(_) => "TemplateNotFound",
            Self::InvalidSmsContentType { .. } => "InvalidSmsContentType",
            Self::UsersNotFound(_) => "UsersNotFound",
            Self::MissingRecipientContacts(_) => "MissingRecipientContacts",
            Self::ToRecipientMissing => "ToRecipientMissing",
            Self::MessageAlreadyCompleted(_) => "MessageAlreadyCompleted",
            Self::Conflict(_) => "Conflict",
            Self::Cancelled { .. } => "Cancelled",
            Self::NotPersisted { .. } => "NotPersisted",
            Self::Crypto(_) => "Crypto",
            Self::Template(_) => "Template",
            Self::Database(_) => "Database",
            Self::Serialization(_) => "Serialization",
            Self::Internal(_) => "Internal",
        }
    }
}
