use crate::domain::Encrypted;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// The channel a sender delivers on. Determines which recipient contact is mandatory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SenderKind {
    Email,
    Phone,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProviderKind {
    SendGridEmail,
    TwilioSms,
}

impl ProviderKind {
    #[must_use]
    pub const fn sender_kind(self) -> SenderKind {
        match self {
            Self::SendGridEmail => SenderKind::Email,
            Self::TwilioSms => SenderKind::Phone,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SendGridEmail => "SendGridEmail",
            Self::TwilioSms => "TwilioSms",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decrypted provider credentials.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "provider")]
pub enum SenderSettings {
    SendGridEmail {
        #[serde(rename = "apiKey")]
        api_key: String,
    },
    TwilioSms {
        #[serde(rename = "accountSid")]
        account_sid: String,
        #[serde(rename = "authToken")]
        auth_token: String,
    },
}

impl SenderSettings {
    #[must_use]
    pub const fn provider(&self) -> ProviderKind {
        match self {
            Self::SendGridEmail { .. } => ProviderKind::SendGridEmail,
            Self::TwilioSms { .. } => ProviderKind::TwilioSms,
        }
    }
}

impl fmt::Debug for SenderSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SendGridEmail { .. } => f.debug_struct("SendGridEmail").finish_non_exhaustive(),
            Self::TwilioSms { account_sid, .. } => {
                f.debug_struct("TwilioSms").field("account_sid", account_sid).finish_non_exhaustive()
            }
        }
    }
}

/// An outbound identity bound to exactly one provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sender {
    pub id: Uuid,
    pub realm_id: Uuid,
    pub unique_name: String,
    pub provider: ProviderKind,
    pub email_address: Option<String>,
    pub phone_number: Option<String>,
    pub display_name: Option<String>,
    /// JSON-encoded [`SenderSettings`], encrypted for the sender's realm.
    pub settings: Encrypted,
}

impl Sender {
    #[must_use]
    pub const fn kind(&self) -> SenderKind {
        self.provider.sender_kind()
    }

    #[must_use]
    pub fn snapshot(&self) -> SenderSnapshot {
        SenderSnapshot {
            id: self.id,
            kind: self.kind(),
            provider: self.provider,
            email_address: self.email_address.clone(),
            phone_number: self.phone_number.clone(),
            display_name: self.display_name.clone(),
        }
    }
}

/// The parts of a sender recorded on a message. Never carries credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SenderSnapshot {
    pub id: Uuid,
    pub kind: SenderKind,
    pub provider: ProviderKind,
    pub email_address: Option<String>,
    pub phone_number: Option<String>,
    pub display_name: Option<String>,
}
