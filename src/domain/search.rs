use crate::domain::locale::Locale;
use crate::domain::message::{Message, MessageStatus, ResultData};
use crate::domain::recipient::Recipient;
use crate::domain::sender::SenderSnapshot;
use crate::domain::template::{ContentType, TemplateSnapshot};
use crate::domain::variable::Variable;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// Read-side view of a message. `body` and `variables` hold ciphertext until
/// the message service decrypts them for a caller of the same realm.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageDto {
    pub id: Uuid,
    pub realm_id: Uuid,
    pub version: i64,
    pub subject: String,
    pub content_type: ContentType,
    pub body: String,
    pub recipients: Vec<Recipient>,
    pub sender: SenderSnapshot,
    pub template: TemplateSnapshot,
    pub ignore_user_locale: bool,
    pub locale: Option<Locale>,
    pub variables: Vec<Variable>,
    pub is_demo: bool,
    pub status: MessageStatus,
    pub result_data: ResultData,
    pub created_by: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub created_on: OffsetDateTime,
    pub updated_by: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_on: OffsetDateTime,
}

impl From<&Message> for MessageDto {
    fn from(message: &Message) -> Self {
        let snapshot = message.snapshot();
        Self {
            id: message.id(),
            realm_id: message.realm_id(),
            version: message.version(),
            subject: snapshot.subject.clone(),
            content_type: snapshot.body.content_type,
            body: snapshot.body.text.as_str().to_string(),
            recipients: snapshot.recipients.clone(),
            sender: snapshot.sender.clone(),
            template: snapshot.template.clone(),
            ignore_user_locale: snapshot.ignore_user_locale,
            locale: snapshot.locale.clone(),
            variables: snapshot
                .variables
                .iter()
                .map(|(key, value)| Variable { key: key.to_string(), value: value.as_str().to_string() })
                .collect(),
            is_demo: snapshot.is_demo,
            status: message.status(),
            result_data: message.result_data().clone(),
            created_by: message.created_by(),
            created_on: message.created_on(),
            updated_by: message.updated_by(),
            updated_on: message.updated_on(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MessageSort {
    #[default]
    CreatedOn,
    UpdatedOn,
    Subject,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SortOption {
    pub field: MessageSort,
    pub is_descending: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchMessagesQuery {
    /// Case-insensitive terms matched against the subject; all must match.
    #[serde(default)]
    pub search_terms: Vec<String>,
    pub status: Option<MessageStatus>,
    pub sender_id: Option<Uuid>,
    pub template_id: Option<Uuid>,
    pub is_demo: Option<bool>,
    #[serde(default)]
    pub sort: Vec<SortOption>,
    #[serde(default)]
    pub skip: usize,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

const fn default_limit() -> usize {
    20
}

impl Default for SearchMessagesQuery {
    fn default() -> Self {
        Self {
            search_terms: Vec::new(),
            status: None,
            sender_id: None,
            template_id: None,
            is_demo: None,
            sort: Vec::new(),
            skip: 0,
            limit: default_limit(),
        }
    }
}

impl SearchMessagesQuery {
    #[must_use]
    pub fn matches(&self, message: &MessageDto) -> bool {
        let subject = message.subject.to_lowercase();
        self.status.is_none_or(|s| s == message.status)
            && self.sender_id.is_none_or(|id| id == message.sender.id)
            && self.template_id.is_none_or(|id| id == message.template.id)
            && self.is_demo.is_none_or(|d| d == message.is_demo)
            && self.search_terms.iter().all(|term| subject.contains(&term.to_lowercase()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResults<T> {
    pub items: Vec<T>,
    /// Number of matches before paging.
    pub total: usize,
}
