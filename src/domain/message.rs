use crate::domain::Encrypted;
use crate::domain::locale::Locale;
use crate::domain::recipient::{Recipient, RecipientType};
use crate::domain::sender::SenderSnapshot;
use crate::domain::template::{ContentType, TemplateSnapshot};
use crate::domain::variable::EncryptedVariables;
use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MessageStatus {
    #[default]
    Pending,
    Succeeded,
    Failed,
}

impl MessageStatus {
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Succeeded => "Succeeded",
            Self::Failed => "Failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultEntry {
    pub key: String,
    pub value: String,
}

/// Ordered diagnostic pairs captured from a provider response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResultData(Vec<ResultEntry>);

impl ResultData {
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Appends a pair, replacing the value of an existing key in place.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        if let Some(entry) = self.0.iter_mut().find(|e| e.key == key) {
            entry.value = value;
        } else {
            self.0.push(ResultEntry { key, value });
        }
    }

    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.iter().find(|e| e.key == key).map(|e| e.value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResultEntry> {
        self.0.iter()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Body {
    #[serde(rename = "type")]
    pub content_type: ContentType,
    pub text: Encrypted,
}

/// Snapshot recorded when a message is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageCreated {
    pub subject: String,
    pub body: Body,
    pub recipients: Vec<Recipient>,
    pub sender: SenderSnapshot,
    pub template: TemplateSnapshot,
    pub ignore_user_locale: bool,
    pub locale: Option<Locale>,
    pub variables: EncryptedVariables,
    pub is_demo: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum MessageChange {
    #[serde(rename = "MessageCreated")]
    Created(Box<MessageCreated>),
    #[serde(rename = "MessageSucceeded", rename_all = "camelCase")]
    Succeeded { result_data: ResultData },
    #[serde(rename = "MessageFailed", rename_all = "camelCase")]
    Failed { result_data: ResultData },
}

impl MessageChange {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Created(_) => "MessageCreated",
            Self::Succeeded { .. } => "MessageSucceeded",
            Self::Failed { .. } => "MessageFailed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageEvent {
    pub message_id: Uuid,
    pub realm_id: Uuid,
    pub version: i64,
    pub actor_id: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub occurred_at: OffsetDateTime,
    pub change: MessageChange,
}

/// One outbound message instance, rebuilt by folding its events.
#[derive(Debug, Clone)]
pub struct Message {
    id: Uuid,
    realm_id: Uuid,
    version: i64,
    created_by: Uuid,
    created_on: OffsetDateTime,
    updated_by: Uuid,
    updated_on: OffsetDateTime,
    snapshot: MessageCreated,
    status: MessageStatus,
    result_data: ResultData,
    uncommitted: Vec<MessageEvent>,
}

impl Message {
    /// Creates a pending message.
    ///
    /// # Errors
    /// Returns `AppError::Validation` unless the snapshot has exactly one `To` recipient.
    pub fn create(id: Uuid, realm_id: Uuid, actor_id: Uuid, snapshot: MessageCreated) -> Result<Self> {
        let to_count = snapshot.recipients.iter().filter(|r| r.recipient_type == RecipientType::To).count();
        if to_count != 1 {
            return Err(AppError::Validation(format!(
                "A message must have exactly one 'To' recipient, found {to_count}"
            )));
        }

        let event = MessageEvent {
            message_id: id,
            realm_id,
            version: 1,
            actor_id,
            occurred_at: OffsetDateTime::now_utc(),
            change: MessageChange::Created(Box::new(snapshot.clone())),
        };

        let mut message = Self {
            id,
            realm_id,
            version: 1,
            created_by: actor_id,
            created_on: event.occurred_at,
            updated_by: actor_id,
            updated_on: event.occurred_at,
            snapshot,
            status: MessageStatus::Pending,
            result_data: ResultData::new(),
            uncommitted: Vec::new(),
        };
        message.uncommitted.push(event);
        Ok(message)
    }

    /// Rebuilds a message from its stored events, in version order.
    ///
    /// # Errors
    /// Returns `AppError::Internal` if the stream is empty, does not start with a
    /// creation event, skips a version, mixes messages, creates the message twice,
    /// or continues after a terminal event.
    pub fn from_events(events: impl IntoIterator<Item = MessageEvent>) -> Result<Self> {
        let mut events = events.into_iter();
        let first = events.next().ok_or_else(|| AppError::Internal("Empty message event stream".into()))?;

        let MessageChange::Created(snapshot) = first.change else {
            return Err(AppError::Internal(format!(
                "Message {} stream does not start with a creation event",
                first.message_id
            )));
        };
        if first.version != 1 {
            return Err(AppError::Internal(format!("Message {} stream starts at version {}", first.message_id, first.version)));
        }

        let mut message = Self {
            id: first.message_id,
            realm_id: first.realm_id,
            version: first.version,
            created_by: first.actor_id,
            created_on: first.occurred_at,
            updated_by: first.actor_id,
            updated_on: first.occurred_at,
            snapshot: *snapshot,
            status: MessageStatus::Pending,
            result_data: ResultData::new(),
            uncommitted: Vec::new(),
        };

        for event in events {
            if event.message_id != message.id || event.version != message.version + 1 {
                return Err(AppError::Internal(format!(
                    "Message {} stream is inconsistent at version {}",
                    message.id, event.version
                )));
            }
            if message.status.is_terminal() {
                return Err(AppError::Internal(format!(
                    "Message {} has an event at version {} after completing as {:?}",
                    message.id, event.version, message.status
                )));
            }
            if matches!(event.change, MessageChange::Created(_)) {
                return Err(AppError::Internal(format!(
                    "Message {} is created again at version {}",
                    message.id, event.version
                )));
            }
            message.apply(&event);
        }

        Ok(message)
    }

    /// Records a successful send.
    ///
    /// # Errors
    /// Returns `AppError::MessageAlreadyCompleted` if the message is not pending.
    pub fn succeed(&mut self, result_data: ResultData, actor_id: Uuid) -> Result<()> {
        self.complete(MessageChange::Succeeded { result_data }, actor_id)
    }

    /// Records a failed send.
    ///
    /// # Errors
    /// Returns `AppError::MessageAlreadyCompleted` if the message is not pending.
    pub fn fail(&mut self, result_data: ResultData, actor_id: Uuid) -> Result<()> {
        self.complete(MessageChange::Failed { result_data }, actor_id)
    }

    fn complete(&mut self, change: MessageChange, actor_id: Uuid) -> Result<()> {
        if self.status.is_terminal() {
            return Err(AppError::MessageAlreadyCompleted(self.id));
        }

        let event = MessageEvent {
            message_id: self.id,
            realm_id: self.realm_id,
            version: self.version + 1,
            actor_id,
            occurred_at: OffsetDateTime::now_utc(),
            change,
        };
        self.apply(&event);
        self.uncommitted.push(event);
        Ok(())
    }

    fn apply(&mut self, event: &MessageEvent) {
        match &event.change {
            MessageChange::Created(snapshot) => self.snapshot = (**snapshot).clone(),
            MessageChange::Succeeded { result_data } => {
                self.status = MessageStatus::Succeeded;
                self.result_data = result_data.clone();
            }
            MessageChange::Failed { result_data } => {
                self.status = MessageStatus::Failed;
                self.result_data = result_data.clone();
            }
        }
        self.version = event.version;
        self.updated_by = event.actor_id;
        self.updated_on = event.occurred_at;
    }

    /// Events not yet written to the store.
    #[must_use]
    pub fn uncommitted_events(&self) -> &[MessageEvent] {
        &self.uncommitted
    }

    /// Version the store must currently hold for the uncommitted events to apply.
    #[must_use]
    pub fn expected_version(&self) -> i64 {
        self.version - i64::try_from(self.uncommitted.len()).unwrap_or(i64::MAX)
    }

    pub fn mark_committed(&mut self) {
        self.uncommitted.clear();
    }

    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    #[must_use]
    pub const fn realm_id(&self) -> Uuid {
        self.realm_id
    }

    #[must_use]
    pub const fn version(&self) -> i64 {
        self.version
    }

    #[must_use]
    pub const fn created_by(&self) -> Uuid {
        self.created_by
    }

    #[must_use]
    pub const fn created_on(&self) -> OffsetDateTime {
        self.created_on
    }

    #[must_use]
    pub const fn updated_by(&self) -> Uuid {
        self.updated_by
    }

    #[must_use]
    pub const fn updated_on(&self) -> OffsetDateTime {
        self.updated_on
    }

    #[must_use]
    pub const fn status(&self) -> MessageStatus {
        self.status
    }

    #[must_use]
    pub const fn result_data(&self) -> &ResultData {
        &self.result_data
    }

    #[must_use]
    pub const fn snapshot(&self) -> &MessageCreated {
        &self.snapshot
    }

    #[must_use]
    pub fn subject(&self) -> &str {
        &self.snapshot.subject
    }

    #[must_use]
    pub const fn body(&self) -> &Body {
        &self.snapshot.body
    }

    #[must_use]
    pub fn recipients(&self) -> &[Recipient] {
        &self.snapshot.recipients
    }

    /// The single `To` recipient, guaranteed by [`Message::create`].
    #[must_use]
    pub fn to_recipient(&self) -> Option<&Recipient> {
        self.snapshot.recipients.iter().find(|r| r.recipient_type == RecipientType::To)
    }
}
