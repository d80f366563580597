use crate::domain::message::{Message, MessageEvent};
use crate::error::{AppError, Result};
use crate::services::collaborators::MessageStore;
use async_trait::async_trait;
use dashmap::DashMap;
use uuid::Uuid;

/// Event streams keyed by message id.
#[derive(Debug, Default)]
pub struct InMemoryMessageStore {
    streams: DashMap<Uuid, Vec<MessageEvent>>,
}

impl InMemoryMessageStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored messages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.streams.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    fn append(&self, message: &Message) -> Result<()> {
        let events = message.uncommitted_events();
        if events.is_empty() {
            return Ok(());
        }

        let mut stream = self.streams.entry(message.id()).or_default();
        let current = i64::try_from(stream.len()).map_err(|e| AppError::Internal(e.to_string()))?;
        if current != message.expected_version() {
            return Err(AppError::Conflict(format!(
                "Message {} is at version {current}, expected {}",
                message.id(),
                message.expected_version()
            )));
        }
        if stream.first().is_some_and(|e| e.realm_id != message.realm_id()) {
            return Err(AppError::Conflict(format!("Message {} belongs to another realm", message.id())));
        }

        stream.extend_from_slice(events);
        Ok(())
    }
}

#[async_trait]
impl MessageStore for InMemoryMessageStore {
    async fn save_messages(&self, messages: &mut [Message]) -> Result<()> {
        let mut first_error = None;
        for message in messages.iter_mut() {
            match self.append(message) {
                Ok(()) => message.mark_committed(),
                Err(e) => {
                    tracing::warn!(error = %e, message_id = %message.id(), "Failed to save message");
                    first_error.get_or_insert(e);
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    async fn load(&self, realm_id: Uuid, id: Uuid, version: Option<i64>) -> Result<Option<Message>> {
        let Some(stream) = self.streams.get(&id) else {
            return Ok(None);
        };
        let events: Vec<MessageEvent> = stream
            .iter()
            .filter(|e| e.realm_id == realm_id && version.is_none_or(|v| e.version <= v))
            .cloned()
            .collect();
        drop(stream);

        if events.is_empty() {
            return Ok(None);
        }
        Message::from_events(events).map(Some)
    }
}
