use crate::domain::message::{MessageChange, MessageEvent};
use crate::error::AppError;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, sqlx::FromRow)]
pub struct MessageEventRecord {
    pub(crate) message_id: Uuid,
    pub(crate) realm_id: Uuid,
    pub(crate) version: i64,
    pub(crate) actor_id: Uuid,
    pub(crate) event_type: String,
    pub(crate) payload: serde_json::Value,
    pub(crate) occurred_at: OffsetDateTime,
}

impl TryFrom<&MessageEvent> for MessageEventRecord {
    type Error = AppError;

    fn try_from(event: &MessageEvent) -> Result<Self, Self::Error> {
        Ok(Self {
            message_id: event.message_id,
            realm_id: event.realm_id,
            version: event.version,
            actor_id: event.actor_id,
            event_type: event.change.name().to_string(),
            payload: serde_json::to_value(&event.change)?,
            occurred_at: event.occurred_at,
        })
    }
}

impl TryFrom<MessageEventRecord> for MessageEvent {
    type Error = AppError;

    fn try_from(record: MessageEventRecord) -> Result<Self, Self::Error> {
        let change: MessageChange = serde_json::from_value(record.payload)?;
        if change.name() != record.event_type {
            return Err(AppError::Internal(format!(
                "Event {} of message {} is stored as {} but contains {}",
                record.version,
                record.message_id,
                record.event_type,
                change.name()
            )));
        }
        Ok(Self {
            message_id: record.message_id,
            realm_id: record.realm_id,
            version: record.version,
            actor_id: record.actor_id,
            occurred_at: record.occurred_at,
            change,
        })
    }
}
