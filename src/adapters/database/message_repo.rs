use crate::adapters::database::DbPool;
use crate::adapters::database::records::MessageEventRecord;
use crate::domain::message::{Message, MessageEvent};
use crate::error::{AppError, Result};
use crate::services::collaborators::MessageStore;
use async_trait::async_trait;
use sqlx::PgConnection;
use uuid::Uuid;

/// Appends message events to the `message_events` table.
#[derive(Clone, Debug)]
pub struct PgMessageStore {
    pool: DbPool,
}

impl PgMessageStore {
    #[must_use]
    pub const fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Writes one message's uncommitted events in a single transaction.
    ///
    /// # Errors
    /// Returns `AppError::Conflict` if the stored version moved on.
    /// Returns `AppError::Database` if the insert fails.
    #[tracing::instrument(level = "debug", skip(self, message), fields(message_id = %message.id()))]
    async fn append(&self, message: &Message) -> Result<()> {
        let events = message.uncommitted_events();
        if events.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;

        let current = current_version(&mut tx, message.id()).await?;
        if current != message.expected_version() {
            return Err(AppError::Conflict(format!(
                "Message {} is at version {current}, expected {}",
                message.id(),
                message.expected_version()
            )));
        }

        for event in events {
            insert_event(&mut tx, event).await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

async fn current_version(conn: &mut PgConnection, message_id: Uuid) -> Result<i64> {
    let version: Option<i64> = sqlx::query_scalar("SELECT MAX(version) FROM message_events WHERE message_id = $1")
        .bind(message_id)
        .fetch_one(conn)
        .await?;
    Ok(version.unwrap_or(0))
}

async fn insert_event(conn: &mut PgConnection, event: &MessageEvent) -> Result<()> {
    let record = MessageEventRecord::try_from(event)?;

    let result = sqlx::query(
        r#"
        INSERT INTO message_events (message_id, realm_id, version, actor_id, event_type, payload, occurred_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(record.message_id)
    .bind(record.realm_id)
    .bind(record.version)
    .bind(record.actor_id)
    .bind(&record.event_type)
    .bind(&record.payload)
    .bind(record.occurred_at)
    .execute(conn)
    .await;

    match result {
        Ok(_) => Ok(()),
        Err(sqlx::Error::Database(e)) if e.code().as_deref() == Some("23505") => {
            // Unique violation: another writer appended this version first
            Err(AppError::Conflict(format!("Message {} version {} already exists", event.message_id, event.version)))
        }
        Err(e) => Err(AppError::Database(e)),
    }
}

#[async_trait]
impl MessageStore for PgMessageStore {
    #[tracing::instrument(level = "debug", skip(self, messages), fields(count = messages.len()))]
    async fn save_messages(&self, messages: &mut [Message]) -> Result<()> {
        let mut first_error = None;
        for message in messages.iter_mut() {
            match self.append(message).await {
                Ok(()) => message.mark_committed(),
                Err(e) => {
                    tracing::warn!(error = %e, message_id = %message.id(), "Failed to save message");
                    first_error.get_or_insert(e);
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn load(&self, realm_id: Uuid, id: Uuid, version: Option<i64>) -> Result<Option<Message>> {
        let records = sqlx::query_as::<_, MessageEventRecord>(
            r#"
            SELECT message_id, realm_id, version, actor_id, event_type, payload, occurred_at
            FROM message_events
            WHERE message_id = $1
              AND realm_id = $2
              AND ($3::BIGINT IS NULL OR version <= $3)
            ORDER BY version ASC
            "#,
        )
        .bind(id)
        .bind(realm_id)
        .bind(version)
        .fetch_all(&self.pool)
        .await?;

        if records.is_empty() {
            return Ok(None);
        }

        let events = records.into_iter().map(MessageEvent::try_from).collect::<Result<Vec<_>>>()?;
        Message::from_events(events).map(Some)
    }
}
