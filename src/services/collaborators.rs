//! Boundaries the message service depends on. Every lookup is scoped to a realm.

use crate::domain::dictionary::Dictionary;
use crate::domain::locale::Locale;
use crate::domain::message::Message;
use crate::domain::search::{MessageDto, SearchMessagesQuery, SearchResults};
use crate::domain::sender::Sender;
use crate::domain::template::Template;
use crate::domain::user::User;
use crate::error::Result;
use async_trait::async_trait;
use uuid::Uuid;

#[async_trait]
pub trait SenderDirectory: Send + Sync + std::fmt::Debug {
    /// Finds a sender by id or unique name.
    async fn find_sender(&self, realm_id: Uuid, reference: &str) -> Result<Option<Sender>>;
}

#[async_trait]
pub trait TemplateDirectory: Send + Sync + std::fmt::Debug {
    /// Finds a template by id or unique name.
    async fn find_template(&self, realm_id: Uuid, reference: &str) -> Result<Option<Template>>;
}

#[async_trait]
pub trait UserDirectory: Send + Sync + std::fmt::Debug {
    /// Loads the users that exist among `ids`. Missing ids are simply absent.
    async fn load_users(&self, realm_id: Uuid, ids: &[Uuid]) -> Result<Vec<User>>;
}

#[async_trait]
pub trait LanguageDirectory: Send + Sync + std::fmt::Debug {
    async fn list_dictionaries(&self, realm_id: Uuid) -> Result<Vec<Dictionary>>;

    async fn find_default_locale(&self, realm_id: Uuid) -> Result<Locale>;
}

#[async_trait]
pub trait MessageStore: Send + Sync + std::fmt::Debug {
    /// Appends the uncommitted events of every message.
    ///
    /// Each message is written independently; all are attempted and the first
    /// failure is returned.
    async fn save_messages(&self, messages: &mut [Message]) -> Result<()>;

    /// Rebuilds a message, optionally as it was at `version`.
    async fn load(&self, realm_id: Uuid, id: Uuid, version: Option<i64>) -> Result<Option<Message>>;
}

#[async_trait]
pub trait MessageReadModel: Send + Sync + std::fmt::Debug {
    async fn save(&self, message: MessageDto) -> Result<()>;

    async fn read(&self, realm_id: Uuid, id: Uuid) -> Result<Option<MessageDto>>;

    async fn search(&self, realm_id: Uuid, query: &SearchMessagesQuery) -> Result<SearchResults<MessageDto>>;
}
