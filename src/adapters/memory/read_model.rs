use crate::domain::search::{MessageDto, MessageSort, SearchMessagesQuery, SearchResults, SortOption};
use crate::error::Result;
use crate::services::collaborators::MessageReadModel;
use async_trait::async_trait;
use dashmap::DashMap;
use std::cmp::Ordering;
use uuid::Uuid;

/// Latest projection of every message, keyed by id.
#[derive(Debug, Default)]
pub struct InMemoryMessageReadModel {
    messages: DashMap<Uuid, MessageDto>,
}

impl InMemoryMessageReadModel {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn compare(a: &MessageDto, b: &MessageDto, sort: &[SortOption]) -> Ordering {
    let ordering = sort.iter().fold(Ordering::Equal, |ordering, option| {
        ordering.then_with(|| {
            let field = match option.field {
                MessageSort::CreatedOn => a.created_on.cmp(&b.created_on),
                MessageSort::UpdatedOn => a.updated_on.cmp(&b.updated_on),
                MessageSort::Subject => a.subject.to_lowercase().cmp(&b.subject.to_lowercase()),
            };
            if option.is_descending { field.reverse() } else { field }
        })
    });
    // Stable tie-break so paging is deterministic.
    ordering.then_with(|| a.created_on.cmp(&b.created_on)).then_with(|| a.id.cmp(&b.id))
}

#[async_trait]
impl MessageReadModel for InMemoryMessageReadModel {
    async fn save(&self, message: MessageDto) -> Result<()> {
        self.messages.insert(message.id, message);
        Ok(())
    }

    async fn read(&self, realm_id: Uuid, id: Uuid) -> Result<Option<MessageDto>> {
        Ok(self.messages.get(&id).filter(|m| m.realm_id == realm_id).map(|m| m.value().clone()))
    }

    async fn search(&self, realm_id: Uuid, query: &SearchMessagesQuery) -> Result<SearchResults<MessageDto>> {
        let mut matches: Vec<MessageDto> = self
            .messages
            .iter()
            .filter(|m| m.realm_id == realm_id && query.matches(m.value()))
            .map(|m| m.value().clone())
            .collect();
        matches.sort_by(|a, b| compare(a, b, &query.sort));

        let total = matches.len();
        let items = matches.into_iter().skip(query.skip).take(query.limit).collect();
        Ok(SearchResults { items, total })
    }
}
