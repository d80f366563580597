use crate::domain::dictionary::Dictionary;
use crate::domain::locale::Locale;
use crate::domain::sender::Sender;
use crate::domain::template::Template;
use crate::domain::user::User;
use crate::error::{AppError, Result};
use crate::services::collaborators::{LanguageDirectory, SenderDirectory, TemplateDirectory, UserDirectory};
use async_trait::async_trait;
use dashmap::DashMap;
use serde::Deserialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use uuid::Uuid;

/// Everything a realm needs to send messages, as loaded from a JSON file.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RealmFixture {
    pub realm_id: Uuid,
    pub default_locale: Locale,
    #[serde(default)]
    pub senders: Vec<Sender>,
    #[serde(default)]
    pub templates: Vec<Template>,
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub dictionaries: Vec<Dictionary>,
}

/// Senders, templates, users and dictionaries held in memory.
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    senders: DashMap<Uuid, Sender>,
    templates: DashMap<Uuid, Template>,
    users: DashMap<Uuid, User>,
    dictionaries: DashMap<Uuid, Vec<Dictionary>>,
    default_locales: DashMap<Uuid, Locale>,
    user_loads: AtomicUsize,
}

impl InMemoryDirectory {
    #[must_use]
    pub fn from_fixture(fixture: RealmFixture) -> Self {
        let directory = Self::default();
        let realm_id = fixture.realm_id;
        directory.set_default_locale(realm_id, fixture.default_locale);
        for sender in fixture.senders {
            directory.add_sender(sender);
        }
        for template in fixture.templates {
            directory.add_template(template);
        }
        for user in fixture.users {
            directory.add_user(user);
        }
        for dictionary in fixture.dictionaries {
            directory.add_dictionary(realm_id, dictionary);
        }
        directory
    }

    pub fn add_sender(&self, sender: Sender) {
        self.senders.insert(sender.id, sender);
    }

    pub fn add_template(&self, template: Template) {
        self.templates.insert(template.id, template);
    }

    pub fn add_user(&self, user: User) {
        self.users.insert(user.id, user);
    }

    /// Adds a dictionary, replacing any existing one for the same locale.
    pub fn add_dictionary(&self, realm_id: Uuid, dictionary: Dictionary) {
        let mut dictionaries = self.dictionaries.entry(realm_id).or_default();
        dictionaries.retain(|d| d.locale != dictionary.locale);
        dictionaries.push(dictionary);
    }

    pub fn set_default_locale(&self, realm_id: Uuid, locale: Locale) {
        self.default_locales.insert(realm_id, locale);
    }

    /// Number of batched user reads served so far.
    #[must_use]
    pub fn user_load_count(&self) -> usize {
        self.user_loads.load(Ordering::SeqCst)
    }
}

/// Matches an id when `reference` parses as one, otherwise a case-insensitive name.
fn find_by_reference<T: Clone>(
    entries: &DashMap<Uuid, T>,
    realm_id: Uuid,
    reference: &str,
    realm_of: impl Fn(&T) -> Uuid,
    name_of: impl Fn(&T) -> &str,
) -> Option<T> {
    if let Ok(id) = Uuid::parse_str(reference) {
        return entries.get(&id).filter(|e| realm_of(e.value()) == realm_id).map(|e| e.value().clone());
    }
    let reference = reference.trim();
    entries
        .iter()
        .find(|e| realm_of(e.value()) == realm_id && name_of(e.value()).eq_ignore_ascii_case(reference))
        .map(|e| e.value().clone())
}

#[async_trait]
impl SenderDirectory for InMemoryDirectory {
    async fn find_sender(&self, realm_id: Uuid, reference: &str) -> Result<Option<Sender>> {
        Ok(find_by_reference(&self.senders, realm_id, reference, |s| s.realm_id, |s| s.unique_name.as_str()))
    }
}

#[async_trait]
impl TemplateDirectory for InMemoryDirectory {
    async fn find_template(&self, realm_id: Uuid, reference: &str) -> Result<Option<Template>> {
        Ok(find_by_reference(&self.templates, realm_id, reference, |t| t.realm_id, |t| t.unique_name.as_str()))
    }
}

#[async_trait]
impl UserDirectory for InMemoryDirectory {
    async fn load_users(&self, realm_id: Uuid, ids: &[Uuid]) -> Result<Vec<User>> {
        self.user_loads.fetch_add(1, Ordering::SeqCst);
        Ok(ids
            .iter()
            .filter_map(|id| self.users.get(id))
            .filter(|u| u.realm_id == realm_id)
            .map(|u| u.value().clone())
            .collect())
    }
}

#[async_trait]
impl LanguageDirectory for InMemoryDirectory {
    async fn list_dictionaries(&self, realm_id: Uuid) -> Result<Vec<Dictionary>> {
        Ok(self.dictionaries.get(&realm_id).map(|d| d.value().clone()).unwrap_or_default())
    }

    async fn find_default_locale(&self, realm_id: Uuid) -> Result<Locale> {
        self.default_locales
            .get(&realm_id)
            .map(|l| l.value().clone())
            .ok_or_else(|| AppError::Internal(format!("Realm {realm_id} has no default locale")))
    }
}
