use crate::domain::dictionary::DictionarySet;
use crate::domain::locale::Locale;
use crate::error::Result;
use crate::services::collaborators::LanguageDirectory;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Clone, Debug)]
pub struct LocalizationService {
    languages: Arc<dyn LanguageDirectory>,
}

impl LocalizationService {
    pub fn new(languages: Arc<dyn LanguageDirectory>) -> Self {
        Self { languages }
    }

    /// Loads every dictionary of the realm along with its default locale.
    ///
    /// # Errors
    /// Propagates failures from the language directory.
    #[tracing::instrument(err(level = "warn"), skip(self))]
    pub async fn load(&self, realm_id: Uuid) -> Result<DictionarySet> {
        let default_locale = self.languages.find_default_locale(realm_id).await?;
        let dictionaries = self.languages.list_dictionaries(realm_id).await?;
        tracing::debug!(count = dictionaries.len(), %default_locale, "Loaded dictionaries");
        Ok(DictionarySet::new(dictionaries, default_locale))
    }
}

/// Picks the locale a recipient's message is rendered in.
///
/// With `ignore_user_locale` the request locale wins; otherwise the user's own
/// preference comes first. The realm default is the last resort.
#[must_use]
pub fn effective_locale(
    ignore_user_locale: bool,
    user_locale: Option<&Locale>,
    request_locale: Option<&Locale>,
    default_locale: &Locale,
) -> Locale {
    let preferred = if ignore_user_locale { request_locale } else { user_locale.or(request_locale) };
    preferred.unwrap_or(default_locale).clone()
}
