use crate::domain::locale::Locale;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Translations for a single locale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dictionary {
    pub locale: Locale,
    pub entries: BTreeMap<String, String>,
}

impl Dictionary {
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }
}

/// Every dictionary of a realm, loaded once per request.
#[derive(Debug, Clone)]
pub struct DictionarySet {
    by_locale: HashMap<Locale, Arc<Dictionary>>,
    default_locale: Locale,
}

impl DictionarySet {
    #[must_use]
    pub fn new(dictionaries: Vec<Dictionary>, default_locale: Locale) -> Self {
        let by_locale = dictionaries.into_iter().map(|d| (d.locale.clone(), Arc::new(d))).collect();
        Self { by_locale, default_locale }
    }

    #[must_use]
    pub const fn default_locale(&self) -> &Locale {
        &self.default_locale
    }

    /// Builds the lookup for `target`, falling back to the default locale.
    #[must_use]
    pub fn for_locale(&self, target: Option<&Locale>) -> Dictionaries {
        let effective_locale = target.unwrap_or(&self.default_locale).clone();
        Dictionaries {
            effective: self.by_locale.get(&effective_locale).cloned(),
            default: self.by_locale.get(&self.default_locale).cloned(),
            effective_locale,
        }
    }
}

/// Fallback-aware translation lookup scoped to one effective locale.
#[derive(Debug, Clone)]
pub struct Dictionaries {
    effective_locale: Locale,
    effective: Option<Arc<Dictionary>>,
    default: Option<Arc<Dictionary>>,
}

impl Dictionaries {
    #[must_use]
    pub fn new(dictionaries: Vec<Dictionary>, default_locale: Locale, target: Option<Locale>) -> Self {
        DictionarySet::new(dictionaries, default_locale).for_locale(target.as_ref())
    }

    #[must_use]
    pub const fn locale(&self) -> &Locale {
        &self.effective_locale
    }

    /// Effective-locale value, then default-locale value, then the key itself.
    #[must_use]
    pub fn translate<'a>(&'a self, key: &'a str) -> &'a str {
        self.effective
            .as_deref()
            .and_then(|d| d.get(key))
            .or_else(|| self.default.as_deref().and_then(|d| d.get(key)))
            .unwrap_or(key)
    }
}
