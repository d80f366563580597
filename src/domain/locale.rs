use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A language tag such as `en`, `fr-CA` or `zh-Hant-TW`.
///
/// Tags compare case-insensitively; the stored form is normalized to
/// lowercase language, title-case script and uppercase region.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Locale(String);

impl Locale {
    /// Parses and normalizes a language tag.
    ///
    /// # Errors
    /// Returns a description of the problem if the tag is not well formed.
    pub fn parse(value: &str) -> Result<Self, String> {
        let value = value.trim();
        if value.is_empty() {
            return Err("Locale cannot be empty".into());
        }

        let parts: Vec<&str> = value.split(['-', '_']).collect();
        let invalid = || format!("Invalid locale: '{value}'");

        let language = parts[0];
        if !(2..=3).contains(&language.len()) || !language.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(invalid());
        }
        let mut normalized = language.to_ascii_lowercase();

        let mut rest = &parts[1..];
        if let Some(script) = rest.first()
            && script.len() == 4
            && script.chars().all(|c| c.is_ascii_alphabetic())
        {
            normalized.push('-');
            normalized.push_str(&script[..1].to_ascii_uppercase());
            normalized.push_str(&script[1..].to_ascii_lowercase());
            rest = &rest[1..];
        }

        match rest {
            [] => {}
            [region] if is_region(region) => {
                normalized.push('-');
                normalized.push_str(&region.to_ascii_uppercase());
            }
            _ => return Err(invalid()),
        }

        Ok(Self(normalized))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn is_region(value: &str) -> bool {
    (value.len() == 2 && value.chars().all(|c| c.is_ascii_alphabetic()))
        || (value.len() == 3 && value.chars().all(|c| c.is_ascii_digit()))
}

impl FromStr for Locale {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Locale {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Locale> for String {
    fn from(locale: Locale) -> Self {
        locale.0
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
