use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Plain,
    Html,
}

impl ContentType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Plain => "plain",
            Self::Html => "html",
        }
    }

    #[must_use]
    pub const fn mime_type(self) -> &'static str {
        match self {
            Self::Plain => "text/plain",
            Self::Html => "text/html",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Content {
    #[serde(rename = "type")]
    pub content_type: ContentType,
    pub text: String,
}

impl Content {
    #[must_use]
    pub fn plain(text: impl Into<String>) -> Self {
        Self { content_type: ContentType::Plain, text: text.into() }
    }

    #[must_use]
    pub fn html(text: impl Into<String>) -> Self {
        Self { content_type: ContentType::Html, text: text.into() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    pub id: Uuid,
    pub realm_id: Uuid,
    pub unique_name: String,
    pub display_name: Option<String>,
    /// May be a dictionary key or a pattern with `@Resource`/`@Variable` expressions.
    pub subject: String,
    pub content: Content,
}

impl Template {
    #[must_use]
    pub fn snapshot(&self) -> TemplateSnapshot {
        TemplateSnapshot {
            id: self.id,
            unique_name: self.unique_name.clone(),
            display_name: self.display_name.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateSnapshot {
    pub id: Uuid,
    pub unique_name: String,
    pub display_name: Option<String>,
}
