//! Sandboxed template rendering.
//!
//! Templates can call exactly two lookups: `@Resource("key")`, answered by the
//! recipient's [`Dictionaries`], and `@Variable("key")`, answered by the request
//! variables. Nothing else is reachable from a template.

pub mod parser;

use crate::domain::dictionary::Dictionaries;
use crate::domain::template::{Content, ContentType, Template};
use crate::domain::variable::Variables;
use parser::{Pattern, Segment};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    #[error("syntax error at {position}: {message}")]
    Syntax { position: usize, message: String },
    #[error("unknown function '{name}' at {position}; only Resource and Variable are available")]
    UnknownFunction { name: String, position: usize },
    #[error("variable '{0}' was not provided")]
    MissingVariable(String),
    #[error("{part}: {source}")]
    InPart {
        part: &'static str,
        #[source]
        source: Box<TemplateError>,
    },
}

impl TemplateError {
    fn in_part(self, part: &'static str) -> Self {
        Self::InPart { part, source: Box::new(self) }
    }
}

/// Output of rendering a template for one locale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedContent {
    pub subject: String,
    pub body: Content,
}

#[derive(Debug, Clone)]
enum Subject {
    /// A bare subject is a dictionary key.
    Key(String),
    Pattern(Pattern),
}

/// A template parsed once and rendered per locale.
#[derive(Debug, Clone)]
pub struct CompiledTemplate {
    subject: Subject,
    body: Pattern,
    content_type: ContentType,
}

impl CompiledTemplate {
    /// Parses the template's subject and body.
    ///
    /// # Errors
    /// Returns `TemplateError::InPart` wrapping the parse error of the offending part.
    pub fn compile(template: &Template) -> Result<Self, TemplateError> {
        let subject = parser::parse(&template.subject).map_err(|e| e.in_part("subject"))?;
        let subject = if subject.is_literal() { Subject::Key(subject.literal()) } else { Subject::Pattern(subject) };
        let body = parser::parse(&template.content.text).map_err(|e| e.in_part("body"))?;

        Ok(Self { subject, body, content_type: template.content.content_type })
    }

    #[must_use]
    pub const fn content_type(&self) -> ContentType {
        self.content_type
    }

    /// Renders subject and body. Output depends only on the inputs.
    ///
    /// # Errors
    /// Returns `TemplateError::MissingVariable` (wrapped in `InPart`) for an absent variable.
    pub fn render(&self, dictionaries: &Dictionaries, variables: &Variables) -> Result<RenderedContent, TemplateError> {
        let subject = match &self.subject {
            Subject::Key(key) => dictionaries.translate(key).to_string(),
            Subject::Pattern(pattern) => {
                render_pattern(pattern, dictionaries, variables, ContentType::Plain).map_err(|e| e.in_part("subject"))?
            }
        };
        let text =
            render_pattern(&self.body, dictionaries, variables, self.content_type).map_err(|e| e.in_part("body"))?;

        Ok(RenderedContent { subject, body: Content { content_type: self.content_type, text } })
    }
}

fn render_pattern(
    pattern: &Pattern,
    dictionaries: &Dictionaries,
    variables: &Variables,
    content_type: ContentType,
) -> Result<String, TemplateError> {
    let mut out = String::new();
    for segment in pattern.segments() {
        match segment {
            Segment::Text(text) => out.push_str(text),
            Segment::Resource(key) => push_value(&mut out, dictionaries.translate(key), content_type),
            Segment::Variable(key) => {
                let value = variables.get(key).ok_or_else(|| TemplateError::MissingVariable(key.clone()))?;
                push_value(&mut out, value, content_type);
            }
        }
    }
    Ok(out)
}

fn push_value(out: &mut String, value: &str, content_type: ContentType) {
    match content_type {
        ContentType::Plain => out.push_str(value),
        ContentType::Html => {
            for c in value.chars() {
                match c {
                    '&' => out.push_str("&amp;"),
                    '<' => out.push_str("&lt;"),
                    '>' => out.push_str("&gt;"),
                    '"' => out.push_str("&quot;"),
                    '\'' => out.push_str("&#39;"),
                    _ => out.push(c),
                }
            }
        }
    }
}
