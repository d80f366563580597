use crate::domain::locale::Locale;
use crate::domain::recipient::RecipientType;
use crate::domain::sender::SenderKind;
use crate::domain::variable::{Variable, is_identifier};
use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipientPayload {
    #[serde(rename = "type")]
    pub recipient_type: RecipientType,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub display_name: Option<String>,
    pub user_id: Option<Uuid>,
}

impl RecipientPayload {
    #[must_use]
    pub fn user(recipient_type: RecipientType, user_id: Uuid) -> Self {
        Self { recipient_type, user_id: Some(user_id), ..Self::default() }
    }

    #[must_use]
    pub fn email(recipient_type: RecipientType, email: impl Into<String>) -> Self {
        Self { recipient_type, email: Some(email.into()), ..Self::default() }
    }

    #[must_use]
    pub fn phone(recipient_type: RecipientType, phone: impl Into<String>) -> Self {
        Self { recipient_type, phone: Some(phone.into()), ..Self::default() }
    }

    const fn is_contact(&self) -> bool {
        self.email.is_some() || self.phone.is_some()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessagePayload {
    pub sender: String,
    pub template: String,
    pub recipients: Vec<RecipientPayload>,
    #[serde(default)]
    pub ignore_user_locale: bool,
    pub locale: Option<String>,
    #[serde(default)]
    pub variables: Vec<Variable>,
    #[serde(default)]
    pub is_demo: bool,
}

impl SendMessagePayload {
    /// Checks the rules that do not depend on the sender.
    ///
    /// # Errors
    /// Returns `AppError::Validation` listing every problem found.
    pub fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();

        if self.sender.trim().is_empty() {
            errors.push("'sender' is required".to_string());
        }
        if self.template.trim().is_empty() {
            errors.push("'template' is required".to_string());
        }
        if self.recipients.is_empty() {
            errors.push("At least one recipient is required".to_string());
        }

        for (index, recipient) in self.recipients.iter().enumerate() {
            match (recipient.user_id, recipient.is_contact()) {
                (Some(_), true) => errors.push(format!(
                    "recipients[{index}]: specify either 'userId' or a contact ('email', 'phone'), not both"
                )),
                (None, false) => {
                    errors.push(format!("recipients[{index}]: a 'userId', 'email' or 'phone' is required"));
                }
                _ => {}
            }
            if let Some(email) = &recipient.email
                && !is_email(email)
            {
                errors.push(format!("recipients[{index}]: '{email}' is not a valid email address"));
            }
            if let Some(phone) = &recipient.phone
                && !is_phone_number(phone)
            {
                errors.push(format!("recipients[{index}]: '{phone}' is not a valid E.164 phone number"));
            }
        }

        if let Some(locale) = &self.locale
            && let Err(e) = Locale::parse(locale)
        {
            errors.push(e);
        }

        let mut keys = HashSet::with_capacity(self.variables.len());
        for (index, variable) in self.variables.iter().enumerate() {
            if !is_identifier(&variable.key) {
                errors.push(format!("variables[{index}]: '{}' is not a valid key", variable.key));
            } else if !keys.insert(variable.key.as_str()) {
                errors.push(format!("variables[{index}]: duplicate key '{}'", variable.key));
            }
            if variable.value.trim().is_empty() {
                errors.push(format!("variables[{index}]: value for '{}' cannot be empty", variable.key));
            }
        }

        into_result(errors)
    }

    /// Checks the rules imposed by the sender's channel.
    ///
    /// # Errors
    /// Returns `AppError::Validation` listing every problem found.
    pub fn validate_for(&self, kind: SenderKind) -> Result<()> {
        let mut errors = Vec::new();

        for (index, recipient) in self.recipients.iter().enumerate() {
            if recipient.user_id.is_some() {
                continue;
            }
            match kind {
                SenderKind::Email if recipient.email.is_none() => {
                    errors.push(format!("recipients[{index}]: 'email' is required by an email sender"));
                }
                SenderKind::Phone if recipient.phone.is_none() => {
                    errors.push(format!("recipients[{index}]: 'phone' is required by a phone sender"));
                }
                _ => {}
            }
        }

        if kind == SenderKind::Phone {
            for (index, recipient) in self.recipients.iter().enumerate() {
                if recipient.recipient_type != RecipientType::To {
                    errors.push(format!("recipients[{index}]: SMS messages only accept 'To' recipients"));
                }
            }
        }

        into_result(errors)
    }

    /// The request-level locale, once validated.
    #[must_use]
    pub fn target_locale(&self) -> Option<Locale> {
        self.locale.as_deref().and_then(|l| Locale::parse(l).ok())
    }
}

fn into_result(errors: Vec<String>) -> Result<()> {
    if errors.is_empty() { Ok(()) } else { Err(AppError::Validation(errors.join("; "))) }
}

#[must_use]
pub fn is_email(value: &str) -> bool {
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !value.chars().any(char::is_whitespace)
}

/// E.164: a `+`, a non-zero leading digit, at most 15 digits in total.
#[must_use]
pub fn is_phone_number(value: &str) -> bool {
    let Some(digits) = value.strip_prefix('+') else {
        return false;
    };
    (8..=15).contains(&digits.len())
        && digits.chars().all(|c| c.is_ascii_digit())
        && !digits.starts_with('0')
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentMessages {
    pub ids: Vec<Uuid>,
}
