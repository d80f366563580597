use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RecipientType {
    #[default]
    To,
    #[serde(rename = "CC")]
    Cc,
    Bcc,
}

/// A resolved recipient. `user_id` is a back-reference; contact fields are copied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recipient {
    #[serde(rename = "type")]
    pub recipient_type: RecipientType,
    pub address: Option<String>,
    pub phone_number: Option<String>,
    pub display_name: Option<String>,
    pub user_id: Option<Uuid>,
}

/// Resolved recipients grouped by type, in input order within each group.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Recipients {
    to: Vec<Recipient>,
    cc: Vec<Recipient>,
    bcc: Vec<Recipient>,
}

impl Recipients {
    pub fn push(&mut self, recipient: Recipient) {
        match recipient.recipient_type {
            RecipientType::To => self.to.push(recipient),
            RecipientType::Cc => self.cc.push(recipient),
            RecipientType::Bcc => self.bcc.push(recipient),
        }
    }

    #[must_use]
    pub fn to(&self) -> &[Recipient] {
        &self.to
    }

    #[must_use]
    pub fn cc(&self) -> &[Recipient] {
        &self.cc
    }

    #[must_use]
    pub fn bcc(&self) -> &[Recipient] {
        &self.bcc
    }

    /// CC followed by Bcc: the list every generated message carries.
    #[must_use]
    pub fn shared(&self) -> Vec<Recipient> {
        self.cc.iter().chain(&self.bcc).cloned().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.to.len() + self.cc.len() + self.bcc.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FromIterator<Recipient> for Recipients {
    fn from_iter<I: IntoIterator<Item = Recipient>>(iter: I) -> Self {
        let mut recipients = Self::default();
        for recipient in iter {
            recipients.push(recipient);
        }
        recipients
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contact(recipient_type: RecipientType, address: &str) -> Recipient {
        Recipient {
            recipient_type,
            address: Some(address.to_string()),
            phone_number: None,
            display_name: None,
            user_id: None,
        }
    }

    #[test]
    fn test_grouping_keeps_input_order() {
        let recipients: Recipients = [
            contact(RecipientType::Bcc, "audit@example.com"),
            contact(RecipientType::To, "a@example.com"),
            contact(RecipientType::Cc, "boss@example.com"),
            contact(RecipientType::To, "b@example.com"),
        ]
        .into_iter()
        .collect();

        assert_eq!(recipients.len(), 4);
        assert_eq!(recipients.to()[0].address.as_deref(), Some("a@example.com"));
        assert_eq!(recipients.to()[1].address.as_deref(), Some("b@example.com"));

        let shared = recipients.shared();
        assert_eq!(shared[0].recipient_type, RecipientType::Cc);
        assert_eq!(shared[1].recipient_type, RecipientType::Bcc);
    }

    #[test]
    fn test_type_wire_names() {
        assert_eq!(serde_json::to_string(&RecipientType::Cc).unwrap(), "\"CC\"");
        assert_eq!(serde_json::from_str::<RecipientType>("\"Bcc\"").unwrap(), RecipientType::Bcc);
    }
}
