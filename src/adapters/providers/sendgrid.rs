use super::status_data;
use crate::domain::message::ResultData;
use crate::domain::recipient::{Recipient, RecipientType};
use crate::domain::sender::{ProviderKind, SenderSettings};
use crate::services::dispatch::provider::{
    MessageHandler, OutboundMessage, ProviderError, ProviderStrategy, SendResult,
};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Serialize, PartialEq, Eq)]
pub(crate) struct EmailAddress {
    email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub(crate) struct Personalization {
    to: Vec<EmailAddress>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    cc: Vec<EmailAddress>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    bcc: Vec<EmailAddress>,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub(crate) struct MailContent {
    #[serde(rename = "type")]
    mime_type: &'static str,
    value: String,
}

/// Body of a SendGrid v3 `mail/send` request.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub(crate) struct MailSendRequest {
    personalizations: Vec<Personalization>,
    from: EmailAddress,
    subject: String,
    content: Vec<MailContent>,
}

fn address(recipient: &Recipient) -> Result<EmailAddress, ProviderError> {
    let email = recipient
        .address
        .clone()
        .ok_or_else(|| ProviderError::InvalidMessage("every email recipient needs an address".into()))?;
    Ok(EmailAddress { email, name: recipient.display_name.clone() })
}

pub(crate) fn build_mail_request(message: &OutboundMessage) -> Result<MailSendRequest, ProviderError> {
    let from = message
        .sender
        .email_address
        .clone()
        .ok_or_else(|| ProviderError::InvalidMessage("the sender has no email address".into()))?;

    let to: Vec<EmailAddress> = message.recipients_of(RecipientType::To).map(address).collect::<Result<_, _>>()?;
    if to.len() != 1 {
        return Err(ProviderError::InvalidMessage(format!("expected exactly one 'To' recipient, found {}", to.len())));
    }
    let cc = message.recipients_of(RecipientType::Cc).map(address).collect::<Result<_, _>>()?;
    let bcc = message.recipients_of(RecipientType::Bcc).map(address).collect::<Result<_, _>>()?;

    Ok(MailSendRequest {
        personalizations: vec![Personalization { to, cc, bcc }],
        from: EmailAddress { email: from, name: message.sender.display_name.clone() },
        subject: message.subject.clone(),
        content: vec![MailContent {
            mime_type: message.body.content_type.mime_type(),
            value: message.body.text.clone(),
        }],
    })
}

#[derive(Clone, Debug)]
pub struct SendGridStrategy {
    client: reqwest::Client,
    base_url: String,
}

impl SendGridStrategy {
    #[must_use]
    pub const fn new(client: reqwest::Client, base_url: String) -> Self {
        Self { client, base_url }
    }
}

impl ProviderStrategy for SendGridStrategy {
    fn provider(&self) -> ProviderKind {
        ProviderKind::SendGridEmail
    }

    fn execute(&self, settings: SenderSettings) -> Result<Arc<dyn MessageHandler>, ProviderError> {
        let provider = settings.provider();
        let SenderSettings::SendGridEmail { api_key } = settings else {
            return Err(ProviderError::InvalidSettings(format!("expected SendGrid settings, got {provider}")));
        };
        if api_key.trim().is_empty() {
            return Err(ProviderError::InvalidSettings("the SendGrid API key is empty".into()));
        }
        Ok(Arc::new(SendGridHandler { client: self.client.clone(), base_url: self.base_url.clone(), api_key }))
    }
}

pub struct SendGridHandler {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl std::fmt::Debug for SendGridHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SendGridHandler").field("base_url", &self.base_url).finish_non_exhaustive()
    }
}

#[async_trait]
impl MessageHandler for SendGridHandler {
    async fn send(&self, message: &OutboundMessage) -> Result<SendResult, ProviderError> {
        let request = build_mail_request(message)?;

        let response = self
            .client
            .post(format!("{}/v3/mail/send", self.base_url.trim_end_matches('/')))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let mut data = status_data(status);
        if let Some(id) = response.headers().get("X-Message-Id").and_then(|v| v.to_str().ok()) {
            data.insert("MessageId", id);
        }

        if status.is_success() {
            tracing::debug!(status = %status, "SendGrid accepted message");
            return Ok(SendResult::success(data));
        }

        record_error_body(&mut data, response.text().await);
        Ok(SendResult::failure(data))
    }
}

/// Adds the body of a rejected request, or why it could not be read.
fn record_error_body<E: std::fmt::Display>(data: &mut ResultData, body: Result<String, E>) {
    match body {
        Ok(body) if body.is_empty() => {}
        Ok(body) => data.insert("Error", body),
        Err(e) => data.insert("BodyError", e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::sender::{SenderKind, SenderSnapshot};
    use crate::domain::template::Content;
    use uuid::Uuid;

    fn recipient(recipient_type: RecipientType, address: Option<&str>, name: Option<&str>) -> Recipient {
        Recipient {
            recipient_type,
            address: address.map(str::to_string),
            phone_number: None,
            display_name: name.map(str::to_string),
            user_id: None,
        }
    }

    fn message(recipients: Vec<Recipient>) -> OutboundMessage {
        OutboundMessage {
            message_id: Uuid::new_v4(),
            realm_id: Uuid::new_v4(),
            sender: SenderSnapshot {
                id: Uuid::new_v4(),
                kind: SenderKind::Email,
                provider: ProviderKind::SendGridEmail,
                email_address: Some("noreply@example.com".into()),
                phone_number: None,
                display_name: Some("Example".into()),
            },
            subject: "Welcome".into(),
            body: Content::html("<p>Hi</p>"),
            recipients,
        }
    }

    #[test]
    fn test_request_json_shape() {
        let request = build_mail_request(&message(vec![
            recipient(RecipientType::To, Some("ada@example.com"), Some("Ada")),
            recipient(RecipientType::Bcc, Some("audit@example.com"), None),
        ]))
        .unwrap();

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["personalizations"][0]["to"][0]["email"], "ada@example.com");
        assert_eq!(json["personalizations"][0]["to"][0]["name"], "Ada");
        assert_eq!(json["personalizations"][0]["bcc"][0]["email"], "audit@example.com");
        assert!(json["personalizations"][0].get("cc").is_none());
        assert_eq!(json["from"]["name"], "Example");
        assert_eq!(json["content"][0]["type"], "text/html");
        assert_eq!(json["content"][0]["value"], "<p>Hi</p>");
    }

    #[test]
    fn test_error_body_is_recorded() {
        let mut data = ResultData::new();
        record_error_body::<String>(&mut data, Ok(r#"{"errors":[{"message":"bad"}]}"#.into()));
        assert_eq!(data.get("Error"), Some(r#"{"errors":[{"message":"bad"}]}"#));

        let mut data = ResultData::new();
        record_error_body::<String>(&mut data, Ok(String::new()));
        assert_eq!(data.get("Error"), None);

        let mut data = ResultData::new();
        record_error_body(&mut data, Err("connection closed before message completed"));
        assert_eq!(data.get("BodyError"), Some("connection closed before message completed"));
        assert_eq!(data.get("Error"), None);
    }

    #[test]
    fn test_rejects_missing_addresses() {
        let no_to = build_mail_request(&message(vec![recipient(RecipientType::Cc, Some("c@example.com"), None)]));
        assert!(matches!(no_to, Err(ProviderError::InvalidMessage(_))));

        let unaddressed = build_mail_request(&message(vec![recipient(RecipientType::To, None, None)]));
        assert!(matches!(unaddressed, Err(ProviderError::InvalidMessage(_))));

        let mut anonymous = message(vec![recipient(RecipientType::To, Some("a@example.com"), None)]);
        anonymous.sender.email_address = None;
        assert!(matches!(build_mail_request(&anonymous), Err(ProviderError::InvalidMessage(_))));
    }

    #[test]
    fn test_strategy_requires_sendgrid_settings() {
        let strategy = SendGridStrategy::new(reqwest::Client::new(), "http://localhost".into());

        let twilio = SenderSettings::TwilioSms { account_sid: "AC1".into(), auth_token: "t".into() };
        assert!(matches!(strategy.execute(twilio), Err(ProviderError::InvalidSettings(_))));

        let handler = strategy.execute(SenderSettings::SendGridEmail { api_key: "SG.secret".into() }).unwrap();
        assert!(!format!("{handler:?}").contains("SG.secret"));
    }
}
