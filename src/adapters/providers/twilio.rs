use super::status_data;
use crate::domain::message::ResultData;
use crate::domain::recipient::RecipientType;
use crate::domain::sender::{ProviderKind, SenderSettings};
use crate::domain::template::ContentType;
use crate::services::dispatch::provider::{
    MessageHandler, OutboundMessage, ProviderError, ProviderStrategy, SendResult,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Form fields of a Twilio `Messages.json` request.
#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct SmsRequest {
    from: String,
    to: String,
    body: String,
}

#[derive(Debug, Deserialize)]
struct SmsResponse {
    sid: Option<String>,
    status: Option<String>,
    code: Option<i64>,
    message: Option<String>,
    error_code: Option<i64>,
    error_message: Option<String>,
}

pub(crate) fn build_sms_request(message: &OutboundMessage) -> Result<SmsRequest, ProviderError> {
    let from = message
        .sender
        .phone_number
        .clone()
        .ok_or_else(|| ProviderError::InvalidMessage("the sender has no phone number".into()))?;

    if message.recipients.iter().any(|r| r.recipient_type != RecipientType::To) {
        return Err(ProviderError::InvalidMessage("SMS messages only accept 'To' recipients".into()));
    }
    let [to] = message.recipients.as_slice() else {
        return Err(ProviderError::InvalidMessage(format!(
            "expected exactly one 'To' recipient, found {}",
            message.recipients.len()
        )));
    };
    let to = to
        .phone_number
        .clone()
        .ok_or_else(|| ProviderError::InvalidMessage("the recipient has no phone number".into()))?;

    if message.body.content_type != ContentType::Plain {
        return Err(ProviderError::InvalidMessage("SMS bodies must be plain text".into()));
    }

    Ok(SmsRequest { from, to, body: message.body.text.clone() })
}

#[derive(Clone, Debug)]
pub struct TwilioStrategy {
    client: reqwest::Client,
    base_url: String,
}

impl TwilioStrategy {
    #[must_use]
    pub const fn new(client: reqwest::Client, base_url: String) -> Self {
        Self { client, base_url }
    }
}

impl ProviderStrategy for TwilioStrategy {
    fn provider(&self) -> ProviderKind {
        ProviderKind::TwilioSms
    }

    fn execute(&self, settings: SenderSettings) -> Result<Arc<dyn MessageHandler>, ProviderError> {
        let provider = settings.provider();
        let SenderSettings::TwilioSms { account_sid, auth_token } = settings else {
            return Err(ProviderError::InvalidSettings(format!("expected Twilio settings, got {provider}")));
        };
        if account_sid.trim().is_empty() || auth_token.trim().is_empty() {
            return Err(ProviderError::InvalidSettings("the Twilio account SID and auth token are required".into()));
        }
        Ok(Arc::new(TwilioHandler {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            account_sid,
            auth_token,
        }))
    }
}

pub struct TwilioHandler {
    client: reqwest::Client,
    base_url: String,
    account_sid: String,
    auth_token: String,
}

impl std::fmt::Debug for TwilioHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TwilioHandler")
            .field("base_url", &self.base_url)
            .field("account_sid", &self.account_sid)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl MessageHandler for TwilioHandler {
    async fn send(&self, message: &OutboundMessage) -> Result<SendResult, ProviderError> {
        let request = build_sms_request(message)?;
        let url = format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.base_url.trim_end_matches('/'),
            self.account_sid
        );

        let response = self
            .client
            .post(url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&request)
            .send()
            .await?;

        let status = response.status();
        let mut data = status_data(status);
        record_sms_response(&mut data, response.text().await);

        tracing::debug!(status = %status, "Twilio responded");
        Ok(if status.is_success() { SendResult::success(data) } else { SendResult::failure(data) })
    }
}

/// Copies the SID, status and error fields of a Twilio reply into `data`.
/// A body that cannot be read or parsed is recorded as `BodyError`.
fn record_sms_response<E: std::fmt::Display>(data: &mut ResultData, body: Result<String, E>) {
    let parsed = match body {
        Ok(body) => serde_json::from_str::<SmsResponse>(&body).map_err(|e| e.to_string()),
        Err(e) => Err(e.to_string()),
    };
    let body = match parsed {
        Ok(body) => body,
        Err(e) => {
            data.insert("BodyError", e);
            return;
        }
    };

    if let Some(sid) = body.sid {
        data.insert("MessageSid", sid);
    }
    if let Some(state) = body.status {
        data.insert("Status", state);
    }
    if let Some(code) = body.error_code.or(body.code) {
        data.insert("ErrorCode", code.to_string());
    }
    if let Some(error) = body.error_message.or(body.message) {
        data.insert("ErrorMessage", error);
    }
}
