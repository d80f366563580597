//! HTTP provider handlers built from decrypted sender settings.

mod sendgrid;
mod twilio;

pub use sendgrid::{SendGridHandler, SendGridStrategy};
pub use twilio::{TwilioHandler, TwilioStrategy};

use crate::config::ProviderConfig;
use crate::domain::message::ResultData;
use crate::services::dispatch::ProviderRegistry;
use std::sync::Arc;

/// Registry with every built-in provider.
#[must_use]
pub fn registry(config: &ProviderConfig, client: &reqwest::Client) -> ProviderRegistry {
    ProviderRegistry::new()
        .with(Arc::new(SendGridStrategy::new(client.clone(), config.sendgrid_base_url.clone())))
        .with(Arc::new(TwilioStrategy::new(client.clone(), config.twilio_base_url.clone())))
}

fn status_data(status: reqwest::StatusCode) -> ResultData {
    let mut data = ResultData::new().with("StatusCode", status.as_u16().to_string());
    if let Some(reason) = status.canonical_reason() {
        data.insert("ReasonPhrase", reason);
    }
    data
}
