#![forbid(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::todo)]
#![warn(clippy::panic)]
#![warn(clippy::dbg_macro)]
#![warn(clippy::print_stdout)]
#![warn(clippy::print_stderr)]
#![warn(clippy::clone_on_ref_ptr)]
#![warn(unreachable_pub)]
#![warn(missing_debug_implementations)]
#![warn(unused_qualifications)]
#![deny(unused_must_use)]

pub mod adapters;
pub mod config;
pub mod domain;
pub mod error;
pub mod services;
pub mod telemetry;

use crate::adapters::crypto::RealmCipher;
use crate::adapters::memory::{InMemoryMessageReadModel, InMemoryMessageStore};
use crate::config::Config;
use crate::error::{AppError, Result};
use crate::services::collaborators::{
    LanguageDirectory, MessageReadModel, MessageStore, SenderDirectory, TemplateDirectory, UserDirectory,
};
use crate::services::crypto_service::{ContentCipher, CryptoService};
use crate::services::dispatch::{ProviderDispatcher, ProviderRegistry};
use crate::services::message_service::{Collaborators, MessageService};
use std::sync::Arc;
use std::time::Duration;

/// The wired application.
#[derive(Clone, Debug)]
pub struct App {
    pub message_service: MessageService,
    pub crypto_service: CryptoService,
}

#[derive(Clone, Debug)]
struct Directories {
    senders: Arc<dyn SenderDirectory>,
    templates: Arc<dyn TemplateDirectory>,
    users: Arc<dyn UserDirectory>,
    languages: Arc<dyn LanguageDirectory>,
}

/// Wires services from configuration and injected adapters.
///
/// Only the directory is mandatory. Everything else falls back to the
/// in-memory adapters, the built-in HTTP providers and a cipher derived from
/// the configured master key.
#[derive(Debug)]
pub struct AppBuilder {
    config: Config,
    directories: Option<Directories>,
    store: Option<Arc<dyn MessageStore>>,
    read_model: Option<Arc<dyn MessageReadModel>>,
    registry: Option<ProviderRegistry>,
    cipher: Option<Arc<dyn ContentCipher>>,
}

impl AppBuilder {
    #[must_use]
    pub const fn new(config: Config) -> Self {
        Self { config, directories: None, store: None, read_model: None, registry: None, cipher: None }
    }

    #[must_use]
    pub fn with_directory<D>(mut self, directory: Arc<D>) -> Self
    where
        D: SenderDirectory + TemplateDirectory + UserDirectory + LanguageDirectory + 'static,
    {
        self.directories = Some(Directories {
            senders: Arc::<D>::clone(&directory),
            templates: Arc::<D>::clone(&directory),
            users: Arc::<D>::clone(&directory),
            languages: directory,
        });
        self
    }

    #[must_use]
    pub fn with_message_store(mut self, store: Arc<dyn MessageStore>) -> Self {
        self.store = Some(store);
        self
    }

    #[must_use]
    pub fn with_read_model(mut self, read_model: Arc<dyn MessageReadModel>) -> Self {
        self.read_model = Some(read_model);
        self
    }

    #[must_use]
    pub fn with_provider_registry(mut self, registry: ProviderRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    #[must_use]
    pub fn with_cipher(mut self, cipher: Arc<dyn ContentCipher>) -> Self {
        self.cipher = Some(cipher);
        self
    }

    /// # Errors
    /// Returns `AppError::Internal` if no directory was provided, or
    /// `AppError::Crypto` if the configured master key is invalid.
    pub fn build(self) -> Result<App> {
        let directories =
            self.directories.ok_or_else(|| AppError::Internal("No sender/template/user directory configured".into()))?;

        let cipher = match self.cipher {
            Some(cipher) => cipher,
            None => Arc::new(RealmCipher::from_base64(&self.config.crypto.encryption_key)?),
        };
        let crypto_service = CryptoService::new(cipher);

        let registry = self
            .registry
            .unwrap_or_else(|| adapters::providers::registry(&self.config.providers, &reqwest::Client::new()));
        let dispatcher =
            ProviderDispatcher::new(registry, Duration::from_secs(self.config.dispatch.provider_timeout_secs));

        let collaborators = Collaborators {
            senders: directories.senders,
            templates: directories.templates,
            users: directories.users,
            languages: directories.languages,
            store: self.store.unwrap_or_else(|| Arc::new(InMemoryMessageStore::new())),
            read_model: self.read_model.unwrap_or_else(|| Arc::new(InMemoryMessageReadModel::new())),
        };

        let message_service =
            MessageService::new(collaborators, crypto_service.clone(), dispatcher, &self.config.dispatch);

        Ok(App { message_service, crypto_service })
    }
}
