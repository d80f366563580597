#![allow(dead_code)]

use async_trait::async_trait;
use courier::AppBuilder;
use courier::adapters::crypto::RealmCipher;
use courier::adapters::memory::{InMemoryDirectory, InMemoryMessageReadModel, InMemoryMessageStore};
use courier::config::Config;
use courier::domain::dictionary::Dictionary;
use courier::domain::locale::Locale;
use courier::domain::message::{Message, ResultData};
use courier::domain::payload::{RecipientPayload, SendMessagePayload, SentMessages};
use courier::domain::sender::{ProviderKind, Sender, SenderSettings};
use courier::domain::template::{Content, Template};
use courier::domain::user::User;
use courier::domain::variable::Variable;
use courier::error::{AppError, Result};
use courier::services::collaborators::MessageStore;
use courier::services::crypto_service::CryptoService;
use courier::services::dispatch::ProviderRegistry;
use courier::services::dispatch::provider::{
    MessageHandler, OutboundMessage, ProviderError, ProviderStrategy, SendResult,
};
use courier::services::message_service::{MessageService, RequestContext};
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

pub const EMAIL_SENDER: &str = "notifications";
pub const SMS_SENDER: &str = "sms";
pub const WELCOME_TEMPLATE: &str = "welcome";
pub const NEWSLETTER_TEMPLATE: &str = "newsletter";
pub const CODE_TEMPLATE: &str = "code";

/// Records what the fake providers were asked to send and lets tests script failures.
#[derive(Debug, Default)]
pub struct ProviderLog {
    sent: Mutex<Vec<OutboundMessage>>,
    failing: Mutex<HashSet<String>>,
    panicking: Mutex<HashSet<String>>,
    delay: Mutex<Option<Duration>>,
    cancel_on_send: Mutex<Option<CancellationToken>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ProviderLog {
    pub fn sent(&self) -> Vec<OutboundMessage> {
        self.sent.lock().unwrap().clone()
    }

    /// Sends to this address or phone number return a transport error.
    pub fn fail_for(&self, contact: &str) {
        self.failing.lock().unwrap().insert(contact.to_string());
    }

    /// Sends to this address or phone number panic inside the handler.
    pub fn panic_for(&self, contact: &str) {
        self.panicking.lock().unwrap().insert(contact.to_string());
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    /// Cancels `token` as soon as the first send starts.
    pub fn cancel_on_send(&self, token: CancellationToken) {
        *self.cancel_on_send.lock().unwrap() = Some(token);
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[derive(Debug)]
struct FakeStrategy {
    kind: ProviderKind,
    log: Arc<ProviderLog>,
}

impl ProviderStrategy for FakeStrategy {
    fn provider(&self) -> ProviderKind {
        self.kind
    }

    fn execute(&self, settings: SenderSettings) -> std::result::Result<Arc<dyn MessageHandler>, ProviderError> {
        if settings.provider() != self.kind {
            return Err(ProviderError::InvalidSettings("wrong provider".into()));
        }
        Ok(Arc::new(FakeHandler { log: Arc::clone(&self.log) }))
    }
}

#[derive(Debug)]
struct FakeHandler {
    log: Arc<ProviderLog>,
}

#[async_trait]
impl MessageHandler for FakeHandler {
    async fn send(&self, message: &OutboundMessage) -> std::result::Result<SendResult, ProviderError> {
        let to = message.recipients.first().expect("every message has a To recipient");
        let contact = to.address.clone().or_else(|| to.phone_number.clone()).unwrap_or_default();

        let in_flight = self.log.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.log.max_in_flight.fetch_max(in_flight, Ordering::SeqCst);

        let token = self.log.cancel_on_send.lock().unwrap().clone();
        if let Some(token) = token {
            token.cancel();
        }
        let delay = *self.log.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        self.log.sent.lock().unwrap().push(message.clone());
        self.log.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.log.panicking.lock().unwrap().contains(&contact) {
            panic!("provider client crashed for {contact}");
        }
        if self.log.failing.lock().unwrap().contains(&contact) {
            return Err(ProviderError::Other(anyhow::anyhow!("connection reset by peer")));
        }
        Ok(SendResult::success(
            ResultData::new().with("StatusCode", "202").with("MessageId", message.message_id.to_string()),
        ))
    }
}

/// Delegates to the in-memory store but refuses messages addressed to a rejected contact.
#[derive(Debug)]
pub struct RejectingStore {
    inner: Arc<InMemoryMessageStore>,
    rejected: Mutex<HashSet<String>>,
}

impl RejectingStore {
    pub fn new(inner: Arc<InMemoryMessageStore>) -> Self {
        Self { inner, rejected: Mutex::new(HashSet::new()) }
    }

    pub fn reject(&self, contact: &str) {
        self.rejected.lock().unwrap().insert(contact.to_string());
    }
}

#[async_trait]
impl MessageStore for RejectingStore {
    async fn save_messages(&self, messages: &mut [Message]) -> Result<()> {
        let mut first_error = None;
        for message in messages.iter_mut() {
            let contact = message.recipients().first().and_then(|r| r.address.clone()).unwrap_or_default();
            let result = if self.rejected.lock().unwrap().contains(&contact) {
                Err(AppError::Conflict(format!("Message {} rejected by store", message.id())))
            } else {
                self.inner.save_messages(std::slice::from_mut(message)).await
            };
            if let Err(e) = result {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    async fn load(&self, realm_id: Uuid, id: Uuid, version: Option<i64>) -> Result<Option<Message>> {
        self.inner.load(realm_id, id, version).await
    }
}

pub struct TestApp {
    pub realm_id: Uuid,
    pub actor_id: Uuid,
    pub directory: Arc<InMemoryDirectory>,
    pub store: Arc<InMemoryMessageStore>,
    pub read_model: Arc<InMemoryMessageReadModel>,
    pub provider: Arc<ProviderLog>,
    pub crypto: CryptoService,
    pub service: MessageService,
}

impl TestApp {
    pub fn new() -> Self {
        Self::build(Config::default(), &[ProviderKind::SendGridEmail, ProviderKind::TwilioSms], |store| store)
    }

    pub fn with_config(config: Config) -> Self {
        Self::build(config, &[ProviderKind::SendGridEmail, ProviderKind::TwilioSms], |store| store)
    }

    /// An app whose registry only knows `providers`.
    pub fn with_providers(providers: &[ProviderKind]) -> Self {
        Self::build(Config::default(), providers, |store| store)
    }

    /// An app that saves through the store returned by `wrap`. `TestApp::store`
    /// stays the in-memory store underneath.
    pub fn with_store(wrap: impl FnOnce(Arc<InMemoryMessageStore>) -> Arc<dyn MessageStore>) -> Self {
        Self::build(Config::default(), &[ProviderKind::SendGridEmail, ProviderKind::TwilioSms], wrap)
    }

    fn build(
        config: Config,
        providers: &[ProviderKind],
        wrap: impl FnOnce(Arc<InMemoryMessageStore>) -> Arc<dyn MessageStore>,
    ) -> Self {
        courier::telemetry::init_test_telemetry();

        let realm_id = Uuid::new_v4();
        let directory = Arc::new(InMemoryDirectory::default());
        let store = Arc::new(InMemoryMessageStore::new());
        let message_store = wrap(store.clone());
        let read_model = Arc::new(InMemoryMessageReadModel::new());
        let provider = Arc::new(ProviderLog::default());

        let registry = providers.iter().fold(ProviderRegistry::new(), |registry, kind| {
            registry.with(Arc::new(FakeStrategy { kind: *kind, log: Arc::clone(&provider) }))
        });
        let cipher = RealmCipher::from_base64(&RealmCipher::generate_key()).unwrap();

        let app = AppBuilder::new(config)
            .with_directory(directory.clone())
            .with_message_store(message_store)
            .with_read_model(read_model.clone())
            .with_provider_registry(registry)
            .with_cipher(Arc::new(cipher))
            .build()
            .unwrap();

        let test_app = Self {
            realm_id,
            actor_id: Uuid::new_v4(),
            directory,
            store,
            read_model,
            provider,
            crypto: app.crypto_service,
            service: app.message_service,
        };
        test_app.seed();
        test_app
    }

    fn seed(&self) {
        let realm_id = self.realm_id;
        self.directory.set_default_locale(realm_id, locale("en"));
        self.directory.add_dictionary(
            realm_id,
            dictionary("en", &[("greeting", "Welcome"), ("subject.welcome", "Welcome aboard"), ("subject.news", "News")]),
        );
        self.directory
            .add_dictionary(realm_id, dictionary("fr", &[("greeting", "Bienvenue"), ("subject.welcome", "Bienvenue à bord")]));

        self.add_sender(
            EMAIL_SENDER,
            ProviderKind::SendGridEmail,
            &SenderSettings::SendGridEmail { api_key: "SG.test".into() },
        );
        self.add_sender(
            SMS_SENDER,
            ProviderKind::TwilioSms,
            &SenderSettings::TwilioSms { account_sid: "AC123".into(), auth_token: "token".into() },
        );

        self.add_template(
            WELCOME_TEMPLATE,
            "subject.welcome",
            Content::plain(r#"Hello, @Resource("greeting")! Token: @Variable("Token")"#),
        );
        self.add_template(NEWSLETTER_TEMPLATE, "subject.news", Content::html(r#"<h1>@Resource("greeting")</h1>"#));
        self.add_template(CODE_TEMPLATE, "Code", Content::plain(r#"Your code is @Variable("Token")"#));
    }

    pub fn add_sender(&self, name: &str, provider: ProviderKind, settings: &SenderSettings) -> Sender {
        let sender = Sender {
            id: Uuid::new_v4(),
            realm_id: self.realm_id,
            unique_name: name.to_string(),
            provider,
            email_address: Some("noreply@example.com".into()),
            phone_number: Some("+15555550100".into()),
            display_name: Some("Example".into()),
            settings: self.crypto.encrypt_settings(settings, self.realm_id).unwrap(),
        };
        self.directory.add_sender(sender.clone());
        sender
    }

    pub fn add_template(&self, name: &str, subject: &str, content: Content) -> Template {
        let template = Template {
            id: Uuid::new_v4(),
            realm_id: self.realm_id,
            unique_name: name.to_string(),
            display_name: None,
            subject: subject.to_string(),
            content,
        };
        self.directory.add_template(template.clone());
        template
    }

    pub fn add_user(&self, email: Option<&str>, phone: Option<&str>, user_locale: Option<&str>) -> User {
        let user = User {
            id: Uuid::new_v4(),
            realm_id: self.realm_id,
            email_address: email.map(str::to_string),
            phone_number: phone.map(str::to_string),
            full_name: Some("Test User".into()),
            locale: user_locale.map(locale),
        };
        self.directory.add_user(user.clone());
        user
    }

    pub fn ctx(&self) -> RequestContext {
        RequestContext::new(self.realm_id, self.actor_id)
    }

    pub async fn send(&self, payload: SendMessagePayload) -> Result<SentMessages> {
        self.service.send_message(&self.ctx(), payload).await
    }

    pub async fn message(&self, id: Uuid) -> Message {
        self.store.load(self.realm_id, id, None).await.unwrap().expect("message was saved")
    }

    pub fn decrypt(&self, message: &Message) -> String {
        self.crypto.decrypt(&message.body().text, self.realm_id).unwrap()
    }
}

pub fn locale(tag: &str) -> Locale {
    Locale::parse(tag).unwrap()
}

pub fn dictionary(tag: &str, entries: &[(&str, &str)]) -> Dictionary {
    Dictionary {
        locale: locale(tag),
        entries: entries.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())).collect::<BTreeMap<_, _>>(),
    }
}

/// A payload with the `Token` variable set to `abc123`.
pub fn payload(sender: &str, template: &str, recipients: Vec<RecipientPayload>) -> SendMessagePayload {
    SendMessagePayload {
        sender: sender.to_string(),
        template: template.to_string(),
        recipients,
        ignore_user_locale: false,
        locale: None,
        variables: vec![Variable { key: "Token".into(), value: "abc123".into() }],
        is_demo: false,
    }
}
