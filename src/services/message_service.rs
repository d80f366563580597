use crate::config::DispatchConfig;
use crate::domain::Encrypted;
use crate::domain::locale::Locale;
use crate::domain::message::{Body, Message, MessageCreated};
use crate::domain::payload::{SendMessagePayload, SentMessages};
use crate::domain::search::{MessageDto, SearchMessagesQuery, SearchResults};
use crate::domain::sender::SenderKind;
use crate::domain::template::ContentType;
use crate::domain::variable::{Variable, Variables};
use crate::error::{AppError, Result};
use crate::services::collaborators::{
    LanguageDirectory, MessageReadModel, MessageStore, SenderDirectory, TemplateDirectory, UserDirectory,
};
use crate::services::crypto_service::CryptoService;
use crate::services::dispatch::{PreparedDispatch, ProviderDispatcher};
use crate::services::dispatch::provider::OutboundMessage;
use crate::services::localization_service::{LocalizationService, effective_locale};
use crate::services::recipient_service::RecipientService;
use crate::services::template::{CompiledTemplate, RenderedContent};
use opentelemetry::{global, metrics::Histogram};
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

#[derive(Clone, Debug)]
struct Metrics {
    recipients_per_request: Histogram<u64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("courier");
        Self {
            recipients_per_request: meter
                .u64_histogram("courier_recipients_per_request")
                .with_description("Number of 'To' recipients in a single send request")
                .build(),
        }
    }
}

/// Who is sending, on behalf of which realm, and how to stop them.
#[derive(Clone, Debug)]
pub struct RequestContext {
    pub realm_id: Uuid,
    pub actor_id: Uuid,
    pub cancellation: CancellationToken,
}

impl RequestContext {
    #[must_use]
    pub fn new(realm_id: Uuid, actor_id: Uuid) -> Self {
        Self { realm_id, actor_id, cancellation: CancellationToken::new() }
    }

    #[must_use]
    pub fn with_cancellation(mut self, cancellation: CancellationToken) -> Self {
        self.cancellation = cancellation;
        self
    }
}

/// The lookups and stores a [`MessageService`] works against.
#[derive(Clone, Debug)]
pub struct Collaborators {
    pub senders: Arc<dyn SenderDirectory>,
    pub templates: Arc<dyn TemplateDirectory>,
    pub users: Arc<dyn UserDirectory>,
    pub languages: Arc<dyn LanguageDirectory>,
    pub store: Arc<dyn MessageStore>,
    pub read_model: Arc<dyn MessageReadModel>,
}

#[derive(Clone, Debug)]
pub struct MessageService {
    senders: Arc<dyn SenderDirectory>,
    templates: Arc<dyn TemplateDirectory>,
    recipients: RecipientService,
    localization: LocalizationService,
    store: Arc<dyn MessageStore>,
    read_model: Arc<dyn MessageReadModel>,
    crypto: CryptoService,
    dispatcher: ProviderDispatcher,
    max_concurrency: usize,
    metrics: Metrics,
}

impl MessageService {
    #[must_use]
    pub fn new(
        collaborators: Collaborators,
        crypto: CryptoService,
        dispatcher: ProviderDispatcher,
        config: &DispatchConfig,
    ) -> Self {
        Self {
            senders: collaborators.senders,
            templates: collaborators.templates,
            recipients: RecipientService::new(collaborators.users),
            localization: LocalizationService::new(collaborators.languages),
            store: collaborators.store,
            read_model: collaborators.read_model,
            crypto,
            dispatcher,
            max_concurrency: config.max_concurrency.max(1),
            metrics: Metrics::new(),
        }
    }

    /// Sends the template to every `To` recipient, one message each.
    ///
    /// Request-level problems fail the whole call before anything is sent.
    /// Provider problems only fail the affected message, which is still
    /// recorded and returned.
    ///
    /// # Errors
    /// Returns a validation or lookup error (`Validation`, `SenderNotFound`,
    /// `TemplateNotFound`, `InvalidSmsContentType`, `UsersNotFound`,
    /// `MissingRecipientContacts`, `ToRecipientMissing`, `Template`) with no
    /// message created, `Cancelled` when the context is cancelled, or
    /// `NotPersisted` carrying every sent id and the first persistence error.
    #[tracing::instrument(
        err(level = "warn"),
        skip(self, ctx, payload),
        fields(realm_id = %ctx.realm_id, actor_id = %ctx.actor_id, recipient_count = payload.recipients.len())
    )]
    pub async fn send_message(&self, ctx: &RequestContext, payload: SendMessagePayload) -> Result<SentMessages> {
        payload.validate()?;
        let realm_id = ctx.realm_id;

        let sender = self
            .senders
            .find_sender(realm_id, &payload.sender)
            .await?
            .ok_or_else(|| AppError::SenderNotFound(payload.sender.clone()))?;
        payload.validate_for(sender.kind())?;

        let template = self
            .templates
            .find_template(realm_id, &payload.template)
            .await?
            .ok_or_else(|| AppError::TemplateNotFound(payload.template.clone()))?;
        if sender.kind() == SenderKind::Phone && template.content.content_type != ContentType::Plain {
            return Err(AppError::InvalidSmsContentType {
                template: template.unique_name.clone(),
                content_type: template.content.content_type.to_string(),
            });
        }
        let compiled = CompiledTemplate::compile(&template)?;

        let resolved = self.recipients.resolve(realm_id, &payload.recipients, sender.kind()).await?;
        let dictionaries = self.localization.load(realm_id).await?;
        let target_locale = payload.target_locale();

        let variables: Variables = payload.variables.iter().cloned().collect();
        let encrypted_variables = self.crypto.encrypt_variables(&variables, realm_id)?;
        let settings = self.crypto.decrypt_settings(&sender)?;

        let sender_snapshot = sender.snapshot();
        let template_snapshot = template.snapshot();
        let shared = resolved.recipients.shared();
        let to_count = resolved.recipients.to().len();
        self.metrics.recipients_per_request.record(u64::try_from(to_count).unwrap_or(u64::MAX), &[]);

        let mut rendered: HashMap<Locale, RenderedContent> = HashMap::new();
        let mut prepared = Vec::with_capacity(to_count);
        for to in resolved.recipients.to() {
            let locale = effective_locale(
                payload.ignore_user_locale,
                resolved.user_locale(to),
                target_locale.as_ref(),
                dictionaries.default_locale(),
            );
            let content = match rendered.entry(locale.clone()) {
                Entry::Occupied(entry) => entry.into_mut(),
                Entry::Vacant(entry) => {
                    let content = compiled.render(&dictionaries.for_locale(Some(&locale)), &variables)?;
                    entry.insert(content)
                }
            };

            let mut recipients = Vec::with_capacity(1 + shared.len());
            recipients.push(to.clone());
            recipients.extend(shared.iter().cloned());

            let id = Uuid::now_v7();
            let snapshot = MessageCreated {
                subject: content.subject.clone(),
                body: Body {
                    content_type: content.body.content_type,
                    text: self.crypto.encrypt(&content.body.text, realm_id)?,
                },
                recipients: recipients.clone(),
                sender: sender_snapshot.clone(),
                template: template_snapshot.clone(),
                ignore_user_locale: payload.ignore_user_locale,
                locale: Some(locale),
                variables: encrypted_variables.clone(),
                is_demo: payload.is_demo,
            };
            let message = Message::create(id, realm_id, ctx.actor_id, snapshot)?;
            let outbound = Arc::new(OutboundMessage {
                message_id: id,
                realm_id,
                sender: sender_snapshot.clone(),
                subject: content.subject.clone(),
                body: content.body.clone(),
                recipients,
            });
            prepared.push((message, outbound));
        }
        tracing::debug!(messages = prepared.len(), locales = rendered.len(), "Prepared messages");

        if ctx.cancellation.is_cancelled() {
            return Err(AppError::Cancelled { sent: Vec::new() });
        }

        let dispatch = Arc::new(self.dispatcher.prepare(settings));
        let mut messages = self.dispatch_all(ctx, &dispatch, prepared).await?;
        let ids: Vec<Uuid> = messages.iter().map(Message::id).collect();

        let saved = self.store.save_messages(&mut messages).await;
        for message in messages.iter().filter(|m| m.uncommitted_events().is_empty()) {
            if let Err(e) = self.read_model.save(MessageDto::from(message)).await {
                tracing::warn!(error = %e, message_id = %message.id(), "Failed to project message");
            }
        }
        if let Err(source) = saved {
            return Err(AppError::NotPersisted { sent: ids, source: Box::new(source) });
        }

        if ids.len() < to_count {
            tracing::info!(sent = ids.len(), skipped = to_count - ids.len(), "Send request cancelled");
            return Err(AppError::Cancelled { sent: ids });
        }

        tracing::info!(count = ids.len(), "Messages sent");
        Ok(SentMessages { ids })
    }

    /// Runs every provider call with bounded concurrency and returns the
    /// completed messages in initiation order. Stops starting new calls once
    /// the context is cancelled; calls already running are awaited.
    async fn dispatch_all(
        &self,
        ctx: &RequestContext,
        dispatch: &Arc<PreparedDispatch>,
        prepared: Vec<(Message, Arc<OutboundMessage>)>,
    ) -> Result<Vec<Message>> {
        let semaphore = Arc::new(Semaphore::new(prepared.len().min(self.max_concurrency).max(1)));
        let mut tasks = JoinSet::new();

        for (index, (message, outbound)) in prepared.into_iter().enumerate() {
            let permit = tokio::select! {
                biased;
                () = ctx.cancellation.cancelled() => break,
                permit = Arc::clone(&semaphore).acquire_owned() => {
                    permit.map_err(|e| AppError::Internal(format!("Dispatch semaphore closed: {e}")))?
                }
            };
            let dispatch = Arc::clone(dispatch);
            tasks.spawn(
                async move {
                    let _permit = permit;
                    let result = dispatch.dispatch(outbound).await;
                    (index, message, result)
                }
                .instrument(tracing::Span::current()),
            );
        }

        let mut completed = Vec::with_capacity(tasks.len());
        while let Some(joined) = tasks.join_next().await {
            let (index, mut message, result) =
                joined.map_err(|e| AppError::Internal(format!("Dispatch task failed: {e}")))?;
            if result.succeeded {
                message.succeed(result.data, ctx.actor_id)?;
            } else {
                message.fail(result.data, ctx.actor_id)?;
            }
            completed.push((index, message));
        }

        completed.sort_by_key(|(index, _)| *index);
        Ok(completed.into_iter().map(|(_, message)| message).collect())
    }

    /// Returns a message with its body and variables decrypted.
    ///
    /// # Errors
    /// Returns `AppError::Crypto` if the content does not decrypt for `realm_id`.
    #[tracing::instrument(err(level = "warn"), skip(self))]
    pub async fn read_message(&self, realm_id: Uuid, id: Uuid) -> Result<Option<MessageDto>> {
        match self.read_model.read(realm_id, id).await? {
            Some(message) => Ok(Some(self.decrypt_message(message)?)),
            None => Ok(None),
        }
    }

    /// Searches the realm's messages, decrypting each returned item.
    ///
    /// # Errors
    /// Returns `AppError::Crypto` if any item does not decrypt for `realm_id`.
    #[tracing::instrument(err(level = "warn"), skip(self, query))]
    pub async fn search_messages(
        &self,
        realm_id: Uuid,
        query: &SearchMessagesQuery,
    ) -> Result<SearchResults<MessageDto>> {
        let results = self.read_model.search(realm_id, query).await?;
        let items = results.items.into_iter().map(|m| self.decrypt_message(m)).collect::<Result<Vec<_>>>()?;
        Ok(SearchResults { items, total: results.total })
    }

    /// Rebuilds a message from its events, optionally at an earlier version.
    ///
    /// # Errors
    /// Propagates store failures.
    #[tracing::instrument(err(level = "warn"), skip(self))]
    pub async fn load_message(&self, realm_id: Uuid, id: Uuid, version: Option<i64>) -> Result<Option<Message>> {
        self.store.load(realm_id, id, version).await
    }

    /// Replaces the ciphertext body and variable values with plaintext.
    ///
    /// # Errors
    /// Returns `AppError::Crypto` if the content does not decrypt for the message's realm.
    pub fn decrypt_message(&self, mut message: MessageDto) -> Result<MessageDto> {
        let realm_id = message.realm_id;
        message.body = self.crypto.decrypt(&Encrypted::new(message.body), realm_id)?;
        message.variables = message
            .variables
            .into_iter()
            .map(|v| -> Result<Variable> {
                let value = self.crypto.decrypt(&Encrypted::new(v.value), realm_id)?;
                Ok(Variable { key: v.key, value })
            })
            .collect::<Result<_>>()?;
        Ok(message)
    }
}
