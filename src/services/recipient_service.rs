use crate::domain::locale::Locale;
use crate::domain::payload::RecipientPayload;
use crate::domain::recipient::{Recipient, Recipients};
use crate::domain::sender::SenderKind;
use crate::domain::user::User;
use crate::error::{AppError, Result};
use crate::services::collaborators::UserDirectory;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Recipients grouped by type, plus the users they were resolved from.
#[derive(Debug, Clone, Default)]
pub struct ResolvedRecipients {
    pub recipients: Recipients,
    users: HashMap<Uuid, User>,
}

impl ResolvedRecipients {
    /// The preferred locale of the user behind `recipient`, if any.
    #[must_use]
    pub fn user_locale(&self, recipient: &Recipient) -> Option<&Locale> {
        recipient.user_id.and_then(|id| self.users.get(&id)).and_then(|user| user.locale.as_ref())
    }
}

#[derive(Clone, Debug)]
pub struct RecipientService {
    users: Arc<dyn UserDirectory>,
}

impl RecipientService {
    pub fn new(users: Arc<dyn UserDirectory>) -> Self {
        Self { users }
    }

    /// Resolves every payload entry into a concrete recipient.
    ///
    /// All entries are examined before failing, so an error lists every
    /// offending user id.
    ///
    /// # Errors
    /// Returns, in order of precedence, `AppError::UsersNotFound`,
    /// `AppError::MissingRecipientContacts` or `AppError::ToRecipientMissing`.
    #[tracing::instrument(
        err(level = "warn"),
        skip(self, payloads),
        fields(recipient_count = payloads.len())
    )]
    pub async fn resolve(
        &self,
        realm_id: Uuid,
        payloads: &[RecipientPayload],
        kind: SenderKind,
    ) -> Result<ResolvedRecipients> {
        let mut user_ids: Vec<Uuid> = payloads.iter().filter_map(|p| p.user_id).collect();
        user_ids.sort_unstable();
        user_ids.dedup();

        let users: HashMap<Uuid, User> = if user_ids.is_empty() {
            HashMap::new()
        } else {
            self.users.load_users(realm_id, &user_ids).await?.into_iter().map(|u| (u.id, u)).collect()
        };

        let mut missing_users = Vec::new();
        let mut missing_contacts = Vec::new();
        let mut recipients = Recipients::default();

        for payload in payloads {
            let Some(user_id) = payload.user_id else {
                recipients.push(Recipient {
                    recipient_type: payload.recipient_type,
                    address: payload.email.clone(),
                    phone_number: payload.phone.clone(),
                    display_name: payload.display_name.clone(),
                    user_id: None,
                });
                continue;
            };

            let Some(user) = users.get(&user_id) else {
                push_unique(&mut missing_users, user_id);
                continue;
            };

            let has_contact = match kind {
                SenderKind::Email => user.email_address.is_some(),
                SenderKind::Phone => user.phone_number.is_some(),
            };
            if !has_contact {
                push_unique(&mut missing_contacts, user_id);
                continue;
            }

            recipients.push(Recipient {
                recipient_type: payload.recipient_type,
                address: user.email_address.clone(),
                phone_number: user.phone_number.clone(),
                display_name: payload.display_name.clone().or_else(|| user.full_name.clone()),
                user_id: Some(user_id),
            });
        }

        if !missing_users.is_empty() {
            return Err(AppError::UsersNotFound(missing_users));
        }
        if !missing_contacts.is_empty() {
            return Err(AppError::MissingRecipientContacts(missing_contacts));
        }
        if recipients.to().is_empty() {
            return Err(AppError::ToRecipientMissing);
        }

        Ok(ResolvedRecipients { recipients, users })
    }
}

fn push_unique(ids: &mut Vec<Uuid>, id: Uuid) {
    if !ids.contains(&id) {
        ids.push(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryDirectory;
    use crate::domain::recipient::RecipientType;

    fn user(realm_id: Uuid, email: Option<&str>, phone: Option<&str>) -> User {
        User {
            id: Uuid::new_v4(),
            realm_id,
            email_address: email.map(str::to_string),
            phone_number: phone.map(str::to_string),
            full_name: Some("Ada Lovelace".into()),
            locale: None,
        }
    }

    fn setup() -> (Uuid, Arc<InMemoryDirectory>, RecipientService) {
        let realm_id = Uuid::new_v4();
        let directory = Arc::new(InMemoryDirectory::default());
        let service = RecipientService::new(directory.clone());
        (realm_id, directory, service)
    }

    #[tokio::test]
    async fn test_user_and_contact_entries_are_resolved() {
        let (realm_id, directory, service) = setup();
        let ada = user(realm_id, Some("ada@example.com"), None);
        directory.add_user(ada.clone());

        let payloads = vec![
            RecipientPayload::user(RecipientType::To, ada.id),
            RecipientPayload::email(RecipientType::Cc, "boss@example.com"),
        ];
        let resolved = service.resolve(realm_id, &payloads, SenderKind::Email).await.unwrap();

        let to = &resolved.recipients.to()[0];
        assert_eq!(to.address.as_deref(), Some("ada@example.com"));
        assert_eq!(to.display_name.as_deref(), Some("Ada Lovelace"));
        assert_eq!(to.user_id, Some(ada.id));
        assert_eq!(resolved.recipients.cc()[0].address.as_deref(), Some("boss@example.com"));
    }

    #[tokio::test]
    async fn test_user_without_email_is_reported() {
        let (realm_id, directory, service) = setup();
        let u1 = user(realm_id, None, Some("+15555550100"));
        directory.add_user(u1.clone());

        let payloads = vec![RecipientPayload::user(RecipientType::To, u1.id)];
        let err = service.resolve(realm_id, &payloads, SenderKind::Email).await.unwrap_err();

        match err {
            AppError::MissingRecipientContacts(ids) => assert_eq!(ids, vec![u1.id]),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_every_problem_is_accumulated() {
        let (realm_id, directory, service) = setup();
        let no_phone = user(realm_id, Some("a@example.com"), None);
        directory.add_user(no_phone.clone());
        let ghost_one = Uuid::new_v4();
        let ghost_two = Uuid::new_v4();

        let payloads = vec![
            RecipientPayload::user(RecipientType::To, ghost_one),
            RecipientPayload::user(RecipientType::To, no_phone.id),
            RecipientPayload::user(RecipientType::To, ghost_two),
            RecipientPayload::user(RecipientType::To, ghost_one),
        ];
        let err = service.resolve(realm_id, &payloads, SenderKind::Phone).await.unwrap_err();

        match err {
            AppError::UsersNotFound(ids) => assert_eq!(ids, vec![ghost_one, ghost_two]),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(directory.user_load_count(), 1);
    }

    #[tokio::test]
    async fn test_users_from_another_realm_are_not_found() {
        let (realm_id, directory, service) = setup();
        let stranger = user(Uuid::new_v4(), Some("x@example.com"), None);
        directory.add_user(stranger.clone());

        let payloads = vec![RecipientPayload::user(RecipientType::To, stranger.id)];
        let err = service.resolve(realm_id, &payloads, SenderKind::Email).await.unwrap_err();

        assert!(matches!(err, AppError::UsersNotFound(ids) if ids == vec![stranger.id]));
    }

    #[tokio::test]
    async fn test_at_least_one_to_is_required() {
        let (realm_id, directory, service) = setup();

        let payloads = vec![
            RecipientPayload::email(RecipientType::Cc, "cc@example.com"),
            RecipientPayload::email(RecipientType::Bcc, "bcc@example.com"),
        ];
        let err = service.resolve(realm_id, &payloads, SenderKind::Email).await.unwrap_err();

        assert!(matches!(err, AppError::ToRecipientMissing));
        assert_eq!(directory.user_load_count(), 0);
    }

    #[tokio::test]
    async fn test_user_locale_is_exposed() {
        let (realm_id, directory, service) = setup();
        let mut ada = user(realm_id, Some("ada@example.com"), None);
        ada.locale = Some(Locale::parse("fr-CA").unwrap());
        directory.add_user(ada.clone());

        let payloads = vec![
            RecipientPayload::user(RecipientType::To, ada.id),
            RecipientPayload::email(RecipientType::To, "anon@example.com"),
        ];
        let resolved = service.resolve(realm_id, &payloads, SenderKind::Email).await.unwrap();

        let to = resolved.recipients.to();
        assert_eq!(resolved.user_locale(&to[0]).map(ToString::to_string).as_deref(), Some("fr-CA"));
        assert_eq!(resolved.user_locale(&to[1]), None);
    }
}
