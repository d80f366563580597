mod common;

use common::{EMAIL_SENDER, NEWSLETTER_TEMPLATE, TestApp, WELCOME_TEMPLATE, payload};
use courier::domain::message::MessageStatus;
use courier::domain::payload::RecipientPayload;
use courier::domain::recipient::RecipientType;
use courier::domain::search::{MessageSort, SearchMessagesQuery, SortOption};
use uuid::Uuid;

fn to(address: &str) -> Vec<RecipientPayload> {
    vec![RecipientPayload::email(RecipientType::To, address)]
}

#[tokio::test]
async fn test_read_message_returns_plaintext() {
    let app = TestApp::new();
    let sent = app.send(payload(EMAIL_SENDER, WELCOME_TEMPLATE, to("ada@example.com"))).await.unwrap();

    let message = app.service.read_message(app.realm_id, sent.ids[0]).await.unwrap().unwrap();

    assert_eq!(message.body, "Hello, Welcome! Token: abc123");
    assert_eq!(message.variables[0].key, "Token");
    assert_eq!(message.variables[0].value, "abc123");
    assert_eq!(message.status, MessageStatus::Succeeded);
    assert_eq!(message.version, 2);
}

#[tokio::test]
async fn test_read_message_is_realm_scoped() {
    let app = TestApp::new();
    let sent = app.send(payload(EMAIL_SENDER, WELCOME_TEMPLATE, to("ada@example.com"))).await.unwrap();

    assert!(app.service.read_message(Uuid::new_v4(), sent.ids[0]).await.unwrap().is_none());
}

#[tokio::test]
async fn test_search_filters_and_sorts() {
    let app = TestApp::new();
    app.provider.fail_for("bounce@example.com");
    app.send(payload(EMAIL_SENDER, WELCOME_TEMPLATE, to("ada@example.com"))).await.unwrap();
    app.send(payload(EMAIL_SENDER, NEWSLETTER_TEMPLATE, to("bounce@example.com"))).await.unwrap();
    let mut demo = payload(EMAIL_SENDER, NEWSLETTER_TEMPLATE, to("demo@example.com"));
    demo.is_demo = true;
    app.send(demo).await.unwrap();

    let failed = SearchMessagesQuery { status: Some(MessageStatus::Failed), ..SearchMessagesQuery::default() };
    let results = app.service.search_messages(app.realm_id, &failed).await.unwrap();
    assert_eq!(results.total, 1);
    assert_eq!(results.items[0].recipients[0].address.as_deref(), Some("bounce@example.com"));
    assert_eq!(results.items[0].body, "<h1>Welcome</h1>");

    let news = SearchMessagesQuery {
        search_terms: vec!["news".into()],
        is_demo: Some(false),
        ..SearchMessagesQuery::default()
    };
    assert_eq!(app.service.search_messages(app.realm_id, &news).await.unwrap().total, 1);

    let by_subject = SearchMessagesQuery {
        sort: vec![SortOption { field: MessageSort::Subject, is_descending: false }],
        ..SearchMessagesQuery::default()
    };
    let subjects: Vec<String> = app
        .service
        .search_messages(app.realm_id, &by_subject)
        .await
        .unwrap()
        .items
        .into_iter()
        .map(|m| m.subject)
        .collect();
    assert_eq!(subjects, ["News", "News", "Welcome aboard"]);
}

#[tokio::test]
async fn test_load_message_at_version() {
    let app = TestApp::new();
    let sent = app.send(payload(EMAIL_SENDER, WELCOME_TEMPLATE, to("ada@example.com"))).await.unwrap();
    let id = sent.ids[0];

    let created = app.service.load_message(app.realm_id, id, Some(1)).await.unwrap().unwrap();
    assert_eq!(created.status(), MessageStatus::Pending);
    assert!(created.result_data().is_empty());

    let latest = app.service.load_message(app.realm_id, id, None).await.unwrap().unwrap();
    assert_eq!(latest.status(), MessageStatus::Succeeded);
    assert_eq!(latest.created_by(), app.actor_id);

    assert!(app.service.load_message(app.realm_id, Uuid::new_v4(), None).await.unwrap().is_none());
}
