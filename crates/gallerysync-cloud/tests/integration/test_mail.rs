//! Integration tests for the Resend alert adapter

use wiremock::matchers::{bearer_token, body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use gallerysync_cloud::{LogNotifier, ResendNotifier};
use gallerysync_core::ports::{INotificationService, Notification};

#[tokio::test]
async fn test_resend_posts_email() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/emails"))
        .and(bearer_token("re_test"))
        .and(body_json(serde_json::json!({
            "from": "sync@example.org",
            "to": ["ops@example.org"],
            "subject": "gallery sync failing",
            "text": "3 consecutive failures"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "em_1"})))
        .expect(1)
        .mount(&server)
        .await;

    let notifier = ResendNotifier::new(
        "re_test",
        "sync@example.org",
        vec!["ops@example.org".to_string()],
    )
    .with_base_url(server.uri());

    notifier
        .notify(&Notification::error("gallery sync failing", "3 consecutive failures"))
        .await
        .expect("notify");
}

#[tokio::test]
async fn test_resend_rejection_is_an_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/emails"))
        .respond_with(ResponseTemplate::new(422))
        .mount(&server)
        .await;

    let notifier = ResendNotifier::new("re_test", "a@b.c", vec!["d@e.f".to_string()])
        .with_base_url(server.uri());

    assert!(notifier.notify(&Notification::new("t", "b")).await.is_err());
}

#[tokio::test]
async fn test_log_notifier_never_fails() {
    let notifier = LogNotifier::new();
    assert!(notifier.notify(&Notification::error("t", "b")).await.is_ok());
}
