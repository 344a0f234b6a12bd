use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::State,
    http::{HeaderMap, Method, StatusCode, Uri},
    Router,
};
use futures::FutureExt;
use serde_json::Value;
use tether_core::config::DiscordConfig;
use tether_discord::{
    deferred::run_delivery, Command, CommandRegistry, CommandReply, DeliveryOutcome,
    DiscordRestClient, FollowupError, FollowupTransport, HandlerError, RestError, RetrySchedule,
};
use tokio::sync::Mutex;

#[derive(Clone, Debug)]
struct SeenRequest {
    method: Method,
    path: String,
    authorization: Option<String>,
    content_type: Option<String>,
    body: Value,
}

#[derive(Clone, Default)]
struct FakeDiscord {
    seen: Arc<Mutex<Vec<SeenRequest>>>,
}

async fn record(
    State(fake): State<FakeDiscord>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: String,
) -> (StatusCode, String) {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok()).map(str::to_owned);
    let body: Value = serde_json::from_str(&body).unwrap_or(Value::Null);
    let path = uri.path().to_owned();

    fake.seen.lock().await.push(SeenRequest {
        method: method.clone(),
        path: path.clone(),
        authorization: header("authorization"),
        content_type: header("content-type"),
        body: body.clone(),
    });

    if body.get("name").and_then(Value::as_str) == Some("broken") {
        return (StatusCode::BAD_REQUEST, r#"{"message":"Invalid Form Body"}"#.to_owned());
    }
    if path.contains("/webhooks/") && path.contains("/expired/") {
        return (StatusCode::NOT_FOUND, r#"{"message":"Unknown Webhook"}"#.to_owned());
    }
    if path.contains("/channels/") {
        return (StatusCode::OK, r#"{"id":"m-1","content":"hello"}"#.to_owned());
    }
    (StatusCode::OK, "{}".to_owned())
}

async fn spawn_fake_discord() -> (SocketAddr, FakeDiscord) {
    let fake = FakeDiscord::default();
    let app = Router::new().fallback(record).with_state(fake.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind fake api");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("fake api serves");
    });
    (addr, fake)
}

fn config(addr: SocketAddr, bot_token: Option<&str>) -> DiscordConfig {
    DiscordConfig {
        public_key: "ab".repeat(32),
        application_id: "777".to_owned(),
        api_base_url: format!("http://{addr}/api/v10"),
        bot_token: bot_token.map(|token| token.to_owned().into()),
        channel_id: Some("100".to_owned()),
        request_timeout_secs: 10,
    }
}

// Accepts connections and holds them open without ever writing a response.
async fn spawn_silent_listener() -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind silent api");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });
    addr
}

#[tokio::test]
async fn follow_up_edit_is_an_unauthenticated_json_patch() {
    let (addr, fake) = spawn_fake_discord().await;
    let client = DiscordRestClient::new(&config(addr, Some("bot-secret"))).expect("client");

    client.edit_original("tok-abc", "report ready").await.expect("edit succeeds");

    let seen = fake.seen.lock().await.clone();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].method, Method::PATCH);
    assert_eq!(seen[0].path, "/api/v10/webhooks/777/tok-abc/messages/@original");
    assert_eq!(seen[0].authorization, None);
    assert_eq!(seen[0].content_type.as_deref(), Some("application/json"));
    assert_eq!(seen[0].body, serde_json::json!({ "content": "report ready" }));
}

#[tokio::test]
async fn follow_up_failure_status_is_reported_and_retried() {
    let (addr, fake) = spawn_fake_discord().await;
    let client = DiscordRestClient::new(&config(addr, None)).expect("client");
    let schedule = RetrySchedule::new(vec![Duration::from_millis(5), Duration::from_millis(5)]);

    let outcome = run_delivery(
        &client,
        &schedule,
        "expired",
        async { Ok::<_, HandlerError>("late".to_owned()) }.boxed(),
        "interaction-1",
    )
    .await;

    assert_eq!(outcome, DeliveryOutcome::Exhausted { attempts: 3 });
    assert_eq!(fake.seen.lock().await.len(), 3);
}

#[tokio::test]
async fn follow_up_edit_times_out_when_the_api_never_answers() {
    let addr = spawn_silent_listener().await;
    let mut config = config(addr, None);
    config.request_timeout_secs = 1;
    let client = DiscordRestClient::new(&config).expect("client");

    let result = tokio::time::timeout(
        Duration::from_secs(5),
        client.edit_original("tok", "never seen"),
    )
    .await
    .expect("edit gives up on its own before the guard");

    match result {
        Err(FollowupError::Request(message)) => assert!(message.contains("timed out"), "{message}"),
        other => panic!("unexpected result: {other:?}"),
    }
}

#[tokio::test]
async fn silent_api_exhausts_the_retry_schedule() {
    let addr = spawn_silent_listener().await;
    let mut config = config(addr, None);
    config.request_timeout_secs = 1;
    let client = DiscordRestClient::new(&config).expect("client");
    let schedule = RetrySchedule::new(vec![Duration::from_millis(5)]);

    let outcome = tokio::time::timeout(
        Duration::from_secs(10),
        run_delivery(
            &client,
            &schedule,
            "tok",
            async { Ok::<_, HandlerError>("late".to_owned()) }.boxed(),
            "interaction-2",
        ),
    )
    .await
    .expect("delivery finishes once every attempt has timed out");

    assert_eq!(outcome, DeliveryOutcome::Exhausted { attempts: 2 });
}

#[tokio::test]
async fn send_message_uses_bot_authorization_and_default_channel() {
    let (addr, fake) = spawn_fake_discord().await;
    let client = DiscordRestClient::new(&config(addr, Some("bot-secret"))).expect("client");

    let body = client.send_message("hello", None).await.expect("message sent");
    assert!(body.contains("m-1"));

    client.send_message("elsewhere", Some("200")).await.expect("message sent");

    let seen = fake.seen.lock().await.clone();
    assert_eq!(seen[0].method, Method::POST);
    assert_eq!(seen[0].path, "/api/v10/channels/100/messages");
    assert_eq!(seen[0].authorization.as_deref(), Some("Bot bot-secret"));
    assert_eq!(seen[0].body, serde_json::json!({ "content": "hello" }));
    assert_eq!(seen[1].path, "/api/v10/channels/200/messages");
}

#[tokio::test]
async fn register_commands_reports_each_command() {
    let (addr, fake) = spawn_fake_discord().await;
    let client = DiscordRestClient::new(&config(addr, Some("bot-secret"))).expect("client");
    let mut registry = CommandRegistry::new();
    registry
        .register(Command::new("status", "Check the status of the Discord bot.", || {
            CommandReply::immediate("ok")
        }))
        .expect("status registers");
    registry
        .register(Command::new("broken", "Rejected upstream.", || CommandReply::immediate("x")))
        .expect("broken registers");

    let report = client.register_commands(&registry).await;

    assert!(!report.all_ok);
    assert_eq!(report.results.len(), 2);
    let broken = report.results.iter().find(|r| r.name == "broken").expect("broken result");
    assert!(!broken.ok);
    assert!(broken.error.as_deref().unwrap_or_default().contains("400"));
    let status = report.results.iter().find(|r| r.name == "status").expect("status result");
    assert!(status.ok);

    let seen = fake.seen.lock().await.clone();
    assert!(seen.iter().all(|request| request.path == "/api/v10/applications/777/commands"));
    assert!(seen.iter().any(|request| request.body
        == serde_json::json!({
            "name": "status",
            "description": "Check the status of the Discord bot."
        })));
}

#[tokio::test]
async fn upstream_rejection_surfaces_status_and_body() {
    let (addr, _fake) = spawn_fake_discord().await;
    let client = DiscordRestClient::new(&config(addr, Some("bot-secret"))).expect("client");

    let error = client.register_command("broken", "nope").await.expect_err("rejected");

    match error {
        RestError::Status { status, body } => {
            assert_eq!(status, 400);
            assert!(body.contains("Invalid Form Body"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}
