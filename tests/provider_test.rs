//! Provider and dispatch tests against mocked Spark and Zabbix APIs.

use std::sync::Arc;

use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use zpark::config::{Config, TrustedUsers};
use zpark::models::{ErrorCode, Recipient, RoomType, WebhookData, WebhookEvent};
use zpark::providers::{SparkClient, ZabbixClient};
use zpark::tasks::{dispatch, Task, TaskContext, TaskQueue};

fn test_config() -> Config {
    Config {
        api_token: Some("t0k3n".to_string()),
        spark_access_token: "spark-token".to_string(),
        spark_api_url: "http://spark.invalid/v1".to_string(),
        spark_webhook_secret: None,
        trusted_users: TrustedUsers::AllowAll,
        contact_info: Some("Joe <joe@example.com>".to_string()),
        server_url: None,
        zabbix_url: "http://zabbix.invalid/zabbix".to_string(),
        zabbix_username: "api".to_string(),
        zabbix_password: "pw".to_string(),
        zabbix_tls_verify: true,
        host: "127.0.0.1".to_string(),
        port: 0,
        worker_concurrency: 1,
    }
}

// ============================================
// Spark client
// ============================================

#[tokio::test]
async fn test_create_message_to_room() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/messages"))
        .and(body_partial_json(json!({
            "roomId": "room-1",
            "text": "disk full"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "msg-1",
            "roomId": "room-1",
            "text": "disk full"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let spark = SparkClient::new(server.uri(), "token").unwrap();
    let msg = spark
        .create_message(&Recipient::RoomId("room-1".to_string()), "disk full", None)
        .await
        .unwrap();
    assert_eq!(msg.id, "msg-1");
}

#[tokio::test]
async fn test_create_message_to_person_email() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/messages"))
        .and(body_partial_json(json!({ "toPersonEmail": "joe@example.com" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "msg-2",
            "roomId": "direct-room",
            "text": "hi"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let spark = SparkClient::new(server.uri(), "token").unwrap();
    spark
        .create_message(
            &Recipient::PersonEmail("joe@example.com".to_string()),
            "hi",
            None,
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn test_spark_rate_limit_is_retryable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/messages"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;

    let spark = SparkClient::new(server.uri(), "token").unwrap();
    let err = spark
        .create_message(&Recipient::RoomId("room-1".to_string()), "x", None)
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::SparkRateLimited);
    assert!(err.code.is_retryable());
}

#[tokio::test]
async fn test_spark_client_error_is_not_retryable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rooms/nope"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let spark = SparkClient::new(server.uri(), "token").unwrap();
    let err = spark.get_room("nope").await.unwrap_err();
    assert_eq!(err.code, ErrorCode::SparkApiError);
    assert!(!err.code.is_retryable());
}

// ============================================
// Zabbix client
// ============================================

fn rpc_result(result: serde_json::Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "jsonrpc": "2.0",
        "result": result,
        "id": 1
    }))
}

#[tokio::test]
async fn test_api_version_is_unauthenticated() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api_jsonrpc.php"))
        .and(body_partial_json(json!({ "method": "apiinfo.version" })))
        .respond_with(rpc_result(json!("3.4.15")))
        .expect(1)
        .mount(&server)
        .await;

    let zabbix = ZabbixClient::new(&server.uri(), "api", "pw", true).unwrap();
    assert_eq!(zabbix.api_version().await.unwrap(), "3.4.15");
}

#[tokio::test]
async fn test_active_issues_logs_in_and_flattens_hosts() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api_jsonrpc.php"))
        .and(body_partial_json(json!({ "method": "user.login" })))
        .respond_with(rpc_result(json!("auth-token-123")))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api_jsonrpc.php"))
        .and(body_partial_json(json!({
            "method": "trigger.get",
            "auth": "auth-token-123"
        })))
        .respond_with(rpc_result(json!([
            {
                "description": "Lack of free swap space on db1",
                "lastchange": "1509402980",
                "hosts": [{ "host": "db1.example.com" }]
            },
            {
                "description": "No data from agent",
                "lastchange": 1509402000u64,
                "hosts": []
            }
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let zabbix = ZabbixClient::new(&server.uri(), "api", "pw", true).unwrap();
    let issues = zabbix.active_issues().await.unwrap();
    assert_eq!(issues.len(), 2);
    assert_eq!(issues[0].host, "db1.example.com");
    assert_eq!(issues[0].last_change, 1509402980);
    assert_eq!(issues[1].host, "unknown host");
}

async fn mount_count(
    server: &MockServer,
    rpc_method: &str,
    params: serde_json::Value,
    count: serde_json::Value,
) {
    let mut params = params;
    params["countOutput"] = json!(true);
    Mock::given(method("POST"))
        .and(path("/api_jsonrpc.php"))
        .and(body_partial_json(json!({
            "method": rpc_method,
            "params": params
        })))
        .respond_with(rpc_result(count))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_server_status_gathers_all_counts() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api_jsonrpc.php"))
        .and(body_partial_json(json!({ "method": "apiinfo.version" })))
        .respond_with(rpc_result(json!("3.4.15")))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api_jsonrpc.php"))
        .and(body_partial_json(json!({ "method": "user.login" })))
        .respond_with(rpc_result(json!("auth-1")))
        .expect(1)
        .mount(&server)
        .await;

    // The narrower trigger filters must be mounted before the broader
    // ones: partial body matching would otherwise swallow them.
    mount_count(
        &server,
        "trigger.get",
        json!({ "filter": { "status": 0, "value": 0 } }),
        json!("55"),
    )
    .await;
    mount_count(
        &server,
        "trigger.get",
        json!({ "filter": { "status": 0, "value": 1 } }),
        json!(3),
    )
    .await;
    mount_count(
        &server,
        "trigger.get",
        json!({ "filter": { "status": 0 } }),
        json!("60"),
    )
    .await;
    mount_count(
        &server,
        "trigger.get",
        json!({ "filter": { "status": 1 } }),
        json!("2"),
    )
    .await;
    // Zabbix sends counts as strings in some versions and integers in
    // others, so the mocks mix both.
    mount_count(&server, "host.get", json!({ "filter": { "status": 0 } }), json!("13")).await;
    mount_count(&server, "host.get", json!({ "filter": { "status": 1 } }), json!(2)).await;
    mount_count(&server, "template.get", json!({}), json!("39")).await;
    mount_count(&server, "item.get", json!({ "filter": { "status": 0 } }), json!("120")).await;
    mount_count(&server, "item.get", json!({ "filter": { "status": 1 } }), json!(6)).await;
    mount_count(&server, "item.get", json!({ "filter": { "state": 1 } }), json!(7)).await;
    mount_count(&server, "user.get", json!({}), json!(9)).await;
    mount_count(&server, "httptest.get", json!({}), json!("4")).await;

    let zabbix = ZabbixClient::new(&server.uri(), "api", "pw", true).unwrap();
    let status = zabbix.server_status().await.unwrap();

    assert_eq!(status.version, "3.4.15");
    assert_eq!(status.hosts_enabled, 13);
    assert_eq!(status.hosts_disabled, 2);
    assert_eq!(status.templates, 39);
    assert_eq!(status.items_enabled, 120);
    assert_eq!(status.items_disabled, 6);
    assert_eq!(status.items_unsupported, 7);
    assert_eq!(status.triggers_enabled, 60);
    assert_eq!(status.triggers_disabled, 2);
    assert_eq!(status.triggers_ok, 55);
    assert_eq!(status.triggers_problem, 3);
    assert_eq!(status.users, 9);
    assert_eq!(status.web_scenarios, 4);
}

#[tokio::test]
async fn test_expired_session_logs_in_again() {
    let server = MockServer::start().await;
    // The first login hands out a token the server has since expired
    Mock::given(method("POST"))
        .and(path("/api_jsonrpc.php"))
        .and(body_partial_json(json!({ "method": "user.login" })))
        .respond_with(rpc_result(json!("stale-token")))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api_jsonrpc.php"))
        .and(body_partial_json(json!({ "method": "user.login" })))
        .respond_with(rpc_result(json!("fresh-token")))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api_jsonrpc.php"))
        .and(body_partial_json(json!({
            "method": "trigger.get",
            "auth": "stale-token"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "error": {
                "code": -32602,
                "message": "Invalid params.",
                "data": "Session terminated, re-login, please."
            },
            "id": 1
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api_jsonrpc.php"))
        .and(body_partial_json(json!({
            "method": "trigger.get",
            "auth": "fresh-token"
        })))
        .respond_with(rpc_result(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let zabbix = ZabbixClient::new(&server.uri(), "api", "pw", true).unwrap();
    let err = zabbix.active_issues().await.unwrap_err();
    assert_eq!(err.code, ErrorCode::ZabbixApiError);

    // The stale token was dropped from the cache, so the next call
    // authenticates from scratch instead of replaying it.
    assert!(zabbix.active_issues().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_login_failure_maps_to_auth_failed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api_jsonrpc.php"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "error": {
                "code": -32602,
                "message": "Invalid params.",
                "data": "Login name or password is incorrect."
            },
            "id": 1
        })))
        .mount(&server)
        .await;

    let zabbix = ZabbixClient::new(&server.uri(), "api", "wrong", true).unwrap();
    let err = zabbix.active_issues().await.unwrap_err();
    assert_eq!(err.code, ErrorCode::ZabbixAuthFailed);
}

// ============================================
// Webhook dispatch
// ============================================

async fn mock_spark_message(server: &MockServer, text: &str, room_type: RoomType) {
    let room_type = match room_type {
        RoomType::Direct => "direct",
        RoomType::Group => "group",
    };
    Mock::given(method("GET"))
        .and(path("/messages/msg-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "msg-1",
            "roomId": "room-1",
            "text": text,
            "html": text,
            "personId": "person-1",
            "personEmail": "joe@example.com"
        })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rooms/room-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "room-1",
            "title": "Ops",
            "type": room_type
        })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/people/person-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "person-1",
            "emails": ["joe@example.com"],
            "displayName": "Joe User",
            "nickName": "Joe"
        })))
        .mount(server)
        .await;
}

fn webhook_event() -> WebhookEvent {
    WebhookEvent {
        id: "wh-1".to_string(),
        name: Some("Zpark webhook".to_string()),
        resource: "messages".to_string(),
        event: "created".to_string(),
        actor_id: None,
        data: WebhookData {
            id: "msg-1".to_string(),
            room_id: Some("room-1".to_string()),
            person_id: Some("person-1".to_string()),
            person_email: Some("joe@example.com".to_string()),
            created: None,
        },
    }
}

async fn dispatch_context(server: &MockServer) -> (Arc<TaskContext>, tokio::sync::mpsc::UnboundedReceiver<zpark::tasks::QueuedTask>) {
    let (queue, rx) = TaskQueue::new();
    let ctx = Arc::new(TaskContext {
        config: Arc::new(test_config()),
        spark: Arc::new(SparkClient::new(server.uri(), "token").unwrap()),
        zabbix: Arc::new(ZabbixClient::new(&server.uri(), "api", "pw", true).unwrap()),
        queue,
    });
    (ctx, rx)
}

#[tokio::test]
async fn test_dispatch_show_issues_enqueues_report_task() {
    let server = MockServer::start().await;
    mock_spark_message(&server, "show issues", RoomType::Direct).await;
    let (ctx, mut rx) = dispatch_context(&server).await;

    let dispatched = dispatch::dispatch_spark_command(&ctx, &webhook_event())
        .await
        .unwrap();
    assert!(dispatched);

    match rx.recv().await.unwrap().task {
        Task::ReportActiveIssues { room, caller } => {
            assert_eq!(room.id, "room-1");
            assert_eq!(caller.id, "person-1");
        }
        other => panic!("unexpected task: {:?}", other),
    }
}

#[tokio::test]
async fn test_dispatch_hello_enqueues_hello_task() {
    let server = MockServer::start().await;
    mock_spark_message(&server, "hello", RoomType::Direct).await;
    let (ctx, mut rx) = dispatch_context(&server).await;

    assert!(dispatch::dispatch_spark_command(&ctx, &webhook_event())
        .await
        .unwrap());
    assert!(matches!(
        rx.recv().await.unwrap().task,
        Task::SayHello { .. }
    ));
}

#[tokio::test]
async fn test_dispatch_unknown_command_enqueues_nothing() {
    let server = MockServer::start().await;
    mock_spark_message(&server, "make me a sandwich", RoomType::Direct).await;
    let (ctx, mut rx) = dispatch_context(&server).await;

    let dispatched = dispatch::dispatch_spark_command(&ctx, &webhook_event())
        .await
        .unwrap();
    assert!(!dispatched);
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_failed_report_notifies_caller_on_first_attempt_only() {
    use zpark::models::{Person, Room};
    use zpark::tasks::commands;

    let server = MockServer::start().await;
    // Zabbix is down
    Mock::given(method("POST"))
        .and(path("/api_jsonrpc.php"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    // The failure notice lands here; exactly once across both attempts
    Mock::given(method("POST"))
        .and(path("/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "msg-9",
            "roomId": "room-1",
            "text": "x"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (ctx, _rx) = dispatch_context(&server).await;
    let room = Room {
        id: "room-1".to_string(),
        title: "Ops".to_string(),
        room_type: RoomType::Direct,
    };
    let caller = Person {
        id: "person-1".to_string(),
        emails: vec!["joe@example.com".to_string()],
        display_name: Some("Joe User".to_string()),
        nick_name: Some("Joe".to_string()),
    };

    let err = commands::report_active_issues(&ctx, &room, &caller, 0)
        .await
        .unwrap_err();
    assert!(err.code.is_retryable());

    // A retry must not notify again
    commands::report_active_issues(&ctx, &room, &caller, 1)
        .await
        .unwrap_err();
}

#[tokio::test]
async fn test_dispatch_group_message_without_mention_is_dropped() {
    let server = MockServer::start().await;
    // Group room but no spark-mention in the html, so the bot was not
    // addressed and the message must be ignored.
    mock_spark_message(&server, "show issues", RoomType::Group).await;
    let (ctx, mut rx) = dispatch_context(&server).await;

    let dispatched = dispatch::dispatch_spark_command(&ctx, &webhook_event())
        .await
        .unwrap();
    assert!(!dispatched);
    assert!(rx.try_recv().is_err());
}
