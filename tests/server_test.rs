//! Served gateway: typed client, hot reload and graceful shutdown.

use std::time::Duration;

use comp_gateway::client::{ClientError, GatewayClient, NewComment};
use serde_json::json;
use wiremock::{
    matchers::{body_json, method, path},
    Mock, MockServer, ResponseTemplate,
};

mod common;
use common::{config_for, spawn_gateway, ORG, TOKEN};

#[tokio::test]
async fn test_client_round_trip_through_gateway() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/comments"))
        .and(body_json(json!({
            "content": "Looks good",
            "entityId": "task-1",
            "entityType": "task"
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": "c1" })))
        .expect(1)
        .mount(&upstream)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/v1/comments/c1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&upstream)
        .await;

    let gateway = spawn_gateway(config_for(&upstream)).await;
    let client = GatewayClient::new(&gateway.url(), TOKEN, ORG);

    let health = client.health().await.unwrap();
    assert_eq!(health["status"], "ok");

    let created = client
        .create_comment(&NewComment {
            content: "Looks good".into(),
            entity_id: "task-1".into(),
            entity_type: "task".into(),
        })
        .await
        .unwrap();
    assert_eq!(created.status, 201);
    assert_eq!(created.data, Some(json!({ "id": "c1" })));

    let deleted = client.delete_comment("c1").await.unwrap();
    assert!(deleted.is_success());
    assert_eq!(deleted.status, 204);
    assert_eq!(deleted.data, None);

    gateway.shutdown.trigger();
}

#[tokio::test]
async fn test_client_surfaces_error_messages() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/tasks/task-9/attachments"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({ "message": "Forbidden resource" })))
        .mount(&upstream)
        .await;

    let gateway = spawn_gateway(config_for(&upstream)).await;

    let client = GatewayClient::new(&gateway.url(), TOKEN, ORG);
    let denied = client.list_attachments("task-9").await.unwrap();
    assert_eq!(denied.status, 403);
    assert_eq!(denied.error.as_deref(), Some("Forbidden resource"));

    let anonymous = GatewayClient::new(&gateway.url(), "", "");
    let rejected = anonymous.list_attachments("task-9").await.unwrap();
    assert_eq!(rejected.status, 401);
    assert_eq!(rejected.error.as_deref(), Some("Unauthorized"));

    gateway.shutdown.trigger();
}

#[tokio::test]
async fn test_client_refuses_direct_upstream_paths() {
    let client = GatewayClient::new("http://127.0.0.1:1", TOKEN, ORG);
    let result = client
        .call::<serde_json::Value, ()>(reqwest::Method::GET, "/v1/comments", None)
        .await;
    assert!(matches!(result, Err(ClientError::NotProxyRoute(_))));
}

#[tokio::test]
async fn test_download_through_gateway_is_rewritten() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/attachments/att-1/download"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "downloadUrl": "/files/abc" })))
        .mount(&upstream)
        .await;

    let gateway = spawn_gateway(config_for(&upstream)).await;
    let client = GatewayClient::new(&gateway.url(), TOKEN, ORG);

    let download = client.download_attachment("att-1").await.unwrap();
    assert!(download.status.is_success());
    let body: serde_json::Value = serde_json::from_slice(&download.body).unwrap();
    assert_eq!(body["downloadUrl"], format!("{}/files/abc", upstream.uri()));

    gateway.shutdown.trigger();
}

#[tokio::test]
async fn test_reload_switches_upstream() {
    let first = MockServer::start().await;
    let second = MockServer::start().await;
    for (server, name) in [(&first, "first"), (&second, "second")] {
        Mock::given(method("GET"))
            .and(path("/v1/tasks/task-1/attachments"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "from": name })))
            .mount(server)
            .await;
    }

    let gateway = spawn_gateway(config_for(&first)).await;
    let client = GatewayClient::new(&gateway.url(), TOKEN, ORG);

    let before = client.list_attachments("task-1").await.unwrap();
    assert_eq!(before.data, Some(json!({ "from": "first" })));

    gateway.config_updates.send(config_for(&second)).unwrap();

    let mut switched = false;
    for _ in 0..50 {
        let after = client.list_attachments("task-1").await.unwrap();
        if after.data == Some(json!({ "from": "second" })) {
            switched = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(switched, "gateway should forward to the reloaded upstream");

    gateway.shutdown.trigger();
}

#[tokio::test]
async fn test_graceful_shutdown_stops_server() {
    let upstream = MockServer::start().await;
    let gateway = spawn_gateway(config_for(&upstream)).await;

    let client = GatewayClient::new(&gateway.url(), TOKEN, ORG);
    client.health().await.unwrap();

    gateway.shutdown.trigger();
    let result = tokio::time::timeout(Duration::from_secs(5), gateway.handle)
        .await
        .expect("server should stop after shutdown")
        .unwrap();
    assert!(result.is_ok());
}
