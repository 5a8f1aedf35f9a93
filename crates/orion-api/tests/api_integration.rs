#![allow(clippy::unwrap_used, clippy::expect_used)]

use orion_api::{ApiClient, TurnStore, VoiceProvisioning, PROCESSED_ACK};
use orion_core::{OrionError, Role, TurnRecord};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> ApiClient {
    ApiClient::new(server.uri(), Some("tok".into()))
}

#[tokio::test]
async fn test_history_skips_malformed_records() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/sessions/s-1/memory"))
        .and(header("authorization", "Bearer tok"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "id": "m1",
                "type": "CONVERSATION",
                "content": "hi",
                "metadata": {"role": "user"},
                "createdAt": "2024-01-01T10:00:00Z"
            },
            {"id": "broken", "content": "no timestamp"},
            {
                "id": "m2",
                "content": "hello",
                "metadata": null,
                "createdAt": "2024-01-01T10:00:01Z"
            }
        ])))
        .mount(&server)
        .await;

    let records = client_for(&server).session_history("s-1").await.unwrap();
    let ids: Vec<_> = records.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["m1", "m2"]);
    assert_eq!(records[0].role_tag(), Some("user"));
    assert_eq!(records[1].role_tag(), None);
}

#[tokio::test]
async fn test_history_non_list_payload_is_session_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/sessions/s-1/memory"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": []})))
        .mount(&server)
        .await;

    let err = client_for(&server).session_history("s-1").await.unwrap_err();
    assert!(matches!(err, OrionError::Session(_)));
}

#[tokio::test]
async fn test_unauthorized_maps_to_dedicated_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/sessions/s-1/memory"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({"message": "Token expired"})),
        )
        .mount(&server)
        .await;

    let err = client_for(&server).session_history("s-1").await.unwrap_err();
    match err {
        OrionError::Unauthorized(msg) => assert_eq!(msg, "Token expired"),
        other => panic!("expected Unauthorized, got {other:?}"),
    }
}

#[tokio::test]
async fn test_voice_config_passes_type_query() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/voice/config"))
        .and(query_param("type", "onboarding"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"agent_id": "agent-42", "model": "eleven_turbo_v2"})),
        )
        .mount(&server)
        .await;

    let config = client_for(&server).agent_config("onboarding").await.unwrap();
    assert_eq!(config.agent_id, "agent-42");
    assert_eq!(config.model.as_deref(), Some("eleven_turbo_v2"));
}

#[tokio::test]
async fn test_voice_prompt_sends_session_and_user() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/voice/prompt"))
        .and(body_json(json!({"sessionId": "s-1", "userName": "Ada"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "system_prompt": "You are helpful.",
            "first_message": "Hi Ada!"
        })))
        .mount(&server)
        .await;

    let prompt = client_for(&server).system_prompt("s-1", "Ada").await.unwrap();
    assert_eq!(prompt.system_prompt, "You are helpful.");
    assert_eq!(prompt.first_message.as_deref(), Some("Hi Ada!"));
}

#[tokio::test]
async fn test_store_turn_posts_record_and_surfaces_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/voice/message"))
        .and(body_json(json!({"sessionId": "s-1", "role": "user", "content": "hello"})))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/voice/message"))
        .and(body_json(json!({"sessionId": "s-2", "role": "assistant", "content": "x"})))
        .respond_with(ResponseTemplate::new(500).set_body_string("db down"))
        .mount(&server)
        .await;

    let client = client_for(&server);
    client
        .store_turn(&TurnRecord::new("s-1", Role::User, "hello"))
        .await
        .unwrap();

    let err = client
        .store_turn(&TurnRecord::new("s-2", Role::Assistant, "x"))
        .await
        .unwrap_err();
    match err {
        OrionError::Http(msg) => assert!(msg.contains("db down"), "got {msg}"),
        other => panic!("expected Http, got {other:?}"),
    }
}

#[tokio::test]
async fn test_plan_and_execute_aggregates_step_text() {
    let server = MockServer::start().await;
    let plan = json!({"steps": [{"tool": "search"}, {"tool": "count"}]});
    Mock::given(method("POST"))
        .and(path("/agent/sessions/s-1/plan"))
        .and(body_json(json!({"input": "find cafes"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(plan.clone()))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/agent/sessions/s-1/execute"))
        .and(body_json(plan))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"result": {"text": "Found 3 cafes"}},
            {"result": {"count": 3}},
            {"result": null}
        ])))
        .mount(&server)
        .await;

    let reply = client_for(&server)
        .plan_and_execute("s-1", "find cafes")
        .await
        .unwrap();
    assert_eq!(reply, "Found 3 cafes\n{\"count\":3}");
}

#[tokio::test]
async fn test_plan_and_execute_empty_results_acknowledge() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/agent/sessions/s-1/plan"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"steps": []})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/agent/sessions/s-1/execute"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let reply = client_for(&server)
        .plan_and_execute("s-1", "thanks")
        .await
        .unwrap();
    assert_eq!(reply, PROCESSED_ACK);
}

#[tokio::test]
async fn test_plan_error_carries_server_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/agent/sessions/s-1/plan"))
        .respond_with(
            ResponseTemplate::new(503).set_body_json(json!({"message": "Planner offline"})),
        )
        .mount(&server)
        .await;

    let err = client_for(&server)
        .plan_and_execute("s-1", "do it")
        .await
        .unwrap_err();
    match err {
        OrionError::Http(msg) => assert_eq!(msg, "Planner offline"),
        other => panic!("expected Http, got {other:?}"),
    }
}

#[tokio::test]
async fn test_list_and_create_sessions() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/sessions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "id": "s-1",
                "status": "ACTIVE",
                "metadata": {"name": "Trip planning"},
                "createdAt": "2024-01-01T10:00:00Z"
            },
            {"id": "s-2", "createdAt": "2024-01-02T10:00:00Z"}
        ])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/sessions"))
        .and(body_json(json!({"metadata": {"name": "Groceries"}})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": "s-3",
            "status": "ACTIVE",
            "metadata": {"name": "Groceries"},
            "createdAt": "2024-01-03T10:00:00Z"
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let sessions = client.list_sessions().await.unwrap();
    assert_eq!(sessions.len(), 2);
    assert_eq!(sessions[0].name(), Some("Trip planning"));
    assert_eq!(sessions[1].name(), None);

    let created = client.create_session(Some("Groceries")).await.unwrap();
    assert_eq!(created.id, "s-3");
    assert_eq!(created.name(), Some("Groceries"));
}

#[tokio::test]
async fn test_requests_without_token_omit_authorization() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/sessions"))
        .and(header("authorization", "Bearer tok"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/sessions"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let anonymous = ApiClient::new(server.uri(), None);
    assert!(anonymous.token().is_none());
    let err = anonymous.list_sessions().await.unwrap_err();
    assert!(matches!(err, OrionError::Unauthorized(_)));
}
