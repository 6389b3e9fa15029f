use client_config::{ClientConfig, PersistedQueryMode};
use graphql_client::ExecuteOptions;
use pretty_assertions::assert_eq;
use serde_json::json;

use crate::support::*;

fn with_mode(mode: PersistedQueryMode) -> ClientConfig {
    let mut config = config();
    config.persisted_queries.mode = mode;
    config
}

fn not_found() -> serde_json::Value {
    json!({
        "errors": [{
            "message": "PersistedQueryNotFound",
            "extensions": { "code": "PERSISTED_QUERY_NOT_FOUND" }
        }]
    })
}

#[tokio::test]
async fn automatic_sends_the_hash_alone_when_known() {
    let server = ScriptedServer::new();
    server.respond(json!({ "data": { "user": user("1", "Alice") } }));

    let client = builder(&server, with_mode(PersistedQueryMode::Automatic)).build().unwrap();
    let artifact = user_query();

    let value = client
        .execute(artifact.clone(), ExecuteOptions::variables(vars(json!({ "id": "1" }))))
        .await
        .unwrap();

    assert_eq!(value.data, Some(json!({ "user": user("1", "Alice") })));

    let requests = server.requests();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].get("query").is_none());
    assert_eq!(
        requests[0]["extensions"],
        json!({ "persistedQuery": { "version": 1, "sha256Hash": artifact.hash } })
    );
}

#[tokio::test]
async fn automatic_falls_back_to_the_document_once() {
    let server = ScriptedServer::new();
    server
        .respond(not_found())
        .respond(json!({ "data": { "user": user("1", "Alice") } }));

    let client = builder(&server, with_mode(PersistedQueryMode::Automatic)).build().unwrap();
    let artifact = user_query();

    let value = client
        .execute(artifact.clone(), ExecuteOptions::variables(vars(json!({ "id": "1" }))))
        .await
        .unwrap();

    assert_eq!(value.data, Some(json!({ "user": user("1", "Alice") })));
    assert!(!value.has_errors());

    let requests = server.requests();
    assert_eq!(requests.len(), 2);
    assert!(requests[0].get("query").is_none());
    assert_eq!(requests[1]["query"], artifact.text.as_str());
}

#[tokio::test]
async fn automatic_gives_up_after_one_retry() {
    let server = ScriptedServer::new();
    server.respond(not_found()).respond(not_found());

    let client = builder(&server, with_mode(PersistedQueryMode::Automatic)).build().unwrap();

    let value = client
        .execute(user_query(), ExecuteOptions::variables(vars(json!({ "id": "1" }))))
        .await
        .unwrap();

    assert!(value.is_persisted_query_not_found());
    assert_eq!(server.request_count(), 2);
}

#[tokio::test]
async fn fixed_only_sends_the_document_id() {
    let server = ScriptedServer::new();
    server.respond(json!({ "data": { "user": user("1", "Alice") } }));

    let client = builder(&server, with_mode(PersistedQueryMode::Fixed)).build().unwrap();
    let artifact = user_query();

    assert_eq!(client.pipeline().names().last(), Some(&"fetch"));
    assert!(client.pipeline().names().contains(&"fixed_persisted_queries"));

    client
        .execute(artifact.clone(), ExecuteOptions::variables(vars(json!({ "id": "1" }))))
        .await
        .unwrap();

    let request = &server.requests()[0];
    assert_eq!(
        request,
        &json!({
            "doc_id": artifact.hash,
            "operationName": "UserQuery",
            "variables": { "id": "1" }
        })
    );
}
