use std::time::Duration;

use client_config::ClientConfig;
use graphql_client::{Client, ExecuteOptions, FetchError};
use operation_artifact::CachePolicy;
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::{
    matchers::{header, method, path},
    Mock, MockServer, ResponseTemplate,
};

use crate::support::*;

fn client_for(server: &MockServer, configure: impl FnOnce(&mut ClientConfig)) -> Client {
    let mut config = ClientConfig {
        url: Some(format!("{}/graphql", server.uri()).parse().unwrap()),
        ..Default::default()
    };
    configure(&mut config);

    Client::builder(config).build().unwrap()
}

fn alice() -> ExecuteOptions {
    ExecuteOptions::variables(vars(json!({ "id": "1" }))).with_policy(CachePolicy::NetworkOnly)
}

#[tokio::test]
async fn posts_json_over_http() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(header("content-type", "application/json"))
        .and(header("x-api-key", "secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": { "user": user("1", "Alice") } })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, |config| {
        config.headers.insert("x-api-key".to_string(), "secret".to_string());
    });

    let value = client.execute(user_query(), alice()).await.unwrap();
    assert_eq!(value.data, Some(json!({ "user": user("1", "Alice") })));

    let requests = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();

    insta::assert_json_snapshot!(body, @r###"
    {
      "query": "query UserQuery($id: ID!) { user(id: $id) { __typename id name } }",
      "operationName": "UserQuery",
      "variables": {
        "id": "1"
      }
    }
    "###);
}

#[tokio::test]
async fn graphql_errors_survive_http_errors() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({ "errors": [{ "message": "Unknown field" }] })))
        .mount(&server)
        .await;

    let client = client_for(&server, |_| {});
    let value = client.execute(user_query(), alice()).await.unwrap();

    assert_eq!(value.network_error, None);
    assert_eq!(value.errors[0].message, "Unknown field");
}

#[tokio::test]
async fn failed_requests_become_network_errors() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(502).set_body_string("Bad Gateway"))
        .mount(&server)
        .await;

    let client = client_for(&server, |_| {});
    let value = client.execute(user_query(), alice()).await.unwrap();

    assert!(value.data.is_none());
    assert!(value.network_error.is_some());
    assert!(client.store().is_empty());
}

#[tokio::test]
async fn slow_requests_time_out() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "data": { "user": user("1", "Alice") } }))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let client = client_for(&server, |config| {
        config.request_timeout = Some(Duration::from_millis(50));
    });

    let value = client.execute(user_query(), alice()).await.unwrap();

    assert_eq!(value.network_error, Some(FetchError::Timeout(Duration::from_millis(50))));
}
