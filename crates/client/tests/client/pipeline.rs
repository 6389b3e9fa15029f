use std::sync::{Arc, Mutex};

use graphql_client::{
    AfterFlow, BeforeFlow, ClientError, CorrelationToken, ExecuteOptions, GraphqlResponse, Plugin, RequestContext,
    ResolvedValue, ValueSource,
};
use operation_artifact::CachePolicy;
use pretty_assertions::assert_eq;
use serde_json::json;

use crate::support::*;

type Log = Arc<Mutex<Vec<String>>>;

/// Logs both of its phases and passes everything on.
struct Recorder {
    name: &'static str,
    log: Log,
}

#[async_trait::async_trait]
impl Plugin for Recorder {
    fn name(&self) -> &str {
        self.name
    }

    async fn before_network(&self, _ctx: &mut RequestContext) -> Result<BeforeFlow, ClientError> {
        self.log.lock().unwrap().push(format!("{} before", self.name));
        Ok(BeforeFlow::Next)
    }

    async fn after_network(&self, _ctx: &mut RequestContext, value: ResolvedValue) -> Result<AfterFlow, ClientError> {
        self.log.lock().unwrap().push(format!("{} after", self.name));
        Ok(AfterFlow::Resolve(value))
    }
}

/// Resolves every request itself.
struct Mock;

#[async_trait::async_trait]
impl Plugin for Mock {
    fn name(&self) -> &str {
        "mock"
    }

    async fn before_network(&self, _ctx: &mut RequestContext) -> Result<BeforeFlow, ClientError> {
        Ok(BeforeFlow::Resolve(ResolvedValue::from_response(GraphqlResponse {
            data: Some(json!({ "user": user("1", "Mocked") })),
            ..Default::default()
        })))
    }
}

fn recorder(name: &'static str, log: &Log) -> Recorder {
    Recorder { name, log: log.clone() }
}

#[tokio::test]
async fn plugins_run_forward_then_in_reverse() {
    let server = ScriptedServer::new();
    server.respond(json!({ "data": { "user": user("1", "Alice") } }));

    let log = Log::default();
    let client = builder(&server, config())
        .plugin(recorder("first", &log))
        .plugin(recorder("second", &log))
        .build()
        .unwrap();

    assert_eq!(
        client.pipeline().names(),
        ["fetch_params", "dispatch", "cache_policy", "first", "second", "fetch"]
    );

    let value = client
        .execute(user_query(), ExecuteOptions::variables(vars(json!({ "id": "1" }))))
        .await
        .unwrap();

    assert_eq!(value.data, Some(json!({ "user": user("1", "Alice") })));
    assert_eq!(
        *log.lock().unwrap(),
        ["first before", "second before", "second after", "first after"]
    );
}

#[tokio::test]
async fn resolving_early_skips_later_plugins_and_the_network() {
    let server = ScriptedServer::new();

    let log = Log::default();
    let client = builder(&server, config())
        .plugin(recorder("outer", &log))
        .plugin(Mock)
        .plugin(recorder("inner", &log))
        .build()
        .unwrap();

    let value = client
        .execute(
            user_query(),
            ExecuteOptions::variables(vars(json!({ "id": "1" }))).with_policy(CachePolicy::NetworkOnly),
        )
        .await
        .unwrap();

    assert_eq!(value.data, Some(json!({ "user": user("1", "Mocked") })));
    assert_eq!(*log.lock().unwrap(), ["outer before", "outer after"]);
    assert_eq!(server.request_count(), 0);
}

#[tokio::test]
async fn custom_pipeline_replaces_the_defaults() {
    let server = ScriptedServer::new();
    let client = builder(&server, config())
        .pipeline(vec![Arc::new(Mock)])
        .build()
        .unwrap();

    assert_eq!(client.pipeline().names(), ["fetch_params", "mock"]);

    let value = client
        .execute(user_query(), ExecuteOptions::variables(vars(json!({ "id": "1" }))))
        .await
        .unwrap();

    assert_eq!(value.source, ValueSource::Network);
    assert_eq!(server.request_count(), 0);
    assert!(client.store().is_empty());
}

#[tokio::test]
async fn configured_headers_are_sent() {
    let server = ScriptedServer::new();
    server.respond(json!({ "data": { "user": user("1", "Alice") } }));

    let mut config = config();
    config.headers.insert("x-api-key".to_string(), "secret".to_string());
    let client = builder(&server, config).build().unwrap();

    client
        .execute(user_query(), ExecuteOptions::variables(vars(json!({ "id": "1" }))))
        .await
        .unwrap();

    let headers = server.last_headers().unwrap();
    assert_eq!(headers.get("x-api-key").unwrap(), "secret");

    insta::assert_json_snapshot!(server.requests()[0], @r###"
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
async fn a_url_is_required() {
    let server = ScriptedServer::new();
    let result = builder(&server, Default::default()).build();

    assert!(matches!(result, Err(ClientError::Configuration(_))));
}

#[tokio::test]
async fn throw_on_error_only_for_configured_kinds() {
    let server = ScriptedServer::new();
    server
        .respond(json!({ "data": null, "errors": [{ "message": "Not allowed" }] }))
        .respond(json!({ "data": { "user": null }, "errors": [{ "message": "Not found" }] }));

    let mut config = config();
    config.throw_on_error.operations = vec![client_config::ThrowOnErrorOperation::Mutation];
    let client = builder(&server, config).build().unwrap();

    assert_eq!(client.pipeline().names()[0], "throw_on_error");

    let error = client
        .execute(
            update_user(),
            ExecuteOptions::variables(vars(json!({ "id": "1", "name": "Bob" }))),
        )
        .await
        .unwrap_err();

    assert_eq!(error.to_string(), "Not allowed");

    let value = client
        .execute(user_query(), ExecuteOptions::variables(vars(json!({ "id": "2" }))))
        .await
        .unwrap();

    assert_eq!(value.errors.len(), 1);
    assert_eq!(value.errors[0].message, "Not found");
}

#[tokio::test]
async fn fragments_are_not_executable() {
    let server = ScriptedServer::new();
    let client = client(&server);

    let error = client
        .execute(user_friends_fragment(), ExecuteOptions::default())
        .await
        .unwrap_err();

    assert_eq!(error, ClientError::NotExecutable("UserFriends".to_string()));
}

#[tokio::test(start_paused = true)]
async fn cancelled_invocations_never_reach_the_cache() {
    let server = ScriptedServer::new();
    server.respond(json!({ "data": { "user": user("1", "Alice") } }));
    server.delay(std::time::Duration::from_millis(100));

    let client = client(&server);
    let token = CorrelationToken::new();

    let execution = tokio::spawn({
        let client = client.clone();
        let token = token.clone();
        async move {
            client
                .execute_with_token(user_query(), ExecuteOptions::variables(vars(json!({ "id": "1" }))), token)
                .await
        }
    });

    tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    token.cancel();

    assert_eq!(execution.await.unwrap(), Err(ClientError::Cancelled));
    assert_eq!(server.request_count(), 1);
    assert!(client.store().is_empty());
}

#[tokio::test(start_paused = true)]
async fn cancelling_a_handle_cancels_its_invocations() {
    let server = ScriptedServer::new();
    server.respond(json!({ "data": { "user": user("1", "Alice") } }));
    server.delay(std::time::Duration::from_millis(100));

    let client = client(&server);
    let handle = Arc::new(client.document(user_query()));

    let execution = tokio::spawn({
        let handle = handle.clone();
        async move {
            handle
                .execute(ExecuteOptions::variables(vars(json!({ "id": "1" }))))
                .await
        }
    });

    tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    assert!(handle.state().fetching);
    handle.cancel();

    assert_eq!(execution.await.unwrap(), Err(ClientError::Cancelled));

    let state = handle.state();
    assert!(!state.fetching);
    assert_eq!(state.error, Some(ClientError::Cancelled));
    assert!(client.store().is_empty());
}
