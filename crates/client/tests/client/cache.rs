use std::sync::{Arc, Mutex};

use graphql_client::{pipeline::DeliverySink, ExecuteOptions, RequestContext, ResolvedValue, ValueSource};
use normalized_cache::EntityKey;
use operation_artifact::CachePolicy;
use pretty_assertions::assert_eq;
use serde_json::json;

use crate::support::*;

fn alice() -> ExecuteOptions {
    ExecuteOptions::variables(vars(json!({ "id": "1" })))
}

#[tokio::test]
async fn cache_first_only_fetches_once() {
    let server = ScriptedServer::new();
    server.respond(json!({ "data": { "user": user("1", "Alice") } }));

    let client = client(&server);

    let first = client.execute(user_query(), alice()).await.unwrap();
    let second = client.execute(user_query(), alice()).await.unwrap();

    assert_eq!(first.source, ValueSource::Network);
    assert_eq!(second.source, ValueSource::Cache);
    assert_eq!(first.data, second.data);
    assert_eq!(server.request_count(), 1);
}

#[tokio::test]
async fn cache_only_misses_resolve_partial_values() {
    let server = ScriptedServer::new();
    let client = client(&server);

    let value = client
        .execute(user_query(), alice().with_policy(CachePolicy::CacheOnly))
        .await
        .unwrap();

    assert!(value.partial);
    assert_eq!(value.source, ValueSource::Cache);
    assert_eq!(server.request_count(), 0);
}

#[tokio::test]
async fn network_only_always_fetches() {
    let server = ScriptedServer::new();
    server
        .respond(json!({ "data": { "user": user("1", "Alice") } }))
        .respond(json!({ "data": { "user": user("1", "Alicia") } }));

    let client = client(&server);
    let options = || alice().with_policy(CachePolicy::NetworkOnly);

    client.execute(user_query(), options()).await.unwrap();
    let value = client.execute(user_query(), options()).await.unwrap();

    assert_eq!(value.data, Some(json!({ "user": user("1", "Alicia") })));
    assert_eq!(server.request_count(), 2);
}

#[tokio::test]
async fn no_cache_never_writes() {
    let server = ScriptedServer::new();
    server.respond(json!({ "data": { "user": user("1", "Alice") } }));

    let client = client(&server);
    let value = client
        .execute(user_query(), alice().with_policy(CachePolicy::NoCache))
        .await
        .unwrap();

    assert_eq!(value.data, Some(json!({ "user": user("1", "Alice") })));
    assert!(client.store().is_empty());
}

#[tokio::test]
async fn documents_declare_their_own_policy() {
    let server = ScriptedServer::new();
    server
        .respond(json!({ "data": { "user": user("1", "Alice") } }))
        .respond(json!({ "data": { "user": user("1", "Alicia") } }));

    let client = client(&server);
    let artifact = Arc::new(user_query().as_ref().clone().with_policy(CachePolicy::NetworkOnly));

    client.execute(artifact.clone(), alice()).await.unwrap();
    client.execute(artifact, alice()).await.unwrap();

    assert_eq!(server.request_count(), 2);
}

#[tokio::test]
async fn cache_and_network_delivers_twice() {
    let server = ScriptedServer::new();
    server
        .respond(json!({ "data": { "user": user("1", "Alice") } }))
        .respond(json!({ "data": { "user": user("1", "Alicia") } }));

    let client = client(&server);
    client.execute(user_query(), alice()).await.unwrap();

    let delivered = Arc::new(Mutex::new(Vec::<ResolvedValue>::new()));
    let sink: DeliverySink = Arc::new({
        let delivered = delivered.clone();
        move |value| delivered.lock().unwrap().push(value)
    });

    let ctx = RequestContext::new(user_query(), vars(json!({ "id": "1" })), CachePolicy::CacheAndNetwork);
    let execution = client.pipeline().execute(ctx, Some(sink)).await.unwrap();

    let graphql_client::pipeline::Execution::Settled(last) = execution else {
        panic!("queries don't stream");
    };

    let delivered = delivered.lock().unwrap();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].source, ValueSource::Cache);
    assert_eq!(delivered[0].data, Some(json!({ "user": user("1", "Alice") })));

    assert_eq!(last.source, ValueSource::Network);
    assert_eq!(last.data, Some(json!({ "user": user("1", "Alicia") })));
    assert_eq!(server.request_count(), 2);
}

#[tokio::test]
async fn entities_are_shared_between_documents() {
    let server = ScriptedServer::new();
    server
        .respond(json!({ "data": { "user": user("1", "Alice") } }))
        .respond(json!({ "data": { "updateUser": user("1", "Alicia") } }));

    let client = client(&server);
    let handle = client.document(user_query());
    let mut watcher = handle.watch();

    handle.execute(alice()).await.unwrap();
    watcher.borrow_and_update();

    client
        .execute(
            update_user(),
            ExecuteOptions::variables(vars(json!({ "id": "1", "name": "Alicia" }))),
        )
        .await
        .unwrap();

    assert!(watcher.has_changed().unwrap());

    let value = watcher.borrow_and_update().value.clone().unwrap();
    assert_eq!(value.source, ValueSource::Cache);
    assert_eq!(value.data, Some(json!({ "user": user("1", "Alicia") })));

    let record = client.store().record(&EntityKey::entity("User", "1")).unwrap();
    assert_eq!(record.fields.len(), 3);
}

#[tokio::test]
async fn dropping_a_handle_ends_its_cache_subscription() {
    let server = ScriptedServer::new();
    server.respond(json!({ "data": { "user": user("1", "Alice") } }));

    let client = client(&server);
    let handle = client.document(user_query());
    handle.execute(alice()).await.unwrap();

    assert_eq!(client.store().subscriber_count(), 1);

    drop(handle);
    assert_eq!(client.store().subscriber_count(), 0);
}

#[tokio::test]
async fn fragments_read_their_entity() {
    let server = ScriptedServer::new();
    server.respond(json!({ "data": { "user": {
        "__typename": "User",
        "id": "1",
        "friends": friends(&["2", "3"], true)
    } } }));

    let client = client(&server);
    client
        .execute(user_with_friends(), ExecuteOptions::variables(vars(json!({ "id": "1", "first": 2 }))))
        .await
        .unwrap();

    let fragment = client
        .fragment(user_friends_fragment(), vars(json!({ "__typename": "User", "id": "1" })))
        .unwrap();

    assert_eq!(fragment.key(), &EntityKey::entity("User", "1"));

    let value = fragment.read();
    assert!(!value.partial);
    assert_eq!(value.page_info.map(|info| info.has_next_page), Some(true));

    let edges = value.data.as_ref().and_then(|data| data["friends"]["edges"].as_array()).unwrap();
    assert_eq!(edges.len(), 2);

    assert!(client
        .fragment(user_friends_fragment(), vars(json!({ "id": "1" })))
        .is_err());
}
