use futures_util::StreamExt;
use graphql_client::{ClientError, CorrelationToken, ExecuteOptions};
use normalized_cache::EntityKey;
use pretty_assertions::assert_eq;
use serde_json::json;

use crate::support::*;

#[tokio::test]
async fn events_are_written_to_the_cache() {
    let server = ScriptedServer::new();
    server
        .respond(json!({ "data": { "user": user("1", "Alice") } }))
        .stream_events(vec![
            json!({ "data": { "userUpdated": user("1", "Alicia") } }),
            json!({ "data": { "userUpdated": user("1", "Ali") } }),
        ]);

    let client = client(&server);

    let query = client.document(user_query());
    query
        .execute(ExecuteOptions::variables(vars(json!({ "id": "1" }))))
        .await
        .unwrap();

    let subscription = client.document(user_updated());
    let events: Vec<_> = subscription
        .listen(ExecuteOptions::default())
        .await
        .unwrap()
        .collect()
        .await;

    let names: Vec<String> = events
        .into_iter()
        .map(|event| event.unwrap().data.unwrap()["userUpdated"]["name"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(names, ["Alicia", "Ali"]);

    let value = subscription.state().value.unwrap();
    assert_eq!(value.data, Some(json!({ "userUpdated": user("1", "Ali") })));

    // The query sees the last event through the cache.
    let value = query.state().value.unwrap();
    assert_eq!(value.data, Some(json!({ "user": user("1", "Ali") })));
}

#[tokio::test]
async fn cancelled_subscriptions_stop() {
    let server = ScriptedServer::new();
    server.stream_events(vec![json!({ "data": { "userUpdated": user("1", "Alicia") } })]);

    let client = client(&server);
    let token = CorrelationToken::new();

    let stream = client
        .subscribe(user_updated(), ExecuteOptions::default(), token.clone())
        .await
        .unwrap();

    token.cancel();
    let events: Vec<_> = stream.collect().await;

    assert!(events.into_iter().all(|event| event == Err(ClientError::Cancelled)));
    assert!(!client.store().contains(&EntityKey::entity("User", "1")));
}
