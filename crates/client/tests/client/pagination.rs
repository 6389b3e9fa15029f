use std::time::Duration;

use graphql_client::{ClientError, DocumentHandle, ExecuteOptions, PageLoad};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

use crate::support::*;

fn loaded(load: PageLoad) -> Value {
    match load {
        PageLoad::Loaded(value) => value.data.unwrap(),
        other => panic!("expected a loaded page, got {other:?}"),
    }
}

fn ids(users: &Value) -> Vec<&str> {
    users
        .as_array()
        .unwrap()
        .iter()
        .map(|user| user["id"].as_str().unwrap())
        .collect()
}

#[tokio::test]
async fn offset_pages_are_appended() {
    let server = ScriptedServer::new();
    server
        .respond(json!({ "data": users(0, 10) }))
        .respond(json!({ "data": users(10, 3) }));

    let client = client(&server);
    let handle = client.document(users_query());

    let first = handle
        .execute(ExecuteOptions::variables(vars(json!({ "limit": 10 }))))
        .await
        .unwrap();

    assert_eq!(ids(&first.data.unwrap()["users"]).len(), 10);
    assert_eq!(handle.page_info().map(|info| info.has_next_page), Some(true));

    let data = loaded(handle.load_next_page(None).await.unwrap());

    assert_eq!(server.requests()[1]["variables"], json!({ "limit": 10, "offset": 10 }));
    assert_eq!(
        ids(&data["users"]),
        ["0", "1", "2", "3", "4", "5", "6", "7", "8", "9", "10", "11", "12"]
    );

    // A short page means there's nothing left.
    assert_eq!(handle.load_next_page(None).await.unwrap(), PageLoad::Exhausted);
    assert_eq!(server.request_count(), 2);

    let state = handle.state().value.unwrap();
    assert_eq!(ids(&state.data.unwrap()["users"]).len(), 13);
}

#[tokio::test]
async fn cursor_pages_continue_from_the_end_cursor() {
    let server = ScriptedServer::new();
    server
        .respond(json!({ "data": { "friends": friends(&["1", "2"], true) } }))
        .respond(json!({ "data": { "friends": friends(&["3", "4"], false) } }));

    let client = client(&server);
    let handle = client.document(friends_query());

    handle
        .execute(ExecuteOptions::variables(vars(json!({ "first": 2 }))))
        .await
        .unwrap();

    let data = loaded(handle.load_next_page(None).await.unwrap());

    assert_eq!(server.requests()[1]["variables"], json!({ "first": 2, "after": "c2" }));

    let nodes: Vec<&str> = data["friends"]["edges"]
        .as_array()
        .unwrap()
        .iter()
        .map(|edge| edge["node"]["id"].as_str().unwrap())
        .collect();
    assert_eq!(nodes, ["1", "2", "3", "4"]);

    let page_info = handle.page_info().unwrap();
    assert!(!page_info.has_next_page);
    assert_eq!(page_info.end_cursor.as_deref(), Some("c4"));

    assert_eq!(handle.load_next_page(None).await.unwrap(), PageLoad::Exhausted);
    assert_eq!(handle.load_previous_page(None).await.unwrap(), PageLoad::Exhausted);
}

#[tokio::test]
async fn page_size_can_be_changed() {
    let server = ScriptedServer::new();
    server
        .respond(json!({ "data": { "friends": friends(&["1", "2"], true) } }))
        .respond(json!({ "data": { "friends": friends(&["3", "4", "5", "6", "7"], true) } }));

    let client = client(&server);
    let handle = client.document(friends_query());

    handle
        .execute(ExecuteOptions::variables(vars(json!({ "first": 2 }))))
        .await
        .unwrap();

    handle.load_next_page(Some(5)).await.unwrap();

    assert_eq!(server.requests()[1]["variables"], json!({ "first": 5, "after": "c2" }));
}

#[tokio::test(start_paused = true)]
async fn overlapping_loads_are_ignored() {
    let server = ScriptedServer::new();
    server
        .respond(json!({ "data": { "friends": friends(&["1", "2"], true) } }))
        .respond(json!({ "data": { "friends": friends(&["3", "4"], true) } }))
        .respond(json!({ "data": { "friends": friends(&["5", "6"], false) } }));
    server.delay(Duration::from_millis(50));

    let client = client(&server);
    let handle = client.document(friends_query());

    handle
        .execute(ExecuteOptions::variables(vars(json!({ "first": 2 }))))
        .await
        .unwrap();

    let (first, second) = tokio::join!(handle.load_next_page(None), handle.load_next_page(None));

    assert!(matches!(first, Ok(PageLoad::Loaded(_))));
    assert_eq!(second, Ok(PageLoad::AlreadyLoading));
    assert_eq!(server.request_count(), 2);

    // The guard is released once the load settles.
    assert!(matches!(handle.load_next_page(None).await, Ok(PageLoad::Loaded(_))));
    assert_eq!(server.requests()[2]["variables"], json!({ "first": 2, "after": "c4" }));
}

#[tokio::test(start_paused = true)]
async fn handles_on_the_same_list_share_one_page_load() {
    let server = ScriptedServer::new();
    server
        .respond(json!({ "data": { "friends": friends(&["1", "2"], true) } }))
        .respond(json!({ "data": { "friends": friends(&["3", "4"], true) } }));
    server.delay(Duration::from_millis(50));

    let client = client(&server);
    let options = || ExecuteOptions::variables(vars(json!({ "first": 2 })));

    let first = client.document(friends_query());
    first.execute(options()).await.unwrap();

    // Served from the cache.
    let second = client.document(friends_query());
    second.execute(options()).await.unwrap();
    assert_eq!(server.request_count(), 1);

    let (a, b) = tokio::join!(first.load_next_page(None), second.load_next_page(None));

    assert!(matches!(a, Ok(PageLoad::Loaded(_))));
    assert_eq!(b, Ok(PageLoad::AlreadyLoading));
    assert_eq!(server.request_count(), 2);

    // Both handles see the merged list.
    let end_cursor = |handle: &DocumentHandle| handle.page_info().and_then(|info| info.end_cursor);
    assert_eq!(end_cursor(&first).as_deref(), Some("c4"));
    assert_eq!(end_cursor(&second).as_deref(), Some("c4"));
}

#[tokio::test]
async fn pages_need_a_paginated_document_with_a_first_page() {
    let server = ScriptedServer::new();
    let client = client(&server);

    let error = client.document(user_query()).load_next_page(None).await.unwrap_err();
    assert_eq!(error, ClientError::NotPaginated("UserQuery".to_string()));

    let error = client.document(friends_query()).load_next_page(None).await.unwrap_err();
    assert_eq!(error, ClientError::NoPageLoaded("MyFriends".to_string()));

    assert_eq!(server.request_count(), 0);
}

#[tokio::test]
async fn fragments_load_pages_through_their_node() {
    let server = ScriptedServer::new();
    server
        .respond(json!({ "data": { "user": {
            "__typename": "User",
            "id": "1",
            "friends": friends(&["2", "3"], true)
        } } }))
        .respond(json!({ "data": { "node": {
            "__typename": "User",
            "id": "1",
            "friends": friends(&["4", "5"], false)
        } } }));

    let client = client(&server);
    client
        .execute(user_with_friends(), ExecuteOptions::variables(vars(json!({ "id": "1", "first": 2 }))))
        .await
        .unwrap();

    let fragment = client
        .fragment(user_friends_fragment(), vars(json!({ "__typename": "User", "id": "1" })))
        .unwrap();
    let mut watcher = fragment.watch();
    watcher.borrow_and_update();

    let data = loaded(fragment.load_next_page(None).await.unwrap());

    let request = &server.requests()[1];
    assert_eq!(request["operationName"], "UserFriends_Pagination_Query");
    assert_eq!(request["variables"], json!({ "id": "1", "first": 2, "after": "c3" }));
    assert!(request["query"].as_str().unwrap().contains("node(id: $id)"));

    let nodes: Vec<&str> = data["friends"]["edges"]
        .as_array()
        .unwrap()
        .iter()
        .map(|edge| edge["node"]["id"].as_str().unwrap())
        .collect();
    assert_eq!(nodes, ["2", "3", "4", "5"]);

    assert!(watcher.has_changed().unwrap());
    assert_eq!(fragment.load_next_page(None).await.unwrap(), PageLoad::Exhausted);
}
