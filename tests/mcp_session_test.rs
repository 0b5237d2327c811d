mod helpers;

use std::time::Duration;

use helpers::{spawn_server, spawn_server_with};
use local_notes::config::NotesConfig;
use serde_json::json;

// A dead peer is only noticed on write, so disconnect tests need frequent frames.
fn fast_heartbeat(config: &mut NotesConfig) {
    config.transport.heartbeat_start_delay_ms = 50;
    config.transport.heartbeat_interval_ms = 50;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn stream_opens_with_endpoint_event_and_no_buffering() {
    let server = spawn_server().await;
    let session = server.connect("/mcp", &[]).await;

    assert!(session.post_url.contains("/mcp/messages?sessionId="));
    assert_eq!(session.session_id.len(), 32);
    assert_eq!(
        session.events.headers.get("x-accel-buffering").unwrap(),
        "no"
    );
    assert!(session.events.headers["content-type"]
        .to_str()
        .unwrap()
        .starts_with("text/event-stream"));
    assert_eq!(server.state.connections.registry().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn anonymous_create_then_list() {
    let server = spawn_server().await;
    let mut session = server.connect("/mcp", &[]).await;

    let init = session
        .request("initialize", json!({"protocolVersion": "2024-11-05", "capabilities": {}}))
        .await;
    assert_eq!(init["result"]["serverInfo"]["name"], "local-notes");
    assert_eq!(session.post(&json!({"jsonrpc": "2.0", "method": "notifications/initialized"})).await, 202);

    session
        .call_ok("create_note", json!({"title": "A", "content": "1"}))
        .await;
    let notes = session.call_ok("list_recent_notes", json!({"limit": 10})).await;

    let notes = notes.as_array().unwrap();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0]["title"], "A");
    assert_eq!(notes[0]["content"], "1");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn api_key_identity_survives_reconnect() {
    let server = spawn_server_with(fast_heartbeat).await;
    let user = server.create_user("ada").await;

    let mut first = server.connect(&format!("/mcp/{}", user.api_key), &[]).await;
    first.call_ok("create_note", json!({"title": "B", "content": "2"})).await;
    drop(first);
    assert!(server.eventually(|s| s.connections.registry().is_empty()).await);

    // Same key, carried in the header this time
    let mut second = server.connect("/mcp", &[("x-api-key", user.api_key.as_str())]).await;
    let found = second
        .call_ok("search_notes", json!({"keyword": "B", "limit": 10}))
        .await;
    let found = found.as_array().unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0]["title"], "B");

    // An anonymous session cannot see it
    let mut anon = server.connect("/mcp", &[]).await;
    let none = anon.call_ok("search_notes", json!({"keyword": "B"})).await;
    assert!(none.as_array().unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_sessions_stay_isolated() {
    let server = spawn_server().await;
    let one = server.create_user("one").await;
    let two = server.create_user("two").await;

    let mut s1 = server.connect(&format!("/mcp/{}", one.api_key), &[]).await;
    let mut s2 = server.connect(&format!("/mcp/{}", two.api_key), &[]).await;

    let (n1, n2) = tokio::join!(
        s1.call_ok("create_note", json!({"title": "from one", "content": ""})),
        s2.call_ok("create_note", json!({"title": "from two", "content": ""})),
    );

    let (l1, l2) = tokio::join!(
        s1.call_ok("list_recent_notes", json!({})),
        s2.call_ok("list_recent_notes", json!({})),
    );
    let l1 = l1.as_array().unwrap().clone();
    let l2 = l2.as_array().unwrap().clone();
    assert_eq!(l1.len(), 1);
    assert_eq!(l1[0]["title"], "from one");
    assert_eq!(l2.len(), 1);
    assert_eq!(l2[0]["title"], "from two");

    // Cross-tenant access by id is indistinguishable from a missing note
    let stolen = s1.call_tool("get_note", json!({"id": n2["id"]})).await;
    assert_eq!(stolen["isError"], true);
    let stolen = s2.call_tool("delete_note", json!({"id": n1["id"]})).await;
    assert_eq!(stolen["isError"], true);
    s1.call_ok("get_note", json!({"id": n1["id"]})).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn unknown_session_is_404_and_leaves_others_alone() {
    let server = spawn_server().await;
    let mut session = server.connect("/mcp", &[]).await;

    let response = server
        .post_raw("does-not-exist", r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#)
        .await;
    assert_eq!(response.status(), 404);
    assert_eq!(response.text().await.unwrap(), "Session not found");

    let missing = server
        .http
        .post(server.url("/mcp/messages"))
        .body("{}")
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), 404);

    assert_eq!(server.state.connections.registry().len(), 1);
    assert_eq!(server.state.connections.teardown_count(), 0);
    let pong = session.request("ping", json!({})).await;
    assert_eq!(pong["result"], json!({}));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn malformed_message_is_400() {
    let server = spawn_server().await;
    let mut session = server.connect("/mcp", &[]).await;

    let response = server.post_raw(&session.session_id, "{not json").await;
    assert_eq!(response.status(), 400);

    let pong = session.request("ping", json!({})).await;
    assert_eq!(pong["result"], json!({}));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn protocol_errors_travel_on_the_stream() {
    let server = spawn_server().await;
    let mut session = server.connect("/mcp", &[]).await;

    let unknown_method = session.request("resources/list", json!({})).await;
    assert_eq!(unknown_method["error"]["code"], -32601);

    let unknown_tool = session
        .request("tools/call", json!({"name": "nope", "arguments": {}}))
        .await;
    assert_eq!(unknown_tool["error"]["code"], -32602);

    let positional = session
        .request("tools/call", json!({"name": "create_note", "arguments": ["A", "1"]}))
        .await;
    assert!(positional.get("error").is_none());
    assert_eq!(positional["result"]["isError"], true);

    let not_found = session.call_tool("get_note", json!({"id": 404})).await;
    assert_eq!(not_found["isError"], true);
    assert_eq!(not_found["content"][0]["text"], "Note 404 not found");

    let tools = session.request("tools/list", json!({})).await;
    assert_eq!(tools["result"]["tools"].as_array().unwrap().len(), 7);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn disconnect_tears_the_session_down_once() {
    let server = spawn_server_with(fast_heartbeat).await;
    let session = server.connect("/mcp", &[]).await;
    let session_id = session.session_id.clone();

    drop(session);
    assert!(server.eventually(|s| s.connections.teardown_count() == 1).await);
    assert!(server.state.connections.registry().is_empty());

    let response = server
        .post_raw(&session_id, r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#)
        .await;
    assert_eq!(response.status(), 404);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn heartbeats_arrive_after_the_start_delay() {
    let server = spawn_server_with(fast_heartbeat).await;
    let mut session = server.connect("/mcp", &[]).await;

    let first = session.events.next_event().await;
    assert!(first.comment);
    assert!(first.event.is_none());
    let second = session.events.next_event().await;
    assert!(second.comment);

    // Requests still interleave cleanly with heartbeats
    let pong = session.request("ping", json!({})).await;
    assert_eq!(pong["result"], json!({}));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn explicit_shutdown_ends_streams() {
    let server = spawn_server().await;
    let mut a = server.connect("/mcp", &[]).await;
    let _b = server.connect("/mcp", &[]).await;

    assert_eq!(server.state.connections.shutdown(), 2);
    assert!(server.state.connections.registry().is_empty());

    let ended = tokio::time::timeout(Duration::from_secs(5), a.events.try_next_event())
        .await
        .unwrap();
    assert!(ended.is_none());
}
