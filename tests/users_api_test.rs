mod helpers;

use helpers::{spawn_server, TestServer};
use local_notes::notes::store;
use local_notes::notes::types::Tenant;
use local_notes::session::SessionId;
use serde_json::{json, Value};

async fn json_of(response: reqwest::Response) -> Value {
    serde_json::from_str(&response.text().await.unwrap()).unwrap()
}

fn set_cookie(response: &reqwest::Response) -> String {
    response
        .headers()
        .get("set-cookie")
        .expect("response should set a cookie")
        .to_str()
        .unwrap()
        .to_string()
}

async fn send(
    server: &TestServer,
    method: reqwest::Method,
    path: &str,
    auth: &[(&str, &str)],
    body: Option<Value>,
) -> reqwest::Response {
    let mut request = server.http.request(method, server.url(path));
    for (name, value) in auth {
        request = request.header(*name, *value);
    }
    if let Some(body) = body {
        request = request
            .header("content-type", "application/json")
            .body(body.to_string());
    }
    request.send().await.unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn register_login_logout_cycle() {
    use reqwest::Method;
    let server = spawn_server().await;

    let registered = send(&server, Method::POST, "/api/users/register", &[], Some(json!({"username": "ada"}))).await;
    assert_eq!(registered.status(), 201);
    let cookie = set_cookie(&registered);
    let ada = json_of(registered).await;
    let id = ada["id"].as_i64().unwrap();
    assert!(cookie.starts_with(&format!("user_id={id}")), "{cookie}");
    assert!(cookie.contains("Path=/"), "{cookie}");
    assert!(cookie.contains("Max-Age=2592000"), "{cookie}");
    assert_eq!(ada["is_admin"], true);
    let api_key = ada["api_key"].as_str().unwrap().to_string();

    let session = format!("user_id={id}");
    let current = json_of(send(&server, Method::GET, "/api/users/current", &[("cookie", session.as_str())], None).await).await;
    assert_eq!(current["username"], "ada");
    assert_eq!(current["is_super_admin"], true);

    let nobody = json_of(send(&server, Method::GET, "/api/users/current", &[], None).await).await;
    assert_eq!(nobody, Value::Null);

    let taken = send(&server, Method::POST, "/api/users/register", &[], Some(json!({"username": "ADA"}))).await;
    assert_eq!(taken.status(), 409);
    let blank = send(&server, Method::POST, "/api/users/register", &[], Some(json!({"username": " "}))).await;
    assert_eq!(blank.status(), 400);

    let wrong = send(
        &server,
        Method::POST,
        "/api/users/login",
        &[],
        Some(json!({"username": "ada", "api_key": "not-the-key"})),
    )
    .await;
    assert_eq!(wrong.status(), 401);

    let login = send(
        &server,
        Method::POST,
        "/api/users/login",
        &[],
        Some(json!({"username": "Ada", "api_key": api_key})),
    )
    .await;
    assert_eq!(login.status(), 200);
    assert!(set_cookie(&login).starts_with(&format!("user_id={id}")));

    let renamed = send(
        &server,
        Method::PUT,
        "/api/users/current",
        &[("cookie", session.as_str())],
        Some(json!({"username": "lovelace"})),
    )
    .await;
    assert_eq!(json_of(renamed).await["username"], "lovelace");

    let anonymous_rename = send(
        &server,
        Method::PUT,
        "/api/users/current",
        &[],
        Some(json!({"username": "ghost"})),
    )
    .await;
    assert_eq!(anonymous_rename.status(), 401);

    let logout = send(&server, Method::POST, "/api/users/logout", &[("cookie", session.as_str())], None).await;
    assert_eq!(logout.status(), 200);
    let cleared = set_cookie(&logout);
    assert!(cleared.starts_with("user_id=;"), "{cleared}");
    assert!(cleared.contains("Max-Age=0"), "{cleared}");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn admin_user_management() {
    use reqwest::Method;
    let server = spawn_server().await;
    let ada = server.create_user("ada").await;
    let grace = server.create_user("grace").await;
    let bob = server.create_user("bob").await;
    let as_ada = [("x-api-key", ada.api_key.as_str())];
    let as_grace = [("x-api-key", grace.api_key.as_str())];

    let denied = send(&server, Method::DELETE, &format!("/api/admin/users/{}", bob.id), &as_grace, None).await;
    assert_eq!(denied.status(), 403);

    let promoted = send(
        &server,
        Method::PUT,
        &format!("/api/admin/users/{}", grace.id),
        &as_ada,
        Some(json!({"is_admin": true})),
    )
    .await;
    assert_eq!(json_of(promoted).await["is_admin"], true);

    // A plain admin cannot touch the super admin or hand out admin rights.
    let touch_super = send(
        &server,
        Method::PUT,
        &format!("/api/admin/users/{}", ada.id),
        &as_grace,
        Some(json!({"username": "mallory"})),
    )
    .await;
    assert_eq!(touch_super.status(), 403);
    let grant = send(
        &server,
        Method::PUT,
        &format!("/api/admin/users/{}", bob.id),
        &as_grace,
        Some(json!({"is_admin": true})),
    )
    .await;
    assert_eq!(grant.status(), 403);

    let renamed = send(
        &server,
        Method::PUT,
        &format!("/api/admin/users/{}", bob.id),
        &as_grace,
        Some(json!({"username": "robert"})),
    )
    .await;
    assert_eq!(json_of(renamed).await["username"], "robert");

    let demote_self = send(
        &server,
        Method::PUT,
        &format!("/api/admin/users/{}", ada.id),
        &as_ada,
        Some(json!({"is_admin": false})),
    )
    .await;
    assert_eq!(demote_self.status(), 400);

    let delete_super = send(&server, Method::DELETE, &format!("/api/admin/users/{}", ada.id), &as_grace, None).await;
    assert_eq!(delete_super.status(), 403);
    let delete_self = send(&server, Method::DELETE, &format!("/api/admin/users/{}", ada.id), &as_ada, None).await;
    assert_eq!(delete_self.status(), 400);

    let bob_id = bob.id;
    server
        .state
        .pool
        .run(move |conn| store::create_note(conn, Tenant::User(bob_id), "bob's", "note"))
        .await
        .unwrap();
    let bob_session = server.connect(&format!("/mcp/{}", bob.api_key), &[]).await;

    let deleted = send(&server, Method::DELETE, &format!("/api/admin/users/{}", bob.id), &as_ada, None).await;
    assert_eq!(deleted.status(), 200);
    let deleted = json_of(deleted).await;
    assert_eq!(deleted["deletedNotes"], 1);
    assert_eq!(deleted["closedSessions"], 1);
    let bob_session_id = SessionId::from(bob_session.session_id.as_str());
    assert!(server.state.connections.registry().get(&bob_session_id).is_none());

    let orphan = json_of(
        send(&server, Method::GET, "/api/users/current", &[("x-api-key", bob.api_key.as_str())], None).await,
    )
    .await;
    assert_eq!(orphan, Value::Null);

    let again = send(&server, Method::DELETE, &format!("/api/admin/users/{}", bob.id), &as_ada, None).await;
    assert_eq!(again.status(), 404);
}
