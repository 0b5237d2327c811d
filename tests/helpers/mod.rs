#![allow(dead_code)]

use std::pin::Pin;
use std::time::Duration;

use futures::{Stream, StreamExt};
use local_notes::config::NotesConfig;
use local_notes::db::Pool;
use local_notes::notes::types::User;
use local_notes::notes::users;
use local_notes::server::{router, AppState};
use serde_json::{json, Value};
use tempfile::TempDir;

const WAIT: Duration = Duration::from_secs(5);

/// A server bound to an ephemeral port with its own temp database.
pub struct TestServer {
    pub base: String,
    pub state: AppState,
    pub http: reqwest::Client,
    _tmp: TempDir,
}

pub async fn spawn_server() -> TestServer {
    spawn_server_with(|_| {}).await
}

pub async fn spawn_server_with(tweak: impl FnOnce(&mut NotesConfig)) -> TestServer {
    let tmp = TempDir::new().unwrap();
    let mut config = NotesConfig::default();
    config.storage.db_path = tmp.path().join("notes.db").to_string_lossy().into_owned();
    config.storage.pool_size = 4;
    tweak(&mut config);

    let pool = Pool::open(config.resolved_db_path(), config.storage.pool_size).unwrap();
    let state = AppState::new(pool, &config);
    let app = router(state.clone(), config.server.max_body_bytes);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestServer {
        base: format!("http://{addr}"),
        state,
        http: reqwest::Client::new(),
        _tmp: tmp,
    }
}

impl TestServer {
    pub async fn create_user(&self, username: &str) -> User {
        let username = username.to_string();
        self.state
            .pool
            .run(move |conn| users::create_user(conn, &username, false))
            .await
            .unwrap()
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base)
    }

    /// Open an MCP session at `path` (e.g. `/mcp` or `/mcp/<key>`).
    pub async fn connect(&self, path: &str, headers: &[(&str, &str)]) -> McpSession {
        let mut request = self.http.get(self.url(path));
        for (name, value) in headers {
            request = request.header(*name, *value);
        }
        let response = request.send().await.unwrap();
        assert_eq!(response.status(), 200);

        let mut events = SseReader::new(response);
        let endpoint = events.next_event().await;
        assert_eq!(endpoint.event.as_deref(), Some("endpoint"));
        let session_id = endpoint
            .data
            .split("sessionId=")
            .nth(1)
            .unwrap()
            .to_string();

        McpSession {
            post_url: self.url(&endpoint.data),
            session_id,
            events,
            http: self.http.clone(),
            next_id: 1,
        }
    }

    pub async fn post_raw(&self, session_id: &str, body: &str) -> reqwest::Response {
        let url = format!(
            "{}?sessionId={session_id}",
            self.url(self.state.connections.message_path())
        );
        self.http
            .post(url)
            .header("content-type", "application/json")
            .body(body.to_string())
            .send()
            .await
            .unwrap()
    }

    /// Poll until `check` holds or the wait runs out.
    pub async fn eventually(&self, check: impl Fn(&AppState) -> bool) -> bool {
        let deadline = tokio::time::Instant::now() + WAIT;
        while tokio::time::Instant::now() < deadline {
            if check(&self.state) {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        check(&self.state)
    }
}

#[derive(Debug, Default)]
pub struct SseEvent {
    pub event: Option<String>,
    pub data: String,
    pub comment: bool,
}

type ByteStream = Pin<Box<dyn Stream<Item = reqwest::Result<axum::body::Bytes>> + Send>>;

/// Minimal `text/event-stream` parser over a streaming response body.
pub struct SseReader {
    pub headers: reqwest::header::HeaderMap,
    stream: ByteStream,
    buf: String,
}

impl SseReader {
    pub fn new(response: reqwest::Response) -> Self {
        Self {
            headers: response.headers().clone(),
            stream: Box::pin(response.bytes_stream()),
            buf: String::new(),
        }
    }

    /// Next complete event, or `None` once the server ends the stream.
    pub async fn try_next_event(&mut self) -> Option<SseEvent> {
        loop {
            if let Some(pos) = self.buf.find("\n\n") {
                let raw: String = self.buf.drain(..pos + 2).collect();
                return Some(parse_event(&raw));
            }
            let chunk = tokio::time::timeout(WAIT, self.stream.next())
                .await
                .expect("timed out waiting for an SSE event")?;
            let chunk = chunk.ok()?;
            self.buf.push_str(&String::from_utf8_lossy(&chunk).replace("\r\n", "\n"));
        }
    }

    pub async fn next_event(&mut self) -> SseEvent {
        self.try_next_event().await.expect("stream ended")
    }

    /// Next `message` event as JSON, skipping heartbeats.
    pub async fn next_message(&mut self) -> Value {
        loop {
            let event = self.next_event().await;
            if event.event.as_deref() == Some("message") {
                return serde_json::from_str(&event.data).unwrap();
            }
        }
    }
}

fn parse_event(raw: &str) -> SseEvent {
    let mut event = SseEvent::default();
    let mut data = Vec::new();
    for line in raw.lines() {
        if line.starts_with(':') {
            event.comment = true;
        } else if let Some(rest) = line.strip_prefix("event:") {
            event.event = Some(rest.trim_start().to_string());
        } else if let Some(rest) = line.strip_prefix("data:") {
            data.push(rest.strip_prefix(' ').unwrap_or(rest).to_string());
        }
    }
    event.data = data.join("\n");
    event
}

/// One agent-side MCP session.
pub struct McpSession {
    pub post_url: String,
    pub session_id: String,
    pub events: SseReader,
    http: reqwest::Client,
    next_id: u64,
}

impl McpSession {
    /// Post a JSON-RPC message and return the HTTP status of the POST.
    pub async fn post(&self, message: &Value) -> u16 {
        self.http
            .post(&self.post_url)
            .header("content-type", "application/json")
            .body(message.to_string())
            .send()
            .await
            .unwrap()
            .status()
            .as_u16()
    }

    /// Send a request and wait for its response on the stream.
    pub async fn request(&mut self, method: &str, params: Value) -> Value {
        let id = self.next_id;
        self.next_id += 1;
        let status = self
            .post(&json!({"jsonrpc": "2.0", "id": id, "method": method, "params": params}))
            .await;
        assert_eq!(status, 202);

        loop {
            let message = self.events.next_message().await;
            if message["id"] == json!(id) {
                return message;
            }
        }
    }

    /// Call a tool; returns the `result` object.
    pub async fn call_tool(&mut self, name: &str, arguments: Value) -> Value {
        let response = self
            .request("tools/call", json!({"name": name, "arguments": arguments}))
            .await;
        assert!(response.get("error").is_none(), "unexpected error: {response}");
        response["result"].clone()
    }

    /// Call a tool expected to succeed and parse its JSON text payload.
    pub async fn call_ok(&mut self, name: &str, arguments: Value) -> Value {
        let result = self.call_tool(name, arguments).await;
        assert_ne!(result["isError"], json!(true), "tool error: {result}");
        serde_json::from_str(result["content"][0]["text"].as_str().unwrap()).unwrap()
    }
}
