//! In-process mock of the hub's REST and WebSocket APIs.
//!
//! Routes answer with canned JSON; every REST request and every WebSocket
//! message from the client is recorded so tests can assert on what was sent.
//!
//! ```ignore
//! let hub = MockHub::new()
//!     .state("sensor.price", "4.2")
//!     .forecasts("weather.home", "hourly", hourly_forecast(start, 5, "sunny"))
//!     .spawn()
//!     .await;
//! let config = HubConfig { base_url: hub.base_url(), ..Default::default() };
//! ```

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use serde_json::{json, Value};
use tokio::task::JoinHandle;

use crate::fixtures::entity_state;

/// How the mock answers on its WebSocket endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WsBehavior {
    /// Regular handshake, one reply per request
    #[default]
    Normal,
    /// Regular handshake; unrelated messages with other ids precede each reply
    Noisy,
    /// First message is not `auth_required`
    WrongGreeting,
    /// First message is plain text rather than JSON
    GarbageGreeting,
    /// Accepts the connection but never sends `auth_required`
    SilentGreeting,
    /// Replies `auth_invalid` to the auth message
    RejectAuth,
    /// Authenticates, then never answers requests
    Unresponsive,
    /// Authenticates, then floods unrelated messages instead of answering
    Flood,
}

/// One REST request as seen by the mock.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub path: String,
    pub query: Option<String>,
    pub authorization: Option<String>,
}

/// Canned REST answer, optionally held back before it is sent.
#[derive(Debug, Clone)]
struct CannedRoute {
    status: u16,
    body: String,
    delay: Option<Duration>,
}

/// Builder for a mock hub.
#[derive(Debug, Clone, Default)]
pub struct MockHub {
    routes: HashMap<String, CannedRoute>,
    histories: HashMap<String, Value>,
    forecasts: HashMap<(String, String), Value>,
    websocket: WsBehavior,
}

impl MockHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `body` with `status` at an exact path (query ignored).
    pub fn route(mut self, path: &str, status: u16, body: impl Into<String>) -> Self {
        let route = CannedRoute {
            status,
            body: body.into(),
            delay: None,
        };
        self.routes.insert(path.to_string(), route);
        self
    }

    /// `GET /api/states/{entity_id}` returning a plain state.
    pub fn state(self, entity_id: &str, state: &str) -> Self {
        let body = entity_state(entity_id, state).to_string();
        self.route(&format!("/api/states/{}", entity_id), 200, body)
    }

    /// `GET /api/states/{entity_id}` with attributes (e.g. a forecast list).
    pub fn state_with_attributes(self, entity_id: &str, state: &str, attributes: Value) -> Self {
        let mut body = entity_state(entity_id, state);
        body["attributes"] = attributes;
        self.route(&format!("/api/states/{}", entity_id), 200, body.to_string())
    }

    /// `GET /api/states/{entity_id}` answered only after `delay`.
    pub fn delayed_state(mut self, entity_id: &str, state: &str, delay: Duration) -> Self {
        let route = CannedRoute {
            status: 200,
            body: entity_state(entity_id, state).to_string(),
            delay: Some(delay),
        };
        self.routes
            .insert(format!("/api/states/{}", entity_id), route);
        self
    }

    /// `GET /api/states/{entity_id}` failing with `status`.
    pub fn failing_state(self, entity_id: &str, status: u16) -> Self {
        self.route(
            &format!("/api/states/{}", entity_id),
            status,
            json!({ "message": "Entity not found." }).to_string(),
        )
    }

    /// History response for `filter_entity_id={entity_id}`, any start time.
    pub fn history(mut self, entity_id: &str, body: Value) -> Self {
        self.histories.insert(entity_id.to_string(), body);
        self
    }

    /// Forecast list returned by `weather.get_forecasts` for an entity and type.
    pub fn forecasts(mut self, entity_id: &str, kind: &str, points: Value) -> Self {
        self.forecasts
            .insert((entity_id.to_string(), kind.to_string()), points);
        self
    }

    pub fn websocket(mut self, behavior: WsBehavior) -> Self {
        self.websocket = behavior;
        self
    }

    /// Bind to an ephemeral local port and start serving.
    pub async fn spawn(self) -> MockHubHandle {
        let state = HubState {
            hub: Arc::new(self),
            requests: Arc::new(Mutex::new(Vec::new())),
            ws_received: Arc::new(Mutex::new(Vec::new())),
            ws_sessions: Arc::new(Mutex::new(0)),
        };

        let app = Router::new()
            .route("/api/websocket", get(websocket_handler))
            .fallback(rest_handler)
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind mock hub");
        let addr = listener.local_addr().expect("Mock hub has no local address");

        let task = tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        MockHubHandle { addr, state, task }
    }
}

#[derive(Clone)]
struct HubState {
    hub: Arc<MockHub>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    ws_received: Arc<Mutex<Vec<Value>>>,
    ws_sessions: Arc<Mutex<usize>>,
}

/// A running mock hub; stops serving when dropped.
pub struct MockHubHandle {
    addr: SocketAddr,
    state: HubState,
    task: JoinHandle<()>,
}

impl MockHubHandle {
    /// REST base URL, e.g. `http://127.0.0.1:4242/api`
    pub fn base_url(&self) -> String {
        format!("http://{}/api", self.addr)
    }

    pub fn websocket_url(&self) -> String {
        format!("ws://{}/api/websocket", self.addr)
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.requests.lock().unwrap().clone()
    }

    /// Messages the client sent over WebSocket, across all sessions.
    pub fn websocket_messages(&self) -> Vec<Value> {
        self.state.ws_received.lock().unwrap().clone()
    }

    /// Number of WebSocket sessions that have ended.
    pub fn websocket_sessions_closed(&self) -> usize {
        *self.state.ws_sessions.lock().unwrap()
    }
}

impl Drop for MockHubHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn rest_handler(State(state): State<HubState>, uri: Uri, headers: HeaderMap) -> Response {
    let path = uri.path().to_string();
    let query = uri.query().map(str::to_string);
    state.requests.lock().unwrap().push(RecordedRequest {
        path: path.clone(),
        query: query.clone(),
        authorization: headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
    });

    let found = if path.starts_with("/api/history/period/") {
        query
            .as_deref()
            .and_then(|q| query_param(q, "filter_entity_id"))
            .and_then(|entity| state.hub.histories.get(&entity))
            .map(|body| CannedRoute {
                status: 200,
                body: body.to_string(),
                delay: None,
            })
    } else {
        state.hub.routes.get(&path).cloned()
    };

    match found {
        Some(route) => {
            if let Some(delay) = route.delay {
                tokio::time::sleep(delay).await;
            }
            (
                StatusCode::from_u16(route.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
                [(header::CONTENT_TYPE, "application/json")],
                route.body,
            )
                .into_response()
        }
        None => (StatusCode::NOT_FOUND, "404: Not Found").into_response(),
    }
}

fn query_param(query: &str, name: &str) -> Option<String> {
    query.split('&').find_map(|pair| {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        (key == name).then(|| value.to_string())
    })
}

async fn websocket_handler(ws: WebSocketUpgrade, State(state): State<HubState>) -> Response {
    ws.on_upgrade(move |socket| async move {
        run_session(socket, &state).await;
        *state.ws_sessions.lock().unwrap() += 1;
    })
}

async fn run_session(mut socket: WebSocket, state: &HubState) {
    let behavior = state.hub.websocket;

    match behavior {
        WsBehavior::SilentGreeting => {
            drain(&mut socket, state).await;
            return;
        }
        WsBehavior::GarbageGreeting => {
            if send_text(&mut socket, "Welcome to the hub".to_string()).await.is_ok() {
                drain(&mut socket, state).await;
            }
            return;
        }
        _ => {}
    }

    let greeting = if behavior == WsBehavior::WrongGreeting {
        json!({ "type": "event", "event": { "event_type": "state_changed" } })
    } else {
        json!({ "type": "auth_required", "ha_version": "2024.6.0" })
    };
    if send(&mut socket, greeting).await.is_err() {
        return;
    }
    if behavior == WsBehavior::WrongGreeting {
        drain(&mut socket, state).await;
        return;
    }

    if receive(&mut socket, state).await.is_none() {
        return;
    }

    let reply = if behavior == WsBehavior::RejectAuth {
        json!({ "type": "auth_invalid", "message": "Invalid access token or password" })
    } else {
        json!({ "type": "auth_ok", "ha_version": "2024.6.0" })
    };
    if send(&mut socket, reply).await.is_err() || behavior == WsBehavior::RejectAuth {
        drain(&mut socket, state).await;
        return;
    }

    while let Some(request) = receive(&mut socket, state).await {
        let id = request.get("id").and_then(Value::as_u64).unwrap_or(0);

        match behavior {
            WsBehavior::Unresponsive => continue,
            WsBehavior::Flood => {
                for n in 0..200u64 {
                    let noise = json!({ "id": id + 1000 + n, "type": "event", "event": {} });
                    if send(&mut socket, noise).await.is_err() {
                        return;
                    }
                }
                continue;
            }
            WsBehavior::Noisy => {
                let noise = [
                    json!({ "id": id + 100, "type": "event", "event": { "event_type": "state_changed" } }),
                    json!({ "id": id + 101, "type": "result", "success": true, "result": null }),
                ];
                for message in noise {
                    if send(&mut socket, message).await.is_err() {
                        return;
                    }
                }
            }
            _ => {}
        }

        if send(&mut socket, service_reply(&state.hub, id, &request))
            .await
            .is_err()
        {
            return;
        }
    }
}

fn service_reply(hub: &MockHub, id: u64, request: &Value) -> Value {
    let entity = request
        .pointer("/target/entity_id")
        .and_then(Value::as_str)
        .unwrap_or("");
    let kind = request
        .pointer("/service_data/type")
        .and_then(Value::as_str)
        .unwrap_or("");

    match hub.forecasts.get(&(entity.to_string(), kind.to_string())) {
        Some(points) => json!({
            "id": id,
            "type": "result",
            "success": true,
            "result": { "response": { entity: { "forecast": points } } },
        }),
        None => json!({
            "id": id,
            "type": "result",
            "success": false,
            "error": { "code": "service_validation_error", "message": format!("No forecast for {}", entity) },
        }),
    }
}

async fn send(socket: &mut WebSocket, message: Value) -> Result<(), axum::Error> {
    send_text(socket, message.to_string()).await
}

async fn send_text(socket: &mut WebSocket, text: String) -> Result<(), axum::Error> {
    socket.send(Message::Text(text)).await
}

/// Next JSON message from the client; `None` once the client goes away.
async fn receive(socket: &mut WebSocket, state: &HubState) -> Option<Value> {
    loop {
        match socket.recv().await {
            Some(Ok(Message::Text(text))) => {
                let value: Value = serde_json::from_str(&text).unwrap_or(Value::Null);
                state.ws_received.lock().unwrap().push(value.clone());
                return Some(value);
            }
            Some(Ok(Message::Close(_))) | Some(Err(_)) | None => return None,
            Some(Ok(_)) => continue,
        }
    }
}

/// Keep the socket open until the client closes it, with an upper bound.
async fn drain(socket: &mut WebSocket, state: &HubState) {
    let _ = tokio::time::timeout(Duration::from_secs(5), async {
        while receive(socket, state).await.is_some() {}
    })
    .await;
}
