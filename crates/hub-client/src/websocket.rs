//! Hub WebSocket session: authentication handshake and id-correlated
//! service calls.
//!
//! The conversation is strict:
//! 1. hub sends `auth_required`
//! 2. client sends `auth` with the access token
//! 3. hub replies `auth_ok` (anything else aborts the session)
//!
//! After that each request carries a per-connection id and the reply with the
//! same id is awaited, discarding unrelated traffic. Every wait is bounded by
//! the response timeout and the number of discarded messages is capped.

use std::time::Duration;

use dashboard_common::{DashError, DashResult};
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio::time::{timeout, timeout_at, Instant};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, instrument};

/// Unrelated messages tolerated while waiting for one reply.
pub const MAX_DISCARDED_MESSAGES: usize = 64;

const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// Reported as the message type when a handshake frame is not JSON.
const NON_JSON: &str = "<non-JSON>";

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Clone, Copy)]
pub struct SessionTimeouts {
    pub connect: Duration,
    /// Bound on each awaited reply, handshake messages included
    pub response: Duration,
}

/// Forecast series offered by `weather.get_forecasts`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForecastKind {
    Hourly,
    TwiceDaily,
}

impl ForecastKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ForecastKind::Hourly => "hourly",
            ForecastKind::TwiceDaily => "twice_daily",
        }
    }
}

/// An authenticated WebSocket session with the hub.
///
/// Call [`HubSession::close`] when done; dropping the session still tears
/// down the TCP connection but skips the close handshake.
pub struct HubSession {
    stream: WsStream,
    next_id: u64,
    timeouts: SessionTimeouts,
}

impl HubSession {
    /// Connect and authenticate. The connection is closed again if the
    /// handshake fails.
    #[instrument(skip(access_token, timeouts))]
    pub async fn connect(
        url: &str,
        access_token: &str,
        timeouts: SessionTimeouts,
    ) -> DashResult<Self> {
        let (stream, _response) = timeout(timeouts.connect, connect_async(url))
            .await
            .map_err(|_| DashError::Timeout(format!("WebSocket connect to {}", url)))?
            .map_err(|e| DashError::Connection {
                entity: url.to_string(),
                message: e.to_string(),
            })?;

        let mut session = Self {
            stream,
            next_id: 1,
            timeouts,
        };

        if let Err(e) = session.authenticate(access_token).await {
            session.close().await;
            return Err(e);
        }

        debug!("WebSocket session authenticated");
        Ok(session)
    }

    async fn authenticate(&mut self, access_token: &str) -> DashResult<()> {
        let greeting = self.receive_handshake("auth_required").await?;
        let kind = message_type(&greeting);
        if kind != "auth_required" {
            return Err(DashError::UnexpectedMessage {
                expected: "auth_required".to_string(),
                got: kind.to_string(),
            });
        }

        self.send(json!({ "type": "auth", "access_token": access_token }))
            .await?;

        let reply = self.receive_handshake("auth_ok").await?;
        match message_type(&reply) {
            "auth_ok" => Ok(()),
            "auth_invalid" => Err(DashError::AuthRejected(
                reply
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("auth_invalid")
                    .to_string(),
            )),
            other => Err(DashError::UnexpectedMessage {
                expected: "auth_ok".to_string(),
                got: other.to_string(),
            }),
        }
    }

    /// Handshake frames that are not JSON break the conversation the same way
    /// a wrong message type does.
    async fn receive_handshake(&mut self, expected: &str) -> DashResult<Value> {
        match self.receive(expected, self.deadline()).await {
            Err(DashError::Json { .. }) => Err(DashError::UnexpectedMessage {
                expected: expected.to_string(),
                got: NON_JSON.to_string(),
            }),
            other => other,
        }
    }

    /// Issue a `call_service` request and return its `result` object.
    pub async fn call_service(
        &mut self,
        domain: &str,
        service: &str,
        service_data: Value,
        entity_id: &str,
    ) -> DashResult<Value> {
        let id = self.next_id;
        self.next_id += 1;

        self.send(json!({
            "id": id,
            "type": "call_service",
            "domain": domain,
            "service": service,
            "service_data": service_data,
            "target": { "entity_id": entity_id },
            "return_response": true,
        }))
        .await?;

        let deadline = self.deadline();
        let mut discarded = 0;
        loop {
            let message = self.receive(entity_id, deadline).await?;
            if message.get("id").and_then(Value::as_u64) == Some(id) {
                return result_payload(id, message);
            }

            discarded += 1;
            debug!(
                expected = id,
                got = ?message.get("id"),
                kind = message_type(&message),
                "Discarding unrelated message"
            );
            if discarded >= MAX_DISCARDED_MESSAGES {
                return Err(DashError::UnmatchedResponse { id, discarded });
            }
        }
    }

    /// Forecast list of a weather entity via `weather.get_forecasts`.
    pub async fn get_forecasts(
        &mut self,
        entity_id: &str,
        kind: ForecastKind,
    ) -> DashResult<Vec<Value>> {
        let result = self
            .call_service(
                "weather",
                "get_forecasts",
                json!({ "type": kind.as_str() }),
                entity_id,
            )
            .await?;

        match result
            .get("response")
            .and_then(|r| r.get(entity_id))
            .and_then(|e| e.get("forecast"))
        {
            Some(Value::Array(points)) => Ok(points.clone()),
            _ => Err(DashError::MissingField {
                entity: entity_id.to_string(),
                field: format!("response.{}.forecast", entity_id),
            }),
        }
    }

    /// Close the connection, giving the hub a short window to acknowledge.
    pub async fn close(mut self) {
        match timeout(CLOSE_TIMEOUT, self.stream.close(None)).await {
            Ok(Ok(())) => debug!("WebSocket session closed"),
            Ok(Err(e)) => debug!(error = %e, "WebSocket close failed"),
            Err(_) => debug!("WebSocket close timed out"),
        }
    }

    fn deadline(&self) -> Instant {
        Instant::now() + self.timeouts.response
    }

    async fn send(&mut self, message: Value) -> DashResult<()> {
        if let Some(kind) = message.get("type").and_then(Value::as_str) {
            debug!(kind, id = ?message.get("id"), "Sending");
        }
        self.stream
            .send(Message::Text(message.to_string()))
            .await
            .map_err(|e| DashError::Connection {
                entity: "websocket".to_string(),
                message: e.to_string(),
            })
    }

    /// Next JSON message, skipping control frames.
    async fn receive(&mut self, waiting_for: &str, deadline: Instant) -> DashResult<Value> {
        loop {
            let next = timeout_at(deadline, self.stream.next())
                .await
                .map_err(|_| DashError::Timeout(format!("WebSocket reply for {}", waiting_for)))?;

            let text = match next {
                Some(Ok(Message::Text(text))) => text,
                Some(Ok(Message::Binary(bytes))) => String::from_utf8_lossy(&bytes).into_owned(),
                Some(Ok(Message::Close(_))) | None => return Err(DashError::SessionClosed),
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    return Err(DashError::Connection {
                        entity: "websocket".to_string(),
                        message: e.to_string(),
                    })
                }
            };

            return serde_json::from_str(&text).map_err(|e| DashError::payload(waiting_for, e));
        }
    }
}

fn message_type(message: &Value) -> &str {
    message.get("type").and_then(Value::as_str).unwrap_or("")
}

/// Unwrap a `result` message, surfacing the hub's error on `success: false`.
fn result_payload(id: u64, message: Value) -> DashResult<Value> {
    if message.get("success").and_then(Value::as_bool) == Some(true) {
        return Ok(message.get("result").cloned().unwrap_or(Value::Null));
    }

    let error = message.get("error");
    let field = |name: &str| {
        error
            .and_then(|e| e.get(name))
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string()
    };
    Err(DashError::ServiceCall {
        id,
        code: field("code"),
        message: field("message"),
    })
}
