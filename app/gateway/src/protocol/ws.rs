//! WebSocket server -- axum endpoint and per-socket message loop.
//!
//! A single `/ws` path serves four jobs: CORS preflight, WebSocket
//! upgrade, the HTTP poll view, and method rejection. Poll and upgrade
//! both require a usable `uid` query parameter.

use crate::protocol::{origin_allowed, sanitize_uid};
use crate::run::BeginRequest;
use crate::state::AppState;
use crate::dispatch::Driver;
use axum::{
    Json, Router,
    extract::{
        FromRequestParts, Query, Request, State, WebSocketUpgrade,
        ws::{Message as WsMessage, WebSocket},
    },
    http::{HeaderMap, HeaderValue, Method, StatusCode, header},
    response::{IntoResponse, Response},
    routing::any,
};
use compact_str::CompactString;
use futures_util::{SinkExt, StreamExt};
use llm::{RequestBody, sanitize_messages};
use protocol::{ClientMessage, ServerMessage};
use serde_json::{Value, json};
use std::collections::BTreeMap;
use tokio::sync::mpsc;

/// Build the axum router with the `/ws` endpoint.
pub fn router<D: Driver>(state: AppState<D>) -> Router {
    Router::new()
        .route("/ws", any(ws_endpoint::<D>))
        .with_state(state)
}

/// Single entry point for everything under `/ws`.
async fn ws_endpoint<D: Driver>(
    State(state): State<AppState<D>>,
    method: Method,
    headers: HeaderMap,
    Query(query): Query<BTreeMap<String, String>>,
    request: Request,
) -> Response {
    let (mut parts, _body) = request.into_parts();
    let ws = WebSocketUpgrade::from_request_parts(&mut parts, &state)
        .await
        .ok();
    if let Some(origin) = headers.get(header::ORIGIN).and_then(|v| v.to_str().ok())
        && !origin_allowed(origin)
    {
        return with_cors(StatusCode::FORBIDDEN.into_response());
    }

    match method {
        Method::OPTIONS => with_cors(StatusCode::NO_CONTENT.into_response()),
        Method::GET => {
            let raw = query.get("uid").map(String::as_str).unwrap_or_default();
            let Some(uid) = sanitize_uid(raw) else {
                return with_cors(
                    (
                        StatusCode::BAD_REQUEST,
                        Json(json!({ "error": "uid is required" })),
                    )
                        .into_response(),
                );
            };
            match ws {
                Some(upgrade) => upgrade.on_upgrade(move |socket| handle_socket(socket, state, uid)),
                None => with_cors(Json(state.coordinator.poll(&uid).await).into_response()),
            }
        }
        _ => with_cors(StatusCode::METHOD_NOT_ALLOWED.into_response()),
    }
}

fn with_cors(mut response: Response) -> Response {
    let headers = response.headers_mut();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type, Authorization"),
    );
    headers.insert(
        header::ACCESS_CONTROL_MAX_AGE,
        HeaderValue::from_static("86400"),
    );
    response
}

/// Handle an established WebSocket connection.
async fn handle_socket<D: Driver>(socket: WebSocket, state: AppState<D>, uid: CompactString) {
    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();
    let socket_id = CompactString::from(uuid::Uuid::new_v4().to_string());

    state
        .coordinator
        .attach(&uid, socket_id.clone(), tx.clone())
        .await;

    // Sender task: forward ServerMessages to the WebSocket.
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let json = match serde_json::to_string(&msg) {
                Ok(json) => json,
                Err(e) => {
                    tracing::error!("failed to serialize server message: {e}");
                    continue;
                }
            };
            if sender.send(WsMessage::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    // Receiver loop: process inbound frames until the socket closes.
    while let Some(Ok(ws_msg)) = receiver.next().await {
        let text = match ws_msg {
            WsMessage::Text(t) => t,
            WsMessage::Close(_) => break,
            _ => continue,
        };

        let message = match protocol::decode(&text) {
            Ok(message) => message,
            Err(e) => {
                let _ = tx.send(ServerMessage::Error {
                    message: e.reason().to_owned(),
                });
                continue;
            }
        };

        match message {
            begin @ ClientMessage::Begin { .. } => match begin_request(begin) {
                Ok(request) => {
                    if let Err(e) = state.coordinator.begin(&uid, &socket_id, request).await {
                        let _ = tx.send(ServerMessage::Error {
                            message: e.reason().to_owned(),
                        });
                    }
                }
                Err(reason) => {
                    let _ = tx.send(ServerMessage::Error {
                        message: reason.to_owned(),
                    });
                }
            },
            ClientMessage::Stop { rid } => {
                if let Some(rid) = rid {
                    state.coordinator.stop(&uid, &rid).await;
                }
            }
            // decode() already rejects unknown frame types.
            ClientMessage::Unknown => {}
        }
    }

    state.coordinator.detach(&uid, &socket_id).await;
    drop(tx);
    let _ = send_task.await;
}

/// Validate a `begin` frame and assemble the normalized request: either
/// the `or_body` passthrough or a body synthesized from the envelope.
fn begin_request(message: ClientMessage) -> Result<BeginRequest, &'static str> {
    let ClientMessage::Begin {
        rid,
        api_key,
        provider,
        or_body,
        model,
        messages,
        after,
        temperature,
        top_p,
        max_tokens,
        reasoning,
        verbosity,
        response_format,
    } = message
    else {
        return Err("bad_type");
    };

    let Some(rid) = rid.filter(|r| !r.is_empty()) else {
        return Err("missing_fields");
    };
    let Some(api_key) = api_key.filter(|k| !k.is_empty()) else {
        return Err("missing_fields");
    };
    let provider = provider
        .and_then(|p| serde_json::from_value(Value::String(p.into())).ok())
        .unwrap_or_default();

    let mut body: RequestBody = match or_body {
        Some(value) => serde_json::from_value(value).map_err(|_| "missing_fields")?,
        None => RequestBody {
            model: model.unwrap_or_default(),
            messages: Vec::new(),
            stream: true,
            temperature,
            top_p,
            max_tokens: max_tokens.as_ref().and_then(Value::as_u64),
            reasoning: reasoning.and_then(|r| serde_json::from_value(r).ok()),
            verbosity,
            response_format,
            rest: BTreeMap::new(),
        },
    };
    if body.messages.is_empty() {
        let parsed = messages.and_then(|m| serde_json::from_value(m).ok());
        body.messages = parsed.ok_or("missing_fields")?;
    }
    if body.messages.is_empty() {
        return Err("missing_fields");
    }
    body.stream = true;
    sanitize_messages(&mut body.messages);

    Ok(BeginRequest {
        rid,
        api_key,
        provider,
        body,
        after: after.unwrap_or(-1),
    })
}

#[cfg(test)]
mod tests {
    use super::begin_request;
    use llm::ProviderKind;
    use protocol::{ClientMessage, decode};

    fn begin(json: &str) -> ClientMessage {
        decode(json).expect("begin frame")
    }

    #[test]
    fn envelope_synthesis() {
        let request = begin_request(begin(
            r#"{"type":"begin","rid":"r1","apiKey":"K","model":"m",
                "messages":[{"role":"user","content":"hi"}],"temperature":0.2}"#,
        ))
        .unwrap();
        assert_eq!(request.rid, "r1");
        assert_eq!(request.api_key, "K");
        assert_eq!(request.provider, ProviderKind::OpenRouter);
        assert_eq!(request.after, -1);
        assert_eq!(request.body.model, "m");
        assert!(request.body.stream);
        assert_eq!(request.body.temperature.as_ref().unwrap().as_f64(), Some(0.2));
        assert_eq!(request.body.messages.len(), 1);
    }

    #[test]
    fn missing_rid_or_key_or_messages_rejected() {
        let no_rid = begin(r#"{"type":"begin","apiKey":"K","model":"m","messages":[]}"#);
        assert_eq!(begin_request(no_rid).unwrap_err(), "missing_fields");

        let no_key = begin(r#"{"type":"begin","rid":"r","model":"m","messages":[]}"#);
        assert_eq!(begin_request(no_key).unwrap_err(), "missing_fields");

        let no_messages = begin(r#"{"type":"begin","rid":"r","apiKey":"K","model":"m"}"#);
        assert_eq!(begin_request(no_messages).unwrap_err(), "missing_fields");

        let empty_messages =
            begin(r#"{"type":"begin","rid":"r","apiKey":"K","model":"m","messages":[]}"#);
        assert_eq!(begin_request(empty_messages).unwrap_err(), "missing_fields");
    }

    #[test]
    fn or_body_passes_through_with_extras() {
        let request = begin_request(begin(
            r#"{"type":"begin","rid":"r1","apiKey":"K","provider":"openai",
                "or_body":{"model":"m","messages":[{"role":"user","content":"hi"}],
                           "provider_routing":{"order":["x"]}}}"#,
        ))
        .unwrap();
        assert_eq!(request.provider, ProviderKind::OpenAi);
        assert!(request.body.stream);
        assert_eq!(
            request.body.rest.get("provider_routing").unwrap()["order"][0],
            "x"
        );
    }

    #[test]
    fn blank_message_is_sanitized() {
        let request = begin_request(begin(
            r#"{"type":"begin","rid":"r1","apiKey":"K","model":"m",
                "messages":[{"role":"user","content":"   "}]}"#,
        ))
        .unwrap();
        assert_eq!(request.body.messages[0].content.joined_text(), ".");
    }

    #[test]
    fn unknown_provider_falls_back_to_openrouter() {
        let request = begin_request(begin(
            r#"{"type":"begin","rid":"r1","apiKey":"K","provider":"acme","model":"m",
                "messages":[{"role":"user","content":"hi"}]}"#,
        ))
        .unwrap();
        assert_eq!(request.provider, ProviderKind::OpenRouter);
    }

    #[test]
    fn after_cursor_carries() {
        let request = begin_request(begin(
            r#"{"type":"begin","rid":"r1","apiKey":"K","model":"m",
                "messages":[{"role":"user","content":"hi"}],"after":7}"#,
        ))
        .unwrap();
        assert_eq!(request.after, 7);
    }
}
