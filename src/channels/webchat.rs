//! Web chat channel: a JSON-over-WebSocket endpoint for browser clients.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    Router,
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
    routing::get,
};
use futures::stream;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, mpsc};
use tower_http::cors::CorsLayer;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::channels::{Channel, IncomingMessage, MessageStream, OutgoingResponse};
use crate::error::ChannelError;

const CHANNEL_NAME: &str = "webchat";
const WEB_USER: &str = "web-user";

// ── JSON Protocol ───────────────────────────────────────────────────────

/// Message from browser client → server.
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ClientMessage {
    #[serde(rename = "message")]
    Message {
        content: String,
        thread_id: Option<String>,
    },
}

/// Message from server → browser client.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
enum ServerMessage {
    #[serde(rename = "response")]
    Response {
        content: String,
        thread_id: Option<String>,
    },
    #[serde(rename = "error")]
    Error { message: String },
}

// ── Shared State ────────────────────────────────────────────────────────

struct WebChatInner {
    /// WS handlers → `Channel::start` stream.
    incoming_tx: mpsc::UnboundedSender<IncomingMessage>,
    /// Outbound queue of each connected socket, keyed by the thread it owns.
    sockets: Mutex<HashMap<String, mpsc::UnboundedSender<ServerMessage>>>,
}

#[derive(Clone)]
struct WsState {
    inner: Arc<WebChatInner>,
}

// ── WebChatChannel ──────────────────────────────────────────────────────

/// A WebSocket channel for browser chat.
///
/// Every socket owns exactly one server-assigned thread, so two tabs hold
/// two independent conversations. Replies go only to the socket that owns
/// the message's thread.
pub struct WebChatChannel {
    inner: Arc<WebChatInner>,
    incoming_rx: Mutex<Option<mpsc::UnboundedReceiver<IncomingMessage>>>,
}

impl Default for WebChatChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl WebChatChannel {
    pub fn new() -> Self {
        let (incoming_tx, incoming_rx) = mpsc::unbounded_channel();

        Self {
            inner: Arc::new(WebChatInner {
                incoming_tx,
                sockets: Mutex::new(HashMap::new()),
            }),
            incoming_rx: Mutex::new(Some(incoming_rx)),
        }
    }

    /// Axum router serving `/ws/chat`. Merge it into the server's app.
    pub fn router(&self) -> Router {
        let state = WsState {
            inner: Arc::clone(&self.inner),
        };

        Router::new()
            .route("/ws/chat", get(ws_chat_handler))
            .layer(CorsLayer::permissive())
            .with_state(state)
    }
}

#[async_trait]
impl Channel for WebChatChannel {
    fn name(&self) -> &str {
        CHANNEL_NAME
    }

    async fn start(&self) -> Result<MessageStream, ChannelError> {
        let rx = self
            .incoming_rx
            .lock()
            .await
            .take()
            .ok_or_else(|| ChannelError::StartupFailed {
                name: CHANNEL_NAME.to_string(),
                reason: "start() already called".to_string(),
            })?;

        let stream = stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|msg| (msg, rx))
        });

        Ok(Box::pin(stream))
    }

    async fn respond(
        &self,
        msg: &IncomingMessage,
        response: OutgoingResponse,
    ) -> Result<(), ChannelError> {
        let Some(thread_id) = msg.thread_id.clone() else {
            return Err(ChannelError::SendFailed {
                name: CHANNEL_NAME.into(),
                reason: "message has no thread".into(),
            });
        };
        let sockets = self.inner.sockets.lock().await;
        match sockets.get(&thread_id) {
            Some(tx) => {
                // A closed queue means the socket is going away.
                let _ = tx.send(ServerMessage::Response {
                    content: response.content,
                    thread_id: Some(thread_id),
                });
            }
            None => debug!(thread_id = %thread_id, "Web chat reply for a disconnected socket dropped"),
        }
        Ok(())
    }

    async fn health_check(&self) -> Result<(), ChannelError> {
        Ok(())
    }
}

// ── WebSocket Handler ───────────────────────────────────────────────────

async fn ws_chat_handler(ws: WebSocketUpgrade, State(state): State<WsState>) -> impl IntoResponse {
    info!("Web chat client connecting");
    ws.on_upgrade(|socket| handle_chat_socket(socket, state.inner))
}

async fn handle_chat_socket(mut socket: WebSocket, inner: Arc<WebChatInner>) {
    let thread_id = Uuid::new_v4().to_string();
    let (outgoing_tx, mut outgoing_rx) = mpsc::unbounded_channel();
    inner
        .sockets
        .lock()
        .await
        .insert(thread_id.clone(), outgoing_tx);
    info!(thread_id = %thread_id, "Web chat client connected");

    loop {
        tokio::select! {
            Some(msg) = outgoing_rx.recv() => {
                if send_json(&mut socket, &msg).await.is_err() {
                    debug!("Web chat client disconnected during send");
                    break;
                }
            }

            result = socket.recv() => {
                match result {
                    Some(Ok(Message::Text(text))) => {
                        let reply = match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(ClientMessage::Message { content, thread_id: requested }) => {
                                if requested.as_ref().is_some_and(|t| *t != thread_id) {
                                    warn!(thread_id = %thread_id, "Web chat client named a thread it does not own");
                                    Some(ServerMessage::Error {
                                        message: "unknown thread_id".to_string(),
                                    })
                                } else {
                                    let msg = IncomingMessage::new(CHANNEL_NAME, WEB_USER, &content)
                                        .with_thread(&thread_id);
                                    if inner.incoming_tx.send(msg).is_err() {
                                        warn!("Web chat incoming channel closed");
                                        break;
                                    }
                                    None
                                }
                            }
                            Err(e) => {
                                debug!(error = %e, "Invalid JSON from web chat client");
                                Some(ServerMessage::Error {
                                    message: format!("invalid message: {e}"),
                                })
                            }
                        };
                        if let Some(reply) = reply
                            && send_json(&mut socket, &reply).await.is_err()
                        {
                            break;
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        info!("Web chat client disconnected");
                        break;
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "Web chat WebSocket error");
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    inner.sockets.lock().await.remove(&thread_id);
    info!(thread_id = %thread_id, "Web chat connection closed");
}

async fn send_json(socket: &mut WebSocket, msg: &ServerMessage) -> Result<(), axum::Error> {
    let json = serde_json::to_string(msg).map_err(axum::Error::new)?;
    socket.send(Message::Text(json.into())).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[test]
    fn server_messages_are_tagged() {
        let json = serde_json::to_value(ServerMessage::Response {
            content: "hi".into(),
            thread_id: Some("t1".into()),
        })
        .unwrap();
        assert_eq!(json["type"], "response");
        assert_eq!(json["thread_id"], "t1");

        let json = serde_json::to_value(ServerMessage::Error {
            message: "bad".into(),
        })
        .unwrap();
        assert_eq!(json["type"], "error");
    }

    #[test]
    fn client_message_thread_is_optional() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"message","content":"hello"}"#).unwrap();
        let ClientMessage::Message { content, thread_id } = msg;
        assert_eq!(content, "hello");
        assert!(thread_id.is_none());
    }

    #[tokio::test]
    async fn start_only_once() {
        let ch = WebChatChannel::new();
        assert!(ch.start().await.is_ok());
        assert!(ch.start().await.is_err());
    }

    #[tokio::test]
    async fn respond_reaches_only_the_owning_socket() {
        let ch = WebChatChannel::new();
        let (tx9, mut rx9) = mpsc::unbounded_channel();
        let (tx7, mut rx7) = mpsc::unbounded_channel();
        {
            let mut sockets = ch.inner.sockets.lock().await;
            sockets.insert("t9".to_string(), tx9);
            sockets.insert("t7".to_string(), tx7);
        }
        let msg = IncomingMessage::new(CHANNEL_NAME, WEB_USER, "hi").with_thread("t9");

        ch.respond(&msg, OutgoingResponse::text("hello")).await.unwrap();

        assert!(rx7.try_recv().is_err());
        match rx9.recv().await.unwrap() {
            ServerMessage::Response { content, thread_id } => {
                assert_eq!(content, "hello");
                assert_eq!(thread_id.as_deref(), Some("t9"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn respond_to_closed_socket_is_dropped() {
        let ch = WebChatChannel::new();
        let msg = IncomingMessage::new(CHANNEL_NAME, WEB_USER, "hi").with_thread("gone");
        assert!(ch.respond(&msg, OutgoingResponse::text("late")).await.is_ok());
    }

    #[tokio::test]
    async fn incoming_messages_reach_stream() {
        let ch = WebChatChannel::new();
        let mut stream = ch.start().await.unwrap();
        ch.inner
            .incoming_tx
            .send(IncomingMessage::new(CHANNEL_NAME, WEB_USER, "ping"))
            .unwrap();
        let msg = stream.next().await.unwrap();
        assert_eq!(msg.content, "ping");
    }
}
