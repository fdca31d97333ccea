//! The real-time channel.
//!
//! One WebSocket per client. The bearer token is validated before the upgrade
//! and the resulting [`Principal`] travels with the connection task; client
//! frames never carry identity.

use std::collections::HashMap;

use axum::debug_handler;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::Response;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::auth::{Principal, bearer_token};
use crate::chat::dispatch;
use crate::error::ChatError;
use crate::hub::ChatEvent;
use crate::store::{ChatStore, StoredMessage};
use crate::topic::Topic;
use crate::{AppState, hub::UnreadSummary};

#[derive(Deserialize)]
pub(crate) struct ConnectQuery {
    token: Option<String>,
}

/// Frames a client may send on the channel.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientFrame {
    Subscribe { topic: String },
    Unsubscribe { topic: String },
    Send { topic: String, payload: serde_json::Value },
}

/// Frames the server pushes back.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerFrame {
    Subscribed {
        topic: String,
    },
    Unsubscribed {
        topic: String,
    },
    Message {
        topic: String,
        #[serde(flatten)]
        message: StoredMessage,
    },
    Alarm {
        topic: String,
        #[serde(flatten)]
        summary: UnreadSummary,
    },
    Error {
        code: &'static str,
        message: String,
    },
}

#[debug_handler(state = AppState)]
pub(crate) async fn chat_ws(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(ConnectQuery { token }): Query<ConnectQuery>,
    ws: WebSocketUpgrade,
) -> Result<Response, ChatError> {
    // Token from the session-scoped attributes of the upgrade request:
    // Authorization header, or the `token` query parameter for browser
    // clients that cannot set headers on a WebSocket.
    let token = bearer_token(&headers)
        .map(str::to_owned)
        .or(token)
        .ok_or(ChatError::Unauthenticated)?;

    let user_id = state.validator.validate(&token)?;
    let principal = Principal {
        user_id,
        session_id: Uuid::now_v7().to_string(),
    };

    tracing::info!(user = principal.user_id, session = %principal.session_id, "channel connected");

    Ok(ws.on_upgrade(move |socket| connection(state, principal, socket)))
}

/// Runs for the lifetime of one channel.
async fn connection(state: AppState, principal: Principal, socket: WebSocket) {
    let (mut sink, mut stream) = socket.split();

    // All outbound traffic funnels through one queue so broadcasts from
    // forwarder tasks and direct replies cannot interleave a write.
    let (out_tx, mut out_rx) = mpsc::channel::<ServerFrame>(64);

    let write_task = tokio::spawn(async move {
        while let Some(frame) = out_rx.recv().await {
            let Ok(text) = serde_json::to_string(&frame) else {
                continue;
            };
            if sink.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    let mut subscriptions: HashMap<Topic, JoinHandle<()>> = HashMap::new();

    while let Some(Ok(message)) = stream.next().await {
        let text = match message {
            Message::Text(text) => text,
            Message::Close(_) => break,
            _ => continue,
        };

        let frame = match serde_json::from_str::<ClientFrame>(&text) {
            Ok(frame) => frame,
            Err(e) => {
                let _ = out_tx
                    .send(ServerFrame::Error {
                        code: "BAD_FRAME",
                        message: e.to_string(),
                    })
                    .await;
                continue;
            }
        };

        if let Err(e) = handle_frame(&state, &principal, &out_tx, &mut subscriptions, frame).await {
            let _ = out_tx
                .send(ServerFrame::Error {
                    code: e.code(),
                    message: e.to_string(),
                })
                .await;
        }
    }

    // Disconnect is an implicit unsubscribe from everything.
    for (_, forwarder) in subscriptions {
        forwarder.abort();
    }
    write_task.abort();

    tracing::info!(user = principal.user_id, session = %principal.session_id, "channel closed");
}

async fn handle_frame(
    state: &AppState,
    principal: &Principal,
    out_tx: &mpsc::Sender<ServerFrame>,
    subscriptions: &mut HashMap<Topic, JoinHandle<()>>,
    frame: ClientFrame,
) -> Result<(), ChatError> {
    match frame {
        ClientFrame::Subscribe { topic } => {
            let topic = Topic::parse(&topic)?;
            authorize_subscription(&state.store, principal, topic).await?;

            if !subscriptions.contains_key(&topic) {
                let rx = state.hub.subscribe(topic);
                subscriptions.insert(topic, spawn_forwarder(topic, rx, out_tx.clone()));
            }

            let _ = out_tx
                .send(ServerFrame::Subscribed {
                    topic: topic.to_string(),
                })
                .await;
            Ok(())
        }

        ClientFrame::Unsubscribe { topic } => {
            let topic = Topic::parse(&topic)?;
            if let Some(forwarder) = subscriptions.remove(&topic) {
                forwarder.abort();
                let _ = out_tx
                    .send(ServerFrame::Unsubscribed {
                        topic: topic.to_string(),
                    })
                    .await;
            }
            Ok(())
        }

        ClientFrame::Send { topic, payload } => {
            let parse = |e: serde_json::Error| ChatError::BadRequest(e.to_string());

            match Topic::parse(&topic)? {
                Topic::Chat(chat_id) => {
                    let publish = serde_json::from_value(payload).map_err(parse)?;
                    dispatch::send(&state.store, &state.hub, chat_id, principal, publish).await?;
                    Ok(())
                }
                Topic::ChatRead(chat_id) => {
                    let publish = serde_json::from_value(payload).map_err(parse)?;
                    dispatch::mark_as_read(&state.store, &state.hub, chat_id, principal, publish)
                        .await?;
                    Ok(())
                }
                Topic::Alarm(_) => Err(ChatError::BadRequest(
                    "alarm topics are receive-only".to_string(),
                )),
            }
        }
    }
}

/// Subscribe-time authorization, run once per subscribe frame.
async fn authorize_subscription(
    store: &ChatStore,
    principal: &Principal,
    topic: Topic,
) -> Result<(), ChatError> {
    match topic {
        Topic::Chat(chat_id) | Topic::ChatRead(chat_id) => {
            if !store.chat_exists(chat_id).await? {
                return Err(ChatError::ChatNotFound(chat_id));
            }
            store.require_participant(chat_id, principal.user_id).await
        }
        Topic::Alarm(user_id) => {
            if user_id != principal.user_id {
                return Err(ChatError::Forbidden);
            }
            Ok(())
        }
    }
}

fn spawn_forwarder(
    topic: Topic,
    mut rx: broadcast::Receiver<ChatEvent>,
    out_tx: mpsc::Sender<ServerFrame>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    let frame = match event {
                        ChatEvent::Message(message) => ServerFrame::Message {
                            topic: topic.to_string(),
                            message,
                        },
                        ChatEvent::Unread(summary) => ServerFrame::Alarm {
                            topic: topic.to_string(),
                            summary,
                        },
                    };
                    if out_tx.send(frame).await.is_err() {
                        break;
                    }
                }
                // A slow channel misses events and catches up through
                // history on its next fetch.
                Err(broadcast::error::RecvError::Lagged(dropped)) => {
                    tracing::debug!(topic = %topic, dropped, "subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}
