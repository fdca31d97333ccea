//! The two channel actions: send and mark-as-read.
//!
//! Persistence comes first and is the source of truth; broadcast delivery is
//! best effort on top (a subscriber that is gone by fan-out time catches up
//! through history).

use serde::Deserialize;

use crate::auth::Principal;
use crate::error::ChatError;
use crate::hub::{ChatEvent, Hub, UnreadSummary};
use crate::store::{ChatStore, MessagePreview, StoredMessage};
use crate::topic::Topic;

/// Payload sent to `/chat/{chat_id}`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePublish {
    pub content: String,
    #[serde(default)]
    pub image_urls: Vec<String>,
}

/// Payload sent to `/chat/read/{chat_id}`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkAsReadPublish {
    pub chat_message_id: i64,
}

/// Persist a message, fan out its unread markers, and broadcast it to the
/// chat topic plus an unread summary to every recipient's alarm topic.
///
/// Membership is checked on every send, not only at subscribe time, so a
/// participant removed mid-session stops broadcasting immediately.
pub async fn send(
    store: &ChatStore,
    hub: &Hub,
    chat_id: i64,
    principal: &Principal,
    publish: MessagePublish,
) -> Result<StoredMessage, ChatError> {
    if !store.chat_exists(chat_id).await? {
        return Err(ChatError::ChatNotFound(chat_id));
    }
    store.require_participant(chat_id, principal.user_id).await?;

    if publish.content.trim().is_empty() && publish.image_urls.is_empty() {
        return Err(ChatError::BadRequest("empty message".to_string()));
    }

    let message = store
        .insert_message(
            chat_id,
            principal.user_id,
            &publish.content,
            &publish.image_urls,
        )
        .await?;

    tracing::debug!(
        chat = chat_id,
        message = message.message_id,
        sender = principal.user_id,
        "message persisted"
    );

    hub.publish(Topic::Chat(chat_id), ChatEvent::Message(message.clone()));

    let preview = MessagePreview {
        message_id: message.message_id,
        sender_nickname: message.sender_nickname.clone(),
        content: message.content.clone(),
        sent_at: message.sent_at,
    };

    for user_id in store.participant_ids(chat_id).await? {
        if user_id == principal.user_id {
            continue;
        }
        let summary = UnreadSummary {
            chat_id,
            unread_count: store.unread_count(user_id, chat_id).await?,
            latest_message: Some(preview.clone()),
        };
        hub.publish(Topic::Alarm(user_id), ChatEvent::Unread(summary));
    }

    Ok(message)
}

/// Advance the caller's read cursor and push the refreshed unread summary to
/// their own alarm topic only; read state is private per recipient.
pub async fn mark_as_read(
    store: &ChatStore,
    hub: &Hub,
    chat_id: i64,
    principal: &Principal,
    publish: MarkAsReadPublish,
) -> Result<(), ChatError> {
    store.require_participant(chat_id, principal.user_id).await?;

    store
        .mark_read_up_to(chat_id, principal.user_id, publish.chat_message_id)
        .await?;

    let summary = UnreadSummary {
        chat_id,
        unread_count: store.unread_count(principal.user_id, chat_id).await?,
        latest_message: store.latest_message(chat_id).await?,
    };
    hub.publish(Topic::Alarm(principal.user_id), ChatEvent::Unread(summary));

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::timeout;

    use super::*;
    use crate::store::test_support::memory_store;

    fn principal(user_id: i64) -> Principal {
        Principal {
            user_id,
            session_id: format!("session-{user_id}"),
        }
    }

    async fn setup() -> (ChatStore, Hub, i64) {
        let store = memory_store().await;
        let hub = Hub::new(16);
        let chat = store.create_chat("porto trip").await.unwrap();
        store.join_chat(chat, 1).await.unwrap();
        store.join_chat(chat, 2).await.unwrap();
        (store, hub, chat)
    }

    #[tokio::test]
    async fn send_requires_membership() {
        let (store, hub, chat) = setup().await;

        let err = send(
            &store,
            &hub,
            chat,
            &principal(3),
            MessagePublish {
                content: "hi".into(),
                image_urls: vec![],
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ChatError::Forbidden));
    }

    #[tokio::test]
    async fn send_to_missing_chat_is_not_found() {
        let (store, hub, _chat) = setup().await;

        let err = send(
            &store,
            &hub,
            999,
            &principal(1),
            MessagePublish {
                content: "hi".into(),
                image_urls: vec![],
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ChatError::ChatNotFound(999)));
    }

    #[tokio::test]
    async fn send_rejects_empty_payloads() {
        let (store, hub, chat) = setup().await;

        let err = send(
            &store,
            &hub,
            chat,
            &principal(1),
            MessagePublish {
                content: "   ".into(),
                image_urls: vec![],
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ChatError::BadRequest(_)));
    }

    #[tokio::test]
    async fn send_broadcasts_to_chat_topic_and_recipient_alarms() {
        let (store, hub, chat) = setup().await;

        let mut chat_rx = hub.subscribe(Topic::Chat(chat));
        let mut alarm_1 = hub.subscribe(Topic::Alarm(1));
        let mut alarm_2 = hub.subscribe(Topic::Alarm(2));

        send(
            &store,
            &hub,
            chat,
            &principal(1),
            MessagePublish {
                content: "hi".into(),
                image_urls: vec![],
            },
        )
        .await
        .unwrap();

        let event = timeout(Duration::from_millis(250), chat_rx.recv())
            .await
            .expect("chat broadcast")
            .unwrap();
        match event {
            ChatEvent::Message(m) => {
                assert_eq!(m.content, "hi");
                assert_eq!(m.sender_id, 1);
            }
            other => panic!("expected message event, got {other:?}"),
        }

        let event = timeout(Duration::from_millis(250), alarm_2.recv())
            .await
            .expect("recipient alarm")
            .unwrap();
        match event {
            ChatEvent::Unread(s) => {
                assert_eq!(s.chat_id, chat);
                assert_eq!(s.unread_count, 1);
                assert_eq!(s.latest_message.unwrap().content, "hi");
            }
            other => panic!("expected unread event, got {other:?}"),
        }

        // The sender's own alarm stays quiet.
        assert!(timeout(Duration::from_millis(50), alarm_1.recv()).await.is_err());
    }

    #[tokio::test]
    async fn mark_as_read_pushes_only_to_the_reader() {
        let (store, hub, chat) = setup().await;

        let msg = send(
            &store,
            &hub,
            chat,
            &principal(1),
            MessagePublish {
                content: "hi".into(),
                image_urls: vec![],
            },
        )
        .await
        .unwrap();

        let mut alarm_1 = hub.subscribe(Topic::Alarm(1));
        let mut alarm_2 = hub.subscribe(Topic::Alarm(2));

        mark_as_read(
            &store,
            &hub,
            chat,
            &principal(2),
            MarkAsReadPublish {
                chat_message_id: msg.message_id,
            },
        )
        .await
        .unwrap();

        let event = timeout(Duration::from_millis(250), alarm_2.recv())
            .await
            .expect("reader alarm")
            .unwrap();
        match event {
            ChatEvent::Unread(s) => assert_eq!(s.unread_count, 0),
            other => panic!("expected unread event, got {other:?}"),
        }

        assert!(timeout(Duration::from_millis(50), alarm_1.recv()).await.is_err());
    }

    #[tokio::test]
    async fn mark_as_read_requires_membership() {
        let (store, hub, chat) = setup().await;

        let err = mark_as_read(
            &store,
            &hub,
            chat,
            &principal(3),
            MarkAsReadPublish { chat_message_id: 1 },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ChatError::Forbidden));
    }
}
