use chrono::{DateTime, Utc};
use serde::Serialize;

use super::ChatStore;
use crate::error::ChatError;

/// A persisted chat message, as broadcast and as served from history.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredMessage {
    pub message_id: i64,
    pub chat_id: i64,
    pub sender_id: i64,
    pub sender_nickname: String,
    pub sender_profile_image: Option<String>,
    pub content: String,
    pub image_urls: Vec<String>,
    pub sent_at: DateTime<Utc>,
}

/// History row: the message plus the requesting user's own read state.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    #[serde(flatten)]
    pub message: StoredMessage,
    pub has_read: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePreview {
    pub message_id: i64,
    pub sender_nickname: String,
    pub content: String,
    pub sent_at: DateTime<Utc>,
}

impl ChatStore {
    /// Persist a message and fan out one unread marker per current
    /// participant other than the sender, in a single transaction. Partial
    /// state (message without markers) is never observable.
    pub async fn insert_message(
        &self,
        chat_id: i64,
        sender_id: i64,
        content: &str,
        image_urls: &[String],
    ) -> Result<StoredMessage, ChatError> {
        let (sender_nickname, sender_profile_image): (String, Option<String>) =
            sqlx::query_as("SELECT nickname, profile_image FROM users WHERE id = ?")
                .bind(sender_id)
                .fetch_one(&self.pool)
                .await?;

        let sent_at = Utc::now();
        let image_urls_json =
            serde_json::to_string(image_urls).map_err(|e| ChatError::BadRequest(e.to_string()))?;

        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            "INSERT INTO chat_messages (chat_id, sender_id, content, image_urls, created_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(chat_id)
        .bind(sender_id)
        .bind(content)
        .bind(&image_urls_json)
        .bind(sent_at)
        .execute(&mut *tx)
        .await?;
        let message_id = inserted.last_insert_rowid();

        // Set-based fan-out: all current participants except the sender.
        sqlx::query(
            "INSERT INTO chat_message_users (message_id, chat_id, user_id, has_read)
             SELECT ?, ?, user_id, 0 FROM chat_users WHERE chat_id = ? AND user_id <> ?",
        )
        .bind(message_id)
        .bind(chat_id)
        .bind(chat_id)
        .bind(sender_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(StoredMessage {
            message_id,
            chat_id,
            sender_id,
            sender_nickname,
            sender_profile_image,
            content: content.to_string(),
            image_urls: image_urls.to_vec(),
            sent_at,
        })
    }

    /// Flip every unread marker of this user in this chat with message id up
    /// to `upto_message_id`. Monotonic and idempotent; returns how many rows
    /// actually changed.
    pub async fn mark_read_up_to(
        &self,
        chat_id: i64,
        user_id: i64,
        upto_message_id: i64,
    ) -> Result<u64, ChatError> {
        let result = sqlx::query(
            "UPDATE chat_message_users SET has_read = 1
             WHERE chat_id = ? AND user_id = ? AND message_id <= ? AND has_read = 0",
        )
        .bind(chat_id)
        .bind(user_id)
        .bind(upto_message_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn unread_count(&self, user_id: i64, chat_id: i64) -> Result<i64, ChatError> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM chat_message_users
             WHERE user_id = ? AND chat_id = ? AND has_read = 0",
        )
        .bind(user_id)
        .bind(chat_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    /// Backward cursor pagination: up to `size` messages strictly older than
    /// `latest_message_id` (0 means "newest page"), newest first, each
    /// annotated with the caller's own read state. Messages without a marker
    /// for the caller (their own, or ones sent before they joined) count as
    /// read.
    pub async fn recent_messages(
        &self,
        user_id: i64,
        chat_id: i64,
        size: i64,
        latest_message_id: i64,
    ) -> Result<Vec<HistoryEntry>, ChatError> {
        type Row = (
            i64,
            i64,
            i64,
            String,
            Option<String>,
            String,
            String,
            DateTime<Utc>,
            bool,
        );

        let rows: Vec<Row> = sqlx::query_as(
            "SELECT m.id, m.chat_id, m.sender_id, u.nickname, u.profile_image,
                    m.content, m.image_urls, m.created_at,
                    COALESCE(r.has_read, 1)
             FROM chat_messages m
             JOIN users u ON u.id = m.sender_id
             LEFT JOIN chat_message_users r ON r.message_id = m.id AND r.user_id = ?
             WHERE m.chat_id = ? AND (? = 0 OR m.id < ?)
             ORDER BY m.id DESC
             LIMIT ?",
        )
        .bind(user_id)
        .bind(chat_id)
        .bind(latest_message_id)
        .bind(latest_message_id)
        .bind(size)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(
                |(
                    message_id,
                    chat_id,
                    sender_id,
                    sender_nickname,
                    sender_profile_image,
                    content,
                    image_urls,
                    sent_at,
                    has_read,
                )| {
                    HistoryEntry {
                        message: StoredMessage {
                            message_id,
                            chat_id,
                            sender_id,
                            sender_nickname,
                            sender_profile_image,
                            content,
                            image_urls: serde_json::from_str(&image_urls).unwrap_or_default(),
                            sent_at,
                        },
                        has_read,
                    }
                },
            )
            .collect())
    }

    pub async fn latest_message(&self, chat_id: i64) -> Result<Option<MessagePreview>, ChatError> {
        let row: Option<(i64, String, String, DateTime<Utc>)> = sqlx::query_as(
            "SELECT m.id, u.nickname, m.content, m.created_at
             FROM chat_messages m
             JOIN users u ON u.id = m.sender_id
             WHERE m.chat_id = ?
             ORDER BY m.id DESC
             LIMIT 1",
        )
        .bind(chat_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(message_id, sender_nickname, content, sent_at)| MessagePreview {
            message_id,
            sender_nickname,
            content,
            sent_at,
        }))
    }

    /// Every image URL ever sent into the chat, newest message first.
    pub async fn album(&self, chat_id: i64) -> Result<Vec<String>, ChatError> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT image_urls FROM chat_messages
             WHERE chat_id = ? AND image_urls <> '[]'
             ORDER BY id DESC",
        )
        .bind(chat_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .flat_map(|(json,)| serde_json::from_str::<Vec<String>>(&json).unwrap_or_default())
            .collect())
    }
}
