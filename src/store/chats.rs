use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::{ChatStore, User};
use crate::error::ChatError;
use crate::store::MessagePreview;

/// Order of the chat summary list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum ChatSort {
    /// Most recent activity first.
    #[serde(rename = "RECENT")]
    Recent,
    /// Most unread messages first, recency as tie-breaker.
    #[serde(rename = "UNREAD")]
    Unread,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSummary {
    pub chat_id: i64,
    pub name: String,
    pub participant_count: i64,
    pub unread_count: i64,
    pub latest_message: Option<MessagePreview>,
}

impl ChatStore {
    /// Create a chat room. Called by the travel-group trigger, not by chat
    /// clients.
    pub async fn create_chat(&self, name: &str) -> Result<i64, ChatError> {
        let result = sqlx::query("INSERT INTO chats (name, created_at) VALUES (?, ?)")
            .bind(name)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn chat_exists(&self, chat_id: i64) -> Result<bool, ChatError> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM chats WHERE id = ?")
            .bind(chat_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    pub async fn is_participant(&self, chat_id: i64, user_id: i64) -> Result<bool, ChatError> {
        let row: Option<(i64,)> =
            sqlx::query_as("SELECT 1 FROM chat_users WHERE chat_id = ? AND user_id = ?")
                .bind(chat_id)
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.is_some())
    }

    /// Shortcut for the membership check most call sites want.
    pub async fn require_participant(&self, chat_id: i64, user_id: i64) -> Result<(), ChatError> {
        if self.is_participant(chat_id, user_id).await? {
            Ok(())
        } else {
            Err(ChatError::Forbidden)
        }
    }

    pub async fn join_chat(&self, chat_id: i64, user_id: i64) -> Result<(), ChatError> {
        if !self.chat_exists(chat_id).await? {
            return Err(ChatError::ChatNotFound(chat_id));
        }

        let inserted =
            sqlx::query("INSERT INTO chat_users (chat_id, user_id, joined_at) VALUES (?, ?, ?)")
                .bind(chat_id)
                .bind(user_id)
                .bind(Utc::now())
                .execute(&self.pool)
                .await;

        match inserted {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(ChatError::AlreadyJoined(chat_id))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Remove the caller's membership. Past read markers stay untouched.
    pub async fn leave_chat(&self, chat_id: i64, user_id: i64) -> Result<(), ChatError> {
        let result = sqlx::query("DELETE FROM chat_users WHERE chat_id = ? AND user_id = ?")
            .bind(chat_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(ChatError::NotAParticipant(chat_id));
        }
        Ok(())
    }

    pub async fn participants(&self, chat_id: i64) -> Result<Vec<User>, ChatError> {
        let users = sqlx::query_as::<_, User>(
            "SELECT u.id, u.nickname, u.email, u.description, u.profile_image
             FROM chat_users cu
             JOIN users u ON u.id = cu.user_id
             WHERE cu.chat_id = ?
             ORDER BY cu.joined_at, u.id",
        )
        .bind(chat_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(users)
    }

    pub async fn participant_ids(&self, chat_id: i64) -> Result<Vec<i64>, ChatError> {
        let rows: Vec<(i64,)> =
            sqlx::query_as("SELECT user_id FROM chat_users WHERE chat_id = ? ORDER BY user_id")
                .bind(chat_id)
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    /// One summary per chat the user participates in: last message preview,
    /// unread count, participant count.
    pub async fn chat_summaries(
        &self,
        user_id: i64,
        sort: ChatSort,
    ) -> Result<Vec<ChatSummary>, ChatError> {
        let chats: Vec<(i64, String)> = sqlx::query_as(
            "SELECT c.id, c.name
             FROM chat_users cu
             JOIN chats c ON c.id = cu.chat_id
             WHERE cu.user_id = ?",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let mut summaries = Vec::with_capacity(chats.len());
        for (chat_id, name) in chats {
            let (participant_count,): (i64,) =
                sqlx::query_as("SELECT COUNT(*) FROM chat_users WHERE chat_id = ?")
                    .bind(chat_id)
                    .fetch_one(&self.pool)
                    .await?;

            summaries.push(ChatSummary {
                chat_id,
                name,
                participant_count,
                unread_count: self.unread_count(user_id, chat_id).await?,
                latest_message: self.latest_message(chat_id).await?,
            });
        }

        let latest_id = |s: &ChatSummary| s.latest_message.as_ref().map(|m| m.message_id);
        match sort {
            ChatSort::Recent => {
                summaries.sort_by_key(|s| std::cmp::Reverse((latest_id(s), s.chat_id)));
            }
            ChatSort::Unread => {
                summaries
                    .sort_by_key(|s| std::cmp::Reverse((s.unread_count, latest_id(s), s.chat_id)));
            }
        }

        Ok(summaries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::test_support::memory_store;

    #[tokio::test]
    async fn join_is_unique_per_chat_and_user() {
        let store = memory_store().await;
        let chat = store.create_chat("lisbon trip").await.unwrap();

        store.join_chat(chat, 1).await.unwrap();
        let err = store.join_chat(chat, 1).await.unwrap_err();
        assert!(matches!(err, ChatError::AlreadyJoined(_)));

        assert!(store.is_participant(chat, 1).await.unwrap());
    }

    #[tokio::test]
    async fn join_unknown_chat_is_not_found() {
        let store = memory_store().await;
        let err = store.join_chat(999, 1).await.unwrap_err();
        assert!(matches!(err, ChatError::ChatNotFound(999)));
    }

    #[tokio::test]
    async fn leave_requires_membership() {
        let store = memory_store().await;
        let chat = store.create_chat("lisbon trip").await.unwrap();

        let err = store.leave_chat(chat, 1).await.unwrap_err();
        assert!(matches!(err, ChatError::NotAParticipant(_)));

        store.join_chat(chat, 1).await.unwrap();
        store.leave_chat(chat, 1).await.unwrap();
        assert!(!store.is_participant(chat, 1).await.unwrap());
    }

    #[tokio::test]
    async fn participants_come_back_with_profiles() {
        let store = memory_store().await;
        let chat = store.create_chat("lisbon trip").await.unwrap();
        store.join_chat(chat, 1).await.unwrap();
        store.join_chat(chat, 2).await.unwrap();

        let users = store.participants(chat).await.unwrap();
        let nicknames: Vec<_> = users.iter().map(|u| u.nickname.as_str()).collect();
        assert_eq!(nicknames, ["amelia", "bruno"]);
    }
}
