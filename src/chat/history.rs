//! Read-side endpoints: paginated history and the chat summary list.

use axum::Json;
use axum::debug_handler;
use axum::extract::{Path, Query, State};
use serde::{Deserialize, Serialize};

use crate::auth::Audience;
use crate::error::AppResult;
use crate::store::{ChatSort, ChatStore, ChatSummary, HistoryEntry};

const MAX_PAGE_SIZE: i64 = 100;

#[derive(Deserialize)]
pub(crate) struct HistoryQuery {
    #[serde(default = "default_size")]
    size: i64,
    /// Cursor: only messages with a smaller id are returned; 0 means the
    /// newest page.
    #[serde(default)]
    latest: i64,
}

fn default_size() -> i64 {
    10
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RecentChatResponse {
    chat_id: i64,
    messages: Vec<HistoryEntry>,
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn recent_messages(
    State(store): State<ChatStore>,
    audience: Audience,
    Path(chat_id): Path<i64>,
    Query(HistoryQuery { size, latest }): Query<HistoryQuery>,
) -> AppResult<Json<RecentChatResponse>> {
    let user_id = audience.user_id()?;
    store.require_participant(chat_id, user_id).await?;

    let messages = store
        .recent_messages(user_id, chat_id, size.clamp(1, MAX_PAGE_SIZE), latest)
        .await?;

    Ok(Json(RecentChatResponse { chat_id, messages }))
}

#[derive(Deserialize)]
pub(crate) struct SummaryQuery {
    #[serde(default = "default_sort", rename = "sortType")]
    sort_type: ChatSort,
}

fn default_sort() -> ChatSort {
    ChatSort::Unread
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn chat_summaries(
    State(store): State<ChatStore>,
    audience: Audience,
    Query(SummaryQuery { sort_type }): Query<SummaryQuery>,
) -> AppResult<Json<Vec<ChatSummary>>> {
    let user_id = audience.user_id()?;
    Ok(Json(store.chat_summaries(user_id, sort_type).await?))
}
