//! Join and leave.

use axum::debug_handler;
use axum::extract::{Path, State};

use crate::auth::Audience;
use crate::error::AppResult;
use crate::store::ChatStore;

#[debug_handler(state = crate::AppState)]
pub(crate) async fn join_chat(
    State(store): State<ChatStore>,
    audience: Audience,
    Path(chat_id): Path<i64>,
) -> AppResult<()> {
    let user_id = audience.user_id()?;
    store.join_chat(chat_id, user_id).await?;
    tracing::info!(chat = chat_id, user = user_id, "joined chat");
    Ok(())
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn leave_chat(
    State(store): State<ChatStore>,
    audience: Audience,
    Path(chat_id): Path<i64>,
) -> AppResult<()> {
    let user_id = audience.user_id()?;
    store.leave_chat(chat_id, user_id).await?;
    tracing::info!(chat = chat_id, user = user_id, "left chat");
    Ok(())
}
