//! Chat overview: who is here, and every image shared so far.

use axum::Json;
use axum::debug_handler;
use axum::extract::{Path, State};
use serde::Serialize;

use crate::auth::Audience;
use crate::error::AppResult;
use crate::store::{ChatStore, User};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ChatOverviewResponse {
    participants: Vec<User>,
    album: Vec<String>,
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn chat_overview(
    State(store): State<ChatStore>,
    audience: Audience,
    Path(chat_id): Path<i64>,
) -> AppResult<Json<ChatOverviewResponse>> {
    let user_id = audience.user_id()?;
    store.require_participant(chat_id, user_id).await?;

    Ok(Json(ChatOverviewResponse {
        participants: store.participants(chat_id).await?,
        album: store.album(chat_id).await?,
    }))
}
