//! Multipart image upload.
//!
//! Files go to the object store; the returned URLs are what clients put in a
//! message's `imageUrls` payload.

use axum::Json;
use axum::debug_handler;
use axum::extract::multipart::Multipart;
use axum::extract::{Path, State};

use crate::AppState;
use crate::auth::Audience;
use crate::error::{AppResult, ChatError};

#[debug_handler(state = AppState)]
pub(crate) async fn upload_images(
    State(state): State<AppState>,
    audience: Audience,
    Path(chat_id): Path<i64>,
    mut multipart: Multipart,
) -> AppResult<Json<Vec<String>>> {
    let user_id = audience.user_id()?;
    state.store.require_participant(chat_id, user_id).await?;

    let mut urls = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ChatError::BadRequest(e.to_string()))?
    {
        let file_name = field.file_name().unwrap_or("upload").to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| ChatError::BadRequest(e.to_string()))?;

        urls.push(state.images.store(&file_name, &data).await?);
    }

    if urls.is_empty() {
        return Err(ChatError::BadRequest("no files in upload".to_string()));
    }

    tracing::info!(chat = chat_id, user = user_id, count = urls.len(), "images uploaded");
    Ok(Json(urls))
}
