pub mod dispatch;
mod history;
mod image;
mod membership;
mod overview;
pub mod ws;

use axum::Router;
use axum::routing::get;
use axum::routing::post;

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/ws", get(ws::chat_ws))
        .route("/", get(history::chat_summaries))
        .route(
            "/{chat_id}",
            get(history::recent_messages)
                .post(membership::join_chat)
                .delete(membership::leave_chat),
        )
        .route("/{chat_id}/image", post(image::upload_images))
        .route("/{chat_id}/overview", get(overview::chat_overview))
}
