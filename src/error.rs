use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

pub type AppResult<T> = Result<T, ChatError>;

/// Everything the chat core can refuse to do, plus the ambient failures
/// underneath it. Surfaced as an HTTP response or as an `error` frame on the
/// real-time channel; never retried server-side.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("missing credentials")]
    Unauthenticated,

    #[error("invalid token: {0}")]
    InvalidToken(String),

    #[error("forbidden")]
    Forbidden,

    #[error("chat {0} not found")]
    ChatNotFound(i64),

    #[error("malformed subscription topic: {0}")]
    MalformedSubscription(String),

    #[error("already joined chat {0}")]
    AlreadyJoined(i64),

    #[error("not a participant of chat {0}")]
    NotAParticipant(i64),

    #[error("invalid request: {0}")]
    BadRequest(String),

    #[error("image too large: {size} bytes (max {max})")]
    ImageTooLarge { size: usize, max: usize },

    #[error("image storage error: {0}")]
    ImageStorage(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl ChatError {
    /// Stable machine-readable code, used verbatim in `error` frames on the
    /// channel and in JSON error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            ChatError::Unauthenticated => "UNAUTHENTICATED",
            ChatError::InvalidToken(_) => "INVALID_TOKEN",
            ChatError::Forbidden => "FORBIDDEN",
            ChatError::ChatNotFound(_) => "CHAT_NOT_FOUND",
            ChatError::MalformedSubscription(_) => "MALFORMED_SUBSCRIPTION",
            ChatError::AlreadyJoined(_) => "ALREADY_JOINED",
            ChatError::NotAParticipant(_) => "NOT_A_PARTICIPANT",
            ChatError::BadRequest(_) => "BAD_REQUEST",
            ChatError::ImageTooLarge { .. } => "IMAGE_TOO_LARGE",
            ChatError::ImageStorage(_) => "IMAGE_STORAGE_FAILED",
            ChatError::Database(_) => "INTERNAL",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            ChatError::Unauthenticated | ChatError::InvalidToken(_) => StatusCode::UNAUTHORIZED,
            ChatError::Forbidden => StatusCode::FORBIDDEN,
            ChatError::ChatNotFound(_) | ChatError::NotAParticipant(_) => StatusCode::NOT_FOUND,
            ChatError::MalformedSubscription(_) | ChatError::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            ChatError::AlreadyJoined(_) => StatusCode::CONFLICT,
            ChatError::ImageTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ChatError::ImageStorage(_) | ChatError::Database(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ChatError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Internal detail stays in the log, not in the body.
        let message = match &self {
            ChatError::Database(e) => {
                tracing::error!(error = %e, "database failure");
                "internal error".to_string()
            }
            ChatError::ImageStorage(e) => {
                tracing::error!(error = %e, "image storage failure");
                "image storage failed".to_string()
            }
            other => other.to_string(),
        };

        let body = serde_json::json!({
            "code": self.code(),
            "error": message,
        });

        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert_eq!(ChatError::Unauthenticated.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ChatError::Forbidden.status(), StatusCode::FORBIDDEN);
        assert_eq!(ChatError::ChatNotFound(3).status(), StatusCode::NOT_FOUND);
        assert_eq!(ChatError::AlreadyJoined(3).status(), StatusCode::CONFLICT);
        assert_eq!(
            ChatError::MalformedSubscription("/x".into()).status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn codes_are_stable() {
        assert_eq!(ChatError::InvalidToken("exp".into()).code(), "INVALID_TOKEN");
        assert_eq!(ChatError::NotAParticipant(1).code(), "NOT_A_PARTICIPANT");
    }
}
