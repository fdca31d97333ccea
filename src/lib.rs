pub mod auth;
pub mod chat;
pub mod config;
pub mod error;
pub mod hub;
pub mod image_store;
pub mod store;
pub mod topic;

use axum::extract::FromRef;

pub use crate::error::{AppResult, ChatError};

#[derive(Clone, FromRef)]
pub struct AppState {
    pub store: store::ChatStore,
    pub hub: hub::Hub,
    pub validator: auth::TokenValidator,
    pub images: image_store::ImageStore,
}
