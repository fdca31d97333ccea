//! Object storage for chat images.
//!
//! Uploads land here and come back as public URLs that clients then send as
//! message payload. This disk-backed implementation stands in for the hosted
//! object store; the rest of the crate only sees [`ImageStore::store`] and
//! the returned URLs.

use std::path::PathBuf;

use tokio::fs;
use tracing::debug;
use uuid::Uuid;

use crate::error::ChatError;

#[derive(Debug, Clone)]
pub struct ImageStore {
    base_dir: PathBuf,
    base_url: String,
    max_bytes: usize,
}

impl ImageStore {
    pub async fn new(
        base_dir: PathBuf,
        base_url: String,
        max_bytes: usize,
    ) -> Result<Self, ChatError> {
        fs::create_dir_all(&base_dir).await.map_err(|e| {
            ChatError::ImageStorage(format!(
                "failed to create image directory '{}': {e}",
                base_dir.display()
            ))
        })?;

        Ok(Self {
            base_dir,
            base_url,
            max_bytes,
        })
    }

    /// Store one uploaded file under a generated object name and return its
    /// public URL.
    pub async fn store(&self, original_name: &str, data: &[u8]) -> Result<String, ChatError> {
        if data.is_empty() {
            return Err(ChatError::BadRequest("empty image upload".to_string()));
        }
        if data.len() > self.max_bytes {
            return Err(ChatError::ImageTooLarge {
                size: data.len(),
                max: self.max_bytes,
            });
        }

        let object_name = match sanitized_extension(original_name) {
            Some(ext) => format!("{}.{ext}", Uuid::now_v7()),
            None => Uuid::now_v7().to_string(),
        };

        let path = self.base_dir.join(&object_name);
        fs::write(&path, data)
            .await
            .map_err(|e| ChatError::ImageStorage(format!("failed to write {object_name}: {e}")))?;

        debug!(object = %object_name, size = data.len(), "stored chat image");
        Ok(format!("{}/{}", self.base_url, object_name))
    }
}

/// File extension of the uploaded name, lowercased, alphanumeric only. The
/// object name itself is always generated, so this is cosmetic.
fn sanitized_extension(name: &str) -> Option<String> {
    let ext = name.rsplit_once('.')?.1;
    if ext.is_empty() || ext.len() > 8 || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}
