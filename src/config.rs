//! Server configuration loaded from environment variables.
//!
//! Every setting has a default so the server starts with nothing but a
//! `DATABASE_URL` and a `TOKEN_SECRET`.

use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Config {
    /// Socket address the HTTP/WebSocket server binds to.
    /// Env: `CARAVAN_ADDR`, default `0.0.0.0:8080`.
    pub bind_addr: SocketAddr,

    /// SQLite connection string. Env: `DATABASE_URL`,
    /// default `sqlite:caravan.db?mode=rwc`.
    pub database_url: String,

    /// HMAC secret the external token issuer signs session tokens with.
    /// Env: `TOKEN_SECRET`.
    pub token_secret: String,

    /// Directory uploaded chat images are written to.
    /// Env: `IMAGE_DIR`, default `./images`.
    pub image_dir: PathBuf,

    /// Public URL prefix for uploaded images.
    /// Env: `IMAGE_BASE_URL`, default `/images`.
    pub image_base_url: String,

    /// Maximum accepted image size in bytes.
    /// Env: `MAX_IMAGE_BYTES`, default 10 MiB.
    pub max_image_bytes: usize,

    /// Queue depth of each topic's broadcast channel.
    pub hub_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: ([0, 0, 0, 0], 8080).into(),
            database_url: "sqlite:caravan.db?mode=rwc".to_string(),
            token_secret: String::new(),
            image_dir: PathBuf::from("./images"),
            image_base_url: "/images".to_string(),
            max_image_bytes: 10 * 1024 * 1024,
            hub_capacity: 256,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("CARAVAN_ADDR") {
            match addr.parse::<SocketAddr>() {
                Ok(parsed) => config.bind_addr = parsed,
                Err(_) => tracing::warn!(value = %addr, "invalid CARAVAN_ADDR, using default"),
            }
        }

        if let Ok(url) = std::env::var("DATABASE_URL") {
            config.database_url = url;
        }

        if let Ok(secret) = std::env::var("TOKEN_SECRET") {
            config.token_secret = secret;
        }

        if let Ok(dir) = std::env::var("IMAGE_DIR") {
            config.image_dir = PathBuf::from(dir);
        }

        if let Ok(url) = std::env::var("IMAGE_BASE_URL") {
            config.image_base_url = url;
        }

        if let Ok(val) = std::env::var("MAX_IMAGE_BYTES") {
            if let Ok(n) = val.parse::<usize>() {
                config.max_image_bytes = n;
            }
        }

        config
    }
}
