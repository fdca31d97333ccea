use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::Method;
use caravan::auth::TokenValidator;
use caravan::config::Config;
use caravan::hub::Hub;
use caravan::image_store::ImageStore;
use caravan::store::ChatStore;
use caravan::{AppState, chat};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,caravan=debug")),
        )
        .init();

    let config = Config::from_env();
    if config.token_secret.is_empty() {
        anyhow::bail!("TOKEN_SECRET must be set");
    }

    let store = ChatStore::connect(&config.database_url).await?;
    let images = ImageStore::new(
        config.image_dir.clone(),
        config.image_base_url.clone(),
        config.max_image_bytes,
    )
    .await?;

    let state = AppState {
        store,
        hub: Hub::new(config.hub_capacity),
        validator: TokenValidator::new(&config.token_secret),
        images,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers(Any);

    let app = Router::new()
        .nest("/chat", chat::router())
        .with_state(state)
        .layer(DefaultBodyLimit::max(config.max_image_bytes + 64 * 1024))
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    info!(addr = %config.bind_addr, "caravan listening");
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
