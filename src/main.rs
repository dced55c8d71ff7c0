use std::sync::Arc;

use movie_ratings::{AppState, app, config::Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "info,movie_ratings=debug,sqlx=warn".to_string()),
        )
        .init();

    let config = Config::from_env()?;
    let state = Arc::new(AppState::from_config(&config).await?);

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    tracing::info!(addr = %config.addr, db = %config.database_url, "listening");
    axum::serve(listener, app(state)).await?;

    Ok(())
}
