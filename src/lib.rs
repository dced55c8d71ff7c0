pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod error;
pub mod models;
pub mod routes;

use std::sync::Arc;

use sea_orm::DatabaseConnection;

use crate::{auth::PasswordHasher, config::Config};

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub hasher: PasswordHasher,
}

impl AppState {
    pub async fn from_config(config: &Config) -> anyhow::Result<Self> {
        let db = db::connect_and_migrate(&config.database_url, config.database_max_connections)
            .await?;
        let hasher = PasswordHasher::new(config.argon2_memory_kib, config.argon2_iterations)?;
        Ok(Self { db, hasher })
    }
}

pub fn app(state: Arc<AppState>) -> axum::Router {
    routes::router(state)
}
