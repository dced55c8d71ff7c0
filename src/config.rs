use std::net::SocketAddr;

use anyhow::Context;

#[derive(Clone, Debug)]
pub struct Config {
    pub addr: SocketAddr,
    pub database_url: String,
    pub database_max_connections: u32,
    pub argon2_memory_kib: u32,
    pub argon2_iterations: u32,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port: u16 =
            std::env::var("PORT").unwrap_or_else(|_| "5000".to_string()).parse().context("PORT")?;

        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://movies-rating.db?mode=rwc".to_string());

        let database_max_connections: u32 = std::env::var("DATABASE_MAX_CONNECTIONS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(5);

        // Defaults follow the OWASP minimum for Argon2id.
        let argon2_memory_kib: u32 =
            std::env::var("ARGON2_MEMORY_KIB").ok().and_then(|s| s.parse().ok()).unwrap_or(19_456);

        let argon2_iterations: u32 =
            std::env::var("ARGON2_ITERATIONS").ok().and_then(|s| s.parse().ok()).unwrap_or(2);

        Ok(Self {
            addr: format!("{host}:{port}").parse().context("HOST/PORT")?,
            database_url,
            database_max_connections,
            argon2_memory_kib,
            argon2_iterations,
        })
    }
}
