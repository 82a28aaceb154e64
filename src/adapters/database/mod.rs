pub mod outbox_repo;
pub mod push_token_repo;
pub mod records;

use crate::config::DatabaseConfig;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{Pool, Postgres};
use std::str::FromStr;
use std::time::Duration;

pub type DbPool = Pool<Postgres>;

/// Builds connection options, applying the privileged credential when one is configured.
///
/// # Errors
/// Returns `sqlx::Error` if the URL cannot be parsed.
pub fn connect_options(url: &str, config: &DatabaseConfig) -> Result<PgConnectOptions, sqlx::Error> {
    let options = PgConnectOptions::from_str(url)?;
    Ok(match config.password.as_deref().filter(|p| !p.is_empty()) {
        Some(password) => options.password(password),
        None => options,
    })
}

/// Creates the pool without connecting; connections are opened on first use.
///
/// Returns `None` when no store URL is configured.
///
/// # Errors
/// Returns `sqlx::Error` if the URL cannot be parsed.
pub fn init_pool(config: &DatabaseConfig) -> Result<Option<DbPool>, sqlx::Error> {
    let Some(url) = config.url.as_deref().map(str::trim).filter(|url| !url.is_empty()) else {
        return Ok(None);
    };

    Ok(Some(
        PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
            .connect_lazy_with(connect_options(url, config)?),
    ))
}
