//! SurrealDB integration for the sitecheck engine.
//!
//! This crate provides database connectivity and repositories for the
//! durable job and report records behind the in-memory status store.
//!
//! # Features
//!
//! - `memory` (default): in-memory storage for tests and local dev
//! - `rocksdb`: persistent file-based storage

mod connection;
pub mod repositories;
mod schema;

pub use connection::{Database, DbConfig, DbError, get_db, init_db, try_get_db};
pub use schema::init_schema;

/// Initialize the database with the given configuration.
///
/// This should be called once at application startup.
pub async fn init(config: DbConfig) -> Result<(), DbError> {
    init_db(config).await?;
    init_schema().await?;
    Ok(())
}
