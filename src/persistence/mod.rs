//! Persistence Layer
//!
//! SQLite storage for the portfolio, with async operations via sqlx.
//!
//! # Database Schema
//!
//! ## Coins Table
//! - id: upstream coin id (e.g. "bitcoin")
//! - symbol, name
//! - current_price, market_cap, circulating_supply, max_supply: decimal TEXT
//! - price_change_percentage_24h: REAL
//! - market_cap_rank: INTEGER
//! - description, image_url
//! - last_updated, created_at: Timestamp
//!
//! ## Portfolio Entries Table
//! - id: auto-increment
//! - coin_id: foreign key to coins, unique, cascades on delete
//! - amount: decimal TEXT, strictly positive
//! - created_at, updated_at: Timestamp
//!
//! Decimals are stored as text so values survive storage digit for digit.

pub mod models;
pub mod repository;
pub mod session;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::ConnectOptions;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

/// Database connection pool
pub type DbPool = SqlitePool;

/// Database error
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Database connection error: {0}")]
    ConnectionError(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    MigrationError(String),

    #[error("Query error: {0}")]
    QueryError(String),

    #[error("Corrupt stored value: {0}")]
    Corrupt(String),
}

/// Initialize the database connection pool with default settings
///
/// # Arguments
/// - `database_url`: SQLite URL (e.g., "sqlite://data/coinfolio.db" or "sqlite::memory:")
pub async fn init_database(database_url: &str) -> Result<DbPool, DatabaseError> {
    init_database_with(&DatabaseConfig {
        url: database_url.to_string(),
        ..DatabaseConfig::default()
    })
    .await
}

/// Initialize the pool from `config` and bootstrap the schema
///
/// # Errors
/// Returns error if the connection fails or the schema cannot be created
pub async fn init_database_with(config: &DatabaseConfig) -> Result<DbPool, DatabaseError> {
    info!("Initializing database: {}", config.url);

    // Ensure data directory exists
    if let Some(db_path) = config.url.strip_prefix("sqlite://") {
        if let Some(parent) = Path::new(db_path).parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::ConnectionError(sqlx::Error::Configuration(Box::new(e)))
            })?;
        }
    }

    let statement_level = if config.log_queries {
        tracing::log::LevelFilter::Debug
    } else {
        tracing::log::LevelFilter::Trace
    };

    let in_memory = config.url.contains(":memory:");

    // Writers queue on the write lock for up to `busy_timeout`.
    let mut options = SqliteConnectOptions::from_str(&config.url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .busy_timeout(config.busy_timeout)
        .log_statements(statement_level);
    if !in_memory {
        // Readers do not block the writer.
        options = options.journal_mode(SqliteJournalMode::Wal);
    }

    let mut pool_options = SqlitePoolOptions::new().max_connections(config.max_connections.max(1));

    // Every in-memory connection is its own database; keep the one we migrate alive.
    if in_memory {
        pool_options = pool_options
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None);
    }

    let pool = pool_options.connect_with(options).await?;

    run_migrations(&pool).await?;

    info!("✓ Database initialized successfully");

    Ok(pool)
}

/// Create tables and indexes. Safe to run on every start.
async fn run_migrations(pool: &DbPool) -> Result<(), DatabaseError> {
    info!("Running database migrations...");

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS coins (
            id TEXT PRIMARY KEY,
            symbol TEXT NOT NULL,
            name TEXT NOT NULL,
            current_price TEXT,
            price_change_percentage_24h REAL,
            market_cap TEXT,
            market_cap_rank INTEGER,
            circulating_supply TEXT,
            max_supply TEXT,
            description TEXT,
            image_url TEXT,
            last_updated DATETIME NOT NULL,
            created_at DATETIME NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(|e| DatabaseError::MigrationError(format!("Failed to create coins table: {}", e)))?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS portfolio_entries (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            coin_id TEXT NOT NULL UNIQUE,
            amount TEXT NOT NULL,
            created_at DATETIME NOT NULL,
            updated_at DATETIME NOT NULL,
            FOREIGN KEY (coin_id) REFERENCES coins(id) ON DELETE CASCADE
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(|e| {
        DatabaseError::MigrationError(format!("Failed to create portfolio_entries table: {}", e))
    })?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_coins_symbol ON coins(symbol)")
        .execute(pool)
        .await
        .map_err(|e| DatabaseError::MigrationError(format!("Failed to create index: {}", e)))?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_coins_name ON coins(name)")
        .execute(pool)
        .await
        .map_err(|e| DatabaseError::MigrationError(format!("Failed to create index: {}", e)))?;

    info!("✓ Database migrations completed successfully");

    Ok(())
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Database URL (e.g., "sqlite://data/coinfolio.db")
    pub url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// How long a write waits for another writer's lock before failing
    pub busy_timeout: Duration,

    /// Log statements at debug level
    pub log_queries: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://data/coinfolio.db".to_string(),
            max_connections: 5,
            busy_timeout: Duration::from_secs(10),
            log_queries: cfg!(debug_assertions),
        }
    }
}
