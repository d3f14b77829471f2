//! Database context for managing connections and repository access.
//!
//! The DbContext is the primary entry point for all database operations.
//! It holds the connection factory and hands out repositories that share it.

use std::path::Path;

use diesel_async::SimpleAsyncConnection;

use super::pool::{DbError, SqlitePool};
use super::{CategoryRepository, LocalityRepository, QueryRepository, SpreadsheetRepository};

/// Database context that manages the connection pool and provides repository access.
///
/// # Example
/// ```ignore
/// let ctx = DbContext::from_url("sqlite:menor-preco.db");
/// let queries = ctx.queries().find_all().await?;
/// ```
#[derive(Clone, Debug)]
pub struct DbContext {
    pool: SqlitePool,
}

impl DbContext {
    /// Create a context from a database file path.
    pub fn new(db_path: &Path) -> Self {
        Self {
            pool: SqlitePool::from_path(db_path),
        }
    }

    /// Create a context from a `sqlite:` URL or plain path.
    pub fn from_url(url: &str) -> Self {
        Self {
            pool: SqlitePool::new(url),
        }
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn categories(&self) -> CategoryRepository {
        CategoryRepository::new(self.pool.clone())
    }

    pub fn localities(&self) -> LocalityRepository {
        LocalityRepository::new(self.pool.clone())
    }

    pub fn queries(&self) -> QueryRepository {
        QueryRepository::new(self.pool.clone())
    }

    pub fn spreadsheets(&self) -> SpreadsheetRepository {
        SpreadsheetRepository::new(self.pool.clone())
    }

    /// Create all tables if they don't exist.
    pub async fn init_schema(&self) -> Result<(), DbError> {
        let mut conn = self.pool.get().await?;
        conn.batch_execute(include_str!("schema_sqlite.sql")).await
    }
}
