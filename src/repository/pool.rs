//! SQLite connection handling for Diesel.
//!
//! Uses diesel-async's SyncConnectionWrapper to provide an async interface
//! for SQLite. Since SQLite connections are lightweight, a new connection is
//! opened per repository call and closed when it goes out of scope.

use std::path::Path;

use diesel::sqlite::SqliteConnection;
use diesel_async::sync_connection_wrapper::SyncConnectionWrapper;
use diesel_async::AsyncConnection;

use super::util::to_diesel_error;

/// Diesel error type alias.
pub type DbError = diesel::result::Error;

/// Async SQLite connection type.
pub type SqliteConn = SyncConnectionWrapper<SqliteConnection>;

/// SQLite connection factory (creates connections on demand).
#[derive(Clone, Debug)]
pub struct SqlitePool {
    database_url: String,
}

impl SqlitePool {
    /// Create a new SQLite pool.
    pub fn new(database_url: &str) -> Self {
        // Strip sqlite: prefix if present
        let url = database_url.strip_prefix("sqlite:").unwrap_or(database_url);
        Self {
            database_url: url.to_string(),
        }
    }

    /// Create pool from a file path.
    pub fn from_path(path: &Path) -> Self {
        Self::new(&path.display().to_string())
    }

    /// Get a connection.
    pub async fn get(&self) -> Result<SqliteConn, DbError> {
        SqliteConn::establish(&self.database_url)
            .await
            .map_err(to_diesel_error)
    }

    /// Get the database URL.
    pub fn database_url(&self) -> &str {
        &self.database_url
    }
}
