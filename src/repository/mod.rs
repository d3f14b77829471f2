//! Repository layer for database persistence.
//!
//! All database access uses Diesel ORM over SQLite. Each entity store
//! implements [`Repository`], the find/save/delete contract the rest of the
//! crate relies on for durability.

pub mod category;
pub mod context;
pub mod diesel_models;
pub mod locality;
pub mod pool;
pub mod query;
pub mod spreadsheet;
pub mod util;

pub use category::CategoryRepository;
pub use context::DbContext;
pub use locality::LocalityRepository;
pub use pool::{DbError, SqliteConn, SqlitePool};
pub use query::QueryRepository;
pub use spreadsheet::SpreadsheetRepository;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Errors surfaced by the entity stores.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("could not find {entity} of id: {id}")]
    NotFound { entity: &'static str, id: i32 },

    #[error("could not save {entity}: {reason}")]
    NotSaved { entity: &'static str, reason: String },

    #[error("could not delete {entity} of id: {id}")]
    NotDeleted { entity: &'static str, id: i32 },

    #[error("database error")]
    Database(#[from] DbError),
}

impl RepositoryError {
    pub(crate) fn not_saved(entity: &'static str, reason: impl std::fmt::Display) -> Self {
        Self::NotSaved {
            entity,
            reason: reason.to_string(),
        }
    }

    /// True for the absent-entity case.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Storage contract shared by every entity store.
///
/// `save` inserts when the entity has no id (or its id is unknown) and
/// updates the existing row otherwise, returning the entity with its id set.
#[async_trait]
pub trait Repository<T: Send + 'static>: Send + Sync {
    async fn find_by_id(&self, id: i32) -> Result<T, RepositoryError>;

    async fn find_all(&self) -> Result<Vec<T>, RepositoryError>;

    async fn save(&self, entity: T) -> Result<T, RepositoryError>;

    /// Returns the deleted id, or `NotDeleted` when no row matched.
    async fn delete_by_id(&self, id: i32) -> Result<i32, RepositoryError>;

    async fn exists_by_id(&self, id: i32) -> Result<bool, RepositoryError>;
}

#[derive(diesel::QueryableByName)]
pub(crate) struct LastInsertRowId {
    #[diesel(sql_type = diesel::sql_types::BigInt, column_name = "last_insert_rowid()")]
    pub id: i64,
}

/// Id of the row inserted last on this connection.
pub(crate) async fn last_insert_rowid(conn: &mut SqliteConn) -> Result<i32, DbError> {
    use diesel_async::RunQueryDsl;

    let row: LastInsertRowId = diesel::sql_query("SELECT last_insert_rowid()")
        .get_result(conn)
        .await?;
    i32::try_from(row.id).map_err(util::to_diesel_error)
}

/// Parse an optional datetime string from the database.
pub fn parse_datetime_opt(s: Option<String>) -> Option<DateTime<Utc>> {
    s.and_then(|s| {
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
    })
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_datetime_opt() {
        let parsed = parse_datetime_opt(Some("2024-05-01T10:00:00+00:00".to_string()));
        assert_eq!(
            parsed.map(|dt| dt.to_rfc3339()),
            Some("2024-05-01T10:00:00+00:00".to_string())
        );
        assert!(parse_datetime_opt(Some("01-05-2024".to_string())).is_none());
        assert!(parse_datetime_opt(None).is_none());
    }

    #[test]
    fn test_error_messages() {
        let err = RepositoryError::NotDeleted {
            entity: "query",
            id: 999,
        };
        assert_eq!(err.to_string(), "could not delete query of id: 999");
        assert!(RepositoryError::NotFound { entity: "query", id: 1 }.is_not_found());
    }
}
