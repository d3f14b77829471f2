//! Spreadsheet repository.

use async_trait::async_trait;
use diesel::prelude::*;
use diesel_async::{AsyncConnection, RunQueryDsl};

use super::diesel_models::{NewSpreadsheet, SpreadsheetRecord};
use super::pool::{DbError, SqliteConn, SqlitePool};
use super::query::query_by_id;
use super::{last_insert_rowid, parse_datetime_opt, Repository, RepositoryError};
use crate::models::Spreadsheet;
use crate::schema::{queries, spreadsheets};

const ENTITY: &str = "spreadsheet";

async fn hydrate_spreadsheet(
    conn: &mut SqliteConn,
    record: SpreadsheetRecord,
) -> Result<Spreadsheet, DbError> {
    let query = match record.query_id {
        Some(query_id) => query_by_id(conn, query_id).await?,
        None => None,
    };

    Ok(Spreadsheet {
        id: Some(record.id),
        google_id: record.google_id,
        query,
        is_populated: record.is_populated,
        last_populated: parse_datetime_opt(record.last_populated),
    })
}

/// Diesel-backed spreadsheet store.
#[derive(Clone)]
pub struct SpreadsheetRepository {
    pool: SqlitePool,
}

impl SpreadsheetRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Look up a spreadsheet by its remote id.
    pub async fn find_by_google_id(
        &self,
        google_id: &str,
    ) -> Result<Option<Spreadsheet>, RepositoryError> {
        let mut conn = self.pool.get().await?;

        let record = spreadsheets::table
            .filter(spreadsheets::google_id.eq(google_id))
            .select(SpreadsheetRecord::as_select())
            .first(&mut conn)
            .await
            .optional()?;

        match record {
            Some(record) => Ok(Some(hydrate_spreadsheet(&mut conn, record).await?)),
            None => Ok(None),
        }
    }

    /// Spreadsheets exported from a query, oldest first.
    pub async fn find_by_query_id(&self, query_id: i32) -> Result<Vec<Spreadsheet>, RepositoryError> {
        let mut conn = self.pool.get().await?;

        let records = spreadsheets::table
            .filter(spreadsheets::query_id.eq(query_id))
            .order(spreadsheets::id.asc())
            .select(SpreadsheetRecord::as_select())
            .load(&mut conn)
            .await?;

        let mut result = Vec::with_capacity(records.len());
        for record in records {
            result.push(hydrate_spreadsheet(&mut conn, record).await?);
        }
        Ok(result)
    }
}

#[async_trait]
impl Repository<Spreadsheet> for SpreadsheetRepository {
    async fn find_by_id(&self, id: i32) -> Result<Spreadsheet, RepositoryError> {
        let mut conn = self.pool.get().await?;

        let record = spreadsheets::table
            .find(id)
            .select(SpreadsheetRecord::as_select())
            .first(&mut conn)
            .await
            .optional()?
            .ok_or(RepositoryError::NotFound { entity: ENTITY, id })?;

        Ok(hydrate_spreadsheet(&mut conn, record).await?)
    }

    async fn find_all(&self) -> Result<Vec<Spreadsheet>, RepositoryError> {
        let mut conn = self.pool.get().await?;

        let records = spreadsheets::table
            .order(spreadsheets::id.asc())
            .select(SpreadsheetRecord::as_select())
            .load(&mut conn)
            .await?;

        let mut result = Vec::with_capacity(records.len());
        for record in records {
            result.push(hydrate_spreadsheet(&mut conn, record).await?);
        }
        Ok(result)
    }

    /// New spreadsheets must belong to a saved query. Updates may keep a
    /// spreadsheet whose query was deleted.
    async fn save(&self, mut entity: Spreadsheet) -> Result<Spreadsheet, RepositoryError> {
        let query_id = entity.query.as_ref().and_then(|q| q.id);
        if entity.id.is_none() && query_id.is_none() {
            return Err(RepositoryError::not_saved(
                ENTITY,
                "a persisted query is required",
            ));
        }

        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| RepositoryError::not_saved(ENTITY, e))?;

        let requested_id = entity.id;
        let google_id = entity.google_id.clone();
        let is_populated = entity.is_populated;
        let last_populated = entity.last_populated.map(|dt| dt.to_rfc3339());

        let result: Result<Result<i32, String>, DbError> = conn
            .transaction(|conn| {
                Box::pin(async move {
                    use diesel::dsl::count_star;

                    if let Some(query_id) = query_id {
                        let count: i64 = queries::table
                            .filter(queries::id.eq(query_id))
                            .select(count_star())
                            .first(conn)
                            .await?;
                        if count == 0 {
                            return Ok(Err(format!("query {} does not exist", query_id)));
                        }
                    }

                    let mut existing: Option<i32> = None;
                    if let Some(id) = requested_id {
                        existing = spreadsheets::table
                            .find(id)
                            .select(spreadsheets::id)
                            .first(conn)
                            .await
                            .optional()?;
                    }

                    match existing {
                        Some(id) => {
                            diesel::update(spreadsheets::table.find(id))
                                .set((
                                    spreadsheets::google_id.eq(&google_id),
                                    spreadsheets::query_id.eq(query_id),
                                    spreadsheets::is_populated.eq(is_populated),
                                    spreadsheets::last_populated.eq(last_populated.as_deref()),
                                ))
                                .execute(conn)
                                .await?;
                            Ok(Ok(id))
                        }
                        None if query_id.is_none() => {
                            Ok(Err("a persisted query is required".to_string()))
                        }
                        None => {
                            diesel::insert_into(spreadsheets::table)
                                .values(NewSpreadsheet {
                                    google_id: &google_id,
                                    query_id,
                                    is_populated,
                                    last_populated: last_populated.as_deref(),
                                })
                                .execute(conn)
                                .await?;
                            Ok(Ok(last_insert_rowid(conn).await?))
                        }
                    }
                })
            })
            .await;

        let id = result
            .map_err(|e| RepositoryError::not_saved(ENTITY, e))?
            .map_err(|reason| RepositoryError::not_saved(ENTITY, reason))?;

        entity.id = Some(id);
        Ok(entity)
    }

    async fn delete_by_id(&self, id: i32) -> Result<i32, RepositoryError> {
        let mut conn = self.pool.get().await?;

        let rows = diesel::delete(spreadsheets::table.find(id))
            .execute(&mut conn)
            .await?;

        if rows == 0 {
            return Err(RepositoryError::NotDeleted { entity: ENTITY, id });
        }
        Ok(id)
    }

    async fn exists_by_id(&self, id: i32) -> Result<bool, RepositoryError> {
        let mut conn = self.pool.get().await?;

        use diesel::dsl::count_star;
        let count: i64 = spreadsheets::table
            .filter(spreadsheets::id.eq(id))
            .select(count_star())
            .first(&mut conn)
            .await?;

        Ok(count > 0)
    }
}
