//! Query repository.
//!
//! A query row carries its term, radius and category; locality membership
//! lives in `query_localities` with an explicit position so the locality
//! order (and therefore sheet order) survives a round trip.

use async_trait::async_trait;
use diesel::prelude::*;
use diesel_async::{AsyncConnection, RunQueryDsl};

use super::category::category_by_id;
use super::diesel_models::{NewQuery, NewQueryLocality, QueryRecord};
use super::locality::localities_for_query;
use super::pool::{DbError, SqliteConn, SqlitePool};
use super::{last_insert_rowid, Repository, RepositoryError};
use crate::models::Query;
use crate::schema::{categories, localities, queries, query_localities, spreadsheets};

const ENTITY: &str = "query";

/// Assemble a full query (category and localities) on an open connection.
pub(super) async fn hydrate_query(
    conn: &mut SqliteConn,
    record: QueryRecord,
) -> Result<Query, DbError> {
    let localities = localities_for_query(conn, record.id).await?;
    let category = category_by_id(conn, record.category_id).await?;

    Ok(Query {
        id: Some(record.id),
        term: record.term,
        localities,
        category,
        radius: record.radius,
    })
}

/// Load a query by id on an open connection.
pub(super) async fn query_by_id(conn: &mut SqliteConn, id: i32) -> Result<Option<Query>, DbError> {
    let record = queries::table
        .find(id)
        .select(QueryRecord::as_select())
        .first(conn)
        .await
        .optional()?;

    match record {
        Some(record) => Ok(Some(hydrate_query(conn, record).await?)),
        None => Ok(None),
    }
}

/// Check the invariants a query must satisfy before it is written.
fn validate(entity: &Query) -> Result<(i32, Vec<i32>), RepositoryError> {
    let category_id = entity
        .category
        .as_ref()
        .and_then(|c| c.id)
        .ok_or_else(|| RepositoryError::not_saved(ENTITY, "a persisted category is required"))?;

    if entity.localities.is_empty() {
        return Err(RepositoryError::not_saved(
            ENTITY,
            "at least one locality is required",
        ));
    }

    let locality_ids = entity
        .localities
        .iter()
        .map(|l| {
            l.id.ok_or_else(|| {
                RepositoryError::not_saved(
                    ENTITY,
                    format!("locality '{}' has not been persisted", l.name),
                )
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok((category_id, locality_ids))
}

/// Diesel-backed query store.
#[derive(Clone)]
pub struct QueryRepository {
    pool: SqlitePool,
}

impl QueryRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Query a spreadsheet was exported from.
    pub async fn find_by_spreadsheet_id(
        &self,
        spreadsheet_id: i32,
    ) -> Result<Option<Query>, RepositoryError> {
        let mut conn = self.pool.get().await?;

        let query_id: Option<Option<i32>> = spreadsheets::table
            .find(spreadsheet_id)
            .select(spreadsheets::query_id)
            .first(&mut conn)
            .await
            .optional()?;

        match query_id.flatten() {
            Some(id) => Ok(query_by_id(&mut conn, id).await?),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl Repository<Query> for QueryRepository {
    async fn find_by_id(&self, id: i32) -> Result<Query, RepositoryError> {
        let mut conn = self.pool.get().await?;
        query_by_id(&mut conn, id)
            .await?
            .ok_or(RepositoryError::NotFound { entity: ENTITY, id })
    }

    async fn find_all(&self) -> Result<Vec<Query>, RepositoryError> {
        let mut conn = self.pool.get().await?;

        let records = queries::table
            .order(queries::id.asc())
            .select(QueryRecord::as_select())
            .load(&mut conn)
            .await?;

        let mut result = Vec::with_capacity(records.len());
        for record in records {
            result.push(hydrate_query(&mut conn, record).await?);
        }
        Ok(result)
    }

    async fn save(&self, mut entity: Query) -> Result<Query, RepositoryError> {
        let (category_id, locality_ids) = validate(&entity)?;

        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| RepositoryError::not_saved(ENTITY, e))?;

        let requested_id = entity.id;
        let term = entity.term.clone();
        let radius = entity.radius;

        let result: Result<Result<i32, String>, DbError> = conn
            .transaction(|conn| {
                Box::pin(async move {
                    use diesel::dsl::count_star;

                    let category_count: i64 = categories::table
                        .filter(categories::id.eq(category_id))
                        .select(count_star())
                        .first(conn)
                        .await?;
                    if category_count == 0 {
                        return Ok(Err(format!("category {} does not exist", category_id)));
                    }

                    let locality_count: i64 = localities::table
                        .filter(localities::id.eq_any(&locality_ids))
                        .select(count_star())
                        .first(conn)
                        .await?;
                    let mut distinct = locality_ids.clone();
                    distinct.sort_unstable();
                    distinct.dedup();
                    if locality_count as usize != distinct.len() {
                        return Ok(Err("one or more localities do not exist".to_string()));
                    }

                    let mut existing: Option<i32> = None;
                    if let Some(id) = requested_id {
                        existing = queries::table
                            .find(id)
                            .select(queries::id)
                            .first(conn)
                            .await
                            .optional()?;
                    }

                    let query_id = match existing {
                        Some(id) => {
                            diesel::update(queries::table.find(id))
                                .set((
                                    queries::term.eq(&term),
                                    queries::radius.eq(radius),
                                    queries::category_id.eq(category_id),
                                ))
                                .execute(conn)
                                .await?;
                            diesel::delete(
                                query_localities::table.filter(query_localities::query_id.eq(id)),
                            )
                            .execute(conn)
                            .await?;
                            id
                        }
                        None => {
                            diesel::insert_into(queries::table)
                                .values(NewQuery {
                                    term: &term,
                                    radius,
                                    category_id,
                                })
                                .execute(conn)
                                .await?;
                            last_insert_rowid(conn).await?
                        }
                    };

                    let mut seen = Vec::with_capacity(locality_ids.len());
                    for local_id in locality_ids {
                        if seen.contains(&local_id) {
                            continue;
                        }
                        diesel::insert_into(query_localities::table)
                            .values(NewQueryLocality {
                                query_id,
                                local_id,
                                position: seen.len() as i32,
                            })
                            .execute(conn)
                            .await?;
                        seen.push(local_id);
                    }

                    Ok(Ok(query_id))
                })
            })
            .await;

        let id = result
            .map_err(|e| RepositoryError::not_saved(ENTITY, e))?
            .map_err(|reason| RepositoryError::not_saved(ENTITY, reason))?;

        entity.id = Some(id);
        Ok(entity)
    }

    /// Deletes the query with its locality membership. Spreadsheets exported
    /// from it are kept but detached.
    async fn delete_by_id(&self, id: i32) -> Result<i32, RepositoryError> {
        let mut conn = self.pool.get().await?;

        let result: Result<usize, DbError> = conn
            .transaction(|conn| {
                Box::pin(async move {
                    diesel::delete(query_localities::table.filter(query_localities::query_id.eq(id)))
                        .execute(conn)
                        .await?;

                    diesel::update(spreadsheets::table.filter(spreadsheets::query_id.eq(id)))
                        .set(spreadsheets::query_id.eq(None::<i32>))
                        .execute(conn)
                        .await?;

                    diesel::delete(queries::table.find(id)).execute(conn).await
                })
            })
            .await;

        match result {
            Ok(0) => Err(RepositoryError::NotDeleted { entity: ENTITY, id }),
            Ok(_) => Ok(id),
            Err(e) => Err(e.into()),
        }
    }

    async fn exists_by_id(&self, id: i32) -> Result<bool, RepositoryError> {
        let mut conn = self.pool.get().await?;

        use diesel::dsl::count_star;
        let count: i64 = queries::table
            .filter(queries::id.eq(id))
            .select(count_star())
            .first(&mut conn)
            .await?;

        Ok(count > 0)
    }
}
