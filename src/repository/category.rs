//! Category repository.
//!
//! Categories are unique by their remote code (`nota_id`): saving a category
//! whose code already exists updates that row instead of inserting another.

use async_trait::async_trait;
use diesel::prelude::*;
use diesel_async::{AsyncConnection, RunQueryDsl};

use super::diesel_models::{CategoryRecord, NewCategory};
use super::pool::{DbError, SqliteConn, SqlitePool};
use super::{last_insert_rowid, Repository, RepositoryError};
use crate::models::Category;
use crate::schema::{categories, queries};

const ENTITY: &str = "category";

impl From<CategoryRecord> for Category {
    fn from(record: CategoryRecord) -> Self {
        Category {
            id: Some(record.id),
            nota_id: record.nota_id,
            description: record.description,
        }
    }
}

/// Load a category on an already open connection.
pub(super) async fn category_by_id(
    conn: &mut SqliteConn,
    id: i32,
) -> Result<Option<Category>, DbError> {
    categories::table
        .find(id)
        .select(CategoryRecord::as_select())
        .first(conn)
        .await
        .optional()
        .map(|opt| opt.map(Category::from))
}

/// Diesel-backed category store.
#[derive(Clone)]
pub struct CategoryRepository {
    pool: SqlitePool,
}

impl CategoryRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Look up a category by its remote code.
    pub async fn find_by_nota_id(&self, nota_id: &str) -> Result<Option<Category>, RepositoryError> {
        let mut conn = self.pool.get().await?;

        let record = categories::table
            .filter(categories::nota_id.eq(nota_id))
            .select(CategoryRecord::as_select())
            .first(&mut conn)
            .await
            .optional()?;

        Ok(record.map(Category::from))
    }

    /// Category assigned to a query.
    pub async fn find_by_query_id(&self, query_id: i32) -> Result<Option<Category>, RepositoryError> {
        let mut conn = self.pool.get().await?;

        let record = categories::table
            .inner_join(queries::table)
            .filter(queries::id.eq(query_id))
            .select(CategoryRecord::as_select())
            .first(&mut conn)
            .await
            .optional()?;

        Ok(record.map(Category::from))
    }
}

#[async_trait]
impl Repository<Category> for CategoryRepository {
    async fn find_by_id(&self, id: i32) -> Result<Category, RepositoryError> {
        let mut conn = self.pool.get().await?;
        category_by_id(&mut conn, id)
            .await?
            .ok_or(RepositoryError::NotFound { entity: ENTITY, id })
    }

    async fn find_all(&self) -> Result<Vec<Category>, RepositoryError> {
        let mut conn = self.pool.get().await?;

        let records = categories::table
            .order(categories::id.asc())
            .select(CategoryRecord::as_select())
            .load(&mut conn)
            .await?;

        Ok(records.into_iter().map(Category::from).collect())
    }

    async fn save(&self, mut entity: Category) -> Result<Category, RepositoryError> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| RepositoryError::not_saved(ENTITY, e))?;

        let requested_id = entity.id;
        let nota_id = entity.nota_id.clone();
        let description = entity.description.clone();

        let result: Result<i32, DbError> = conn
            .transaction(|conn| {
                Box::pin(async move {
                    let mut existing: Option<i32> = None;
                    if let Some(id) = requested_id {
                        existing = categories::table
                            .find(id)
                            .select(categories::id)
                            .first(conn)
                            .await
                            .optional()?;
                    }
                    if existing.is_none() {
                        existing = categories::table
                            .filter(categories::nota_id.eq(&nota_id))
                            .select(categories::id)
                            .first(conn)
                            .await
                            .optional()?;
                    }

                    match existing {
                        Some(id) => {
                            diesel::update(categories::table.find(id))
                                .set((
                                    categories::nota_id.eq(&nota_id),
                                    categories::description.eq(&description),
                                ))
                                .execute(conn)
                                .await?;
                            Ok(id)
                        }
                        None => {
                            diesel::insert_into(categories::table)
                                .values(NewCategory {
                                    nota_id: &nota_id,
                                    description: &description,
                                })
                                .execute(conn)
                                .await?;
                            last_insert_rowid(conn).await
                        }
                    }
                })
            })
            .await;

        let id = result.map_err(|e| RepositoryError::not_saved(ENTITY, e))?;
        entity.id = Some(id);
        Ok(entity)
    }

    async fn delete_by_id(&self, id: i32) -> Result<i32, RepositoryError> {
        let mut conn = self.pool.get().await?;

        let rows = diesel::delete(categories::table.find(id))
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
        let count: i64 = categories::table
            .filter(categories::id.eq(id))
            .select(count_star())
            .first(&mut conn)
            .await?;

        Ok(count > 0)
    }
}
