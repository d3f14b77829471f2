//! Locality repository.
//!
//! A locality is unique by geohash plus case-insensitive name; saving a
//! locality that matches an existing pair returns the stored row.

use async_trait::async_trait;
use diesel::prelude::*;
use diesel_async::{AsyncConnection, RunQueryDsl};

use super::diesel_models::{LocalityRecord, NewLocality};
use super::pool::{DbError, SqliteConn, SqlitePool};
use super::{last_insert_rowid, Repository, RepositoryError};
use crate::models::{names_match, Locality};
use crate::schema::{localities, query_localities};

const ENTITY: &str = "locality";

impl From<LocalityRecord> for Locality {
    fn from(record: LocalityRecord) -> Self {
        Locality {
            id: Some(record.id),
            geohash: record.geohash,
            name: record.name,
        }
    }
}

/// Localities of a query in the order they were saved.
pub(super) async fn localities_for_query(
    conn: &mut SqliteConn,
    query_id: i32,
) -> Result<Vec<Locality>, DbError> {
    localities::table
        .inner_join(query_localities::table)
        .filter(query_localities::query_id.eq(query_id))
        .order(query_localities::position.asc())
        .select(LocalityRecord::as_select())
        .load(conn)
        .await
        .map(|records| records.into_iter().map(Locality::from).collect())
}

/// Diesel-backed locality store.
#[derive(Clone)]
pub struct LocalityRepository {
    pool: SqlitePool,
}

impl LocalityRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Find a locality by name, ignoring case.
    ///
    /// Comparison happens in Rust so accented names fold correctly, which
    /// SQLite's NOCASE collation does not do.
    pub async fn find_by_name(&self, name: &str) -> Result<Option<Locality>, RepositoryError> {
        let mut conn = self.pool.get().await?;

        let records = localities::table
            .order(localities::id.asc())
            .select(LocalityRecord::as_select())
            .load(&mut conn)
            .await?;

        Ok(records
            .into_iter()
            .find(|r| names_match(&r.name, name))
            .map(Locality::from))
    }

    /// Localities attached to a query.
    pub async fn find_by_query_id(&self, query_id: i32) -> Result<Vec<Locality>, RepositoryError> {
        let mut conn = self.pool.get().await?;
        Ok(localities_for_query(&mut conn, query_id).await?)
    }
}

#[async_trait]
impl Repository<Locality> for LocalityRepository {
    async fn find_by_id(&self, id: i32) -> Result<Locality, RepositoryError> {
        let mut conn = self.pool.get().await?;

        localities::table
            .find(id)
            .select(LocalityRecord::as_select())
            .first(&mut conn)
            .await
            .optional()?
            .map(Locality::from)
            .ok_or(RepositoryError::NotFound { entity: ENTITY, id })
    }

    async fn find_all(&self) -> Result<Vec<Locality>, RepositoryError> {
        let mut conn = self.pool.get().await?;

        let records = localities::table
            .order(localities::id.asc())
            .select(LocalityRecord::as_select())
            .load(&mut conn)
            .await?;

        Ok(records.into_iter().map(Locality::from).collect())
    }

    async fn save(&self, mut entity: Locality) -> Result<Locality, RepositoryError> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| RepositoryError::not_saved(ENTITY, e))?;

        let requested_id = entity.id;
        let geohash = entity.geohash.clone();
        let name = entity.name.clone();

        let result: Result<(i32, String), DbError> = conn
            .transaction(|conn| {
                Box::pin(async move {
                    if let Some(id) = requested_id {
                        let found: Option<i32> = localities::table
                            .find(id)
                            .select(localities::id)
                            .first(conn)
                            .await
                            .optional()?;
                        if found.is_some() {
                            diesel::update(localities::table.find(id))
                                .set((localities::geohash.eq(&geohash), localities::name.eq(&name)))
                                .execute(conn)
                                .await?;
                            return Ok((id, name));
                        }
                    }

                    let same_geohash: Vec<LocalityRecord> = localities::table
                        .filter(localities::geohash.eq(&geohash))
                        .select(LocalityRecord::as_select())
                        .load(conn)
                        .await?;
                    if let Some(existing) = same_geohash
                        .into_iter()
                        .find(|r| names_match(&r.name, &name))
                    {
                        return Ok((existing.id, existing.name));
                    }

                    diesel::insert_into(localities::table)
                        .values(NewLocality {
                            geohash: &geohash,
                            name: &name,
                        })
                        .execute(conn)
                        .await?;
                    let id = last_insert_rowid(conn).await?;
                    Ok((id, name))
                })
            })
            .await;

        let (id, name) = result.map_err(|e| RepositoryError::not_saved(ENTITY, e))?;
        entity.id = Some(id);
        entity.name = name;
        Ok(entity)
    }

    async fn delete_by_id(&self, id: i32) -> Result<i32, RepositoryError> {
        let mut conn = self.pool.get().await?;

        let result: Result<usize, DbError> = conn
            .transaction(|conn| {
                Box::pin(async move {
                    diesel::delete(
                        query_localities::table.filter(query_localities::local_id.eq(id)),
                    )
                    .execute(conn)
                    .await?;

                    diesel::delete(localities::table.find(id)).execute(conn).await
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
        let count: i64 = localities::table
            .filter(localities::id.eq(id))
            .select(count_star())
            .first(&mut conn)
            .await?;

        Ok(count > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::setup_test_db;

    #[tokio::test]
    async fn test_locality_crud() {
        let (ctx, _dir) = setup_test_db().await;
        let repo = ctx.localities();

        let saved = repo.save(Locality::new("6gkzq", "Curitiba")).await.unwrap();
        let id = saved.id.unwrap();
        assert!(repo.exists_by_id(id).await.unwrap());

        let fetched = repo.find_by_id(id).await.unwrap();
        assert_eq!(fetched.geohash, "6gkzq");
        assert_eq!(fetched.name, "Curitiba");

        assert_eq!(repo.find_all().await.unwrap().len(), 1);
        assert_eq!(repo.delete_by_id(id).await.unwrap(), id);
        assert!(!repo.exists_by_id(id).await.unwrap());
    }

    #[tokio::test]
    async fn test_find_by_name_ignores_case() {
        let (ctx, _dir) = setup_test_db().await;
        let repo = ctx.localities();
        repo.save(Locality::new("6gkzm", "São José dos Pinhais"))
            .await
            .unwrap();

        let found = repo.find_by_name("são josé dos pinhais").await.unwrap();
        assert_eq!(found.map(|l| l.geohash), Some("6gkzm".to_string()));
        assert!(repo.find_by_name("Londrina").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_does_not_duplicate_geohash_and_name() {
        let (ctx, _dir) = setup_test_db().await;
        let repo = ctx.localities();

        let first = repo.save(Locality::new("6gkzq", "Curitiba")).await.unwrap();
        let second = repo.save(Locality::new("6gkzq", "CURITIBA")).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.name, "Curitiba");
        assert_eq!(repo.find_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_missing_locality_is_not_deleted() {
        let (ctx, _dir) = setup_test_db().await;
        let err = ctx.localities().delete_by_id(999).await.unwrap_err();
        assert!(matches!(err, RepositoryError::NotDeleted { id: 999, .. }));
    }
}
