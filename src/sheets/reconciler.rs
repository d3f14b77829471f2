//! Spreadsheet population.
//!
//! A population pass brings a remote spreadsheet in line with its query:
//! one tab per locality (titled with the locality name), then the current
//! products of every locality appended to its tab. The pass is fail-fast on
//! the remote write path; a failed pass leaves the spreadsheet unpopulated
//! and is never retried automatically. Re-running a populated spreadsheet
//! appends another set of rows.

use chrono::Utc;
use futures::stream::{self, StreamExt, TryStreamExt};
use tracing::{debug, info};

use super::writer::append_request;
use super::{Request, SheetsApi, SheetsError};
use crate::models::{Query, Sheet, Spreadsheet};
use crate::repository::{Repository, RepositoryError, SpreadsheetRepository};
use crate::scrapers::{FetchError, PriceApi, ProductFetcher};

/// Why a population pass failed.
#[derive(Debug, thiserror::Error)]
pub enum PopulateError {
    #[error("could not find spreadsheet of id: {0} to populate")]
    NotFound(i32),

    #[error("spreadsheet of id: {0} is missing its query")]
    MissingQuery(i32),

    #[error("could not list sheets")]
    ListSheets(#[source] SheetsError),

    #[error("could not complete request to create sheets")]
    CreateTabs(#[source] SheetsError),

    #[error("sheets still missing after creation: {}", .0.join(", "))]
    TabsMissing(Vec<String>),

    #[error("could not fetch products for {locality}")]
    FetchProducts {
        locality: String,
        #[source]
        source: FetchError,
    },

    #[error("could not complete the request to populate spreadsheet")]
    WriteCells(#[source] SheetsError),

    /// The rows were written but the populated flag was not stored.
    #[error("spreadsheet populated but could not be saved to database")]
    Persist(#[source] RepositoryError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Outcome of a successful population pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PopulateReport {
    /// Tabs added in this pass.
    pub tabs_created: usize,
    /// Tabs that received rows.
    pub sheets_written: usize,
    /// Tabs left alone because their locality had no products.
    pub sheets_skipped: usize,
    /// Product rows appended, headers excluded.
    pub rows_written: usize,
}

/// Populates spreadsheets from their queries.
pub struct SpreadsheetReconciler<'a> {
    sheets: &'a dyn SheetsApi,
    prices: &'a dyn PriceApi,
    spreadsheets: &'a SpreadsheetRepository,
    concurrency: usize,
}

impl<'a> SpreadsheetReconciler<'a> {
    pub fn new(
        sheets: &'a dyn SheetsApi,
        prices: &'a dyn PriceApi,
        spreadsheets: &'a SpreadsheetRepository,
    ) -> Self {
        Self {
            sheets,
            prices,
            spreadsheets,
            concurrency: 1,
        }
    }

    /// Number of localities whose products are fetched at the same time.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Run one population pass for the spreadsheet with id `spreadsheet_id`.
    pub async fn reconcile(&self, spreadsheet_id: i32) -> Result<PopulateReport, PopulateError> {
        let mut spreadsheet = match self.spreadsheets.find_by_id(spreadsheet_id).await {
            Ok(spreadsheet) => spreadsheet,
            Err(e) if e.is_not_found() => return Err(PopulateError::NotFound(spreadsheet_id)),
            Err(e) => return Err(e.into()),
        };
        let query = spreadsheet
            .query
            .clone()
            .ok_or(PopulateError::MissingQuery(spreadsheet_id))?;

        let mut report = PopulateReport::default();

        let mut sheets = self
            .discover_sheets(&spreadsheet, &query)
            .await
            .map_err(PopulateError::ListSheets)?;

        let missing = missing_tab_requests(&query, &sheets);
        if !missing.is_empty() {
            debug!(spreadsheet = spreadsheet_id, count = missing.len(), "Tabs pending");
            report.tabs_created = missing.len();
            self.sheets
                .batch_update(&spreadsheet.google_id, missing)
                .await
                .map_err(PopulateError::CreateTabs)?;

            sheets = self
                .discover_sheets(&spreadsheet, &query)
                .await
                .map_err(PopulateError::ListSheets)?;

            let still_missing: Vec<String> = query
                .localities
                .iter()
                .filter(|l| !sheets.iter().any(|s| s.title == l.name))
                .map(|l| l.name.clone())
                .collect();
            if !still_missing.is_empty() {
                return Err(PopulateError::TabsMissing(still_missing));
            }
        }
        debug!(spreadsheet = spreadsheet_id, tabs = sheets.len(), "Tabs ready");

        let fetcher = ProductFetcher::new(self.prices);
        let fetched: Vec<(Sheet, Vec<_>)> = stream::iter(sheets)
            .map(|sheet| {
                let fetcher = &fetcher;
                let query = &query;
                async move {
                    match fetcher.fetch(query, &sheet.locality).await {
                        Ok(products) => Ok((sheet, products)),
                        Err(source) => Err(PopulateError::FetchProducts {
                            locality: sheet.locality.name.clone(),
                            source,
                        }),
                    }
                }
            })
            .buffered(self.concurrency)
            .try_collect()
            .await?;

        let mut requests: Vec<Request> = Vec::new();
        for (sheet, products) in &fetched {
            match append_request(sheet.sheet_id, products) {
                Some(request) => {
                    report.sheets_written += 1;
                    report.rows_written += products.len();
                    requests.push(request);
                }
                None => {
                    info!(locality = %sheet.locality.name, "No products found, skipping sheet");
                    report.sheets_skipped += 1;
                }
            }
        }

        if !requests.is_empty() {
            self.sheets
                .batch_update(&spreadsheet.google_id, requests)
                .await
                .map_err(PopulateError::WriteCells)?;
        }

        spreadsheet.mark_populated(Utc::now());
        self.spreadsheets
            .save(spreadsheet)
            .await
            .map_err(PopulateError::Persist)?;

        info!(
            spreadsheet = spreadsheet_id,
            tabs_created = report.tabs_created,
            sheets_written = report.sheets_written,
            rows = report.rows_written,
            "Spreadsheet populated"
        );
        Ok(report)
    }

    /// Remote tabs whose titles name one of the query's localities, in
    /// locality order. Other tabs are ignored.
    async fn discover_sheets(
        &self,
        spreadsheet: &Spreadsheet,
        query: &Query,
    ) -> Result<Vec<Sheet>, SheetsError> {
        let tabs = self.sheets.list_sheets(&spreadsheet.google_id).await?;

        let mut sheets = Vec::new();
        for locality in &query.localities {
            if let Some(tab) = tabs.iter().find(|t| t.title == locality.name) {
                sheets.push(Sheet {
                    sheet_id: tab.sheet_id,
                    title: tab.title.clone(),
                    locality: locality.clone(),
                });
            }
        }

        for tab in &tabs {
            if query.locality_for_title(&tab.title).is_none() {
                debug!(title = %tab.title, "Ignoring tab without a locality");
            }
        }
        Ok(sheets)
    }
}

/// One add-tab request per locality without a tab, indexed by the locality's
/// position in the query.
fn missing_tab_requests(query: &Query, sheets: &[Sheet]) -> Vec<Request> {
    query
        .localities
        .iter()
        .enumerate()
        .filter(|(_, l)| !sheets.iter().any(|s| s.title == l.name))
        .map(|(index, l)| Request::add_sheet(l.name.clone(), index as u32))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Category, Locality};
    use crate::repository::test_support::setup_test_db;
    use crate::repository::DbContext;
    use crate::sheets::TabProperties;
    use crate::testing::{FakePriceApi, FakeSheetsApi};

    async fn seeded_spreadsheet(ctx: &DbContext, google_id: &str) -> Spreadsheet {
        let category = ctx.categories().save(Category::new("1001", "Pizzas")).await.unwrap();
        let a = ctx.localities().save(Locality::new("6gkzq", "Curitiba")).await.unwrap();
        let b = ctx.localities().save(Locality::new("6gkzm", "Pinhais")).await.unwrap();
        let mut query = Query::new("pizza", vec![a, b], 5.0);
        query.category = Some(category);
        let query = ctx.queries().save(query).await.unwrap();
        ctx.spreadsheets()
            .save(Spreadsheet::new(google_id, query))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_creates_all_tabs_in_one_batch() {
        let (ctx, _dir) = setup_test_db().await;
        let spreadsheet = seeded_spreadsheet(&ctx, "remote-1").await;
        let sheets = FakeSheetsApi::default().with_tabs("remote-1", &["Sheet1"]);
        let prices = FakePriceApi::default()
            .with_products("6gkzq", 3)
            .with_products("6gkzm", 2);
        let repo = ctx.spreadsheets();

        let report = SpreadsheetReconciler::new(&sheets, &prices, &repo)
            .reconcile(spreadsheet.id.unwrap())
            .await
            .unwrap();

        let add_batches = sheets.add_sheet_batches();
        assert_eq!(add_batches.len(), 1);
        assert_eq!(
            add_batches[0],
            vec![
                Request::AddSheet {
                    properties: TabProperties { title: "Curitiba".into(), index: 0 }
                },
                Request::AddSheet {
                    properties: TabProperties { title: "Pinhais".into(), index: 1 }
                },
            ]
        );
        assert_eq!(sheets.append_batches().len(), 1);
        assert_eq!(
            report,
            PopulateReport {
                tabs_created: 2,
                sheets_written: 2,
                sheets_skipped: 0,
                rows_written: 5,
            }
        );

        let stored = repo.find_by_id(spreadsheet.id.unwrap()).await.unwrap();
        assert!(stored.is_populated);
        assert!(stored.last_populated.is_some());
    }

    #[tokio::test]
    async fn test_existing_tabs_are_not_recreated() {
        let (ctx, _dir) = setup_test_db().await;
        let spreadsheet = seeded_spreadsheet(&ctx, "remote-2").await;
        let sheets = FakeSheetsApi::default().with_tabs("remote-2", &["Pinhais", "Notes", "Curitiba"]);
        let prices = FakePriceApi::default()
            .with_products("6gkzq", 1)
            .with_products("6gkzm", 1);
        let repo = ctx.spreadsheets();

        let report = SpreadsheetReconciler::new(&sheets, &prices, &repo)
            .reconcile(spreadsheet.id.unwrap())
            .await
            .unwrap();

        assert!(sheets.add_sheet_batches().is_empty());
        assert_eq!(report.tabs_created, 0);

        let appends = sheets.append_batches();
        assert_eq!(appends.len(), 1);
        let ids: Vec<i64> = appends[0]
            .iter()
            .filter_map(|r| match r {
                Request::AppendCells(a) => Some(a.sheet_id),
                _ => None,
            })
            .collect();
        let curitiba = sheets.sheet_id("remote-2", "Curitiba").unwrap();
        let pinhais = sheets.sheet_id("remote-2", "Pinhais").unwrap();
        assert_eq!(ids, vec![curitiba, pinhais]);
    }

    #[tokio::test]
    async fn test_only_missing_tabs_are_created() {
        let (ctx, _dir) = setup_test_db().await;
        let spreadsheet = seeded_spreadsheet(&ctx, "remote-8").await;
        let sheets = FakeSheetsApi::default().with_tabs("remote-8", &["Pinhais"]);
        let prices = FakePriceApi::default()
            .with_products("6gkzq", 1)
            .with_products("6gkzm", 1);
        let repo = ctx.spreadsheets();

        let report = SpreadsheetReconciler::new(&sheets, &prices, &repo)
            .reconcile(spreadsheet.id.unwrap())
            .await
            .unwrap();

        assert_eq!(
            sheets.add_sheet_batches(),
            vec![vec![Request::add_sheet("Curitiba", 0)]]
        );
        assert_eq!(report.tabs_created, 1);
        assert_eq!(report.sheets_written, 2);
    }

    #[tokio::test]
    async fn test_tabs_absent_after_creation_abort() {
        let (ctx, _dir) = setup_test_db().await;
        let spreadsheet = seeded_spreadsheet(&ctx, "remote-9").await;
        let sheets = FakeSheetsApi::default()
            .with_tabs("remote-9", &["Curitiba"])
            .ignoring_add_sheets();
        let prices = FakePriceApi::default().with_products("6gkzq", 2);
        let repo = ctx.spreadsheets();

        let err = SpreadsheetReconciler::new(&sheets, &prices, &repo)
            .reconcile(spreadsheet.id.unwrap())
            .await
            .unwrap_err();

        assert!(matches!(&err, PopulateError::TabsMissing(names) if names == &["Pinhais"]));
        assert_eq!(sheets.list_calls(), 2);
        assert!(sheets.append_batches().is_empty());
        assert!(prices.product_offsets().is_empty());
        assert!(!repo.find_by_id(spreadsheet.id.unwrap()).await.unwrap().is_populated);
    }

    #[tokio::test]
    async fn test_fetch_failure_aborts_before_writing() {
        let (ctx, _dir) = setup_test_db().await;
        let spreadsheet = seeded_spreadsheet(&ctx, "remote-10").await;
        let sheets = FakeSheetsApi::default().with_tabs("remote-10", &["Curitiba", "Pinhais"]);
        let prices = FakePriceApi::default()
            .with_products("6gkzq", 3)
            .with_failing_geohash("6gkzm");
        let repo = ctx.spreadsheets();

        let err = SpreadsheetReconciler::new(&sheets, &prices, &repo)
            .reconcile(spreadsheet.id.unwrap())
            .await
            .unwrap_err();

        assert!(
            matches!(&err, PopulateError::FetchProducts { locality, .. } if locality == "Pinhais")
        );
        assert!(sheets.append_batches().is_empty());
        let stored = repo.find_by_id(spreadsheet.id.unwrap()).await.unwrap();
        assert!(!stored.is_populated);
        assert!(stored.last_populated.is_none());

        // Each cause appears once in the rendered chain.
        assert_eq!(
            format!("{:#}", anyhow::Error::new(err)),
            "could not fetch products for Pinhais: fake://6gkzm returned HTTP 500"
        );
    }

    #[tokio::test]
    async fn test_locality_without_products_is_skipped() {
        let (ctx, _dir) = setup_test_db().await;
        let spreadsheet = seeded_spreadsheet(&ctx, "remote-3").await;
        let sheets = FakeSheetsApi::default().with_tabs("remote-3", &["Sheet1"]);
        let prices = FakePriceApi::default().with_products("6gkzq", 4);
        let repo = ctx.spreadsheets();

        let report = SpreadsheetReconciler::new(&sheets, &prices, &repo)
            .with_concurrency(2)
            .reconcile(spreadsheet.id.unwrap())
            .await
            .unwrap();

        assert_eq!(report.sheets_written, 1);
        assert_eq!(report.sheets_skipped, 1);
        assert_eq!(sheets.append_batches()[0].len(), 1);
        assert!(repo.find_by_id(spreadsheet.id.unwrap()).await.unwrap().is_populated);
    }

    #[tokio::test]
    async fn test_write_failure_leaves_spreadsheet_unpopulated() {
        let (ctx, _dir) = setup_test_db().await;
        let spreadsheet = seeded_spreadsheet(&ctx, "remote-4").await;
        let sheets = FakeSheetsApi::default()
            .with_tabs("remote-4", &["Curitiba", "Pinhais"])
            .failing_appends();
        let prices = FakePriceApi::default().with_products("6gkzq", 2);
        let repo = ctx.spreadsheets();

        let err = SpreadsheetReconciler::new(&sheets, &prices, &repo)
            .reconcile(spreadsheet.id.unwrap())
            .await
            .unwrap_err();

        assert!(matches!(err, PopulateError::WriteCells(_)));
        let stored = repo.find_by_id(spreadsheet.id.unwrap()).await.unwrap();
        assert!(!stored.is_populated);
        assert!(stored.last_populated.is_none());
    }

    #[tokio::test]
    async fn test_tab_creation_failure_aborts() {
        let (ctx, _dir) = setup_test_db().await;
        let spreadsheet = seeded_spreadsheet(&ctx, "remote-5").await;
        let sheets = FakeSheetsApi::default().failing_add_sheets();
        let prices = FakePriceApi::default().with_products("6gkzq", 2);
        let repo = ctx.spreadsheets();

        let err = SpreadsheetReconciler::new(&sheets, &prices, &repo)
            .reconcile(spreadsheet.id.unwrap())
            .await
            .unwrap_err();

        assert!(matches!(err, PopulateError::CreateTabs(_)));
        assert!(prices.product_offsets().is_empty());
        assert!(!repo.find_by_id(spreadsheet.id.unwrap()).await.unwrap().is_populated);
        assert_eq!(
            format!("{:#}", anyhow::Error::new(err)),
            "could not complete request to create sheets: \
             sheets API returned HTTP 500: Internal error encountered."
        );
    }

    #[tokio::test]
    async fn test_missing_spreadsheet_and_query() {
        let (ctx, _dir) = setup_test_db().await;
        let sheets = FakeSheetsApi::default();
        let prices = FakePriceApi::default();
        let repo = ctx.spreadsheets();
        let reconciler = SpreadsheetReconciler::new(&sheets, &prices, &repo);

        let err = reconciler.reconcile(999).await.unwrap_err();
        assert!(matches!(err, PopulateError::NotFound(999)));

        let spreadsheet = seeded_spreadsheet(&ctx, "remote-6").await;
        let query_id = spreadsheet.query.as_ref().and_then(|q| q.id).unwrap();
        ctx.queries().delete_by_id(query_id).await.unwrap();

        let id = spreadsheet.id.unwrap();
        let err = reconciler.reconcile(id).await.unwrap_err();
        assert!(matches!(err, PopulateError::MissingQuery(i) if i == id));
        assert_eq!(sheets.list_calls(), 0);
    }

    #[tokio::test]
    async fn test_repopulating_appends_again() {
        let (ctx, _dir) = setup_test_db().await;
        let spreadsheet = seeded_spreadsheet(&ctx, "remote-7").await;
        let sheets = FakeSheetsApi::default();
        let prices = FakePriceApi::default()
            .with_products("6gkzq", 1)
            .with_products("6gkzm", 1);
        let repo = ctx.spreadsheets();
        let reconciler = SpreadsheetReconciler::new(&sheets, &prices, &repo);

        reconciler.reconcile(spreadsheet.id.unwrap()).await.unwrap();
        let second = reconciler.reconcile(spreadsheet.id.unwrap()).await.unwrap();

        assert_eq!(second.tabs_created, 0);
        assert_eq!(sheets.add_sheet_batches().len(), 1);
        assert_eq!(sheets.append_batches().len(), 2);
    }
}
