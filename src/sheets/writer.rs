//! Spreadsheet creation and product row layout.

use chrono::{Local, NaiveDate};
use tracing::info;

use super::{Request, SheetsApi, SheetsError};
use crate::models::{Product, Query, Spreadsheet, PRODUCT_COLUMNS};
use crate::repository::{Repository, RepositoryError, SpreadsheetRepository};

/// Errors from creating a spreadsheet for a query.
#[derive(Debug, thiserror::Error)]
pub enum CreateError {
    #[error("could not create remote spreadsheet")]
    Remote(#[from] SheetsError),

    /// The remote spreadsheet exists but no local record points at it.
    #[error("remote spreadsheet {google_id} was created but could not be saved")]
    Persist {
        google_id: String,
        #[source]
        source: RepositoryError,
    },
}

/// Title given to a new spreadsheet: `"<term> - dd/mm/yyyy"`.
pub fn spreadsheet_title(query: &Query, date: NaiveDate) -> String {
    format!("{} - {}", query.display_term(), date.format("%d/%m/%Y"))
}

/// Header row followed by one row per product, every cell as text.
///
/// Returns no rows at all for an empty product list.
pub fn product_rows(products: &[Product]) -> Vec<Vec<String>> {
    if products.is_empty() {
        return Vec::new();
    }

    let mut rows = Vec::with_capacity(products.len() + 1);
    rows.push(PRODUCT_COLUMNS.iter().map(|c| c.to_string()).collect());
    rows.extend(products.iter().map(Product::to_row));
    rows
}

/// Creates remote spreadsheets and records them locally.
pub struct SpreadsheetWriter<'a> {
    sheets: &'a dyn SheetsApi,
    repo: &'a SpreadsheetRepository,
}

impl<'a> SpreadsheetWriter<'a> {
    pub fn new(sheets: &'a dyn SheetsApi, repo: &'a SpreadsheetRepository) -> Self {
        Self { sheets, repo }
    }

    /// Create a spreadsheet for a saved query, dated today.
    pub async fn create_for(&self, query: Query) -> Result<Spreadsheet, CreateError> {
        let title = spreadsheet_title(&query, Local::now().date_naive());
        let google_id = self.sheets.create_spreadsheet(&title).await?;
        info!(%google_id, %title, "Created spreadsheet");

        self.repo
            .save(Spreadsheet::new(google_id.clone(), query))
            .await
            .map_err(|source| CreateError::Persist { google_id, source })
    }
}

/// Append request for one tab, or `None` when there is nothing to write.
pub fn append_request(sheet_id: i64, products: &[Product]) -> Option<Request> {
    let rows = product_rows(products);
    if rows.is_empty() {
        None
    } else {
        Some(Request::append_rows(sheet_id, rows))
    }
}
