//! Google Sheets export.
//!
//! [`SheetsApi`] is the narrow slice of the Sheets v4 API the exporter needs:
//! create a spreadsheet, list its tabs and apply a batch of updates. Request
//! types serialise to the v4 JSON shapes directly.

pub mod client;
pub mod credentials;
pub mod reconciler;
pub mod writer;

pub use client::{GoogleSheetsClient, DEFAULT_SHEETS_API_URL};
pub use credentials::{AuthorizedUser, TokenSource};
pub use reconciler::{PopulateError, PopulateReport, SpreadsheetReconciler};
pub use writer::{append_request, product_rows, spreadsheet_title, CreateError, SpreadsheetWriter};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Errors from the spreadsheet service.
#[derive(Debug, thiserror::Error)]
pub enum SheetsError {
    #[error("request to {url} failed")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("sheets API returned HTTP {status}: {message}")]
    Api { status: u16, message: String },

    #[error("could not decode sheets API response")]
    Decode(#[source] serde_json::Error),

    #[error("credentials error: {0}")]
    Credentials(String),
}

/// Properties of an existing tab.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetProperties {
    #[serde(default)]
    pub sheet_id: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub index: u32,
}

/// Properties of a tab to create.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TabProperties {
    pub title: String,
    pub index: u32,
}

/// A string cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CellData {
    pub user_entered_value: ExtendedValue,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtendedValue {
    pub string_value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowData {
    pub values: Vec<CellData>,
}

/// Rows appended after the last row with data in a tab.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppendCells {
    pub sheet_id: i64,
    pub rows: Vec<RowData>,
    /// Field mask; only cell values are written.
    pub fields: String,
}

/// One operation of a `batchUpdate` call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Request {
    AddSheet { properties: TabProperties },
    AppendCells(AppendCells),
}

impl Request {
    pub fn add_sheet(title: impl Into<String>, index: u32) -> Self {
        Request::AddSheet {
            properties: TabProperties {
                title: title.into(),
                index,
            },
        }
    }

    /// Append string rows to a tab.
    pub fn append_rows(sheet_id: i64, rows: Vec<Vec<String>>) -> Self {
        let rows = rows
            .into_iter()
            .map(|row| RowData {
                values: row
                    .into_iter()
                    .map(|cell| CellData {
                        user_entered_value: ExtendedValue { string_value: cell },
                    })
                    .collect(),
            })
            .collect();

        Request::AppendCells(AppendCells {
            sheet_id,
            rows,
            fields: "userEnteredValue".to_string(),
        })
    }

    pub fn is_add_sheet(&self) -> bool {
        matches!(self, Request::AddSheet { .. })
    }
}

/// Spreadsheet operations used by the exporter.
#[async_trait]
pub trait SheetsApi: Send + Sync {
    /// Create a spreadsheet and return its remote id.
    async fn create_spreadsheet(&self, title: &str) -> Result<String, SheetsError>;

    /// Tabs of a spreadsheet, in tab order.
    async fn list_sheets(&self, spreadsheet_id: &str) -> Result<Vec<SheetProperties>, SheetsError>;

    /// Apply all requests in one call.
    async fn batch_update(
        &self,
        spreadsheet_id: &str,
        requests: Vec<Request>,
    ) -> Result<(), SheetsError>;
}
