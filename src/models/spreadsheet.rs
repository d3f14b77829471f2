//! Spreadsheets exported for a query, and the remote tabs inside them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Locality, Query};

/// Persisted lifecycle of a spreadsheet.
///
/// Tab creation happens inside a single population pass, so only the two
/// durable states are stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpreadsheetState {
    Created,
    Populated,
}

impl SpreadsheetState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Populated => "populated",
        }
    }
}

/// A remote spreadsheet owned by a query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Spreadsheet {
    pub id: Option<i32>,
    /// Spreadsheet id assigned by the remote service.
    pub google_id: String,
    /// Owning query. Absent when the query was deleted after export.
    pub query: Option<Query>,
    pub is_populated: bool,
    pub last_populated: Option<DateTime<Utc>>,
}

impl Spreadsheet {
    pub fn new(google_id: impl Into<String>, query: Query) -> Self {
        Self {
            id: None,
            google_id: google_id.into(),
            query: Some(query),
            is_populated: false,
            last_populated: None,
        }
    }

    pub fn state(&self) -> SpreadsheetState {
        if self.is_populated {
            SpreadsheetState::Populated
        } else {
            SpreadsheetState::Created
        }
    }

    /// Record a successful population pass.
    pub fn mark_populated(&mut self, at: DateTime<Utc>) {
        self.is_populated = true;
        self.last_populated = Some(at);
    }

    /// Browser link to the remote spreadsheet.
    pub fn url(&self) -> String {
        format!("https://docs.google.com/spreadsheets/d/{}", self.google_id)
    }
}

/// A tab of a remote spreadsheet that belongs to one of the query's localities.
///
/// Derived from the remote listing on every pass and never persisted.
#[derive(Debug, Clone)]
pub struct Sheet {
    /// Tab id assigned by the remote service.
    pub sheet_id: i64,
    pub title: String,
    pub locality: Locality,
}
