//! Search queries: a term scoped to localities, a category and a radius.

use serde::{Deserialize, Serialize};

use super::{Category, Locality};

/// Token stored in place of spaces so the term can be dropped into URLs.
pub const TERM_SPACE_PLACEHOLDER: &str = "%20";

/// Search radius used when none is given.
pub const DEFAULT_RADIUS_KM: f64 = 10.0;

/// Encode a user-entered term for storage.
pub fn encode_term(term: &str) -> String {
    term.trim().replace(' ', TERM_SPACE_PLACEHOLDER)
}

/// Decode a stored term for display or for handing to an HTTP client that
/// does its own encoding.
pub fn decode_term(term: &str) -> String {
    term.replace(TERM_SPACE_PLACEHOLDER, " ")
}

/// A saved product search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Query {
    pub id: Option<i32>,
    /// Search term with spaces stored as [`TERM_SPACE_PLACEHOLDER`].
    pub term: String,
    pub localities: Vec<Locality>,
    pub category: Option<Category>,
    /// Search radius in kilometres.
    pub radius: f64,
}

impl Query {
    /// Create an unsaved query. The term is encoded for storage.
    pub fn new(term: &str, localities: Vec<Locality>, radius: f64) -> Self {
        Self {
            id: None,
            term: encode_term(term),
            localities,
            category: None,
            radius,
        }
    }

    /// Term as typed by the user.
    pub fn display_term(&self) -> String {
        decode_term(&self.term)
    }

    /// Find the locality whose name exactly matches a sheet title.
    pub fn locality_for_title(&self, title: &str) -> Option<&Locality> {
        self.localities.iter().find(|l| l.name == title)
    }

    /// Comma-separated locality names for listings.
    pub fn locality_names(&self) -> String {
        self.localities
            .iter()
            .map(|l| l.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}
