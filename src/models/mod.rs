//! Domain models for queries, their localities and categories, and the
//! spreadsheets they are exported to.

mod category;
mod locality;
mod product;
mod query;
mod spreadsheet;

pub use category::{same_category, Category};
pub use locality::{names_match, same_locality, Locality};
pub use product::{Product, PRODUCT_COLUMNS};
pub use query::{decode_term, encode_term, Query, DEFAULT_RADIUS_KM, TERM_SPACE_PLACEHOLDER};
pub use spreadsheet::{Sheet, Spreadsheet, SpreadsheetState};
