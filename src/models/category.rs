//! Product categories discovered from the price service.

use serde::{Deserialize, Serialize};

/// A product category as listed by the remote catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    /// Database row ID (None until persisted).
    pub id: Option<i32>,
    /// Category code used by the remote service.
    pub nota_id: String,
    pub description: String,
}

impl Category {
    pub fn new(nota_id: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: None,
            nota_id: nota_id.into(),
            description: description.into(),
        }
    }
}

/// Categories are the same when ids match and descriptions match ignoring case.
pub fn same_category(a: &Category, b: &Category) -> bool {
    a.id == b.id && a.description.to_uppercase() == b.description.to_uppercase()
}
