//! Geographic localities used to scope remote searches.

use serde::{Deserialize, Serialize};

/// A named region identified by its geohash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Locality {
    /// Database row ID (None until persisted).
    pub id: Option<i32>,
    /// Geohash returned by the geocoding endpoint.
    pub geohash: String,
    /// Canonical display name (first segment of the geocoded display name).
    pub name: String,
}

impl Locality {
    pub fn new(geohash: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: None,
            geohash: geohash.into(),
            name: name.into(),
        }
    }

    /// Build a locality from a geocoder hit.
    ///
    /// The geocoder returns names like `"Curitiba, Região Metropolitana, Paraná, Brasil"`;
    /// only the first comma-delimited segment is kept.
    pub fn from_display_name(geohash: &str, display_name: &str) -> Self {
        let name = display_name.split(',').next().unwrap_or(display_name).trim();
        Self::new(geohash, name)
    }
}

/// Case-insensitive name comparison used for locality lookups.
pub fn names_match(a: &str, b: &str) -> bool {
    a.trim().to_lowercase() == b.trim().to_lowercase()
}

/// Two localities are the same region when geohashes match and names match
/// ignoring case.
pub fn same_locality(a: &Locality, b: &Locality) -> bool {
    a.geohash == b.geohash && names_match(&a.name, &b.name)
}
