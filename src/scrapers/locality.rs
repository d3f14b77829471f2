//! Resolve region names into persisted localities.

use tracing::{debug, info, warn};

use super::menor_preco::PriceApi;
use crate::models::Locality;
use crate::repository::{LocalityRepository, Repository};

/// Turns user-entered region names into stored localities, geocoding the
/// ones not seen before.
pub struct LocalityResolver<'a> {
    api: &'a dyn PriceApi,
    repo: &'a LocalityRepository,
}

impl<'a> LocalityResolver<'a> {
    pub fn new(api: &'a dyn PriceApi, repo: &'a LocalityRepository) -> Self {
        Self { api, repo }
    }

    /// Resolve every name, in input order.
    ///
    /// Names that cannot be geocoded or saved are logged and left out of the
    /// result; they never abort the rest of the batch.
    pub async fn resolve<S: AsRef<str>>(&self, names: &[S]) -> Vec<Locality> {
        let mut resolved = Vec::with_capacity(names.len());

        for name in names {
            let name = name.as_ref().trim();
            if name.is_empty() {
                continue;
            }

            if let Some(locality) = self.resolve_one(name).await {
                resolved.push(locality);
            }
        }

        resolved
    }

    async fn resolve_one(&self, name: &str) -> Option<Locality> {
        match self.repo.find_by_name(name).await {
            Ok(Some(existing)) => {
                debug!(name, geohash = %existing.geohash, "Locality already known");
                return Some(existing);
            }
            Ok(None) => {}
            Err(e) => {
                warn!(name, error = ?e, "Could not look up locality");
                return None;
            }
        }

        let matches = match self.api.search_region(name).await {
            Ok(matches) => matches,
            Err(e) => {
                warn!(name, error = ?e, "Could not geocode region");
                return None;
            }
        };

        let Some(best) = matches.into_iter().next() else {
            warn!(name, "Region not found");
            return None;
        };

        let locality = Locality::from_display_name(&best.geohash, &best.display_name);
        match self.repo.save(locality).await {
            Ok(saved) => {
                info!(name = %saved.name, geohash = %saved.geohash, "Added locality");
                Some(saved)
            }
            Err(e) => {
                warn!(name, error = ?e, "Could not save locality");
                None
            }
        }
    }
}
