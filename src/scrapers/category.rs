//! Discover the remote categories that match a query term.

use tracing::{debug, warn};

use super::menor_preco::PriceApi;
use crate::models::{same_category, Category, Locality, Query};
use crate::repository::{CategoryRepository, Repository, RepositoryError};

/// Errors that end a discovery run.
#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error("no localities defined for query {}", display_id(.0))]
    NoLocalitiesDefined(Option<i32>),

    #[error("no categories found for query {}", display_id(.0))]
    NoCategoriesFound(Option<i32>),
}

fn display_id(id: &Option<i32>) -> String {
    id.map(|id| format!("of id: {}", id))
        .unwrap_or_else(|| "(unsaved)".to_string())
}

/// Finds the categories a term falls under in each of a query's localities.
pub struct CategoryDiscovery<'a> {
    api: &'a dyn PriceApi,
    repo: &'a CategoryRepository,
}

impl<'a> CategoryDiscovery<'a> {
    pub fn new(api: &'a dyn PriceApi, repo: &'a CategoryRepository) -> Self {
        Self { api, repo }
    }

    /// Discover categories across all localities of `query`.
    ///
    /// `progress` is called before each locality is searched with the
    /// locality, its 0-based position and the locality count. A locality the
    /// remote service fails on is skipped, as is any category that cannot be
    /// looked up or stored.
    pub async fn discover<F>(
        &self,
        query: &Query,
        mut progress: F,
    ) -> Result<Vec<Category>, DiscoveryError>
    where
        F: FnMut(&Locality, usize, usize),
    {
        if query.localities.is_empty() {
            return Err(DiscoveryError::NoLocalitiesDefined(query.id));
        }

        let term = query.display_term();
        let total = query.localities.len();
        let mut found: Vec<Category> = Vec::new();

        for (index, locality) in query.localities.iter().enumerate() {
            progress(locality, index, total);

            let matches = match self.api.search_categories(&locality.geohash, &term).await {
                Ok(matches) => matches,
                Err(e) => {
                    warn!(locality = %locality.name, error = ?e, "Category search failed, skipping locality");
                    continue;
                }
            };

            for remote in matches {
                let code = remote.id.clone();
                let category = match self.stored_category(remote.id, remote.desc).await {
                    Ok(category) => category,
                    Err(e) => {
                        warn!(locality = %locality.name, %code, error = ?e, "Could not store category, skipping");
                        continue;
                    }
                };

                if !found.iter().any(|c| same_category(c, &category)) {
                    found.push(category);
                }
            }
        }

        if found.is_empty() {
            return Err(DiscoveryError::NoCategoriesFound(query.id));
        }
        Ok(found)
    }

    /// The stored category for a remote code, created on first sight.
    async fn stored_category(
        &self,
        code: String,
        description: String,
    ) -> Result<Category, RepositoryError> {
        if let Some(existing) = self.repo.find_by_nota_id(&code).await? {
            return Ok(existing);
        }
        let saved = self.repo.save(Category::new(code, description)).await?;
        debug!(code = %saved.nota_id, description = %saved.description, "Stored new category");
        Ok(saved)
    }
}
