//! Nota Paraná "Menor Preço" price service API.
//!
//! Three read-only endpoints are used: region geocoding, category search and
//! paginated product search. [`PriceApi`] is the seam the resolvers and the
//! product fetcher depend on; [`MenorPrecoClient`] is the HTTP implementation.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::debug;

use super::http_client::HttpClient;

/// Public base URL of the price service.
pub const DEFAULT_API_URL: &str = "https://menorpreco.notaparana.pr.gov.br";

/// Products returned per page by the product search endpoint.
pub const PAGE_SIZE: u32 = 50;

/// Errors from the price service.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("request to {url} failed")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("could not decode response from {url}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

/// One geocoding match for a region name.
#[derive(Debug, Clone, Deserialize)]
pub struct RegionMatch {
    pub geohash: String,
    pub display_name: String,
}

/// One category listed for a term in a region.
#[derive(Debug, Clone, Deserialize)]
pub struct CategoryMatch {
    #[serde(deserialize_with = "code_as_string")]
    pub id: String,
    pub desc: String,
}

#[derive(Debug, Deserialize)]
struct CategorySearchResponse {
    #[serde(default)]
    categorias: Vec<CategoryMatch>,
}

/// Store fields of a product record. Values are kept loosely typed since the
/// service mixes numbers and strings for the same field.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawStore {
    #[serde(default)]
    pub codigo: Value,
    #[serde(default)]
    pub nm_emp: Value,
    #[serde(default)]
    pub tp_logr: Value,
    #[serde(default)]
    pub nm_logr: Value,
    #[serde(default)]
    pub nr_logr: Value,
}

/// A product record as returned by the product search endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawProduct {
    #[serde(default)]
    pub id: Value,
    #[serde(default)]
    pub datahora: Value,
    #[serde(default)]
    pub desc: Value,
    #[serde(default)]
    pub distkm: Value,
    #[serde(default)]
    pub gtin: Value,
    #[serde(default)]
    pub ncm: Value,
    #[serde(default)]
    pub nrdoc: Value,
    #[serde(default)]
    pub tempo: Value,
    #[serde(default)]
    pub valor: Value,
    #[serde(default)]
    pub valor_desconto: Value,
    #[serde(default)]
    pub estabelecimento: RawStore,
}

/// One page of product search results.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductPage {
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub produtos: Vec<RawProduct>,
}

/// Parameters shared by every page of one product search.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductSearch {
    pub geohash: String,
    /// Decoded term, as typed by the user.
    pub term: String,
    /// Remote category code.
    pub category: String,
    /// Radius in kilometres.
    pub radius: f64,
}

impl ProductSearch {
    /// Query string for one page. Only `offset` varies between pages.
    pub fn params(&self, offset: u32) -> Vec<(&'static str, String)> {
        vec![
            ("local", self.geohash.clone()),
            ("termo", self.term.clone()),
            ("categoria", self.category.clone()),
            ("offset", offset.to_string()),
            ("raio", self.radius.to_string()),
            ("data", "-1".to_string()),
            ("ordem", "0".to_string()),
        ]
    }
}

/// Read-only operations of the price service.
#[async_trait]
pub trait PriceApi: Send + Sync {
    /// Geocode a region name. Best match first.
    async fn search_region(&self, name: &str) -> Result<Vec<RegionMatch>, ApiError>;

    /// Categories matching a term around a geohash.
    async fn search_categories(
        &self,
        geohash: &str,
        term: &str,
    ) -> Result<Vec<CategoryMatch>, ApiError>;

    /// One page of products starting at `offset`.
    async fn search_products(
        &self,
        search: &ProductSearch,
        offset: u32,
    ) -> Result<ProductPage, ApiError>;
}

/// HTTP implementation of [`PriceApi`].
#[derive(Clone)]
pub struct MenorPrecoClient {
    http: HttpClient,
    base_url: String,
}

impl MenorPrecoClient {
    pub fn new(http: HttpClient, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T, ApiError> {
        let url = format!("{}{}", self.base_url, path);

        let response = self
            .http
            .get(&url, params)
            .await
            .map_err(|source| ApiError::Http {
                url: url.clone(),
                source,
            })?;

        if !response.is_success() {
            return Err(ApiError::Status {
                url: response.url.clone(),
                status: response.status.as_u16(),
            });
        }

        let content_type = response.content_type().unwrap_or_default().to_string();
        let body = response.text().await.map_err(|source| ApiError::Http {
            url: url.clone(),
            source,
        })?;

        serde_json::from_str(&body).map_err(|source| {
            debug!(%url, %content_type, "Unexpected response body");
            ApiError::Decode { url, source }
        })
    }
}

#[async_trait]
impl PriceApi for MenorPrecoClient {
    async fn search_region(&self, name: &str) -> Result<Vec<RegionMatch>, ApiError> {
        debug!(region = name, "Geocoding region");
        self.get_json("/mapa/search", &[("regiao", name.to_string())])
            .await
    }

    async fn search_categories(
        &self,
        geohash: &str,
        term: &str,
    ) -> Result<Vec<CategoryMatch>, ApiError> {
        debug!(geohash, term, "Searching categories");
        let response: CategorySearchResponse = self
            .get_json(
                "/api/v1/categorias",
                &[("local", geohash.to_string()), ("termo", term.to_string())],
            )
            .await?;
        Ok(response.categorias)
    }

    async fn search_products(
        &self,
        search: &ProductSearch,
        offset: u32,
    ) -> Result<ProductPage, ApiError> {
        debug!(geohash = %search.geohash, offset, "Searching products");
        self.get_json("/api/v1/produtos", &search.params(offset))
            .await
    }
}

/// Category codes arrive as numbers or strings; store them as text.
fn code_as_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    match value {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected category code, got {}",
            other
        ))),
    }
}
