//! Paginated product fetching for one query locality.

use serde_json::Value;
use tracing::{debug, warn};

use super::menor_preco::{ApiError, PriceApi, ProductSearch, RawProduct, PAGE_SIZE};
use crate::models::{Locality, Product, Query};

/// Errors from a product fetch.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("query {} has no category", query_label(.0))]
    MissingCategory(Option<i32>),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("invalid number in field '{field}': {value}")]
    InvalidNumber { field: &'static str, value: String },
}

fn query_label(id: &Option<i32>) -> String {
    id.map(|id| id.to_string())
        .unwrap_or_else(|| "(unsaved)".to_string())
}

/// Fetches every product page for a query in one locality.
pub struct ProductFetcher<'a> {
    api: &'a dyn PriceApi,
}

impl<'a> ProductFetcher<'a> {
    pub fn new(api: &'a dyn PriceApi) -> Self {
        Self { api }
    }

    /// Fetch all products for `query` around `locality`, in remote order.
    ///
    /// The first page supplies `total`; further pages are requested at
    /// increasing offsets until `total` products are collected. An empty page
    /// before that ends the fetch.
    pub async fn fetch(&self, query: &Query, locality: &Locality) -> Result<Vec<Product>, FetchError> {
        let category = query
            .category
            .as_ref()
            .ok_or(FetchError::MissingCategory(query.id))?;

        let search = ProductSearch {
            geohash: locality.geohash.clone(),
            term: query.display_term(),
            category: category.nota_id.clone(),
            radius: query.radius,
        };

        let first = self.api.search_products(&search, 0).await?;
        let total = first.total;
        let mut raw = first.produtos;
        let mut offset: u32 = 0;

        while (raw.len() as u64) < total {
            offset += PAGE_SIZE;
            if u64::from(offset) >= total {
                break;
            }

            let page = self.api.search_products(&search, offset).await?;
            if page.produtos.is_empty() {
                warn!(
                    locality = %locality.name,
                    offset,
                    total,
                    collected = raw.len(),
                    "Empty product page before total was reached"
                );
                break;
            }
            raw.extend(page.produtos);
        }

        debug!(locality = %locality.name, total, fetched = raw.len(), "Fetched products");
        raw.iter().map(map_product).collect()
    }
}

/// Map a remote product record into a [`Product`].
pub fn map_product(raw: &RawProduct) -> Result<Product, FetchError> {
    let store = &raw.estabelecimento;
    let address = format!(
        "{} {}, N {}",
        text(&store.tp_logr),
        text(&store.nm_logr),
        text(&store.nr_logr)
    );

    Ok(Product {
        external_id: text(&raw.id),
        emission_date: text(&raw.datahora),
        description: text(&raw.desc),
        distance_km: number("distkm", &raw.distkm)?,
        store_id: text(&store.codigo),
        store_name: text(&store.nm_emp),
        store_address: address,
        barcode: text(&raw.gtin),
        tax_code: text(&raw.ncm),
        document_number: text(&raw.nrdoc),
        time_of_sale: text(&raw.tempo),
        price: number("valor", &raw.valor)?,
        discount_value: number("valor_desconto", &raw.valor_desconto)?,
    })
}

fn text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn number(field: &'static str, value: &Value) -> Result<f64, FetchError> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| FetchError::InvalidNumber {
        field,
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Category;
    use crate::testing::{raw_product, FakePriceApi};

    fn pizza_query() -> Query {
        let mut query = Query::new("pizza calabresa", vec![Locality::new("6gkzq", "Curitiba")], 5.0);
        query.category = Some(Category::new("1001", "Pizzas"));
        query
    }

    #[tokio::test]
    async fn test_pagination_requests_every_page() {
        let api = FakePriceApi::default().with_products("6gkzq", 120);
        let query = pizza_query();

        let products = ProductFetcher::new(&api)
            .fetch(&query, &query.localities[0])
            .await
            .unwrap();

        assert_eq!(products.len(), 120);
        assert_eq!(api.product_offsets(), vec![0, 50, 100]);

        let searches = api.product_searches();
        assert!(searches.iter().all(|s| s == &searches[0]));
        assert_eq!(searches[0].term, "pizza calabresa");
        assert_eq!(searches[0].category, "1001");
    }

    #[tokio::test]
    async fn test_single_page_issues_one_request() {
        let api = FakePriceApi::default().with_products("6gkzq", 7);
        let query = pizza_query();

        let products = ProductFetcher::new(&api)
            .fetch(&query, &query.localities[0])
            .await
            .unwrap();

        assert_eq!(products.len(), 7);
        assert_eq!(api.product_offsets(), vec![0]);
        assert_eq!(products[0].external_id, "p0");
    }

    #[tokio::test]
    async fn test_empty_page_ends_fetch_before_total() {
        let api = FakePriceApi::default()
            .with_products("6gkzq", 60)
            .with_reported_total("6gkzq", 200);
        let query = pizza_query();

        let products = ProductFetcher::new(&api)
            .fetch(&query, &query.localities[0])
            .await
            .unwrap();

        assert_eq!(products.len(), 60);
        assert_eq!(api.product_offsets(), vec![0, 50, 100]);
    }

    #[tokio::test]
    async fn test_missing_category_is_rejected() {
        let api = FakePriceApi::default();
        let mut query = pizza_query();
        query.category = None;

        let err = ProductFetcher::new(&api)
            .fetch(&query, &query.localities[0])
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::MissingCategory(None)));
        assert!(api.product_offsets().is_empty());
    }

    #[test]
    fn test_map_product_formats_address_and_numbers() {
        let product = map_product(&raw_product(3)).unwrap();
        assert_eq!(product.store_address, "RUA XV DE NOVEMBRO, N 3");
        assert_eq!(product.price, 10.5);
        assert_eq!(product.discount_value, 0.0);
        assert_eq!(product.store_id, "42");
    }

    #[test]
    fn test_malformed_price_is_fatal() {
        let mut raw = raw_product(0);
        raw.valor = Value::String("R$ 10".into());

        let err = map_product(&raw).unwrap_err();
        assert!(matches!(err, FetchError::InvalidNumber { field: "valor", .. }));
    }
}
