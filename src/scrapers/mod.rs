//! Scrapers for the Nota Paraná price service.

pub mod category;
mod http_client;
pub mod locality;
pub mod menor_preco;
pub mod products;

pub use category::{CategoryDiscovery, DiscoveryError};
pub use http_client::{HttpClient, HttpResponse};
pub use locality::LocalityResolver;
pub use menor_preco::{
    ApiError, CategoryMatch, MenorPrecoClient, PriceApi, ProductPage, ProductSearch, RawProduct,
    RegionMatch, DEFAULT_API_URL, PAGE_SIZE,
};
pub use products::{FetchError, ProductFetcher};
