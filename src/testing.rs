//! Recording fakes of the remote services for unit tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::models::Product;
use crate::scrapers::menor_preco::RawStore;
use crate::scrapers::{
    ApiError, CategoryMatch, PriceApi, ProductPage, ProductSearch, RawProduct, RegionMatch,
    PAGE_SIZE,
};
use crate::sheets::{Request, SheetProperties, SheetsApi, SheetsError};

/// Product record as the price service would return it.
pub fn raw_product(i: usize) -> RawProduct {
    RawProduct {
        id: Value::from(format!("p{}", i)),
        datahora: Value::from("2024-05-01T10:00:00.000Z"),
        desc: Value::from("PIZZA MUSSARELA 460G"),
        distkm: Value::from(1.5),
        gtin: Value::from("7891234567890"),
        ncm: Value::from("19022000"),
        nrdoc: Value::from(format!("{}", 1000 + i)),
        tempo: Value::from("2 horas"),
        valor: Value::from("10.50"),
        valor_desconto: Value::from(0),
        estabelecimento: RawStore {
            codigo: Value::from(42),
            nm_emp: Value::from("MERCADO CENTRAL"),
            tp_logr: Value::from("RUA"),
            nm_logr: Value::from("XV DE NOVEMBRO"),
            nr_logr: Value::from(i.to_string()),
        },
    }
}

pub fn product(id: &str, price: f64) -> Product {
    Product {
        external_id: id.to_string(),
        emission_date: "2024-05-01T10:00:00.000Z".into(),
        description: "PIZZA MUSSARELA 460G".into(),
        distance_km: 1.5,
        store_id: "42".into(),
        store_name: "MERCADO CENTRAL".into(),
        store_address: "RUA XV DE NOVEMBRO, N 1".into(),
        barcode: "7891234567890".into(),
        tax_code: "19022000".into(),
        document_number: "1000".into(),
        time_of_sale: "2 horas".into(),
        price,
        discount_value: 0.0,
    }
}

#[derive(Default)]
struct PriceCalls {
    regions: Vec<String>,
    categories: Vec<String>,
    products: Vec<(ProductSearch, u32)>,
}

/// In-memory price service keyed by region name and geohash.
#[derive(Default)]
pub struct FakePriceApi {
    regions: HashMap<String, Vec<RegionMatch>>,
    categories: HashMap<String, Vec<CategoryMatch>>,
    products: HashMap<String, Vec<RawProduct>>,
    totals: HashMap<String, u64>,
    failing: Vec<String>,
    calls: Mutex<PriceCalls>,
}

impl FakePriceApi {
    pub fn with_region(mut self, name: &str, geohash: &str, display_name: &str) -> Self {
        self.regions.insert(
            name.to_string(),
            vec![RegionMatch {
                geohash: geohash.to_string(),
                display_name: display_name.to_string(),
            }],
        );
        self
    }

    pub fn with_categories(mut self, geohash: &str, categories: &[(&str, &str)]) -> Self {
        self.categories.insert(
            geohash.to_string(),
            categories
                .iter()
                .map(|(id, desc)| CategoryMatch {
                    id: id.to_string(),
                    desc: desc.to_string(),
                })
                .collect(),
        );
        self
    }

    /// `count` products around `geohash`, served in pages of [`PAGE_SIZE`].
    pub fn with_products(mut self, geohash: &str, count: usize) -> Self {
        self.products
            .insert(geohash.to_string(), (0..count).map(raw_product).collect());
        self
    }

    /// Report `total` products for `geohash` regardless of how many are served.
    pub fn with_reported_total(mut self, geohash: &str, total: u64) -> Self {
        self.totals.insert(geohash.to_string(), total);
        self
    }

    /// Every call for this geohash fails with HTTP 500.
    pub fn with_failing_geohash(mut self, geohash: &str) -> Self {
        self.failing.push(geohash.to_string());
        self
    }

    pub fn region_calls(&self) -> usize {
        self.calls.lock().unwrap().regions.len()
    }

    pub fn category_calls(&self) -> usize {
        self.calls.lock().unwrap().categories.len()
    }

    pub fn product_offsets(&self) -> Vec<u32> {
        self.calls.lock().unwrap().products.iter().map(|(_, o)| *o).collect()
    }

    pub fn product_searches(&self) -> Vec<ProductSearch> {
        self.calls
            .lock()
            .unwrap()
            .products
            .iter()
            .map(|(s, _)| s.clone())
            .collect()
    }

    fn check(&self, geohash: &str) -> Result<(), ApiError> {
        if self.failing.iter().any(|g| g == geohash) {
            return Err(ApiError::Status {
                url: format!("fake://{}", geohash),
                status: 500,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl PriceApi for FakePriceApi {
    async fn search_region(&self, name: &str) -> Result<Vec<RegionMatch>, ApiError> {
        self.calls.lock().unwrap().regions.push(name.to_string());
        Ok(self.regions.get(name).cloned().unwrap_or_default())
    }

    async fn search_categories(
        &self,
        geohash: &str,
        _term: &str,
    ) -> Result<Vec<CategoryMatch>, ApiError> {
        self.calls.lock().unwrap().categories.push(geohash.to_string());
        self.check(geohash)?;
        Ok(self.categories.get(geohash).cloned().unwrap_or_default())
    }

    async fn search_products(
        &self,
        search: &ProductSearch,
        offset: u32,
    ) -> Result<ProductPage, ApiError> {
        self.calls
            .lock()
            .unwrap()
            .products
            .push((search.clone(), offset));
        self.check(&search.geohash)?;

        let all = self.products.get(&search.geohash).cloned().unwrap_or_default();
        let start = (offset as usize).min(all.len());
        let end = (start + PAGE_SIZE as usize).min(all.len());
        let total = self
            .totals
            .get(&search.geohash)
            .copied()
            .unwrap_or(all.len() as u64);
        Ok(ProductPage {
            total,
            produtos: all[start..end].to_vec(),
        })
    }
}

#[derive(Default)]
struct SheetsState {
    created: Vec<String>,
    tabs: HashMap<String, Vec<SheetProperties>>,
    batches: Vec<(String, Vec<Request>)>,
    next_sheet_id: i64,
    list_calls: usize,
}

/// In-memory spreadsheet service that records every batch.
#[derive(Default)]
pub struct FakeSheetsApi {
    state: Mutex<SheetsState>,
    fail_appends: bool,
    fail_add_sheets: bool,
    ignore_add_sheets: bool,
}

impl FakeSheetsApi {
    /// Pre-existing tabs of a spreadsheet.
    pub fn with_tabs(self, spreadsheet_id: &str, titles: &[&str]) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            for title in titles {
                add_tab(&mut state, spreadsheet_id, title);
            }
        }
        self
    }

    pub fn failing_appends(mut self) -> Self {
        self.fail_appends = true;
        self
    }

    pub fn failing_add_sheets(mut self) -> Self {
        self.fail_add_sheets = true;
        self
    }

    /// Accept add-tab batches without creating the tabs.
    pub fn ignoring_add_sheets(mut self) -> Self {
        self.ignore_add_sheets = true;
        self
    }

    pub fn created_titles(&self) -> Vec<String> {
        self.state.lock().unwrap().created.clone()
    }

    pub fn list_calls(&self) -> usize {
        self.state.lock().unwrap().list_calls
    }

    pub fn sheet_id(&self, spreadsheet_id: &str, title: &str) -> Option<i64> {
        self.state
            .lock()
            .unwrap()
            .tabs
            .get(spreadsheet_id)?
            .iter()
            .find(|t| t.title == title)
            .map(|t| t.sheet_id)
    }

    /// Batches made only of add-tab requests.
    pub fn add_sheet_batches(&self) -> Vec<Vec<Request>> {
        self.batches_where(|r| r.is_add_sheet())
    }

    /// Batches made only of append requests.
    pub fn append_batches(&self) -> Vec<Vec<Request>> {
        self.batches_where(|r| !r.is_add_sheet())
    }

    fn batches_where(&self, pred: impl Fn(&Request) -> bool) -> Vec<Vec<Request>> {
        self.state
            .lock()
            .unwrap()
            .batches
            .iter()
            .filter(|(_, b)| !b.is_empty() && b.iter().all(&pred))
            .map(|(_, b)| b.clone())
            .collect()
    }
}

fn add_tab(state: &mut SheetsState, spreadsheet_id: &str, title: &str) {
    state.next_sheet_id += 1;
    let sheet_id = state.next_sheet_id * 100;
    let tabs = state.tabs.entry(spreadsheet_id.to_string()).or_default();
    tabs.push(SheetProperties {
        sheet_id,
        title: title.to_string(),
        index: tabs.len() as u32,
    });
}

fn fake_error() -> SheetsError {
    SheetsError::Api {
        status: 500,
        message: "Internal error encountered.".to_string(),
    }
}

#[async_trait]
impl SheetsApi for FakeSheetsApi {
    async fn create_spreadsheet(&self, title: &str) -> Result<String, SheetsError> {
        let mut state = self.state.lock().unwrap();
        state.created.push(title.to_string());
        let id = format!("fake-{}", state.created.len());
        add_tab(&mut state, &id, "Sheet1");
        Ok(id)
    }

    async fn list_sheets(&self, spreadsheet_id: &str) -> Result<Vec<SheetProperties>, SheetsError> {
        let mut state = self.state.lock().unwrap();
        state.list_calls += 1;
        Ok(state.tabs.get(spreadsheet_id).cloned().unwrap_or_default())
    }

    async fn batch_update(
        &self,
        spreadsheet_id: &str,
        requests: Vec<Request>,
    ) -> Result<(), SheetsError> {
        let mut state = self.state.lock().unwrap();
        state
            .batches
            .push((spreadsheet_id.to_string(), requests.clone()));

        let adds = requests.iter().any(|r| r.is_add_sheet());
        if (adds && self.fail_add_sheets) || (!adds && self.fail_appends) {
            return Err(fake_error());
        }

        if adds && self.ignore_add_sheets {
            return Ok(());
        }

        for request in &requests {
            if let Request::AddSheet { properties } = request {
                add_tab(&mut state, spreadsheet_id, &properties.title);
            }
        }
        Ok(())
    }
}
