//! End-to-end export: query saved locally, spreadsheet created remotely,
//! one population pass against in-memory services.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::json;

use menor_preco::models::{Category, Locality, Query};
use menor_preco::repository::{DbContext, Repository};
use menor_preco::scrapers::{
    ApiError, CategoryMatch, PriceApi, ProductPage, ProductSearch, RawProduct, RegionMatch,
    PAGE_SIZE,
};
use menor_preco::sheets::{
    Request, SheetProperties, SheetsApi, SheetsError, SpreadsheetReconciler, SpreadsheetWriter,
};

/// Serves `count` products per geohash.
struct StubPrices {
    counts: HashMap<String, usize>,
    searches: Mutex<Vec<(ProductSearch, u32)>>,
}

impl StubPrices {
    fn new(counts: &[(&str, usize)]) -> Self {
        Self {
            counts: counts.iter().map(|(g, n)| (g.to_string(), *n)).collect(),
            searches: Mutex::new(Vec::new()),
        }
    }
}

fn raw(geohash: &str, i: usize) -> RawProduct {
    serde_json::from_value(json!({
        "id": format!("{}-{}", geohash, i),
        "datahora": "2024-05-01T10:00:00.000Z",
        "desc": "PIZZA CALABRESA",
        "distkm": 2.25,
        "gtin": "7890000000001",
        "ncm": "19022000",
        "nrdoc": 5000 + i,
        "tempo": "1 dia",
        "valor": 21.9,
        "valor_desconto": "1.50",
        "estabelecimento": {
            "codigo": 7,
            "nm_emp": "SUPERMERCADO BOM PRECO",
            "tp_logr": "AVENIDA",
            "nm_logr": "SETE DE SETEMBRO",
            "nr_logr": 100
        }
    }))
    .unwrap()
}

#[async_trait]
impl PriceApi for StubPrices {
    async fn search_region(&self, _name: &str) -> Result<Vec<RegionMatch>, ApiError> {
        Ok(Vec::new())
    }

    async fn search_categories(
        &self,
        _geohash: &str,
        _term: &str,
    ) -> Result<Vec<CategoryMatch>, ApiError> {
        Ok(Vec::new())
    }

    async fn search_products(
        &self,
        search: &ProductSearch,
        offset: u32,
    ) -> Result<ProductPage, ApiError> {
        self.searches.lock().unwrap().push((search.clone(), offset));
        let total = self.counts.get(&search.geohash).copied().unwrap_or(0);
        let start = (offset as usize).min(total);
        let end = (start + PAGE_SIZE as usize).min(total);
        Ok(ProductPage {
            total: total as u64,
            produtos: (start..end).map(|i| raw(&search.geohash, i)).collect(),
        })
    }
}

#[derive(Default)]
struct StubSheets {
    tabs: Mutex<Vec<SheetProperties>>,
    batches: Mutex<Vec<Vec<Request>>>,
    titles: Mutex<Vec<String>>,
}

#[async_trait]
impl SheetsApi for StubSheets {
    async fn create_spreadsheet(&self, title: &str) -> Result<String, SheetsError> {
        self.titles.lock().unwrap().push(title.to_string());
        self.tabs.lock().unwrap().push(SheetProperties {
            sheet_id: 0,
            title: "Sheet1".to_string(),
            index: 0,
        });
        Ok("remote-1".to_string())
    }

    async fn list_sheets(&self, _id: &str) -> Result<Vec<SheetProperties>, SheetsError> {
        Ok(self.tabs.lock().unwrap().clone())
    }

    async fn batch_update(&self, _id: &str, requests: Vec<Request>) -> Result<(), SheetsError> {
        let mut tabs = self.tabs.lock().unwrap();
        for request in &requests {
            if let Request::AddSheet { properties } = request {
                let sheet_id = 1000 + tabs.len() as i64;
                tabs.push(SheetProperties {
                    sheet_id,
                    title: properties.title.clone(),
                    index: properties.index,
                });
            }
        }
        self.batches.lock().unwrap().push(requests);
        Ok(())
    }
}

async fn saved_query(ctx: &DbContext) -> Query {
    let localities = ctx.localities();
    let a = localities.save(Locality::new("6gkzq", "Curitiba")).await.unwrap();
    let b = localities.save(Locality::new("6gkzw", "Pinhais")).await.unwrap();
    let category = ctx
        .categories()
        .save(Category::new("110", "Pizzas congeladas"))
        .await
        .unwrap();

    let mut query = Query::new("pizza calabresa", vec![a, b], 5.0);
    query.category = Some(category);
    ctx.queries().save(query).await.unwrap()
}

#[tokio::test]
async fn test_export_and_populate_new_spreadsheet() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = DbContext::new(&dir.path().join("pipeline.db"));
    ctx.init_schema().await.unwrap();

    let query = saved_query(&ctx).await;
    let sheets = StubSheets::default();
    let prices = StubPrices::new(&[("6gkzq", 3), ("6gkzw", 0)]);
    let repo = ctx.spreadsheets();

    let spreadsheet = SpreadsheetWriter::new(&sheets, &repo)
        .create_for(query)
        .await
        .unwrap();
    assert!(!spreadsheet.is_populated);
    assert!(sheets.titles.lock().unwrap()[0].starts_with("pizza calabresa - "));

    let report = SpreadsheetReconciler::new(&sheets, &prices, &repo)
        .reconcile(spreadsheet.id.unwrap())
        .await
        .unwrap();

    assert_eq!(report.tabs_created, 2);
    assert_eq!(report.sheets_written, 1);
    assert_eq!(report.sheets_skipped, 1);
    assert_eq!(report.rows_written, 3);

    let batches = sheets.batches.lock().unwrap().clone();
    assert_eq!(batches.len(), 2);
    assert_eq!(
        batches[0],
        vec![Request::add_sheet("Curitiba", 0), Request::add_sheet("Pinhais", 1)]
    );

    // Header plus three rows, all for the Curitiba tab.
    assert_eq!(batches[1].len(), 1);
    match &batches[1][0] {
        Request::AppendCells(append) => {
            assert_eq!(append.sheet_id, 1001);
            assert_eq!(append.rows.len(), 4);
            let price = &append.rows[1].values[11].user_entered_value.string_value;
            assert_eq!(price, "21.9");
        }
        other => panic!("unexpected request {:?}", other),
    }

    for (search, _) in prices.searches.lock().unwrap().iter() {
        assert_eq!(search.term, "pizza calabresa");
        assert_eq!(search.category, "110");
        assert_eq!(search.radius, 5.0);
    }

    let stored = repo.find_by_id(spreadsheet.id.unwrap()).await.unwrap();
    assert!(stored.is_populated);
    assert!(stored.last_populated.is_some());
}
