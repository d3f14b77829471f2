//! Product price records returned by the price service.
//!
//! Products are transient: they exist only for one population pass and are
//! never written to the database.

use serde::Serialize;

/// Header row written at the top of every locality sheet.
pub const PRODUCT_COLUMNS: [&str; 13] = [
    "Id",
    "Data de emissao",
    "Descricao",
    "Distancia em km",
    "Id do estabelecimento",
    "Nome do estabelecimento",
    "Endereco",
    "Codigo de barras",
    "NCM",
    "Numero do documento",
    "Tempo",
    "Preco",
    "Valor de desconto",
];

/// One sale record of a product at a store.
#[derive(Debug, Clone, Serialize)]
pub struct Product {
    pub external_id: String,
    pub emission_date: String,
    pub description: String,
    pub distance_km: f64,
    pub store_id: String,
    pub store_name: String,
    pub store_address: String,
    pub barcode: String,
    pub tax_code: String,
    pub document_number: String,
    pub time_of_sale: String,
    pub price: f64,
    pub discount_value: f64,
}

impl Product {
    /// Cell values in [`PRODUCT_COLUMNS`] order.
    pub fn to_row(&self) -> Vec<String> {
        vec![
            self.external_id.clone(),
            self.emission_date.clone(),
            self.description.clone(),
            self.distance_km.to_string(),
            self.store_id.clone(),
            self.store_name.clone(),
            self.store_address.clone(),
            self.barcode.clone(),
            self.tax_code.clone(),
            self.document_number.clone(),
            self.time_of_sale.clone(),
            self.price.to_string(),
            self.discount_value.to_string(),
        ]
    }
}
