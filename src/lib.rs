//! menor-preco: search product prices published by Nota Paraná and export
//! them to Google Sheets, one tab per locality.
//!
//! The pipeline is split into the price service client ([`scrapers`]), local
//! persistence ([`repository`]) and the spreadsheet exporter ([`sheets`]).
//! Remote services sit behind the [`scrapers::PriceApi`] and
//! [`sheets::SheetsApi`] traits so every step can run against in-memory
//! doubles.

pub mod cli;
pub mod config;
pub mod models;
pub mod repository;
pub mod schema;
pub mod scrapers;
pub mod sheets;

#[cfg(test)]
pub(crate) mod testing;
