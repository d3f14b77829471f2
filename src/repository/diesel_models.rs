//! Diesel ORM models for database tables.
//!
//! Records mirror table rows; the conversion into domain models lives next
//! to each repository.

use diesel::prelude::*;

use crate::schema;

/// Category record from the database.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::categories)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct CategoryRecord {
    pub id: i32,
    pub nota_id: String,
    pub description: String,
}

/// New category for insertion.
#[derive(Insertable, Debug)]
#[diesel(table_name = schema::categories)]
pub struct NewCategory<'a> {
    pub nota_id: &'a str,
    pub description: &'a str,
}

/// Locality record from the database.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::localities)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct LocalityRecord {
    pub id: i32,
    pub geohash: String,
    pub name: String,
}

/// New locality for insertion.
#[derive(Insertable, Debug)]
#[diesel(table_name = schema::localities)]
pub struct NewLocality<'a> {
    pub geohash: &'a str,
    pub name: &'a str,
}

/// Query record from the database.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::queries)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct QueryRecord {
    pub id: i32,
    pub term: String,
    pub radius: f64,
    pub category_id: i32,
}

/// New query for insertion.
#[derive(Insertable, Debug)]
#[diesel(table_name = schema::queries)]
pub struct NewQuery<'a> {
    pub term: &'a str,
    pub radius: f64,
    pub category_id: i32,
}

/// Query/locality membership row.
#[derive(Insertable, Debug)]
#[diesel(table_name = schema::query_localities)]
pub struct NewQueryLocality {
    pub query_id: i32,
    pub local_id: i32,
    pub position: i32,
}

/// Spreadsheet record from the database.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::spreadsheets)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct SpreadsheetRecord {
    pub id: i32,
    pub google_id: String,
    pub query_id: Option<i32>,
    pub is_populated: bool,
    pub last_populated: Option<String>,
}

/// New spreadsheet for insertion.
#[derive(Insertable, Debug)]
#[diesel(table_name = schema::spreadsheets)]
pub struct NewSpreadsheet<'a> {
    pub google_id: &'a str,
    pub query_id: Option<i32>,
    pub is_populated: bool,
    pub last_populated: Option<&'a str>,
}
