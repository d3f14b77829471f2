//! reqwest implementation of [`SheetsApi`] against the Sheets v4 REST API.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::credentials::TokenSource;
use super::{Request, SheetProperties, SheetsApi, SheetsError};

pub const DEFAULT_SHEETS_API_URL: &str = "https://sheets.googleapis.com/v4";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatedSpreadsheet {
    spreadsheet_id: String,
}

#[derive(Debug, Default, Deserialize)]
struct SpreadsheetSheets {
    #[serde(default)]
    sheets: Vec<SheetEntry>,
}

#[derive(Debug, Deserialize)]
struct SheetEntry {
    properties: SheetProperties,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    message: String,
}

/// Authenticated Sheets API client.
pub struct GoogleSheetsClient {
    client: reqwest::Client,
    base_url: String,
    tokens: TokenSource,
}

impl GoogleSheetsClient {
    pub fn new(base_url: &str, tokens: TokenSource, timeout: Duration) -> Result<Self, SheetsError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .gzip(true)
            .build()
            .map_err(|source| SheetsError::Http {
                url: base_url.to_string(),
                source,
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            tokens,
        })
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        url: &str,
    ) -> Result<T, SheetsError> {
        let token = self.tokens.access_token().await?;
        let response = request
            .bearer_auth(token)
            .send()
            .await
            .map_err(|source| SheetsError::Http {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|source| SheetsError::Http {
            url: url.to_string(),
            source,
        })?;
        debug!(url, status = status.as_u16(), "Sheets API call");

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorBody>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(SheetsError::Api {
                status: status.as_u16(),
                message,
            });
        }

        serde_json::from_str(&body).map_err(SheetsError::Decode)
    }
}

#[async_trait]
impl SheetsApi for GoogleSheetsClient {
    async fn create_spreadsheet(&self, title: &str) -> Result<String, SheetsError> {
        let url = format!("{}/spreadsheets", self.base_url);
        let request = self
            .client
            .post(&url)
            .query(&[("fields", "spreadsheetId")])
            .json(&json!({ "properties": { "title": title } }));

        let created: CreatedSpreadsheet = self.send(request, &url).await?;
        Ok(created.spreadsheet_id)
    }

    async fn list_sheets(&self, spreadsheet_id: &str) -> Result<Vec<SheetProperties>, SheetsError> {
        let url = format!("{}/spreadsheets/{}", self.base_url, spreadsheet_id);
        let request = self
            .client
            .get(&url)
            .query(&[("fields", "sheets.properties")]);

        let spreadsheet: SpreadsheetSheets = self.send(request, &url).await?;
        Ok(spreadsheet
            .sheets
            .into_iter()
            .map(|entry| entry.properties)
            .collect())
    }

    async fn batch_update(
        &self,
        spreadsheet_id: &str,
        requests: Vec<Request>,
    ) -> Result<(), SheetsError> {
        let url = format!("{}/spreadsheets/{}:batchUpdate", self.base_url, spreadsheet_id);
        let body = json!({
            "requests": requests,
            "includeSpreadsheetInResponse": false,
            "responseIncludeGridData": false,
        });

        let _: serde_json::Value = self.send(self.client.post(&url).json(&body), &url).await?;
        Ok(())
    }
}
