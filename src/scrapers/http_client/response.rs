//! HTTP response wrapper.

use reqwest::{Response, StatusCode};

/// HTTP response wrapper.
pub struct HttpResponse {
    pub status: StatusCode,
    pub url: String,
    pub(crate) response: Response,
}

impl HttpResponse {
    /// Check if the response is successful.
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Get the Content-Type header.
    pub fn content_type(&self) -> Option<&str> {
        self.response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
    }

    /// Get response body as text.
    pub async fn text(self) -> Result<String, reqwest::Error> {
        self.response.text().await
    }
}
