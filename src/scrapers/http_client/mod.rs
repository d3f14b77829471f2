//! HTTP client shared by the price service scrapers.

mod response;
mod user_agent;

pub use response::HttpResponse;
use user_agent::resolve_user_agent;

use std::time::{Duration, Instant};

use reqwest::Client;
use tracing::debug;

/// HTTP client with request logging and a fixed delay between requests.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    request_delay: Duration,
}

impl HttpClient {
    /// Create a new HTTP client with the default user agent.
    pub fn new(timeout: Duration, request_delay: Duration) -> Result<Self, reqwest::Error> {
        Self::with_user_agent(timeout, request_delay, None)
    }

    /// Create a new HTTP client with custom user agent configuration.
    /// - None: Use default menor-preco user agent
    /// - Some("browser"): Use a desktop browser user agent
    /// - Some(custom): Use custom user agent string
    pub fn with_user_agent(
        timeout: Duration,
        request_delay: Duration,
        user_agent_config: Option<&str>,
    ) -> Result<Self, reqwest::Error> {
        let user_agent = resolve_user_agent(user_agent_config);
        let client = Client::builder()
            .user_agent(&user_agent)
            .timeout(timeout)
            .gzip(true)
            .brotli(true)
            .build()?;

        Ok(Self {
            client,
            request_delay,
        })
    }

    /// Delay applied after every request.
    pub fn request_delay(&self) -> Duration {
        self.request_delay
    }

    /// Make a GET request with query parameters.
    ///
    /// Parameters are percent-encoded by reqwest, so values must be passed
    /// decoded.
    pub async fn get(
        &self,
        url: &str,
        params: &[(&str, String)],
    ) -> Result<HttpResponse, reqwest::Error> {
        let start = Instant::now();
        let response = self.client.get(url).query(params).send().await?;
        let duration = start.elapsed();

        let final_url = response.url().to_string();
        debug!(
            url = %final_url,
            status = response.status().as_u16(),
            duration_ms = duration.as_millis() as u64,
            "GET"
        );

        if !self.request_delay.is_zero() {
            tokio::time::sleep(self.request_delay).await;
        }

        Ok(HttpResponse {
            status: response.status(),
            url: final_url,
            response,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_builds_with_custom_user_agent() {
        let client = HttpClient::with_user_agent(
            Duration::from_secs(5),
            Duration::from_millis(250),
            Some("browser"),
        )
        .unwrap();
        assert_eq!(client.request_delay(), Duration::from_millis(250));
    }
}
