//! HTTP client for the canteen REST API.

use std::time::Duration;

use reqwest::{header, Client};
use serde_json::Value;
use tracing::debug;

use super::ApiError;
use crate::models::{InfoParams, MenuParams};

/// HTTP request timeout in seconds.
/// 30s allows for slow API responses while failing fast enough for good UX.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// API client for the canteen service.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn menu_url(&self, params: &MenuParams) -> String {
        format!(
            "{}/outlets/{}/menu?lang={}",
            self.base_url, params.outlet_id, params.language
        )
    }

    pub fn info_url(&self, params: &InfoParams) -> String {
        format!("{}/info?lang={}", self.base_url, params.language)
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    /// GET a URL and return the body as untyped JSON.
    ///
    /// Records are decoded later, one at a time, so a single malformed record
    /// does not fail the whole response.
    pub async fn get_json(&self, url: &str) -> Result<Value, ApiError> {
        debug!(url, "GET");
        let response = self
            .client
            .get(url)
            .header(header::ACCEPT, "application/json")
            .send()
            .await?;

        let response = Self::check_response(response).await?;
        let text = response.text().await?;

        serde_json::from_str(&text).map_err(|e| {
            ApiError::InvalidResponse(format!("Failed to parse JSON response from {}: {}", url, e))
        })
    }

    pub async fn fetch_menu(&self, params: &MenuParams) -> Result<Value, ApiError> {
        self.get_json(&self.menu_url(params)).await
    }

    pub async fn fetch_info(&self, params: &InfoParams) -> Result<Value, ApiError> {
        self.get_json(&self.info_url(params)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Language;

    #[test]
    fn test_urls() {
        let client = ApiClient::new("https://menu.example.org/api/").unwrap();
        assert_eq!(client.base_url(), "https://menu.example.org/api");
        assert_eq!(
            client.menu_url(&MenuParams::new(5, Language::En)),
            "https://menu.example.org/api/outlets/5/menu?lang=en"
        );
        assert_eq!(
            client.info_url(&InfoParams { language: Language::Cs }),
            "https://menu.example.org/api/info?lang=cs"
        );
    }

    #[tokio::test]
    async fn test_unreachable_host_is_transport_error() {
        // Port 9 (discard) on localhost is closed in test environments
        let client = ApiClient::new("http://127.0.0.1:9").unwrap();
        let err = client
            .fetch_menu(&MenuParams::new(1, Language::Cs))
            .await
            .expect_err("nothing listens on port 9");
        assert!(err.is_unreachable());
    }
}
