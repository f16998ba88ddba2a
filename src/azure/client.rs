//! Azure Client
//!
//! Main client for the Azure management APIs, combining authentication
//! and HTTP functionality.

use super::auth::AzureCredentials;
use super::error::{CarbonError, Result};
use super::http::{AzureHttpClient, RetryPolicy};
use serde::de::DeserializeOwned;
use serde::Serialize;
use url::Url;
use uuid::Uuid;

/// Resource Manager resource listing API version
pub const RESOURCES_API_VERSION: &str = "2021-04-01";

/// Carbon Optimization API version
pub const CARBON_API_VERSION: &str = "2023-04-01-preview";

/// Main Azure client
#[derive(Clone)]
pub struct AzureClient {
    pub credentials: AzureCredentials,
    pub http: AzureHttpClient,
    base_address: Url,
}

/// Parse a base address so that relative joins append to its path
fn parse_base_address(base_address: &str) -> Result<Url> {
    let mut url = Url::parse(base_address)
        .map_err(|e| CarbonError::Config(format!("invalid API address '{}': {}", base_address, e)))?;

    if url.cannot_be_a_base() {
        return Err(CarbonError::Config(format!(
            "invalid API address '{}'",
            base_address
        )));
    }

    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }

    Ok(url)
}

fn parse_json<R: DeserializeOwned>(body: &str) -> Result<R> {
    serde_json::from_str(body)
        .map_err(|e| CarbonError::Api(format!("Failed to parse response JSON: {}", e)))
}

impl AzureClient {
    /// Create a new client using the default credential chain
    pub fn new(base_address: &str, retry: RetryPolicy) -> Result<Self> {
        let credentials = AzureCredentials::new(base_address)?;
        Self::with_credentials(base_address, credentials, retry)
    }

    pub fn with_credentials(
        base_address: &str,
        credentials: AzureCredentials,
        retry: RetryPolicy,
    ) -> Result<Self> {
        Ok(Self {
            credentials,
            http: AzureHttpClient::new(retry)?,
            base_address: parse_base_address(base_address)?,
        })
    }

    /// Get the current access token
    pub async fn get_token(&self) -> Result<String> {
        self.credentials.get_token().await
    }

    /// GET `url` and deserialize the response
    pub async fn get<R: DeserializeOwned>(&self, url: &str) -> Result<R> {
        let token = self.get_token().await?;
        let body = self.http.get(url, &token).await?;
        parse_json(&body)
    }

    /// POST `body` as JSON to `url` and deserialize the response
    pub async fn post<B, R>(&self, url: &str, body: &B) -> Result<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let token = self.get_token().await?;
        let response = self.http.post(url, &token, body).await?;
        parse_json(&response)
    }

    // =========================================================================
    // Management API helpers
    // =========================================================================

    /// Build a management API URL from a path relative to the base address
    pub fn management_url(&self, path: &str) -> Result<String> {
        self.base_address
            .join(path.trim_start_matches('/'))
            .map(String::from)
            .map_err(|e| CarbonError::Config(format!("invalid request path '{}': {}", path, e)))
    }

    /// Build the resource listing URL for a subscription
    pub fn resources_url(&self, subscription_id: &Uuid) -> Result<String> {
        self.management_url(&format!(
            "subscriptions/{}/resources?api-version={}",
            subscription_id, RESOURCES_API_VERSION
        ))
    }

    /// Build the carbon emission report URL
    pub fn carbon_reports_url(&self) -> Result<String> {
        self.management_url(&format!(
            "providers/Microsoft.Carbon/carbonEmissionReports?api-version={}",
            CARBON_API_VERSION
        ))
    }
}
