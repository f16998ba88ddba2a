//! Azure Authentication
//!
//! Bearer tokens come from `azure_identity`: the Azure CLI login first, then
//! `DefaultAzureCredential` (service principal and workload identity from the
//! environment, managed identity, developer tools).

use super::error::{CarbonError, Result};
use async_trait::async_trait;
use azure_core::auth::TokenCredential;
use azure_identity::{AzureCliCredential, DefaultAzureCredential, TokenCredentialOptions};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;
use tokio::process::Command;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Default Azure Resource Manager endpoint
pub const DEFAULT_BASE_ADDRESS: &str = "https://management.azure.com/";

/// Token scope for an API base address, e.g. `https://management.azure.com/.default`
pub fn scope_for(base_address: &str) -> String {
    format!("{}/.default", base_address.trim_end_matches('/'))
}

fn az_program() -> &'static str {
    if cfg!(windows) {
        "az.cmd"
    } else {
        "az"
    }
}

/// Bearer token as returned by an identity provider
#[derive(Clone)]
pub struct AccessToken {
    pub token: String,
    pub expires_on: Option<DateTime<Utc>>,
}

impl AccessToken {
    pub fn new(token: impl Into<String>, expires_on: Option<DateTime<Utc>>) -> Self {
        Self {
            token: token.into(),
            expires_on,
        }
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("token", &"<redacted>")
            .field("expires_on", &self.expires_on)
            .finish()
    }
}

impl From<azure_core::auth::AccessToken> for AccessToken {
    fn from(token: azure_core::auth::AccessToken) -> Self {
        Self::new(
            token.token.secret(),
            DateTime::from_timestamp(token.expires_on.unix_timestamp(), 0),
        )
    }
}

/// A single identity strategy
#[async_trait]
pub trait TokenSource: Send + Sync {
    /// Short name used in logs and chained error messages
    fn name(&self) -> &'static str;

    async fn token(&self, scope: &str) -> Result<AccessToken>;
}

// =========================================================================
// azure_identity credentials
// =========================================================================

/// Adapts an `azure_identity` credential to [`TokenSource`]
pub struct IdentityCredential {
    name: &'static str,
    credential: Arc<dyn TokenCredential>,
}

impl IdentityCredential {
    pub fn new(name: &'static str, credential: Arc<dyn TokenCredential>) -> Self {
        Self { name, credential }
    }

    /// The account logged in with `az login`
    pub fn azure_cli() -> Self {
        Self::new("AzureCliCredential", Arc::new(AzureCliCredential::new()))
    }

    /// Environment, workload identity, managed identity and developer tools
    pub fn default_azure() -> Result<Self> {
        let credential = DefaultAzureCredential::create(TokenCredentialOptions::default())
            .map_err(|e| CarbonError::Auth(format!("DefaultAzureCredential: {}", e)))?;
        Ok(Self::new("DefaultAzureCredential", Arc::new(credential)))
    }
}

#[async_trait]
impl TokenSource for IdentityCredential {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn token(&self, scope: &str) -> Result<AccessToken> {
        self.credential
            .get_token(&[scope])
            .await
            .map(AccessToken::from)
            .map_err(|e| CarbonError::Auth(e.to_string()))
    }
}

// =========================================================================
// Chain
// =========================================================================

/// Tries each source in order and returns the first token produced
pub struct ChainedCredential {
    sources: Vec<Arc<dyn TokenSource>>,
}

impl ChainedCredential {
    pub fn new(sources: Vec<Arc<dyn TokenSource>>) -> Self {
        Self { sources }
    }

    /// Azure CLI first, then the default credential chain
    pub fn default_chain() -> Result<Self> {
        Ok(Self::new(vec![
            Arc::new(IdentityCredential::azure_cli()),
            Arc::new(IdentityCredential::default_azure()?),
        ]))
    }

    pub fn source_names(&self) -> Vec<&'static str> {
        self.sources.iter().map(|s| s.name()).collect()
    }
}

#[async_trait]
impl TokenSource for ChainedCredential {
    fn name(&self) -> &'static str {
        "ChainedCredential"
    }

    async fn token(&self, scope: &str) -> Result<AccessToken> {
        let mut failures = Vec::with_capacity(self.sources.len());

        for source in &self.sources {
            match source.token(scope).await {
                Ok(token) => {
                    tracing::debug!("Token acquired via {}", source.name());
                    return Ok(token);
                }
                Err(e) => {
                    tracing::debug!("{} failed: {}", source.name(), e);
                    let reason = match e {
                        CarbonError::Auth(msg) => msg,
                        other => other.to_string(),
                    };
                    failures.push(format!("{}: {}", source.name(), reason));
                }
            }
        }

        if failures.is_empty() {
            return Err(CarbonError::Auth(
                "no credential sources configured".to_string(),
            ));
        }

        Err(CarbonError::Auth(format!(
            "no credential in the chain produced a token ({}). Run 'az login'",
            failures.join("; ")
        )))
    }
}

// =========================================================================
// Process-lifetime token cache
// =========================================================================

/// Credentials holder with a write-once token cache
///
/// The first successful token is reused for every later call, even once its
/// `expires_on` has passed. Nothing refreshes it.
#[derive(Clone)]
pub struct AzureCredentials {
    provider: Arc<dyn TokenSource>,
    scope: String,
    token_cache: Arc<RwLock<Option<CachedToken>>>,
}

#[derive(Clone)]
struct CachedToken {
    token: String,
    expires_on: Option<DateTime<Utc>>,
}

impl CachedToken {
    fn is_stale(&self) -> bool {
        self.expires_on.is_some_and(|at| at <= Utc::now())
    }
}

impl AzureCredentials {
    /// Credentials backed by the default chain, scoped to `base_address`
    pub fn new(base_address: &str) -> Result<Self> {
        let chain = ChainedCredential::default_chain()?;
        tracing::debug!("Credential chain: {}", chain.source_names().join(" -> "));
        Ok(Self::with_provider(Arc::new(chain), base_address))
    }

    pub fn with_provider(provider: Arc<dyn TokenSource>, base_address: &str) -> Self {
        Self {
            provider,
            scope: scope_for(base_address),
            token_cache: Arc::new(RwLock::new(None)),
        }
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// Get an access token for API calls
    pub async fn get_token(&self) -> Result<String> {
        {
            let cache = self.token_cache.read().await;
            if let Some(cached) = cache.as_ref() {
                if cached.is_stale() {
                    tracing::debug!("Cached token is past its expiry, reusing it anyway");
                }
                return Ok(cached.token.clone());
            }
        }

        let mut cache = self.token_cache.write().await;

        // Another task may have resolved while we waited for the write lock
        if let Some(cached) = cache.as_ref() {
            return Ok(cached.token.clone());
        }

        let token = self.provider.token(&self.scope).await?;

        match token.expires_on {
            Some(at) => tracing::debug!("Token retrieved and expires at: {}", at),
            None => tracing::debug!("Token retrieved without expiry information"),
        }

        *cache = Some(CachedToken {
            token: token.token.clone(),
            expires_on: token.expires_on,
        });

        Ok(token.token)
    }
}

// =========================================================================
// Default subscription
// =========================================================================

fn parse_subscription_id(value: &str) -> Option<Uuid> {
    Uuid::parse_str(value.trim()).ok()
}

#[derive(Deserialize)]
struct AccountShow {
    id: String,
}

fn parse_account_show(stdout: &[u8]) -> Option<Uuid> {
    serde_json::from_slice::<AccountShow>(stdout)
        .ok()
        .and_then(|account| parse_subscription_id(&account.id))
}

/// Subscription to use when none is configured
///
/// Checks `AZURE_SUBSCRIPTION_ID`, then the active `az` account.
pub async fn get_default_subscription() -> Option<Uuid> {
    if let Ok(value) = std::env::var("AZURE_SUBSCRIPTION_ID") {
        if let Some(id) = parse_subscription_id(&value) {
            return Some(id);
        }
        tracing::warn!("Invalid subscription ID format in AZURE_SUBSCRIPTION_ID");
    }

    let output = match Command::new(az_program())
        .args(["account", "show", "--output", "json"])
        .output()
        .await
    {
        Ok(output) => output,
        Err(e) => {
            tracing::debug!("Could not run 'az account show': {}", e);
            return None;
        }
    };

    if !output.status.success() {
        tracing::warn!(
            "'az account show' failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        );
        return None;
    }

    parse_account_show(&output.stdout)
}
