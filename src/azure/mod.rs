//! Azure API interaction module
//!
//! This module provides the core functionality for talking to the Azure
//! management APIs: authentication, the retrying HTTP client, and query scopes.
//!
//! # Module Structure
//!
//! - [`auth`] - Token acquisition through a chain of identity providers
//! - [`client`] - Main Azure client for making API requests
//! - [`error`] - Error taxonomy shared by the whole pipeline
//! - [`http`] - HTTP utilities with `Retry-After` aware retries
//! - [`scope`] - Subscription / resource group query scopes
//!
//! # Example
//!
//! ```ignore
//! use azure_carbon::azure::client::AzureClient;
//! use azure_carbon::azure::http::RetryPolicy;
//!
//! async fn example() -> azure_carbon::azure::error::Result<()> {
//!     let client = AzureClient::new("https://management.azure.com/", RetryPolicy::default())?;
//!     let token = client.get_token().await?;
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod client;
pub mod error;
pub mod http;
pub mod scope;
