//! Carbon emission retrieval
//!
//! # Architecture
//!
//! - [`filter`] - Classifies `--filter` expressions into dimension / tag filters
//! - [`request`] - Typed emission report query and response bodies
//! - [`resources`] - Resource metadata listing used for enrichment
//! - [`aggregate`] - Joins rows with metadata and folds them per resource
//! - [`retriever`] - Runs a whole query end to end
//!
//! # Example
//!
//! ```ignore
//! use azure_carbon::carbon::{CarbonQuery, CarbonRetriever, Timeframe};
//!
//! async fn last_month(retriever: &CarbonRetriever, scope: Scope) -> Result<()> {
//!     let query = CarbonQuery {
//!         scope,
//!         timeframe: Timeframe::month(2024, 3).unwrap(),
//!         filters: vec!["ResourceType=microsoft.web/sites".into()],
//!         page_size: DEFAULT_PAGE_SIZE,
//!     };
//!     let items = retriever.retrieve_carbon_for_resources(&query).await?;
//!     Ok(())
//! }
//! ```

pub mod aggregate;
pub mod filter;
pub mod request;
pub mod resources;
pub mod retriever;

pub use aggregate::{aggregate, CarbonResourceItem};
pub use filter::{classify, FilterTree};
pub use request::{EmissionsRequest, Timeframe, DEFAULT_PAGE_SIZE};
pub use retriever::{CarbonQuery, CarbonRetriever};
