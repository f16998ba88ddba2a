//! Per-resource carbon emissions for Azure subscriptions
//!
//! Retrieves emission figures from the Carbon Optimization API, enriches
//! them with resource location and tags, and folds repeated rows into one
//! item per resource.

pub mod azure;
pub mod carbon;
pub mod config;
pub mod output;
