//! Carbon retrieval
//!
//! Drives a full query: metadata for every subscription in scope, all pages
//! of the emission report, then join and aggregation.

use super::aggregate::{aggregate, CarbonResourceItem, MetadataBySubscription};
use super::filter::classify;
use super::request::{EmissionRecord, EmissionsPage, EmissionsRequest, Timeframe};
use super::resources;
use crate::azure::client::AzureClient;
use crate::azure::error::{CarbonError, Result};
use crate::azure::scope::Scope;
use futures::future::try_join_all;
use std::collections::HashSet;
use uuid::Uuid;

/// Everything the caller decides about a query
#[derive(Debug, Clone)]
pub struct CarbonQuery {
    pub scope: Scope,
    pub timeframe: Timeframe,
    /// Raw `name=v1;v2` expressions
    pub filters: Vec<String>,
    pub page_size: u32,
}

/// Retrieves aggregated per-resource carbon emissions
#[derive(Clone)]
pub struct CarbonRetriever {
    client: AzureClient,
}

impl CarbonRetriever {
    pub fn new(client: AzureClient) -> Self {
        Self { client }
    }

    /// Load resource metadata for each subscription concurrently
    pub async fn fetch_metadata(&self, subscription_ids: &[Uuid]) -> Result<MetadataBySubscription> {
        let fetches = subscription_ids.iter().map(|id| async move {
            let index = resources::fetch_all(&self.client, id).await?;
            Ok::<_, CarbonError>((id.to_string().to_lowercase(), index))
        });

        let indexes = try_join_all(fetches).await?;
        Ok(indexes.into_iter().collect())
    }

    /// Fetch every page of the emission report
    pub async fn fetch_emissions(&self, request: EmissionsRequest) -> Result<Vec<EmissionRecord>> {
        let url = self.client.carbon_reports_url()?;
        let mut request = request;
        let mut records = Vec::new();
        let mut seen_tokens = HashSet::new();
        let mut pages = 0usize;

        loop {
            let page: EmissionsPage = self.client.post(&url, &request).await?;
            pages += 1;

            let next = page.continuation().map(str::to_string);
            records.extend(page.value);

            let Some(token) = next else {
                break;
            };

            // A repeated token would page forever
            if !seen_tokens.insert(token.clone()) {
                return Err(CarbonError::Api(
                    "emissions endpoint returned a continuation token twice".to_string(),
                ));
            }

            tracing::debug!("Fetching emissions page {}", pages + 1);
            request = request.with_skip_token(Some(token));
        }

        tracing::debug!("Fetched {} emission rows in {} pages", records.len(), pages);
        Ok(records)
    }

    /// Carbon emissions per resource for the query scope and timeframe
    pub async fn retrieve_carbon_for_resources(
        &self,
        query: &CarbonQuery,
    ) -> Result<Vec<CarbonResourceItem>> {
        // Parse filters before any network traffic
        let filter = classify(&query.filters)?;

        let subscription_id = query.scope.subscription_id();
        tracing::info!(
            "Retrieving carbon emissions for {} ({:?})",
            query.scope,
            query.timeframe
        );

        let metadata = self.fetch_metadata(&[subscription_id]).await?;

        let request = EmissionsRequest::build(
            &query.scope,
            &[subscription_id.to_string()],
            &query.timeframe,
            query.page_size,
            filter,
        );
        let records = self.fetch_emissions(request).await?;

        let items = aggregate(records, &metadata);
        tracing::info!("Aggregated into {} resources", items.len());
        Ok(items)
    }
}
