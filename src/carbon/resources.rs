//! Azure Resources
//!
//! Lists the resources of a subscription so emission rows can be enriched
//! with location and tags.

use crate::azure::client::AzureClient;
use crate::azure::error::{CarbonError, Result};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

/// Resource as returned by the Resource Manager listing API
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "type")]
    pub resource_type: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub tags: Option<HashMap<String, String>>,
    #[serde(default)]
    pub sku: Option<Sku>,
    #[serde(default)]
    pub identity: Option<Identity>,
    #[serde(default)]
    pub managed_by: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Sku {
    pub name: Option<String>,
    pub tier: Option<String>,
    pub size: Option<String>,
    pub family: Option<String>,
    pub capacity: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub principal_id: Option<String>,
    pub tenant_id: Option<String>,
    #[serde(rename = "type")]
    pub identity_type: Option<String>,
}

/// One page of the resource listing
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceListPage {
    #[serde(default)]
    pub value: Vec<Resource>,
    #[serde(default)]
    pub next_link: Option<String>,
}

/// Location and tags used to enrich emission rows
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResourceMetadata {
    pub id: String,
    pub location: String,
    pub tags: HashMap<String, String>,
}

impl From<Resource> for ResourceMetadata {
    fn from(resource: Resource) -> Self {
        Self {
            id: resource.id,
            location: resource.location.unwrap_or_default(),
            tags: resource.tags.unwrap_or_default(),
        }
    }
}

/// Metadata keyed by lowercased resource id
pub type MetadataIndex = HashMap<String, ResourceMetadata>;

/// Lookup key for a resource id; ids differ in casing between APIs
pub fn metadata_key(resource_id: &str) -> String {
    resource_id.to_lowercase()
}

/// Index resources by lowercased id
pub fn index_resources(resources: impl IntoIterator<Item = Resource>) -> MetadataIndex {
    resources
        .into_iter()
        .map(|r| (metadata_key(&r.id), ResourceMetadata::from(r)))
        .collect()
}

/// Fetch every resource of a subscription, following `nextLink`
pub async fn list_resources(client: &AzureClient, subscription_id: &Uuid) -> Result<Vec<Resource>> {
    let mut all_resources = Vec::new();
    let mut url = client.resources_url(subscription_id)?;
    let mut seen_links = HashSet::new();

    loop {
        let page: ResourceListPage = client.get(&url).await?;
        all_resources.extend(page.value);

        let Some(next) = page.next_link.filter(|link| !link.is_empty()) else {
            break;
        };

        // A repeated link would page forever
        if !seen_links.insert(next.clone()) {
            return Err(CarbonError::Api(
                "resource listing returned the same nextLink twice".to_string(),
            ));
        }
        url = next;
    }

    Ok(all_resources)
}

/// Fetch all resource metadata of a subscription
pub async fn fetch_all(client: &AzureClient, subscription_id: &Uuid) -> Result<MetadataIndex> {
    let resources = list_resources(client, subscription_id).await?;
    tracing::debug!(
        "Loaded metadata for {} resources in subscription {}",
        resources.len(),
        subscription_id
    );
    Ok(index_resources(resources))
}
