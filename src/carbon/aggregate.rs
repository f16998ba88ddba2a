//! Join and aggregation of emission rows
//!
//! Raw report rows are enriched with resource metadata, then rows that
//! reference the same resource are folded into one item.

use super::request::EmissionRecord;
use super::resources::{metadata_key, MetadataIndex, ResourceMetadata};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// Metadata per subscription, keyed by lowercased subscription id
pub type MetadataBySubscription = HashMap<String, MetadataIndex>;

/// Carbon emissions of one resource
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CarbonResourceItem {
    pub carbon: f64,
    pub subscription_id: String,
    pub resource_id: String,
    pub resource_type: String,
    pub resource_location: String,
    pub resource_group_name: String,
    pub publisher_type: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub service_name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub service_tier: String,
    pub tags: BTreeMap<String, String>,
}

impl CarbonResourceItem {
    /// Enrich a report row; without metadata, location and tags are empty
    pub fn from_record(record: EmissionRecord, metadata: Option<&ResourceMetadata>) -> Self {
        let (location, tags) = match metadata {
            Some(m) => (
                m.location.clone(),
                m.tags.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            ),
            None => (String::new(), BTreeMap::new()),
        };

        Self {
            carbon: record.total_carbon_emission,
            subscription_id: record.subscription_id,
            resource_id: record.resource_id,
            resource_type: record.resource_type,
            resource_location: location,
            resource_group_name: record.resource_group,
            // Not reported by the item details endpoint
            publisher_type: String::new(),
            service_name: String::new(),
            service_tier: String::new(),
            tags,
        }
    }

    /// Last segment of the resource id
    pub fn name(&self) -> &str {
        self.resource_id
            .rsplit('/')
            .next()
            .unwrap_or(&self.resource_id)
    }
}

/// Look up each row's metadata by subscription and resource id, ignoring case
pub fn join(
    records: Vec<EmissionRecord>,
    metadata: &MetadataBySubscription,
) -> Vec<CarbonResourceItem> {
    records
        .into_iter()
        .map(|record| {
            let found = metadata
                .get(&record.subscription_id.to_lowercase())
                .and_then(|index| index.get(&metadata_key(&record.resource_id)));
            CarbonResourceItem::from_record(record, found)
        })
        .collect()
}

struct Group {
    first: CarbonResourceItem,
    carbon: f64,
    locations: Vec<String>,
}

impl Group {
    fn new(item: CarbonResourceItem) -> Self {
        Self {
            carbon: item.carbon,
            locations: vec![item.resource_location.clone()],
            first: item,
        }
    }

    fn absorb(&mut self, item: CarbonResourceItem) {
        self.carbon += item.carbon;
        self.locations.push(item.resource_location);
    }

    fn finish(self) -> CarbonResourceItem {
        CarbonResourceItem {
            carbon: self.carbon,
            resource_location: self.locations.join(", "),
            ..self.first
        }
    }
}

/// Fold items with the same resource id into one
///
/// Carbon is summed and every member's location is listed; all other fields,
/// tags included, come from the first member. Groups keep first-encounter order.
pub fn group_by_resource(items: Vec<CarbonResourceItem>) -> Vec<CarbonResourceItem> {
    let mut groups: Vec<Group> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();

    for item in items {
        match positions.get(&item.resource_id) {
            Some(&pos) => groups[pos].absorb(item),
            None => {
                positions.insert(item.resource_id.clone(), groups.len());
                groups.push(Group::new(item));
            }
        }
    }

    groups.into_iter().map(Group::finish).collect()
}

/// Join rows with metadata and reduce to one item per resource
pub fn aggregate(
    records: Vec<EmissionRecord>,
    metadata: &MetadataBySubscription,
) -> Vec<CarbonResourceItem> {
    group_by_resource(join(records, metadata))
}
