//! Query scope
//!
//! The management-API path prefix a carbon query is bound to.

use std::fmt;
use uuid::Uuid;

/// Subscription or resource group a query targets
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    Subscription {
        subscription_id: Uuid,
    },
    ResourceGroup {
        subscription_id: Uuid,
        resource_group: String,
    },
}

impl Scope {
    pub fn subscription(subscription_id: Uuid) -> Self {
        Scope::Subscription { subscription_id }
    }

    pub fn resource_group(subscription_id: Uuid, resource_group: &str) -> Self {
        Scope::ResourceGroup {
            subscription_id,
            resource_group: resource_group.to_string(),
        }
    }

    pub fn subscription_id(&self) -> Uuid {
        match self {
            Scope::Subscription { subscription_id }
            | Scope::ResourceGroup {
                subscription_id, ..
            } => *subscription_id,
        }
    }

    pub fn resource_group_name(&self) -> Option<&str> {
        match self {
            Scope::Subscription { .. } => None,
            Scope::ResourceGroup { resource_group, .. } => Some(resource_group),
        }
    }

    /// ARM path prefix, e.g. `/subscriptions/{id}/resourceGroups/{rg}`
    pub fn path(&self) -> String {
        match self {
            Scope::Subscription { subscription_id } => {
                format!("/subscriptions/{}", subscription_id)
            }
            Scope::ResourceGroup {
                subscription_id,
                resource_group,
            } => format!(
                "/subscriptions/{}/resourceGroups/{}",
                subscription_id, resource_group
            ),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}
