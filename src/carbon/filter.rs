//! Filter expressions
//!
//! Turns `--filter name=v1;v2` arguments into the filter tree sent with the
//! emissions query. Names from the fixed dimension vocabulary become
//! dimension filters, anything else is treated as a tag key.

use crate::azure::error::{CarbonError, Result};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::fmt;

/// Recognized dimension names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dimension {
    PublisherType,
    ResourceGroupName,
    ResourceLocation,
    ResourceId,
    ServiceName,
    ServiceTier,
    ServiceFamily,
    InvoiceId,
    CustomerName,
    PartnerName,
    ResourceType,
    ChargeType,
    BillingPeriod,
    MeterCategory,
    MeterSubCategory,
}

impl Dimension {
    pub const ALL: [Dimension; 15] = [
        Dimension::PublisherType,
        Dimension::ResourceGroupName,
        Dimension::ResourceLocation,
        Dimension::ResourceId,
        Dimension::ServiceName,
        Dimension::ServiceTier,
        Dimension::ServiceFamily,
        Dimension::InvoiceId,
        Dimension::CustomerName,
        Dimension::PartnerName,
        Dimension::ResourceType,
        Dimension::ChargeType,
        Dimension::BillingPeriod,
        Dimension::MeterCategory,
        Dimension::MeterSubCategory,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Dimension::PublisherType => "PublisherType",
            Dimension::ResourceGroupName => "ResourceGroupName",
            Dimension::ResourceLocation => "ResourceLocation",
            Dimension::ResourceId => "ResourceId",
            Dimension::ServiceName => "ServiceName",
            Dimension::ServiceTier => "ServiceTier",
            Dimension::ServiceFamily => "ServiceFamily",
            Dimension::InvoiceId => "InvoiceId",
            Dimension::CustomerName => "CustomerName",
            Dimension::PartnerName => "PartnerName",
            Dimension::ResourceType => "ResourceType",
            Dimension::ChargeType => "ChargeType",
            Dimension::BillingPeriod => "BillingPeriod",
            Dimension::MeterCategory => "MeterCategory",
            Dimension::MeterSubCategory => "MeterSubCategory",
        }
    }

    /// Exact, case-sensitive lookup
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|d| d.as_str() == name)
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a predicate targets a dimension or a resource tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredicateKind {
    Dimension,
    Tag,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FilterOperator {
    In,
}

/// One `name In (values...)` condition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterPredicate {
    pub name: String,
    pub operator: FilterOperator,
    pub values: Vec<String>,
    pub kind: PredicateKind,
}

#[derive(Serialize)]
struct PredicateBody<'a> {
    name: &'a str,
    operator: FilterOperator,
    values: &'a [String],
}

/// Serializes as `{"dimensions": {...}}` or `{"tags": {...}}`
impl Serialize for FilterPredicate {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let key = match self.kind {
            PredicateKind::Dimension => "dimensions",
            PredicateKind::Tag => "tags",
        };
        let body = PredicateBody {
            name: &self.name,
            operator: self.operator,
            values: &self.values,
        };

        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(key, &body)?;
        map.end()
    }
}

impl FilterPredicate {
    /// Parse `name=v1;v2;...`, splitting on the first `=`
    pub fn parse(expression: &str) -> Result<Self> {
        let Some((name, values)) = expression.split_once('=') else {
            return Err(CarbonError::FilterFormat(format!(
                "'{}' is missing '=' (expected name=value1;value2)",
                expression
            )));
        };

        let kind = if Dimension::from_name(name).is_some() {
            PredicateKind::Dimension
        } else {
            PredicateKind::Tag
        };

        Ok(Self {
            name: name.to_string(),
            operator: FilterOperator::In,
            values: values.split(';').map(str::to_string).collect(),
            kind,
        })
    }
}

/// A lone predicate, or several joined by AND
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterTree {
    Predicate(FilterPredicate),
    And(Vec<FilterPredicate>),
}

impl Serialize for FilterTree {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            FilterTree::Predicate(p) => p.serialize(serializer),
            FilterTree::And(ps) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("and", ps)?;
                map.end()
            }
        }
    }
}

impl FilterTree {
    pub fn predicates(&self) -> &[FilterPredicate] {
        match self {
            FilterTree::Predicate(p) => std::slice::from_ref(p),
            FilterTree::And(ps) => ps,
        }
    }
}

/// Classify filter expressions into a filter tree
///
/// No expressions means no filter at all, not an empty AND.
pub fn classify<S: AsRef<str>>(expressions: &[S]) -> Result<Option<FilterTree>> {
    let mut predicates = expressions
        .iter()
        .map(|e| FilterPredicate::parse(e.as_ref()))
        .collect::<Result<Vec<_>>>()?;

    let tree = match predicates.len() {
        0 => None,
        1 => predicates.pop().map(FilterTree::Predicate),
        _ => Some(FilterTree::And(predicates)),
    };

    Ok(tree)
}
