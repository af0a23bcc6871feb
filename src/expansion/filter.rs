//! Declarative property filters.
//!
//! Filters are data: a strategy declares them, the population step narrows
//! them to the session's platform, and the backend decides how to apply them
//! (a `WHERE` clause, a worker-side predicate, or [`matches_all`] for
//! in-memory sources).
//!
//! A list of filters is combined with AND; a [`NodeFilter::Or`] group matches
//! if any of its members does.

use std::collections::BTreeMap;
use std::ops::BitOr;

use serde::{Deserialize, Serialize};

/// Set of target platforms a filter is valid for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValidFor(u32);

impl ValidFor {
    pub const NONE: ValidFor = ValidFor(0);
    pub const SQL_SERVER_2016: ValidFor = ValidFor(1 << 0);
    pub const SQL_SERVER_2017: ValidFor = ValidFor(1 << 1);
    pub const SQL_SERVER_2019: ValidFor = ValidFor(1 << 2);
    pub const SQL_SERVER_2022: ValidFor = ValidFor(1 << 3);
    pub const AZURE_SQL: ValidFor = ValidFor(1 << 4);
    pub const POSTGRES: ValidFor = ValidFor(1 << 5);
    pub const DUCKDB: ValidFor = ValidFor(1 << 6);
    pub const KUSTO: ValidFor = ValidFor(1 << 7);

    pub const ALL_ON_PREM_SQL_SERVER: ValidFor = ValidFor(0b1111);
    pub const ALL_SQL_SERVER: ValidFor = ValidFor(0b1_1111);
    pub const ALL: ValidFor = ValidFor(u32::MAX);

    pub fn bits(self) -> u32 {
        self.0
    }

    /// Whether the two sets share any platform.
    pub fn intersects(self, other: ValidFor) -> bool {
        self.0 & other.0 != 0
    }

    /// Map a SQL Server major version to its platform flag.
    pub fn sql_server_version(major: u32) -> ValidFor {
        match major {
            0..=13 => ValidFor::SQL_SERVER_2016,
            14 => ValidFor::SQL_SERVER_2017,
            15 => ValidFor::SQL_SERVER_2019,
            _ => ValidFor::SQL_SERVER_2022,
        }
    }
}

impl Default for ValidFor {
    fn default() -> Self {
        ValidFor::ALL
    }
}

impl BitOr for ValidFor {
    type Output = ValidFor;

    fn bitor(self, rhs: ValidFor) -> ValidFor {
        ValidFor(self.0 | rhs.0)
    }
}

/// Comparison applied by a property filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOperator {
    Equals,
    NotEquals,
    /// Case-insensitive substring match on string values.
    Contains,
    /// Property equals any of the values.
    In,
}

/// A predicate over one backend object property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyFilter {
    pub property: String,
    pub operator: FilterOperator,
    pub values: Vec<serde_json::Value>,
    #[serde(default)]
    pub valid_for: ValidFor,
}

impl PropertyFilter {
    pub fn equals(property: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        Self {
            property: property.into(),
            operator: FilterOperator::Equals,
            values: vec![value.into()],
            valid_for: ValidFor::ALL,
        }
    }

    pub fn not_equals(property: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        Self {
            operator: FilterOperator::NotEquals,
            ..Self::equals(property, value)
        }
    }

    pub fn contains(property: impl Into<String>, needle: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            operator: FilterOperator::Contains,
            values: vec![serde_json::Value::String(needle.into())],
            valid_for: ValidFor::ALL,
        }
    }

    pub fn any_of<V: Into<serde_json::Value>>(
        property: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        Self {
            property: property.into(),
            operator: FilterOperator::In,
            values: values.into_iter().map(Into::into).collect(),
            valid_for: ValidFor::ALL,
        }
    }

    /// Restrict the filter to a set of platforms.
    pub fn valid_for(mut self, platforms: ValidFor) -> Self {
        self.valid_for = platforms;
        self
    }

    /// Evaluate against an object's properties. A missing property is
    /// treated as null.
    pub fn matches(&self, properties: &BTreeMap<String, serde_json::Value>) -> bool {
        let actual = properties
            .get(&self.property)
            .unwrap_or(&serde_json::Value::Null);

        match self.operator {
            FilterOperator::Equals => self.values.first() == Some(actual),
            FilterOperator::NotEquals => self.values.first() != Some(actual),
            FilterOperator::In => self.values.contains(actual),
            FilterOperator::Contains => match (actual.as_str(), self.values.first().and_then(|v| v.as_str())) {
                (Some(haystack), Some(needle)) => {
                    haystack.to_lowercase().contains(&needle.to_lowercase())
                }
                _ => false,
            },
        }
    }
}

/// A filter clause: a single predicate or an OR group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeFilter {
    Property(PropertyFilter),
    Or { filters: Vec<PropertyFilter> },
}

impl From<PropertyFilter> for NodeFilter {
    fn from(filter: PropertyFilter) -> Self {
        NodeFilter::Property(filter)
    }
}

impl NodeFilter {
    pub fn or(filters: impl IntoIterator<Item = PropertyFilter>) -> Self {
        NodeFilter::Or {
            filters: filters.into_iter().collect(),
        }
    }

    pub fn matches(&self, properties: &BTreeMap<String, serde_json::Value>) -> bool {
        match self {
            NodeFilter::Property(filter) => filter.matches(properties),
            NodeFilter::Or { filters } => filters.iter().any(|f| f.matches(properties)),
        }
    }

    /// Narrow to the given platform. OR groups keep only the members valid
    /// for it and vanish when none are.
    fn for_platform(&self, platform: ValidFor) -> Option<NodeFilter> {
        match self {
            NodeFilter::Property(filter) => filter
                .valid_for
                .intersects(platform)
                .then(|| self.clone()),
            NodeFilter::Or { filters } => {
                let kept: Vec<_> = filters
                    .iter()
                    .filter(|f| f.valid_for.intersects(platform))
                    .cloned()
                    .collect();
                (!kept.is_empty()).then_some(NodeFilter::Or { filters: kept })
            }
        }
    }
}

/// The filters that apply on a platform.
pub fn filters_for_platform(filters: &[NodeFilter], platform: ValidFor) -> Vec<NodeFilter> {
    filters
        .iter()
        .filter_map(|f| f.for_platform(platform))
        .collect()
}

/// AND of all filters.
pub fn matches_all(filters: &[NodeFilter], properties: &BTreeMap<String, serde_json::Value>) -> bool {
    filters.iter().all(|f| f.matches(properties))
}
