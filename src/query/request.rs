use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::storage::data::{GeoPoint, Group, SeriesObservations};

/// Half-open observation time interval `[start, end)`; either bound may be open
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeInterval {
    #[serde(default)]
    pub start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end: Option<DateTime<Utc>>,
}

/// A single polygon ring; closing the ring is optional
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Polygon {
    pub points: Vec<GeoPoint>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupBy {
    pub attrs: Vec<String>,
    #[serde(default)]
    pub include_instances: bool,
}

/// A read request against the observation store
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObsRequest {
    #[serde(default)]
    pub interval: Option<TimeInterval>,
    #[serde(default)]
    pub inside: Option<Polygon>,
    /// Wildcard patterns per attribute name; `*` matches any run of characters
    #[serde(default)]
    pub filter: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub group_by: Option<GroupBy>,
}

impl ObsRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_filter(mut self, attr: &str, patterns: &[&str]) -> Self {
        self.filter.insert(
            attr.to_string(),
            patterns.iter().map(|p| p.to_string()).collect(),
        );
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Response {
    Observations(Vec<SeriesObservations>),
    Groups(Vec<Group>),
}
