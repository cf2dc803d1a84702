use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DataError {
    #[error("Link arrays of time series {ts_id} have unequal lengths: {lengths:?}")]
    LinkArrayMismatch { ts_id: i64, lengths: [usize; 5] },
    #[error("Column {column} has unexpected type: expected {expected}, got {actual}")]
    UnexpectedType {
        column: String,
        expected: &'static str,
        actual: &'static str,
    },
    #[error("Column {0} missing from row")]
    MissingColumn(String),
    #[error("Column {0} is NULL but maps to a string attribute")]
    NullValue(String),
    #[error("No metadata found for time series {0}")]
    MissingTimeSeries(i64),
}

/// A geographic point in decimal degrees (WGS84)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lon: f64,
    pub lat: f64,
}

impl GeoPoint {
    pub fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }
}

/// A link attached to a time series
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Link {
    pub href: String,
    pub rel: String,
    #[serde(rename = "type")]
    pub link_type: String,
    pub hreflang: String,
    pub title: String,
}

/// Descriptive metadata of a time series.
///
/// Every string field corresponds to one [`TsAttribute`](super::schema::TsAttribute)
/// and to the column of the same name in `time_series`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TsMetadata {
    pub version: String,
    #[serde(rename = "type")]
    pub ts_type: String,
    pub title: String,
    pub summary: String,
    pub keywords: String,
    pub keywords_vocabulary: String,
    pub license: String,
    pub conventions: String,
    pub naming_authority: String,
    pub creator_type: String,
    pub creator_name: String,
    pub creator_email: String,
    pub creator_url: String,
    pub institution: String,
    pub project: String,
    pub source: String,
    pub platform: String,
    pub platform_vocabulary: String,
    pub standard_name: String,
    pub unit: String,
    pub instrument: String,
    pub instrument_vocabulary: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<Link>,
}

/// Metadata and value of a single observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObsMetadata {
    pub id: String,
    pub geo_point: GeoPoint,
    pub obstime_instant: DateTime<Utc>,
    pub pubtime: DateTime<Utc>,
    pub data_id: String,
    pub history: String,
    pub metadata_id: String,
    pub processing_level: String,
    pub value: String,
}

impl ObsMetadata {
    pub fn new(
        geo_point: GeoPoint,
        obstime_instant: DateTime<Utc>,
        pubtime: DateTime<Utc>,
        value: String,
    ) -> Self {
        Self {
            id: String::new(),
            geo_point,
            obstime_instant,
            pubtime,
            data_id: String::new(),
            history: String::new(),
            metadata_id: String::new(),
            processing_level: String::new(),
            value,
        }
    }
}

/// A time series together with its matching observations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesObservations {
    pub ts_mdata: TsMetadata,
    pub obs_mdata: Vec<ObsMetadata>,
}

/// A unique attribute combination, optionally with every series sharing it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub combo: TsMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instances: Option<Vec<TsMetadata>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_combo_only_group_omits_instances() {
        let group = Group {
            combo: TsMetadata {
                platform: "06260".to_string(),
                ..Default::default()
            },
            instances: None,
        };

        let json = serde_json::to_value(&group).unwrap();
        assert!(json.get("instances").is_none());
        assert_eq!(json["combo"]["platform"], "06260");
        assert_eq!(json["combo"]["type"], "");
    }

    #[test]
    fn test_link_type_field_name() {
        let link = Link {
            href: "https://example.org".to_string(),
            link_type: "text/html".to_string(),
            ..Default::default()
        };
        let json = serde_json::to_value(&link).unwrap();
        assert_eq!(json["type"], "text/html");
    }
}
