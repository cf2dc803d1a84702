use thiserror::Error;

use super::grouping::GroupMode;
use super::request::{ObsRequest, Polygon, TimeInterval};
use crate::storage::schema::{Attribute, AttributeSchema, SchemaError, TsAttribute};

#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error("polygon contains too few points: {actual} after closing the ring, at least 4 required")]
    PolygonTooSmall { actual: usize },
    #[error("filter on {0} not supported when grouping")]
    NotGroupable(String),
    #[error("grouping requires at least one attribute")]
    NoGroupKeys,
}

/// Patterns for one resolved attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeFilter {
    pub attr: Attribute,
    pub patterns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupSpec {
    pub keys: Vec<TsAttribute>,
    pub mode: GroupMode,
}

/// A request whose attribute names have all been resolved against the schema
#[derive(Debug, Clone, PartialEq)]
pub enum ValidatedRequest {
    Observations {
        interval: Option<TimeInterval>,
        inside: Option<Polygon>,
        filters: Vec<AttributeFilter>,
    },
    Groups {
        spec: GroupSpec,
        filters: Vec<AttributeFilter>,
    },
}

pub struct QueryValidator {
    schema: AttributeSchema,
}

impl QueryValidator {
    pub fn new() -> Self {
        Self::with_schema(AttributeSchema::new())
    }

    pub fn with_schema(schema: AttributeSchema) -> Self {
        Self { schema }
    }

    pub fn schema(&self) -> &AttributeSchema {
        &self.schema
    }

    /// Resolves every attribute name in the request. Nothing is executed before this succeeds.
    pub fn validate(&self, request: &ObsRequest) -> Result<ValidatedRequest, ValidationError> {
        let filters = request
            .filter
            .iter()
            .map(|(name, patterns)| {
                Ok(AttributeFilter {
                    attr: self.schema.resolve(name)?,
                    patterns: patterns.clone(),
                })
            })
            .collect::<Result<Vec<_>, ValidationError>>()?;

        let Some(group_by) = &request.group_by else {
            return Ok(ValidatedRequest::Observations {
                interval: request.interval,
                inside: request.inside.clone(),
                filters,
            });
        };

        let keys = self.schema.resolve_series_many(&group_by.attrs)?;
        if keys.is_empty() {
            return Err(ValidationError::NoGroupKeys);
        }

        // groups are formed over time series only
        if request.interval.is_some() {
            return Err(ValidationError::NotGroupable("interval".to_string()));
        }
        if request.inside.is_some() {
            return Err(ValidationError::NotGroupable("inside".to_string()));
        }
        if let Some(filter) = filters
            .iter()
            .find(|f| matches!(f.attr, Attribute::Observation(_)))
        {
            return Err(ValidationError::NotGroupable(filter.attr.name().to_string()));
        }

        let mode = if group_by.include_instances {
            GroupMode::IncludeInstances
        } else {
            GroupMode::ComboOnly
        };

        Ok(ValidatedRequest::Groups {
            spec: GroupSpec { keys, mode },
            filters,
        })
    }
}

impl Default for QueryValidator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::request::GroupBy;
    use crate::storage::schema::ObsAttribute;

    fn group_request(attrs: &[&str], include_instances: bool) -> ObsRequest {
        ObsRequest {
            group_by: Some(GroupBy {
                attrs: attrs.iter().map(|a| a.to_string()).collect(),
                include_instances,
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_valid_observation_request() {
        let validator = QueryValidator::new();
        let request = ObsRequest::new()
            .with_filter("platform", &["06260"])
            .with_filter("processing_level", &[]);

        match validator.validate(&request).unwrap() {
            ValidatedRequest::Observations { filters, .. } => {
                assert_eq!(filters.len(), 2);
                assert_eq!(filters[0].attr, Attribute::Series(TsAttribute::Platform));
                assert_eq!(
                    filters[1].attr,
                    Attribute::Observation(ObsAttribute::ProcessingLevel)
                );
                assert!(filters[1].patterns.is_empty());
            }
            other => panic!("Expected observations request, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_filter_attribute() {
        let validator = QueryValidator::new();
        let request = ObsRequest::new().with_filter("colour", &["red"]);

        match validator.validate(&request) {
            Err(ValidationError::Schema(SchemaError::UnknownAttribute { name, valid })) => {
                assert_eq!(name, "colour");
                assert!(!valid.is_empty());
            }
            other => panic!("Expected UnknownAttribute, got {:?}", other),
        }
    }

    #[test]
    fn test_group_request() {
        let validator = QueryValidator::new();
        let request = group_request(&["platform", "instrument"], true)
            .with_filter("standard_name", &["air_*"]);

        match validator.validate(&request).unwrap() {
            ValidatedRequest::Groups { spec, filters } => {
                assert_eq!(spec.keys, vec![TsAttribute::Platform, TsAttribute::Instrument]);
                assert_eq!(spec.mode, GroupMode::IncludeInstances);
                assert_eq!(filters.len(), 1);
            }
            other => panic!("Expected groups request, got {:?}", other),
        }
    }

    #[test]
    fn test_duplicate_group_attribute() {
        let validator = QueryValidator::new();
        assert_eq!(
            validator.validate(&group_request(&["platform", "unit", "platform"], false)),
            Err(ValidationError::Schema(SchemaError::DuplicateAttribute(
                "platform".to_string()
            )))
        );
    }

    #[test]
    fn test_group_rejects_observation_filters() {
        let validator = QueryValidator::new();
        assert_eq!(
            validator.validate(&group_request(&[], false)),
            Err(ValidationError::NoGroupKeys)
        );

        let mut request = group_request(&["platform"], false);
        request.interval = Some(TimeInterval::default());
        assert_eq!(
            validator.validate(&request),
            Err(ValidationError::NotGroupable("interval".to_string()))
        );

        let request = group_request(&["platform"], false).with_filter("history", &["*"]);
        assert_eq!(
            validator.validate(&request),
            Err(ValidationError::NotGroupable("history".to_string()))
        );
    }
}
