//! Closed mapping between logical attribute names and physical columns.
//!
//! Only string-valued metadata is addressable by name. Column identifiers placed
//! into SQL text always come from this table, never from caller input.

use std::collections::{HashMap, HashSet};
use thiserror::Error;

use super::data::{ObsMetadata, TsMetadata};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("attribute not found: {name}; supported attributes: {}", valid.join(", "))]
    UnknownAttribute {
        name: String,
        valid: Vec<&'static str>,
    },
    #[error("attribute {0} specified more than once")]
    DuplicateAttribute(String),
}

pub const TIME_SERIES_TABLE: &str = "time_series";
pub const OBSERVATION_TABLE: &str = "observation";

/// String attributes of a time series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TsAttribute {
    Version,
    Type,
    Title,
    Summary,
    Keywords,
    KeywordsVocabulary,
    License,
    Conventions,
    NamingAuthority,
    CreatorType,
    CreatorName,
    CreatorEmail,
    CreatorUrl,
    Institution,
    Project,
    Source,
    Platform,
    PlatformVocabulary,
    StandardName,
    Unit,
    Instrument,
    InstrumentVocabulary,
}

impl TsAttribute {
    pub const ALL: [TsAttribute; 22] = [
        TsAttribute::Version,
        TsAttribute::Type,
        TsAttribute::Title,
        TsAttribute::Summary,
        TsAttribute::Keywords,
        TsAttribute::KeywordsVocabulary,
        TsAttribute::License,
        TsAttribute::Conventions,
        TsAttribute::NamingAuthority,
        TsAttribute::CreatorType,
        TsAttribute::CreatorName,
        TsAttribute::CreatorEmail,
        TsAttribute::CreatorUrl,
        TsAttribute::Institution,
        TsAttribute::Project,
        TsAttribute::Source,
        TsAttribute::Platform,
        TsAttribute::PlatformVocabulary,
        TsAttribute::StandardName,
        TsAttribute::Unit,
        TsAttribute::Instrument,
        TsAttribute::InstrumentVocabulary,
    ];

    /// Logical name, identical to the column name
    pub fn name(self) -> &'static str {
        match self {
            TsAttribute::Version => "version",
            TsAttribute::Type => "type",
            TsAttribute::Title => "title",
            TsAttribute::Summary => "summary",
            TsAttribute::Keywords => "keywords",
            TsAttribute::KeywordsVocabulary => "keywords_vocabulary",
            TsAttribute::License => "license",
            TsAttribute::Conventions => "conventions",
            TsAttribute::NamingAuthority => "naming_authority",
            TsAttribute::CreatorType => "creator_type",
            TsAttribute::CreatorName => "creator_name",
            TsAttribute::CreatorEmail => "creator_email",
            TsAttribute::CreatorUrl => "creator_url",
            TsAttribute::Institution => "institution",
            TsAttribute::Project => "project",
            TsAttribute::Source => "source",
            TsAttribute::Platform => "platform",
            TsAttribute::PlatformVocabulary => "platform_vocabulary",
            TsAttribute::StandardName => "standard_name",
            TsAttribute::Unit => "unit",
            TsAttribute::Instrument => "instrument",
            TsAttribute::InstrumentVocabulary => "instrument_vocabulary",
        }
    }

    pub fn get(self, ts: &TsMetadata) -> &str {
        match self {
            TsAttribute::Version => &ts.version,
            TsAttribute::Type => &ts.ts_type,
            TsAttribute::Title => &ts.title,
            TsAttribute::Summary => &ts.summary,
            TsAttribute::Keywords => &ts.keywords,
            TsAttribute::KeywordsVocabulary => &ts.keywords_vocabulary,
            TsAttribute::License => &ts.license,
            TsAttribute::Conventions => &ts.conventions,
            TsAttribute::NamingAuthority => &ts.naming_authority,
            TsAttribute::CreatorType => &ts.creator_type,
            TsAttribute::CreatorName => &ts.creator_name,
            TsAttribute::CreatorEmail => &ts.creator_email,
            TsAttribute::CreatorUrl => &ts.creator_url,
            TsAttribute::Institution => &ts.institution,
            TsAttribute::Project => &ts.project,
            TsAttribute::Source => &ts.source,
            TsAttribute::Platform => &ts.platform,
            TsAttribute::PlatformVocabulary => &ts.platform_vocabulary,
            TsAttribute::StandardName => &ts.standard_name,
            TsAttribute::Unit => &ts.unit,
            TsAttribute::Instrument => &ts.instrument,
            TsAttribute::InstrumentVocabulary => &ts.instrument_vocabulary,
        }
    }

    pub fn set(self, ts: &mut TsMetadata, value: String) {
        let field = match self {
            TsAttribute::Version => &mut ts.version,
            TsAttribute::Type => &mut ts.ts_type,
            TsAttribute::Title => &mut ts.title,
            TsAttribute::Summary => &mut ts.summary,
            TsAttribute::Keywords => &mut ts.keywords,
            TsAttribute::KeywordsVocabulary => &mut ts.keywords_vocabulary,
            TsAttribute::License => &mut ts.license,
            TsAttribute::Conventions => &mut ts.conventions,
            TsAttribute::NamingAuthority => &mut ts.naming_authority,
            TsAttribute::CreatorType => &mut ts.creator_type,
            TsAttribute::CreatorName => &mut ts.creator_name,
            TsAttribute::CreatorEmail => &mut ts.creator_email,
            TsAttribute::CreatorUrl => &mut ts.creator_url,
            TsAttribute::Institution => &mut ts.institution,
            TsAttribute::Project => &mut ts.project,
            TsAttribute::Source => &mut ts.source,
            TsAttribute::Platform => &mut ts.platform,
            TsAttribute::PlatformVocabulary => &mut ts.platform_vocabulary,
            TsAttribute::StandardName => &mut ts.standard_name,
            TsAttribute::Unit => &mut ts.unit,
            TsAttribute::Instrument => &mut ts.instrument,
            TsAttribute::InstrumentVocabulary => &mut ts.instrument_vocabulary,
        };
        *field = value;
    }

    /// Table-qualified column
    pub fn column(self) -> String {
        format!("{}.{}", TIME_SERIES_TABLE, self.name())
    }
}

/// String metadata attributes of an observation (the value itself excluded)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ObsAttribute {
    Id,
    DataId,
    History,
    MetadataId,
    ProcessingLevel,
}

impl ObsAttribute {
    pub const ALL: [ObsAttribute; 5] = [
        ObsAttribute::Id,
        ObsAttribute::DataId,
        ObsAttribute::History,
        ObsAttribute::MetadataId,
        ObsAttribute::ProcessingLevel,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ObsAttribute::Id => "id",
            ObsAttribute::DataId => "data_id",
            ObsAttribute::History => "history",
            ObsAttribute::MetadataId => "metadata_id",
            ObsAttribute::ProcessingLevel => "processing_level",
        }
    }

    pub fn set(self, obs: &mut ObsMetadata, value: String) {
        let field = match self {
            ObsAttribute::Id => &mut obs.id,
            ObsAttribute::DataId => &mut obs.data_id,
            ObsAttribute::History => &mut obs.history,
            ObsAttribute::MetadataId => &mut obs.metadata_id,
            ObsAttribute::ProcessingLevel => &mut obs.processing_level,
        };
        *field = value;
    }

    pub fn column(self) -> String {
        format!("{}.{}", OBSERVATION_TABLE, self.name())
    }
}

/// Any attribute addressable by name in a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Attribute {
    Series(TsAttribute),
    Observation(ObsAttribute),
}

impl Attribute {
    pub fn name(self) -> &'static str {
        match self {
            Attribute::Series(attr) => attr.name(),
            Attribute::Observation(attr) => attr.name(),
        }
    }

    pub fn column(self) -> String {
        match self {
            Attribute::Series(attr) => attr.column(),
            Attribute::Observation(attr) => attr.column(),
        }
    }
}

/// Lookup table from logical name to attribute, built once at startup
#[derive(Debug, Clone)]
pub struct AttributeSchema {
    by_name: HashMap<&'static str, Attribute>,
}

impl AttributeSchema {
    pub fn new() -> Self {
        let by_name = TsAttribute::ALL
            .iter()
            .map(|&attr| (attr.name(), Attribute::Series(attr)))
            .chain(
                ObsAttribute::ALL
                    .iter()
                    .map(|&attr| (attr.name(), Attribute::Observation(attr))),
            )
            .collect();
        Self { by_name }
    }

    /// Resolves any time series or observation attribute
    pub fn resolve(&self, name: &str) -> Result<Attribute, SchemaError> {
        self.by_name
            .get(name)
            .copied()
            .ok_or_else(|| SchemaError::UnknownAttribute {
                name: name.to_string(),
                valid: self.all_names(),
            })
    }

    /// Resolves grouping keys. Only time series attributes qualify, each at most once.
    pub fn resolve_series_many(&self, names: &[String]) -> Result<Vec<TsAttribute>, SchemaError> {
        let mut seen = HashSet::new();
        let mut attrs = Vec::with_capacity(names.len());

        for name in names {
            let attr = match self.by_name.get(name.as_str()) {
                Some(Attribute::Series(attr)) => *attr,
                _ => {
                    return Err(SchemaError::UnknownAttribute {
                        name: name.clone(),
                        valid: Self::series_names(),
                    })
                }
            };
            if !seen.insert(attr) {
                return Err(SchemaError::DuplicateAttribute(name.clone()));
            }
            attrs.push(attr);
        }

        Ok(attrs)
    }

    /// Every addressable attribute name, time series attributes first
    pub fn all_names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.by_name.values().copied().collect();
        names.sort();
        names.into_iter().map(Attribute::name).collect()
    }

    pub fn series_names() -> Vec<&'static str> {
        TsAttribute::ALL.iter().map(|attr| attr.name()).collect()
    }
}

impl Default for AttributeSchema {
    fn default() -> Self {
        Self::new()
    }
}
