//! obsquery - metadata queries over geotagged time series observations
//!
//! Resolves attribute filters, spatial and temporal restrictions against a PostGIS
//! backed observation store, and groups time series by their metadata attributes.

pub mod config;
pub mod metrics;
pub mod query;
pub mod storage;
