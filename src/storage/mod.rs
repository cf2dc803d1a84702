//! Storage module
//! Domain records, the attribute schema, and access to the relational store.

pub mod data;
pub mod postgres;
pub mod schema;
pub mod store;

pub use data::{DataError, GeoPoint, Group, Link, ObsMetadata, SeriesObservations, TsMetadata};
pub use schema::{Attribute, AttributeSchema, ObsAttribute, SchemaError, TsAttribute};
pub use store::{Row, RowSource, Statement, StoreError};
