//! Query module
//! Validates requests, builds parameterized statements and shapes their rows into responses.

pub mod executor;
pub mod grouping;
pub mod materialize;
pub mod planner;
pub mod predicate;
pub mod request;
pub mod validator;

pub use executor::{ExecutionConfig, ExecutionError, ExecutionResult, QueryExecutor};
pub use grouping::{GroupAggregator, GroupMode, GroupingError};
pub use request::{GroupBy, ObsRequest, Polygon, Response, TimeInterval};
pub use validator::{QueryValidator, ValidatedRequest, ValidationError};
