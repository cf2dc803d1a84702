use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::time::Instant;
use tracing::{debug, info, warn};

use super::grouping::{GroupAggregator, GroupMode, GroupingError};
use super::materialize;
use super::planner::QueryPlanner;
use super::request::{ObsRequest, Polygon, Response, TimeInterval};
use super::validator::{AttributeFilter, GroupSpec, QueryValidator, ValidatedRequest, ValidationError};
use crate::config::ValidTimeWindow;
use crate::metrics;
use crate::storage::data::{DataError, Group, SeriesObservations};
use crate::storage::store::{Row, RowSource, Statement, StoreError};

/// Error type for execution operations
#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    #[error("Invalid request: {0}")]
    Validation(#[from] ValidationError),
    #[error("Corrupt data: {0}")]
    Data(#[from] DataError),
    #[error("Grouping failed: {0}")]
    Grouping(#[from] GroupingError),
    #[error("Backend failure: {0}")]
    Store(#[from] StoreError),
}

/// Result type for execution operations
pub type ExecutionResult<T> = Result<T, ExecutionError>;

/// Configuration for query execution
#[derive(Debug, Clone, Copy, Default)]
pub struct ExecutionConfig {
    /// Observations outside this window are never returned
    pub valid_time: ValidTimeWindow,
}

/// Runs requests against a row source, one statement at a time
pub struct QueryExecutor<S> {
    store: S,
    validator: QueryValidator,
    planner: QueryPlanner,
    config: ExecutionConfig,
}

impl<S: RowSource> QueryExecutor<S> {
    pub fn new(store: S, config: ExecutionConfig) -> Self {
        Self {
            store,
            validator: QueryValidator::new(),
            planner: QueryPlanner::new(),
            config,
        }
    }

    /// Executes a request as a grouping query if it asks for grouping, otherwise
    /// as a flat observation query
    pub async fn execute(&self, request: &ObsRequest) -> ExecutionResult<Response> {
        self.execute_at(request, Utc::now()).await
    }

    /// Like [`execute`](Self::execute), with the valid time window evaluated at `now`
    pub async fn execute_at(&self, request: &ObsRequest, now: DateTime<Utc>) -> ExecutionResult<Response> {
        let started = Instant::now();
        let validated = self.validator.validate(request);

        let (kind, result) = match validated {
            Ok(ValidatedRequest::Observations {
                interval,
                inside,
                filters,
            }) => {
                let window = self.config.valid_time.bounds(now);
                let result = self
                    .get_observations(interval.as_ref(), inside.as_ref(), &filters, window)
                    .await
                    .map(Response::Observations);
                ("observations", result)
            }
            Ok(ValidatedRequest::Groups { spec, filters }) => {
                let result = self.get_groups(&spec, &filters).await.map(Response::Groups);
                ("groups", result)
            }
            Err(e) => ("invalid", Err(e.into())),
        };

        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        match &result {
            Ok(_) => {
                metrics::record_query(kind, elapsed_ms);
                info!(kind, elapsed_ms, "Query completed");
            }
            Err(e) => {
                metrics::record_query_failure(kind);
                warn!(kind, elapsed_ms, error = %e, "Query failed");
            }
        }
        result
    }

    async fn fetch(&self, statement: &Statement) -> ExecutionResult<Vec<Row>> {
        let rows = self.store.fetch(statement).await?;
        debug!(intent = statement.intent, rows = rows.len(), "Fetched rows");
        metrics::record_rows(statement.intent, rows.len());
        Ok(rows)
    }

    async fn get_observations(
        &self,
        interval: Option<&TimeInterval>,
        inside: Option<&Polygon>,
        filters: &[AttributeFilter],
        window: (DateTime<Utc>, DateTime<Utc>),
    ) -> ExecutionResult<Vec<SeriesObservations>> {
        let statement = self.planner.plan_observations(interval, inside, filters, window)?;
        let rows = self.fetch(&statement).await?;
        let by_series = materialize::observations_by_series(&rows)?;
        if by_series.is_empty() {
            return Ok(Vec::new());
        }

        let ts_ids: Vec<i64> = by_series.keys().copied().collect();
        let statement = self.planner.plan_series(&ts_ids);
        let series = self
            .fetch(&statement)
            .await?
            .iter()
            .map(materialize::series_from_row)
            .collect::<Result<HashMap<_, _>, _>>()?;

        Ok(materialize::assemble_observations(by_series, series)?)
    }

    async fn get_groups(&self, spec: &GroupSpec, filters: &[AttributeFilter]) -> ExecutionResult<Vec<Group>> {
        let statement = self.planner.plan_groups(spec, filters);
        let rows = self.fetch(&statement).await?;

        let mut aggregator = GroupAggregator::new(spec.mode, spec.keys.clone());
        for row in &rows {
            let ts = match spec.mode {
                GroupMode::ComboOnly => materialize::series_attributes(row, &spec.keys)?,
                GroupMode::IncludeInstances => materialize::series_from_row(row)?.1,
            };
            aggregator.push(ts)?;
        }

        let groups = aggregator.finish();
        metrics::record_groups(groups.len());
        debug!(rows = rows.len(), groups = groups.len(), "Grouped time series");
        Ok(groups)
    }
}
