use chrono::{DateTime, Utc};
use sqlx::postgres::{PgArguments, PgConnectOptions, PgPool, PgPoolOptions, PgRow};
use sqlx::query::Query;
use sqlx::{Postgres, Row as _};
use tracing::debug;

use super::store::{Column, ColumnKind, ColumnValue, Row, RowSource, SqlParam, Statement, StoreError, StoreResult};

/// Row source backed by a pooled PostgreSQL/PostGIS connection
#[derive(Clone)]
pub struct PgRowSource {
    pool: PgPool,
}

impl PgRowSource {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(options: PgConnectOptions, max_connections: u32) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;
        Ok(Self::new(pool))
    }
}

fn bind_params<'q>(
    mut query: Query<'q, Postgres, PgArguments>,
    params: &'q [SqlParam],
) -> Query<'q, Postgres, PgArguments> {
    for param in params {
        query = match param {
            SqlParam::Text(v) => query.bind(v.as_str()),
            SqlParam::Timestamp(v) => query.bind(*v),
            SqlParam::IntArray(v) => query.bind(v.as_slice()),
        };
    }
    query
}

fn decode_column(row: &PgRow, index: usize, column: &Column) -> Result<ColumnValue, sqlx::Error> {
    let value = match column.kind {
        ColumnKind::Int => row.try_get::<Option<i64>, _>(index)?.map(ColumnValue::Int),
        ColumnKind::Float => row.try_get::<Option<f64>, _>(index)?.map(ColumnValue::Float),
        ColumnKind::Text => row.try_get::<Option<String>, _>(index)?.map(ColumnValue::Text),
        ColumnKind::TextArray => row
            .try_get::<Option<Vec<String>>, _>(index)?
            .map(ColumnValue::TextArray),
        ColumnKind::Timestamp => row
            .try_get::<Option<DateTime<Utc>>, _>(index)?
            .map(ColumnValue::Timestamp),
    };
    Ok(value.unwrap_or(ColumnValue::Null))
}

fn decode_row(row: &PgRow, columns: &[Column]) -> Result<Row, sqlx::Error> {
    let mut decoded = Row::new();
    for (index, column) in columns.iter().enumerate() {
        decoded.insert(column.name.clone(), decode_column(row, index, column)?);
    }
    Ok(decoded)
}

fn query_error(intent: &'static str, source: sqlx::Error) -> StoreError {
    debug!(intent, error = %source, "Statement failed");
    StoreError::Query { intent, source }
}

impl RowSource for PgRowSource {
    async fn fetch(&self, statement: &Statement) -> StoreResult<Vec<Row>> {
        let intent = statement.intent;
        debug!(intent, params = statement.params.len(), "Executing statement");

        let query = bind_params(sqlx::query(&statement.sql), &statement.params);
        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(|source| query_error(intent, source))?;

        rows.iter()
            .map(|row| decode_row(row, &statement.columns))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|source| query_error(intent, source))
    }
}
