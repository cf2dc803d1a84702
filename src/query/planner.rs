//! Assembles complete read statements from the filter fragments.
//!
//! Ordering is part of the result contract: observations come back ordered by
//! series and time, grouping rows by the grouping keys under byte-wise collation.

use chrono::{DateTime, Utc};

use super::grouping::GroupMode;
use super::materialize::{
    ID_COLUMN, LAT_COLUMN, LINK_COLUMNS, LON_COLUMN, OBSTIME_COLUMN, PUBTIME_COLUMN, TS_ID_COLUMN,
    VALUE_COLUMN,
};
use super::predicate::{self, ParamList};
use super::request::{Polygon, TimeInterval};
use super::validator::{AttributeFilter, GroupSpec, ValidationError};
use crate::storage::schema::{ObsAttribute, TsAttribute, TIME_SERIES_TABLE};
use crate::storage::store::{Column, ColumnKind, SqlParam, Statement};

pub const GET_OBSERVATIONS: &str = "get observations";
pub const GET_TIME_SERIES: &str = "get time series";
pub const GET_ATTRIBUTE_GROUPS: &str = "get attribute groups";

/// Builder for a single SELECT
struct Select {
    distinct: bool,
    exprs: Vec<String>,
    columns: Vec<Column>,
}

impl Select {
    fn new() -> Self {
        Self {
            distinct: false,
            exprs: Vec::new(),
            columns: Vec::new(),
        }
    }

    fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    /// Projects `expr` into output column `name`
    fn column(mut self, expr: impl Into<String>, name: &str, kind: ColumnKind) -> Self {
        self.exprs.push(format!("{} AS {}", expr.into(), name));
        self.columns.push(Column::new(name, kind));
        self
    }

    /// id, link arrays and every string attribute of `time_series`
    fn full_series(mut self) -> Self {
        self = self.column(
            format!("{}.{}", TIME_SERIES_TABLE, ID_COLUMN),
            ID_COLUMN,
            ColumnKind::Int,
        );
        for name in LINK_COLUMNS {
            self = self.column(
                format!("{}.{}", TIME_SERIES_TABLE, name),
                name,
                ColumnKind::TextArray,
            );
        }
        for attr in TsAttribute::ALL {
            self = self.column(attr.column(), attr.name(), ColumnKind::Text);
        }
        self
    }

    /// `tail` holds FROM, WHERE and ORDER BY
    fn build(self, intent: &'static str, tail: String, params: ParamList) -> Statement {
        let select = if self.distinct { "SELECT DISTINCT" } else { "SELECT" };
        Statement {
            intent,
            sql: format!("{} {} {}", select, self.exprs.join(", "), tail),
            params: params.into_vec(),
            columns: self.columns,
        }
    }
}

pub struct QueryPlanner;

impl QueryPlanner {
    pub fn new() -> Self {
        Self
    }

    /// Observations matching all three filters, ordered by series id then time
    pub fn plan_observations(
        &self,
        interval: Option<&TimeInterval>,
        inside: Option<&Polygon>,
        filters: &[AttributeFilter],
        window: (DateTime<Utc>, DateTime<Utc>),
    ) -> Result<Statement, ValidationError> {
        let mut params = ParamList::new();
        let time_filter = predicate::time_filter(interval, window, &mut params);
        let geo_filter = predicate::geo_filter(inside, &mut params)?;
        let pattern_filter = predicate::pattern_filter(filters, &mut params);

        let mut select = Select::new()
            .column("observation.ts_id", TS_ID_COLUMN, ColumnKind::Int)
            .column("observation.obstime_instant", OBSTIME_COLUMN, ColumnKind::Timestamp)
            .column("observation.pubtime", PUBTIME_COLUMN, ColumnKind::Timestamp)
            .column("observation.value", VALUE_COLUMN, ColumnKind::Text)
            .column("ST_X(geo_point.point::geometry)", LON_COLUMN, ColumnKind::Float)
            .column("ST_Y(geo_point.point::geometry)", LAT_COLUMN, ColumnKind::Float);
        for attr in ObsAttribute::ALL {
            select = select.column(attr.column(), attr.name(), ColumnKind::Text);
        }

        let tail = format!(
            "FROM observation \
             JOIN time_series ON time_series.id = observation.ts_id \
             JOIN geo_point ON observation.geo_point_id = geo_point.id \
             WHERE {} AND {} AND {} \
             ORDER BY observation.ts_id, observation.obstime_instant",
            time_filter, geo_filter, pattern_filter
        );
        Ok(select.build(GET_OBSERVATIONS, tail, params))
    }

    /// Full metadata of the given series
    pub fn plan_series(&self, ts_ids: &[i64]) -> Statement {
        let mut params = ParamList::new();
        let ph = params.push(SqlParam::IntArray(ts_ids.to_vec()));
        let tail = format!("FROM time_series WHERE time_series.id = ANY({})", ph);
        Select::new().full_series().build(GET_TIME_SERIES, tail, params)
    }

    /// Rows for the group aggregator, ordered by the grouping keys: distinct key
    /// combinations in combo-only mode, full series rows otherwise.
    pub fn plan_groups(&self, spec: &GroupSpec, filters: &[AttributeFilter]) -> Statement {
        let mut params = ParamList::new();
        let pattern_filter = predicate::pattern_filter(filters, &mut params);

        match spec.mode {
            GroupMode::ComboOnly => {
                let mut select = Select::new().distinct();
                for key in &spec.keys {
                    select = select.column(
                        format!("{} COLLATE \"C\"", key.column()),
                        key.name(),
                        ColumnKind::Text,
                    );
                }
                // DISTINCT requires ordering by output columns
                let order = spec
                    .keys
                    .iter()
                    .map(|key| key.name())
                    .collect::<Vec<_>>()
                    .join(", ");
                let tail = format!("FROM time_series WHERE {} ORDER BY {}", pattern_filter, order);
                select.build(GET_ATTRIBUTE_GROUPS, tail, params)
            }
            GroupMode::IncludeInstances => {
                let order = spec
                    .keys
                    .iter()
                    .map(|key| format!("{} COLLATE \"C\"", key.column()))
                    .collect::<Vec<_>>()
                    .join(", ");
                let tail = format!(
                    "FROM time_series WHERE {} ORDER BY {}, time_series.id",
                    pattern_filter, order
                );
                Select::new()
                    .full_series()
                    .build(GET_ATTRIBUTE_GROUPS, tail, params)
            }
        }
    }
}

impl Default for QueryPlanner {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::schema::Attribute;
    use chrono::TimeZone;

    fn window() -> (DateTime<Utc>, DateTime<Utc>) {
        (
            Utc.timestamp_opt(1000, 0).unwrap(),
            Utc.timestamp_opt(2000, 0).unwrap(),
        )
    }

    fn platform_filter(patterns: &[&str]) -> Vec<AttributeFilter> {
        vec![AttributeFilter {
            attr: Attribute::Series(TsAttribute::Platform),
            patterns: patterns.iter().map(|p| p.to_string()).collect(),
        }]
    }

    #[test]
    fn test_plan_observations() {
        let planner = QueryPlanner::new();
        let polygon = Polygon {
            points: vec![
                crate::storage::data::GeoPoint::new(4.0, 52.0),
                crate::storage::data::GeoPoint::new(5.0, 52.0),
                crate::storage::data::GeoPoint::new(5.0, 53.0),
            ],
        };
        let stmt = planner
            .plan_observations(None, Some(&polygon), &platform_filter(&["06*"]), window())
            .unwrap();

        assert_eq!(stmt.intent, GET_OBSERVATIONS);
        assert!(stmt.sql.starts_with("SELECT observation.ts_id AS ts_id, "));
        assert!(stmt.sql.contains(
            "WHERE TRUE AND (observation.obstime_instant >= $1) AND (observation.obstime_instant <= $2) \
             AND ST_DWithin(geo_point.point, ST_GeomFromText($3, 4326)::geography, 0.0) \
             AND (((time_series.platform ILIKE $4))) \
             ORDER BY observation.ts_id, observation.obstime_instant"
        ));
        assert_eq!(stmt.params.len(), 4);
        assert_eq!(stmt.params[3], SqlParam::Text("06%".to_string()));

        // every projected column is declared, in order
        assert_eq!(stmt.columns.len(), 6 + ObsAttribute::ALL.len());
        assert_eq!(stmt.columns[4], Column::new(LON_COLUMN, ColumnKind::Float));
        assert!(stmt.sql.contains("observation.processing_level AS processing_level"));
    }

    #[test]
    fn test_plan_observations_rejects_degenerate_polygon() {
        let planner = QueryPlanner::new();
        let polygon = Polygon {
            points: vec![crate::storage::data::GeoPoint::new(4.0, 52.0)],
        };
        assert_eq!(
            planner.plan_observations(None, Some(&polygon), &[], window()),
            Err(ValidationError::PolygonTooSmall { actual: 1 })
        );
    }

    #[test]
    fn test_plan_series() {
        let stmt = QueryPlanner::new().plan_series(&[3, 1]);
        assert_eq!(stmt.intent, GET_TIME_SERIES);
        assert!(stmt.sql.starts_with("SELECT time_series.id AS id, time_series.link_href AS link_href"));
        assert!(stmt.sql.ends_with("FROM time_series WHERE time_series.id = ANY($1)"));
        assert_eq!(stmt.params, vec![SqlParam::IntArray(vec![3, 1])]);
        assert_eq!(stmt.columns.len(), 1 + LINK_COLUMNS.len() + TsAttribute::ALL.len());
    }

    #[test]
    fn test_plan_groups_combo_only() {
        let spec = GroupSpec {
            keys: vec![TsAttribute::Platform, TsAttribute::Instrument],
            mode: GroupMode::ComboOnly,
        };
        let stmt = QueryPlanner::new().plan_groups(&spec, &[]);

        assert_eq!(
            stmt.sql,
            "SELECT DISTINCT time_series.platform COLLATE \"C\" AS platform, \
             time_series.instrument COLLATE \"C\" AS instrument \
             FROM time_series WHERE TRUE ORDER BY platform, instrument"
        );
        assert!(stmt.params.is_empty());
        assert_eq!(
            stmt.columns,
            vec![
                Column::new("platform", ColumnKind::Text),
                Column::new("instrument", ColumnKind::Text)
            ]
        );
    }

    #[test]
    fn test_plan_groups_with_instances() {
        let spec = GroupSpec {
            keys: vec![TsAttribute::StandardName],
            mode: GroupMode::IncludeInstances,
        };
        let stmt = QueryPlanner::new().plan_groups(&spec, &platform_filter(&["06260", "06348"]));

        assert!(stmt.sql.starts_with("SELECT time_series.id AS id"));
        assert!(stmt.sql.ends_with(
            "FROM time_series WHERE (((time_series.platform ILIKE $1) OR (time_series.platform ILIKE $2))) \
             ORDER BY time_series.standard_name COLLATE \"C\", time_series.id"
        ));
        assert_eq!(stmt.params.len(), 2);
    }
}
