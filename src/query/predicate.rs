//! Filter fragments for the observation and time series statements.
//!
//! Each builder returns a boolean SQL expression and appends the values for its
//! placeholders to a shared [`ParamList`], so placeholder numbering carries on from
//! one fragment to the next. Identifiers come only from the attribute schema.

use chrono::{DateTime, Utc};

use super::request::{Polygon, TimeInterval};
use super::validator::{AttributeFilter, ValidationError};
use crate::storage::data::GeoPoint;
use crate::storage::store::SqlParam;

pub const TAUTOLOGY: &str = "TRUE";

/// Spatial reference system of every geometry (WGS84)
pub const SRID: u32 = 4326;

const OBS_TIME_COLUMN: &str = "observation.obstime_instant";
const POINT_COLUMN: &str = "geo_point.point";

/// Positional parameters of a statement under construction
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParamList {
    values: Vec<SqlParam>,
}

impl ParamList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a value and returns its placeholder (`$1`, `$2`, ...)
    pub fn push(&mut self, value: SqlParam) -> String {
        self.values.push(value);
        format!("${}", self.values.len())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn into_vec(self) -> Vec<SqlParam> {
        self.values
    }
}

/// Restricts observation time to the requested interval and, unconditionally, to
/// the valid time window `[window.0, window.1]`.
pub fn time_filter(
    interval: Option<&TimeInterval>,
    window: (DateTime<Utc>, DateTime<Utc>),
    params: &mut ParamList,
) -> String {
    let mut conds = Vec::new();
    if let Some(interval) = interval {
        if let Some(start) = interval.start {
            let ph = params.push(SqlParam::Timestamp(start));
            conds.push(format!("{} >= {}", OBS_TIME_COLUMN, ph));
        }
        if let Some(end) = interval.end {
            let ph = params.push(SqlParam::Timestamp(end));
            conds.push(format!("{} < {}", OBS_TIME_COLUMN, ph));
        }
    }
    let requested = if conds.is_empty() {
        TAUTOLOGY.to_string()
    } else {
        format!("({})", conds.join(" AND "))
    };

    let lo = params.push(SqlParam::Timestamp(window.0));
    let hi = params.push(SqlParam::Timestamp(window.1));
    format!(
        "{} AND ({} >= {}) AND ({} <= {})",
        requested, OBS_TIME_COLUMN, lo, OBS_TIME_COLUMN, hi
    )
}

/// Appends the first vertex if the ring is not already closed
pub fn close_ring(points: &[GeoPoint]) -> Vec<GeoPoint> {
    let mut ring = points.to_vec();
    if let (Some(first), Some(last)) = (points.first(), points.last()) {
        if first != last {
            ring.push(*first);
        }
    }
    ring
}

/// WKT literal for a closed ring: `POLYGON((lon lat,lon lat,...))`
pub fn polygon_wkt(ring: &[GeoPoint]) -> String {
    let coords = ring
        .iter()
        .map(|p| format!("{} {}", p.lon, p.lat))
        .collect::<Vec<_>>()
        .join(",");
    format!("POLYGON(({}))", coords)
}

/// Keeps observations whose point lies inside the polygon (geography distance 0)
pub fn geo_filter(inside: Option<&Polygon>, params: &mut ParamList) -> Result<String, ValidationError> {
    let Some(polygon) = inside else {
        return Ok(TAUTOLOGY.to_string());
    };

    let ring = close_ring(&polygon.points);
    if ring.len() < 4 {
        return Err(ValidationError::PolygonTooSmall { actual: ring.len() });
    }

    let ph = params.push(SqlParam::Text(polygon_wkt(&ring)));
    Ok(format!(
        "ST_DWithin({}, ST_GeomFromText({}, {})::geography, 0.0)",
        POINT_COLUMN, ph, SRID
    ))
}

/// Translates a wildcard pattern into a LIKE pattern (`*` becomes `%`)
pub fn to_like_pattern(pattern: &str) -> String {
    pattern.replace('*', "%")
}

/// `(a ILIKE p1 OR a ILIKE p2 ...) AND (b ILIKE q1 ...)`. Attributes without
/// patterns do not restrict anything.
pub fn pattern_filter(filters: &[AttributeFilter], params: &mut ParamList) -> String {
    let mut conjuncts = Vec::new();

    for filter in filters.iter().filter(|f| !f.patterns.is_empty()) {
        let column = filter.attr.column();
        let disjuncts: Vec<String> = filter
            .patterns
            .iter()
            .map(|pattern| {
                let ph = params.push(SqlParam::Text(to_like_pattern(pattern)));
                format!("({} ILIKE {})", column, ph)
            })
            .collect();
        conjuncts.push(format!("({})", disjuncts.join(" OR ")));
    }

    if conjuncts.is_empty() {
        TAUTOLOGY.to_string()
    } else {
        format!("({})", conjuncts.join(" AND "))
    }
}
