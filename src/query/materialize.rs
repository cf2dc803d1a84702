//! Conversion of physical rows into domain records.

use std::collections::{BTreeMap, HashMap};

use crate::storage::data::{DataError, GeoPoint, Link, ObsMetadata, SeriesObservations, TsMetadata};
use crate::storage::schema::{ObsAttribute, TsAttribute};
use crate::storage::store::Row;

pub const TS_ID_COLUMN: &str = "ts_id";
pub const ID_COLUMN: &str = "id";
pub const OBSTIME_COLUMN: &str = "obstime_instant";
pub const PUBTIME_COLUMN: &str = "pubtime";
pub const VALUE_COLUMN: &str = "value";
pub const LON_COLUMN: &str = "lon";
pub const LAT_COLUMN: &str = "lat";

/// Parallel link arrays of `time_series`, in field order of [`Link`]
pub const LINK_COLUMNS: [&str; 5] = [
    "link_href",
    "link_rel",
    "link_type",
    "link_hreflang",
    "link_title",
];

/// Zips the parallel link arrays index-wise. Arrays of unequal length are fatal.
pub fn links_from_arrays(ts_id: i64, arrays: [&[String]; 5]) -> Result<Vec<Link>, DataError> {
    let [href, rel, link_type, hreflang, title] = arrays;
    let lengths = arrays.map(|a| a.len());
    if lengths.iter().any(|&len| len != lengths[0]) {
        return Err(DataError::LinkArrayMismatch { ts_id, lengths });
    }

    Ok((0..href.len())
        .map(|i| Link {
            href: href[i].clone(),
            rel: rel[i].clone(),
            link_type: link_type[i].clone(),
            hreflang: hreflang[i].clone(),
            title: title[i].clone(),
        })
        .collect())
}

/// Sets `attrs` on a fresh record from columns of the same names
pub fn series_attributes(row: &Row, attrs: &[TsAttribute]) -> Result<TsMetadata, DataError> {
    let mut ts = TsMetadata::default();
    for attr in attrs {
        attr.set(&mut ts, row.text(attr.name())?.to_string());
    }
    Ok(ts)
}

/// A full time series row: id, link arrays and every string attribute
pub fn series_from_row(row: &Row) -> Result<(i64, TsMetadata), DataError> {
    let ts_id = row.int(ID_COLUMN)?;
    let mut ts = series_attributes(row, &TsAttribute::ALL)?;
    ts.links = links_from_arrays(
        ts_id,
        [
            row.text_array(LINK_COLUMNS[0])?,
            row.text_array(LINK_COLUMNS[1])?,
            row.text_array(LINK_COLUMNS[2])?,
            row.text_array(LINK_COLUMNS[3])?,
            row.text_array(LINK_COLUMNS[4])?,
        ],
    )?;
    Ok((ts_id, ts))
}

/// An observation row, returned with the id of its owning series
pub fn observation_from_row(row: &Row) -> Result<(i64, ObsMetadata), DataError> {
    let ts_id = row.int(TS_ID_COLUMN)?;
    let mut obs = ObsMetadata::new(
        GeoPoint::new(row.float(LON_COLUMN)?, row.float(LAT_COLUMN)?),
        row.timestamp(OBSTIME_COLUMN)?,
        row.timestamp(PUBTIME_COLUMN)?,
        row.text(VALUE_COLUMN)?.to_string(),
    );
    for attr in ObsAttribute::ALL {
        attr.set(&mut obs, row.text(attr.name())?.to_string());
    }
    Ok((ts_id, obs))
}

/// Observations per series id
pub fn observations_by_series(rows: &[Row]) -> Result<BTreeMap<i64, Vec<ObsMetadata>>, DataError> {
    let mut by_series: BTreeMap<i64, Vec<ObsMetadata>> = BTreeMap::new();
    for row in rows {
        let (ts_id, obs) = observation_from_row(row)?;
        by_series.entry(ts_id).or_default().push(obs);
    }
    Ok(by_series)
}

/// Pairs every series' observations with its metadata
pub fn assemble_observations(
    by_series: BTreeMap<i64, Vec<ObsMetadata>>,
    mut series: HashMap<i64, TsMetadata>,
) -> Result<Vec<SeriesObservations>, DataError> {
    by_series
        .into_iter()
        .map(|(ts_id, obs_mdata)| {
            let ts_mdata = series
                .remove(&ts_id)
                .ok_or(DataError::MissingTimeSeries(ts_id))?;
            Ok(SeriesObservations { ts_mdata, obs_mdata })
        })
        .collect()
}
