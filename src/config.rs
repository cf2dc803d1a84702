//! Process configuration, resolved once at startup from the environment.

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use serde::Deserialize;
use sqlx::postgres::PgConnectOptions;
use std::net::SocketAddr;
use std::str::FromStr;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load settings: {0}")]
    Load(#[from] ::config::ConfigError),
    #[error("Invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },
}

const DEFAULT_LO_TIME_SECS: i64 = 86400;
// upper bound lies two seconds past now
const DEFAULT_HI_TIME_SECS: i64 = -2;

/// Time range outside of which observations are never returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidTimeWindow {
    /// `[now - lo_offset, now - hi_offset]`
    Dynamic { lo_offset: Duration, hi_offset: Duration },
    /// `[lo, hi]`
    Static { lo: DateTime<Utc>, hi: DateTime<Utc> },
}

impl ValidTimeWindow {
    /// Lower and upper bound (both inclusive) as seen at `now`. Bounds past the
    /// representable range saturate.
    pub fn bounds(&self, now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        match *self {
            ValidTimeWindow::Dynamic { lo_offset, hi_offset } => {
                (shift_back(now, lo_offset), shift_back(now, hi_offset))
            }
            ValidTimeWindow::Static { lo, hi } => (lo, hi),
        }
    }

    fn from_raw(raw: &RawSettings) -> Self {
        let dynamic = raw
            .dynamictime
            .as_deref()
            .map(|v| !matches!(v.to_lowercase().as_str(), "false" | "no" | "0"))
            .unwrap_or(true);
        let one_sec = Duration::seconds(1);

        if dynamic {
            let lo = offset_setting(raw.lotime.as_deref(), "LOTIME", DEFAULT_LO_TIME_SECS);
            let mut hi = offset_setting(raw.hitime.as_deref(), "HITIME", DEFAULT_HI_TIME_SECS);
            if hi >= lo {
                warn!(lo = lo.num_seconds(), hi = hi.num_seconds(), "HITIME offset not below LOTIME offset; using LOTIME - 1");
                hi = lo.checked_sub(&one_sec).unwrap_or(lo);
            }
            ValidTimeWindow::Dynamic {
                lo_offset: lo,
                hi_offset: hi,
            }
        } else {
            let lo = instant_setting(raw.lotime.as_deref(), "LOTIME", DEFAULT_LO_TIME_SECS);
            let mut hi = instant_setting(raw.hitime.as_deref(), "HITIME", DEFAULT_HI_TIME_SECS);
            if hi <= lo {
                warn!(lo = %lo, hi = %hi, "HITIME not above LOTIME; using LOTIME + 1");
                hi = lo.checked_add_signed(one_sec).unwrap_or(lo);
            }
            ValidTimeWindow::Static { lo, hi }
        }
    }
}

impl Default for ValidTimeWindow {
    fn default() -> Self {
        ValidTimeWindow::Dynamic {
            lo_offset: Duration::seconds(DEFAULT_LO_TIME_SECS),
            hi_offset: Duration::seconds(DEFAULT_HI_TIME_SECS),
        }
    }
}

fn shift_back(now: DateTime<Utc>, offset: Duration) -> DateTime<Utc> {
    match now.checked_sub_signed(offset) {
        Some(t) => t,
        None if offset > Duration::zero() => DateTime::<Utc>::MIN_UTC,
        None => DateTime::<Utc>::MAX_UTC,
    }
}

/// Reads integer seconds, or (when allowed) a `YYYY-MM-DDThh:mm:ssZ` datetime.
/// Unparseable values fall back to the default.
fn secs_setting(raw: Option<&str>, name: &'static str, default: i64, allow_datetime: bool) -> i64 {
    let Some(raw) = raw else {
        return default;
    };
    if let Ok(secs) = raw.parse::<i64>() {
        return secs;
    }
    if allow_datetime {
        if let Ok(t) = NaiveDateTime::parse_from_str(&raw.to_uppercase(), "%Y-%m-%dT%H:%M:%SZ") {
            return t.and_utc().timestamp();
        }
    }
    warn!(name, value = %raw, default, "Unparseable time setting; falling back to default");
    default
}

fn offset_setting(raw: Option<&str>, name: &'static str, default: i64) -> Duration {
    let secs = secs_setting(raw, name, default, false);
    Duration::try_seconds(secs).unwrap_or_else(|| {
        warn!(name, secs, default, "Time offset out of range; falling back to default");
        Duration::seconds(default)
    })
}

fn instant_setting(raw: Option<&str>, name: &'static str, default: i64) -> DateTime<Utc> {
    let secs = secs_setting(raw, name, default, true);
    DateTime::from_timestamp(secs, 0).unwrap_or_else(|| {
        warn!(name, secs, default, "Time setting out of range; falling back to default");
        DateTime::from_timestamp(default, 0).unwrap_or_default()
    })
}

/// Environment variables as collected by the settings loader, keyed by their
/// lowercased names
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawSettings {
    pub database_url: Option<String>,
    pub pghost: Option<String>,
    pub pgport: Option<String>,
    pub pguser: Option<String>,
    pub pgpassword: Option<String>,
    pub pgdbname: Option<String>,
    pub pg_max_connections: Option<String>,
    pub metrics_addr: Option<String>,
    pub dynamictime: Option<String>,
    pub lotime: Option<String>,
    pub hitime: Option<String>,
}

impl RawSettings {
    pub fn from_env() -> Result<Self, ConfigError> {
        let settings = ::config::Config::builder()
            .add_source(::config::Environment::default())
            .build()?
            .try_deserialize()?;
        Ok(settings)
    }

    /// Blank values count as unset
    fn non_blank(self) -> Self {
        let clean = |v: Option<String>| v.map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        Self {
            database_url: clean(self.database_url),
            pghost: clean(self.pghost),
            pgport: clean(self.pgport),
            pguser: clean(self.pguser),
            pgpassword: clean(self.pgpassword),
            pgdbname: clean(self.pgdbname),
            pg_max_connections: clean(self.pg_max_connections),
            metrics_addr: clean(self.metrics_addr),
            dynamictime: clean(self.dynamictime),
            lotime: clean(self.lotime),
            hitime: clean(self.hitime),
        }
    }
}

/// Configuration for the query service
#[derive(Debug, Clone)]
pub struct Config {
    pub connect_options: PgConnectOptions,
    pub max_connections: u32,
    /// Prometheus exporter address, if metrics are enabled
    pub metrics_addr: Option<SocketAddr>,
    pub valid_time: ValidTimeWindow,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_raw(RawSettings::from_env()?)
    }

    pub fn from_raw(raw: RawSettings) -> Result<Self, ConfigError> {
        let raw = raw.non_blank();

        let connect_options = match &raw.database_url {
            Some(url) => PgConnectOptions::from_str(url).map_err(|_| ConfigError::InvalidValue {
                name: "DATABASE_URL",
                value: "<redacted>".to_string(),
            })?,
            None => {
                let port = match &raw.pgport {
                    Some(v) => v.parse().map_err(|_| ConfigError::InvalidValue {
                        name: "PGPORT",
                        value: v.clone(),
                    })?,
                    None => 5432,
                };
                let options = PgConnectOptions::new_without_pgpass()
                    .host(raw.pghost.as_deref().unwrap_or("localhost"))
                    .port(port)
                    .username(raw.pguser.as_deref().unwrap_or("postgres"))
                    .database(raw.pgdbname.as_deref().unwrap_or("data"));
                match &raw.pgpassword {
                    Some(password) => options.password(password),
                    None => options,
                }
            }
        };

        let max_connections = match &raw.pg_max_connections {
            Some(v) => v.parse().map_err(|_| ConfigError::InvalidValue {
                name: "PG_MAX_CONNECTIONS",
                value: v.clone(),
            })?,
            None => 10,
        };

        let metrics_addr = match &raw.metrics_addr {
            Some(v) => Some(v.parse().map_err(|_| ConfigError::InvalidValue {
                name: "METRICS_ADDR",
                value: v.clone(),
            })?),
            None => None,
        };

        Ok(Self {
            connect_options,
            max_connections,
            metrics_addr,
            valid_time: ValidTimeWindow::from_raw(&raw),
        })
    }
}
