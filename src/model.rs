/// Core data types for the weather monitoring service.
///
/// Canonical station/reading model shared by both providers, the
/// availability log, and the error taxonomy. No I/O lives here.

use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Providers
// ---------------------------------------------------------------------------

/// The closed set of upstream weather providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    /// Single-station current-weather endpoint.
    OpenWeather,
    /// Public multi-station data inside a bounding box.
    Netatmo,
}

impl ProviderKind {
    /// The `source` tag stored on every station row.
    pub fn source(&self) -> &'static str {
        match self {
            ProviderKind::OpenWeather => "openweather",
            ProviderKind::Netatmo => "netatmo",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.source())
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "openweather" => Ok(ProviderKind::OpenWeather),
            "netatmo" => Ok(ProviderKind::Netatmo),
            other => Err(format!("unknown provider source: {}", other)),
        }
    }
}

/// Geographic parameters for one fetch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FetchParams {
    /// Single coordinate (OpenWeather).
    Point { lat: f64, lon: f64 },
    /// North-east / south-west corners (Netatmo).
    BoundingBox {
        lat_ne: f64,
        lon_ne: f64,
        lat_sw: f64,
        lon_sw: f64,
    },
}

// ---------------------------------------------------------------------------
// Stations and readings
// ---------------------------------------------------------------------------

/// Station identity and attributes as mapped from a provider payload.
///
/// `(source, source_id)` is the logical key; everything else is an
/// attribute that may drift between sightings.
#[derive(Debug, Clone, PartialEq)]
pub struct StationIdentity {
    pub name: String,
    pub source: ProviderKind,
    pub source_id: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub city: Option<String>,
    pub locality: Option<String>,
}

/// A persisted weather station.
#[derive(Debug, Clone, PartialEq)]
pub struct Station {
    pub id: i64,
    pub name: String,
    pub source: ProviderKind,
    pub source_id: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub city: Option<String>,
    pub locality: Option<String>,
}

/// One normalized observation, not yet tied to a station row.
#[derive(Debug, Clone, PartialEq)]
pub struct NewReading {
    pub temperature: f64,
    pub feels_like: Option<f64>,
    pub humidity: Option<i32>,
    pub pressure: Option<f64>,
    /// Provider observation time, never ingestion time.
    pub timestamp: DateTime<Utc>,
}

/// A persisted reading.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub id: i64,
    pub station_id: i64,
    pub temperature: f64,
    pub feels_like: Option<f64>,
    pub humidity: Option<i32>,
    pub pressure: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

/// Everything one unit of work needs after mapping: who reported, and what.
#[derive(Debug, Clone, PartialEq)]
pub struct MappedUnit {
    pub station: StationIdentity,
    pub reading: NewReading,
}

// ---------------------------------------------------------------------------
// Availability log
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AvailabilityStatus {
    Up,
    Down,
}

impl AvailabilityStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AvailabilityStatus::Up => "up",
            AvailabilityStatus::Down => "down",
        }
    }
}

impl fmt::Display for AvailabilityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AvailabilityStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "up" => Ok(AvailabilityStatus::Up),
            "down" => Ok(AvailabilityStatus::Down),
            other => Err(format!("unknown availability status: {}", other)),
        }
    }
}

/// One row of the append-only availability log.
#[derive(Debug, Clone, PartialEq)]
pub struct AvailabilitySample {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub status: AvailabilityStatus,
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// The provider could not be reached, or answered with something unusable.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Non-2xx HTTP response.
    #[error("HTTP error {status}: {body}")]
    Status { status: u16, body: String },
    /// Connection, TLS or timeout failure before a response arrived.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    /// The body arrived but is not valid JSON.
    #[error("undecodable response body: {0}")]
    Decode(#[from] serde_json::Error),
    /// The caller passed parameters the provider cannot use.
    #[error("invalid fetch parameters: {0}")]
    InvalidParams(String),
}

/// A payload does not fit the expected schema.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid value for field `{field}`")]
pub struct MappingError {
    pub field: &'static str,
}

impl MappingError {
    pub fn new(field: &'static str) -> Self {
        Self { field }
    }
}

/// A write or read against the store failed.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("database error: {0}")]
    Database(#[from] postgres::Error),
    #[error("store lock poisoned")]
    Poisoned,
    #[error("station {0} does not exist")]
    StationNotFound(i64),
    #[error("corrupt row: {0}")]
    CorruptRow(String),
}

/// Connectivity failure against the monitored datastore.
///
/// Never leaves the prober; it is always downgraded to a `down` sample.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("invalid connection settings: {0}")]
    Config(String),
    #[error("connection failed: {0}")]
    Connect(#[source] postgres::Error),
    #[error("close failed: {0}")]
    Close(#[source] postgres::Error),
}

/// Why one unit of a batch failed.
#[derive(Debug, Error)]
pub enum UnitError {
    #[error(transparent)]
    Mapping(#[from] MappingError),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
    #[error("unit aborted before completing")]
    Aborted,
}

/// User-facing classification of a failed upstream fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchFailure {
    Unauthorized,
    NoData,
    UpstreamInternal,
    Unexpected,
}

impl FetchFailure {
    /// Classify by HTTP status; anything without a status is unexpected.
    pub fn classify(err: &FetchError) -> Self {
        match err {
            FetchError::Status { status: 403, .. } => FetchFailure::Unauthorized,
            FetchError::Status { status: 404, .. } => FetchFailure::NoData,
            FetchError::Status { status: 500, .. } => FetchFailure::UpstreamInternal,
            _ => FetchFailure::Unexpected,
        }
    }
}

impl fmt::Display for FetchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchFailure::Unauthorized => write!(f, "Unauthorized"),
            FetchFailure::NoData => write!(f, "No data found"),
            FetchFailure::UpstreamInternal => write!(f, "Internal server error"),
            FetchFailure::Unexpected => write!(f, "Unexpected error"),
        }
    }
}
