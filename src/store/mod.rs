/// Persistence for stations, readings and availability samples.
///
/// - `pg`       — `PgStore`, the production PostgreSQL backend
/// - `memory`   — `MemoryStore`, in-process backend for tests and dry runs
///
/// The ingestion core only talks to `WeatherStore`. Implementations must
/// make `upsert_station` atomic: two concurrent calls with the same
/// `(source, source_id)` end up with one row.

pub mod memory;
pub mod pg;

pub use memory::MemoryStore;
pub use pg::PgStore;

use chrono::{DateTime, Utc};

use crate::model::{
    AvailabilitySample, AvailabilityStatus, NewReading, PersistenceError, Reading, Station,
    StationIdentity,
};

/// Outcome of an atomic find-or-create on `(source, source_id)`.
#[derive(Debug, Clone, PartialEq)]
pub struct UpsertedStation {
    pub station: Station,
    /// `true` when this call inserted the row.
    pub created: bool,
}

pub trait WeatherStore: Send + Sync {
    /// Find-or-create by `(source, source_id)`, patching mutable attributes
    /// of an existing row.
    fn upsert_station(&self, identity: &StationIdentity) -> Result<UpsertedStation, PersistenceError>;

    fn insert_reading(&self, station_id: i64, reading: &NewReading) -> Result<Reading, PersistenceError>;

    fn record_availability(
        &self,
        status: AvailabilityStatus,
        at: DateTime<Utc>,
    ) -> Result<AvailabilitySample, PersistenceError>;

    fn list_stations(&self) -> Result<Vec<Station>, PersistenceError>;

    fn station(&self, id: i64) -> Result<Option<Station>, PersistenceError>;

    /// Readings observed at or after `since`, oldest first.
    fn readings_since(&self, station_id: i64, since: DateTime<Utc>) -> Result<Vec<Reading>, PersistenceError>;

    /// Up to `limit` readings, newest first.
    fn latest_readings(&self, station_id: i64, limit: usize) -> Result<Vec<Reading>, PersistenceError>;

    /// Samples recorded at or after `since`, oldest first.
    fn availability_since(&self, since: DateTime<Utc>) -> Result<Vec<AvailabilitySample>, PersistenceError>;
}
