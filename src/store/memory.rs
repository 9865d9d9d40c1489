/// In-process store.
///
/// Same semantics as `PgStore`, including the attribute patching done on
/// a repeated sighting. Used by tests and by `--dry-run`.

use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};

use crate::model::{
    AvailabilitySample, AvailabilityStatus, NewReading, PersistenceError, Reading, Station,
    StationIdentity,
};
use crate::resolver::apply_sighting;
use crate::store::{UpsertedStation, WeatherStore};

#[derive(Debug, Default)]
struct Tables {
    stations: Vec<Station>,
    readings: Vec<Reading>,
    samples: Vec<AvailabilitySample>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>, PersistenceError> {
        self.tables.lock().map_err(|_| PersistenceError::Poisoned)
    }

    pub fn station_count(&self) -> usize {
        self.lock().map(|t| t.stations.len()).unwrap_or(0)
    }

    pub fn reading_count(&self) -> usize {
        self.lock().map(|t| t.readings.len()).unwrap_or(0)
    }

    pub fn sample_count(&self) -> usize {
        self.lock().map(|t| t.samples.len()).unwrap_or(0)
    }
}

fn next_id(len: usize) -> i64 {
    i64::try_from(len).unwrap_or(i64::MAX - 1) + 1
}

impl WeatherStore for MemoryStore {
    fn upsert_station(&self, identity: &StationIdentity) -> Result<UpsertedStation, PersistenceError> {
        let mut tables = self.lock()?;

        if let Some(existing) = tables
            .stations
            .iter_mut()
            .find(|s| s.source == identity.source && s.source_id == identity.source_id)
        {
            apply_sighting(existing, identity);
            return Ok(UpsertedStation { station: existing.clone(), created: false });
        }

        let station = Station {
            id: next_id(tables.stations.len()),
            name: identity.name.clone(),
            source: identity.source,
            source_id: identity.source_id.clone(),
            latitude: identity.latitude,
            longitude: identity.longitude,
            city: identity.city.clone(),
            locality: identity.locality.clone(),
        };
        tables.stations.push(station.clone());
        Ok(UpsertedStation { station, created: true })
    }

    fn insert_reading(&self, station_id: i64, reading: &NewReading) -> Result<Reading, PersistenceError> {
        let mut tables = self.lock()?;
        if !tables.stations.iter().any(|s| s.id == station_id) {
            return Err(PersistenceError::StationNotFound(station_id));
        }

        let row = Reading {
            id: next_id(tables.readings.len()),
            station_id,
            temperature: reading.temperature,
            feels_like: reading.feels_like,
            humidity: reading.humidity,
            pressure: reading.pressure,
            timestamp: reading.timestamp,
        };
        tables.readings.push(row.clone());
        Ok(row)
    }

    fn record_availability(
        &self,
        status: AvailabilityStatus,
        at: DateTime<Utc>,
    ) -> Result<AvailabilitySample, PersistenceError> {
        let mut tables = self.lock()?;
        let sample = AvailabilitySample {
            id: next_id(tables.samples.len()),
            timestamp: at,
            status,
        };
        tables.samples.push(sample.clone());
        Ok(sample)
    }

    fn list_stations(&self) -> Result<Vec<Station>, PersistenceError> {
        Ok(self.lock()?.stations.clone())
    }

    fn station(&self, id: i64) -> Result<Option<Station>, PersistenceError> {
        Ok(self.lock()?.stations.iter().find(|s| s.id == id).cloned())
    }

    fn readings_since(&self, station_id: i64, since: DateTime<Utc>) -> Result<Vec<Reading>, PersistenceError> {
        let mut rows: Vec<Reading> = self
            .lock()?
            .readings
            .iter()
            .filter(|r| r.station_id == station_id && r.timestamp >= since)
            .cloned()
            .collect();
        rows.sort_by_key(|r| (r.timestamp, r.id));
        Ok(rows)
    }

    fn latest_readings(&self, station_id: i64, limit: usize) -> Result<Vec<Reading>, PersistenceError> {
        let mut rows: Vec<Reading> = self
            .lock()?
            .readings
            .iter()
            .filter(|r| r.station_id == station_id)
            .cloned()
            .collect();
        rows.sort_by_key(|r| std::cmp::Reverse((r.timestamp, r.id)));
        rows.truncate(limit);
        Ok(rows)
    }

    fn availability_since(&self, since: DateTime<Utc>) -> Result<Vec<AvailabilitySample>, PersistenceError> {
        let mut rows: Vec<AvailabilitySample> = self
            .lock()?
            .samples
            .iter()
            .filter(|s| s.timestamp >= since)
            .cloned()
            .collect();
        rows.sort_by_key(|s| (s.timestamp, s.id));
        Ok(rows)
    }
}
