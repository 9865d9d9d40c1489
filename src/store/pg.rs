/// PostgreSQL backend.
///
/// One connection behind a mutex; statements are serialized. Station
/// find-or-create is a single `INSERT ... ON CONFLICT` so concurrent units
/// never race each other into duplicate rows.

use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use postgres::{Client, NoTls, Row};

use crate::logging::{self, DataSource};
use crate::model::{
    AvailabilitySample, AvailabilityStatus, NewReading, PersistenceError, ProviderKind, Reading,
    Station, StationIdentity,
};
use crate::store::{UpsertedStation, WeatherStore};

const SCHEMA: &str = include_str!("../../sql/001_weather_monitoring.sql");

const STATION_COLUMNS: &str = "id, name, source, source_id, latitude, longitude, city, locality";
const READING_COLUMNS: &str =
    "id, station_id, temperature, feels_like, humidity, pressure, observed_at";

// Empty names and absent attributes never overwrite stored values.
const UPSERT_STATION: &str = "
    INSERT INTO weather_stations (name, source, source_id, latitude, longitude, city, locality)
    VALUES ($1, $2, $3, $4, $5, $6, $7)
    ON CONFLICT (source, source_id) DO UPDATE SET
        name       = CASE WHEN EXCLUDED.name <> '' THEN EXCLUDED.name
                          ELSE weather_stations.name END,
        latitude   = COALESCE(EXCLUDED.latitude, weather_stations.latitude),
        longitude  = COALESCE(EXCLUDED.longitude, weather_stations.longitude),
        city       = COALESCE(EXCLUDED.city, weather_stations.city),
        locality   = COALESCE(EXCLUDED.locality, weather_stations.locality),
        updated_at = now()
    RETURNING id, name, source, source_id, latitude, longitude, city, locality,
              (xmax = 0) AS created
";

pub struct PgStore {
    client: Mutex<Client>,
}

impl PgStore {
    pub fn connect(url: &str) -> Result<Self, PersistenceError> {
        let client = Client::connect(url, NoTls)?;
        logging::debug(DataSource::Database, None, "Connected to storage database");
        Ok(Self::from_client(client))
    }

    pub fn from_client(client: Client) -> Self {
        Self { client: Mutex::new(client) }
    }

    /// Creates tables and indexes if missing.
    pub fn migrate(&self) -> Result<(), PersistenceError> {
        self.lock()?.batch_execute(SCHEMA)?;
        logging::info(DataSource::Database, None, "Schema is up to date");
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Client>, PersistenceError> {
        self.client.lock().map_err(|_| PersistenceError::Poisoned)
    }
}

fn station_from_row(row: &Row) -> Result<Station, PersistenceError> {
    let source: String = row.get(2);
    let source = source
        .parse::<ProviderKind>()
        .map_err(PersistenceError::CorruptRow)?;

    Ok(Station {
        id: row.get(0),
        name: row.get(1),
        source,
        source_id: row.get(3),
        latitude: row.get(4),
        longitude: row.get(5),
        city: row.get(6),
        locality: row.get(7),
    })
}

fn reading_from_row(row: &Row) -> Reading {
    Reading {
        id: row.get(0),
        station_id: row.get(1),
        temperature: row.get(2),
        feels_like: row.get(3),
        humidity: row.get(4),
        pressure: row.get(5),
        timestamp: row.get(6),
    }
}

fn sample_from_row(row: &Row) -> Result<AvailabilitySample, PersistenceError> {
    let status: String = row.get(2);
    Ok(AvailabilitySample {
        id: row.get(0),
        timestamp: row.get(1),
        status: status.parse().map_err(PersistenceError::CorruptRow)?,
    })
}

impl WeatherStore for PgStore {
    fn upsert_station(&self, identity: &StationIdentity) -> Result<UpsertedStation, PersistenceError> {
        let row = self.lock()?.query_one(
            UPSERT_STATION,
            &[
                &identity.name,
                &identity.source.source(),
                &identity.source_id,
                &identity.latitude,
                &identity.longitude,
                &identity.city,
                &identity.locality,
            ],
        )?;

        Ok(UpsertedStation {
            station: station_from_row(&row)?,
            created: row.get(8),
        })
    }

    fn insert_reading(&self, station_id: i64, reading: &NewReading) -> Result<Reading, PersistenceError> {
        let query = format!(
            "INSERT INTO weather_readings
                 (station_id, temperature, feels_like, humidity, pressure, observed_at)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {}",
            READING_COLUMNS
        );

        let row = self.lock()?.query_one(
            query.as_str(),
            &[
                &station_id,
                &reading.temperature,
                &reading.feels_like,
                &reading.humidity,
                &reading.pressure,
                &reading.timestamp,
            ],
        )?;

        Ok(reading_from_row(&row))
    }

    fn record_availability(
        &self,
        status: AvailabilityStatus,
        at: DateTime<Utc>,
    ) -> Result<AvailabilitySample, PersistenceError> {
        let row = self.lock()?.query_one(
            "INSERT INTO availability_samples (recorded_at, status)
             VALUES ($1, $2)
             RETURNING id, recorded_at, status",
            &[&at, &status.as_str()],
        )?;

        sample_from_row(&row)
    }

    fn list_stations(&self) -> Result<Vec<Station>, PersistenceError> {
        let query = format!("SELECT {} FROM weather_stations ORDER BY id", STATION_COLUMNS);
        let rows = self.lock()?.query(query.as_str(), &[])?;
        rows.iter().map(station_from_row).collect()
    }

    fn station(&self, id: i64) -> Result<Option<Station>, PersistenceError> {
        let query = format!("SELECT {} FROM weather_stations WHERE id = $1", STATION_COLUMNS);
        let row = self.lock()?.query_opt(query.as_str(), &[&id])?;
        row.as_ref().map(station_from_row).transpose()
    }

    fn readings_since(&self, station_id: i64, since: DateTime<Utc>) -> Result<Vec<Reading>, PersistenceError> {
        let query = format!(
            "SELECT {} FROM weather_readings
             WHERE station_id = $1 AND observed_at >= $2
             ORDER BY observed_at ASC, id ASC",
            READING_COLUMNS
        );
        let rows = self.lock()?.query(query.as_str(), &[&station_id, &since])?;
        Ok(rows.iter().map(reading_from_row).collect())
    }

    fn latest_readings(&self, station_id: i64, limit: usize) -> Result<Vec<Reading>, PersistenceError> {
        let query = format!(
            "SELECT {} FROM weather_readings
             WHERE station_id = $1
             ORDER BY observed_at DESC, id DESC
             LIMIT $2",
            READING_COLUMNS
        );
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = self.lock()?.query(query.as_str(), &[&station_id, &limit])?;
        Ok(rows.iter().map(reading_from_row).collect())
    }

    fn availability_since(&self, since: DateTime<Utc>) -> Result<Vec<AvailabilitySample>, PersistenceError> {
        let rows = self.lock()?.query(
            "SELECT id, recorded_at, status FROM availability_samples
             WHERE recorded_at >= $1
             ORDER BY recorded_at ASC, id ASC",
            &[&since],
        )?;
        rows.iter().map(sample_from_row).collect()
    }
}
