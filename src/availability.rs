/// Availability prober for the monitored PostgreSQL instance.
///
/// A probe opens a fresh connection with the configured credentials and
/// closes it again. Any failure along the way counts as `down`. Every
/// probe appends exactly one sample and never returns an error.

use std::time::Duration;

use chrono::Utc;
use postgres::NoTls;

use crate::config::MonitoredDatabase;
use crate::logging::{self, DataSource};
use crate::model::{AvailabilityStatus, ProbeError};
use crate::store::WeatherStore;

pub struct AvailabilityProber {
    target: MonitoredDatabase,
}

impl AvailabilityProber {
    pub fn new(target: MonitoredDatabase) -> Self {
        Self { target }
    }

    fn connection_config(&self) -> Result<postgres::Config, ProbeError> {
        if self.target.host.trim().is_empty() {
            return Err(ProbeError::Config("host is empty".to_string()));
        }

        let mut config = postgres::Config::new();
        config
            .host(&self.target.host)
            .port(self.target.port)
            .user(&self.target.user)
            .password(&self.target.password)
            .dbname(&self.target.dbname)
            .connect_timeout(Duration::from_secs(self.target.connect_timeout_secs));
        Ok(config)
    }

    /// Connect-then-close against the target. Records nothing.
    pub fn check(&self) -> Result<(), ProbeError> {
        let client = self
            .connection_config()?
            .connect(NoTls)
            .map_err(ProbeError::Connect)?;
        client.close().map_err(ProbeError::Close)
    }

    /// Runs `check` and appends the observed status to `store`.
    ///
    /// A failed append is logged; the observed status is still returned.
    pub fn probe<S>(&self, store: &S) -> AvailabilityStatus
    where
        S: WeatherStore + ?Sized,
    {
        let status = match self.check() {
            Ok(()) => AvailabilityStatus::Up,
            Err(e) => {
                logging::warn(
                    DataSource::Monitor,
                    Some(&self.target.host),
                    &format!("Database unreachable: {}", e),
                );
                AvailabilityStatus::Down
            }
        };

        if let Err(e) = store.record_availability(status, Utc::now()) {
            logging::error(
                DataSource::Database,
                None,
                &format!("Failed to record availability sample ({}): {}", status, e),
            );
        } else {
            logging::debug(DataSource::Monitor, Some(&self.target.host), &format!("Status {}", status));
        }

        status
    }
}
