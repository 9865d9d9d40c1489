/// Station resolution: find-or-create on `(source, source_id)`.
///
/// A station is keyed by provider and provider id only. Names, coordinates
/// and addresses drift between sightings, so a repeated sighting patches
/// the stored attributes instead of creating a second station.

use crate::logging::{self, DataSource};
use crate::model::{PersistenceError, Station, StationIdentity};
use crate::store::WeatherStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Created,
    Matched,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedStation {
    pub station: Station,
    pub resolution: Resolution,
}

/// Returns the station for `identity`, creating it on first sighting.
pub fn resolve_station<S>(store: &S, identity: &StationIdentity) -> Result<ResolvedStation, PersistenceError>
where
    S: WeatherStore + ?Sized,
{
    let upserted = store.upsert_station(identity)?;
    let source = DataSource::from(identity.source);

    let resolution = if upserted.created {
        logging::info(
            source,
            Some(&identity.source_id),
            &format!("New station '{}' (id {})", upserted.station.name, upserted.station.id),
        );
        Resolution::Created
    } else {
        logging::debug(
            source,
            Some(&identity.source_id),
            &format!("Matched station id {}", upserted.station.id),
        );
        Resolution::Matched
    };

    Ok(ResolvedStation { station: upserted.station, resolution })
}

/// Patches `stored` with a later sighting. Returns whether anything changed.
///
/// Non-empty names replace the stored name; present attributes replace
/// stored ones; absent attributes leave stored values alone. Identity
/// fields are never touched.
pub fn apply_sighting(stored: &mut Station, seen: &StationIdentity) -> bool {
    let before = stored.clone();

    if !seen.name.is_empty() {
        stored.name = seen.name.clone();
    }
    if seen.latitude.is_some() {
        stored.latitude = seen.latitude;
    }
    if seen.longitude.is_some() {
        stored.longitude = seen.longitude;
    }
    if seen.city.is_some() {
        stored.city = seen.city.clone();
    }
    if seen.locality.is_some() {
        stored.locality = seen.locality.clone();
    }

    *stored != before
}
