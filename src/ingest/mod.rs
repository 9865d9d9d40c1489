/// Provider clients and schema mapping.
///
/// - `client`      — `WeatherProvider` capability, shared HTTP plumbing
/// - `openweather` — single-station current weather (point query)
/// - `netatmo`     — public multi-station data (bounding-box query)
/// - `mapper`      — canonical fields, path extraction, typed conversion
/// - `path`        — dotted/indexed JSON paths

pub mod client;
pub mod mapper;
pub mod netatmo;
pub mod openweather;
pub mod path;

#[cfg(test)]
pub(crate) mod fixtures;

use serde_json::Value;

use crate::model::{MappedUnit, MappingError, ProviderKind};

/// Splits one provider payload into the per-station payloads it contains.
///
/// OpenWeather payloads are always exactly one unit.
pub fn split_units(kind: ProviderKind, payload: &Value) -> Result<Vec<&Value>, MappingError> {
    match kind {
        ProviderKind::OpenWeather => Ok(vec![payload]),
        ProviderKind::Netatmo => Ok(netatmo::station_entries(payload)?.iter().collect()),
    }
}

/// Maps one unit payload with the provider's schema.
pub fn map_unit(kind: ProviderKind, unit: &Value) -> Result<MappedUnit, MappingError> {
    match kind {
        ProviderKind::OpenWeather => openweather::map_payload(unit),
        ProviderKind::Netatmo => netatmo::map_station(unit),
    }
}
