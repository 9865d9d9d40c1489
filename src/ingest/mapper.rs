/// Provider-agnostic half of the schema mapper.
///
/// Each provider declares a `FieldMap` (canonical field → payload path).
/// `extract` resolves every path into a flat `FieldValues` map; the provider
/// module then post-processes that map and calls `into_unit` to produce the
/// typed `MappedUnit` handed to the station resolver.

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::ingest::path;
use crate::model::{MappedUnit, MappingError, NewReading, ProviderKind, StationIdentity};

// ---------------------------------------------------------------------------
// Canonical fields
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Field {
    Temperature,
    FeelsLike,
    Humidity,
    Pressure,
    Timestamp,
    Name,
    SourceId,
    Longitude,
    Latitude,
    City,
    Locality,
}

impl Field {
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Temperature => "temperature",
            Field::FeelsLike => "feels_like",
            Field::Humidity => "humidity",
            Field::Pressure => "pressure",
            Field::Timestamp => "timestamp",
            Field::Name => "name",
            Field::SourceId => "source_id",
            Field::Longitude => "longitude",
            Field::Latitude => "latitude",
            Field::City => "city",
            Field::Locality => "locality",
        }
    }

    /// Maps a provider measurement type name onto a reading field.
    pub fn from_measurement(name: &str) -> Option<Field> {
        match name {
            "temperature" => Some(Field::Temperature),
            "humidity" => Some(Field::Humidity),
            "pressure" => Some(Field::Pressure),
            _ => None,
        }
    }
}

/// Declarative path map for one provider.
pub type FieldMap = &'static [(Field, &'static str)];

/// Flat canonical field → raw value map. Absent fields are simply missing.
pub type FieldValues = BTreeMap<Field, Value>;

/// Resolves every path of `map` against `payload`.
pub fn extract(payload: &Value, map: FieldMap) -> FieldValues {
    map.iter()
        .filter_map(|(field, p)| path::resolve(payload, p).map(|v| (*field, v.clone())))
        .collect()
}

// ---------------------------------------------------------------------------
// Value coercion
// ---------------------------------------------------------------------------

/// Numeric value from a JSON number or a numeric string.
fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Converts an epoch value (seconds, fractional allowed) into UTC.
pub fn epoch_to_utc(value: &Value) -> Option<DateTime<Utc>> {
    let secs = as_number(value)?;
    if !secs.is_finite() {
        return None;
    }
    let whole = secs.floor();
    let nanos = ((secs - whole) * 1e9).round() as u32;
    DateTime::<Utc>::from_timestamp(whole as i64, nanos.min(999_999_999))
}

/// Parses the mandatory timestamp field.
pub fn require_timestamp(values: &FieldValues) -> Result<DateTime<Utc>, MappingError> {
    values
        .get(&Field::Timestamp)
        .and_then(epoch_to_utc)
        .ok_or(MappingError::new(Field::Timestamp.as_str()))
}

fn optional_number(values: &FieldValues, field: Field) -> Result<Option<f64>, MappingError> {
    match values.get(&field) {
        None => Ok(None),
        Some(v) => as_number(v)
            .map(Some)
            .ok_or(MappingError::new(field.as_str())),
    }
}

fn optional_text(values: &FieldValues, field: Field) -> Result<Option<String>, MappingError> {
    match values.get(&field) {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(_) => Err(MappingError::new(field.as_str())),
    }
}

/// Present and not blank.
fn required_text(values: &FieldValues, field: Field) -> Result<String, MappingError> {
    optional_text(values, field)?
        .filter(|s| !s.trim().is_empty())
        .ok_or(MappingError::new(field.as_str()))
}

// ---------------------------------------------------------------------------
// Typed conversion
// ---------------------------------------------------------------------------

/// Converts post-processed field values into a typed unit.
///
/// The timestamp is checked first so that a payload with no usable time is
/// always reported as a timestamp failure.
pub fn into_unit(values: &FieldValues, source: ProviderKind) -> Result<MappedUnit, MappingError> {
    let timestamp = require_timestamp(values)?;

    let temperature = optional_number(values, Field::Temperature)?
        .ok_or(MappingError::new(Field::Temperature.as_str()))?;
    let humidity = optional_number(values, Field::Humidity)?.map(|h| h.round() as i32);

    let reading = NewReading {
        temperature,
        feels_like: optional_number(values, Field::FeelsLike)?,
        humidity,
        pressure: optional_number(values, Field::Pressure)?,
        timestamp,
    };

    let station = StationIdentity {
        name: match source {
            ProviderKind::OpenWeather => required_text(values, Field::Name)?,
            // Netatmo names are derived from the address and may be empty.
            ProviderKind::Netatmo => optional_text(values, Field::Name)?.unwrap_or_default(),
        },
        source,
        source_id: required_text(values, Field::SourceId)?,
        latitude: optional_number(values, Field::Latitude)?,
        longitude: optional_number(values, Field::Longitude)?,
        city: optional_text(values, Field::City)?,
        locality: optional_text(values, Field::Locality)?,
    };

    Ok(MappedUnit { station, reading })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    const MAP: FieldMap = &[
        (Field::Temperature, "main.temp"),
        (Field::Timestamp, "dt"),
        (Field::Name, "name"),
        (Field::SourceId, "id"),
    ];

    #[test]
    fn test_extract_skips_missing_paths() {
        let values = extract(&json!({"main": {"temp": 3.5}, "dt": 10}), MAP);
        assert_eq!(values.get(&Field::Temperature), Some(&json!(3.5)));
        assert_eq!(values.get(&Field::Timestamp), Some(&json!(10)));
        assert!(!values.contains_key(&Field::Name));
    }

    #[test]
    fn test_epoch_accepts_numbers_and_numeric_strings() {
        let expected = Utc.with_ymd_and_hms(2025, 3, 7, 15, 46, 39).unwrap();
        assert_eq!(epoch_to_utc(&json!(1741362399)), Some(expected));
        assert_eq!(epoch_to_utc(&json!("1741362399")), Some(expected));
        assert_eq!(epoch_to_utc(&json!(1741362399.0)), Some(expected));
    }

    #[test]
    fn test_epoch_keeps_fractional_seconds() {
        let ts = epoch_to_utc(&json!(1741362399.5)).expect("fractional epoch");
        assert_eq!(ts.timestamp(), 1741362399);
        assert_eq!(ts.timestamp_subsec_millis(), 500);
    }

    #[test]
    fn test_epoch_rejects_non_numeric() {
        assert_eq!(epoch_to_utc(&json!("yesterday")), None);
        assert_eq!(epoch_to_utc(&json!(true)), None);
        assert_eq!(epoch_to_utc(&json!({"dt": 1})), None);
    }

    #[test]
    fn test_missing_timestamp_reported_before_other_fields() {
        let values = extract(&json!({"name": "x"}), MAP);
        let err = into_unit(&values, ProviderKind::OpenWeather).unwrap_err();
        assert_eq!(err.field, "timestamp");
    }

    #[test]
    fn test_missing_temperature_is_mapping_error() {
        let values = extract(&json!({"dt": 1, "name": "x", "id": 1}), MAP);
        let err = into_unit(&values, ProviderKind::OpenWeather).unwrap_err();
        assert_eq!(err.field, "temperature");
    }

    #[test]
    fn test_wrong_type_names_the_field() {
        let values = extract(
            &json!({"main": {"temp": "warm"}, "dt": 1, "name": "x", "id": 1}),
            MAP,
        );
        let err = into_unit(&values, ProviderKind::OpenWeather).unwrap_err();
        assert_eq!(err.field, "temperature");
    }

    #[test]
    fn test_numeric_source_id_coerced_to_string() {
        let values = extract(
            &json!({"main": {"temp": 1.0}, "dt": 1, "name": "x", "id": 6694000}),
            MAP,
        );
        let unit = into_unit(&values, ProviderKind::OpenWeather).expect("valid unit");
        assert_eq!(unit.station.source_id, "6694000");
    }

    #[test]
    fn test_blank_identity_text_is_rejected() {
        let blank_id = extract(
            &json!({"main": {"temp": 1.0}, "dt": 10, "name": "RandomCity", "id": " "}),
            MAP,
        );
        assert_eq!(
            into_unit(&blank_id, ProviderKind::OpenWeather).unwrap_err(),
            MappingError::new("source_id")
        );

        let blank_name = extract(&json!({"main": {"temp": 1.0}, "dt": 10, "name": "", "id": 1}), MAP);
        assert_eq!(
            into_unit(&blank_name, ProviderKind::OpenWeather).unwrap_err(),
            MappingError::new("name")
        );
    }

    #[test]
    fn test_blank_name_allowed_for_netatmo() {
        let values = extract(&json!({"main": {"temp": 1.0}, "dt": 10, "name": "", "id": "70:ee"}), MAP);
        let unit = into_unit(&values, ProviderKind::Netatmo).expect("derived name may be empty");
        assert_eq!(unit.station.name, "");
        assert_eq!(unit.station.source_id, "70:ee");
    }

    #[test]
    fn test_measurement_names() {
        assert_eq!(Field::from_measurement("temperature"), Some(Field::Temperature));
        assert_eq!(Field::from_measurement("humidity"), Some(Field::Humidity));
        assert_eq!(Field::from_measurement("pressure"), Some(Field::Pressure));
        assert_eq!(Field::from_measurement("rain_60min"), None);
    }
}
