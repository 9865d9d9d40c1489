/// Netatmo public-data API client and payload mapping.
///
/// `getpublicdata` returns every public station inside a bounding box:
///
/// ```text
/// { "body": [
///     { "_id": "70:ee:50:..",
///       "place": { "location": [lon, lat], "city": "..", "street": ".." },
///       "measures": {
///         "<module id>": { "type": ["temperature", "humidity"],
///                          "res":  { "<epoch>": [18.3, 47] } },
///         "<rain gauge id>": { "rain_60min": 0, "rain_timeutc": .. } } } ] }
/// ```
///
/// Each element of `body` is mapped on its own by `map_station`.

use serde_json::Value;
use std::collections::BTreeMap;

use crate::config::NetatmoSettings;
use crate::ingest::client::{WeatherProvider, execute_json};
use crate::ingest::mapper::{self, Field, FieldMap, FieldValues};
use crate::ingest::path;
use crate::model::{FetchError, FetchParams, MappedUnit, MappingError, ProviderKind};

const ENDPOINT: &str = "getpublicdata";

/// Key of the station list inside a `getpublicdata` response.
pub const BODY_KEY: &str = "body";

/// Separator between city and street in synthesized station names.
const NAME_SEPARATOR: &str = " - ";

/// Canonical field → payload path. `place.street` lands in `Locality`.
pub const FIELD_MAP: FieldMap = &[
    (Field::Longitude, "place.location[0]"),
    (Field::Latitude, "place.location[1]"),
    (Field::City, "place.city"),
    (Field::Locality, "place.street"),
    (Field::SourceId, "_id"),
];

const MEASURES_PATH: &str = "measures";

// ============================================================================
// API Client
// ============================================================================

pub struct NetatmoClient {
    http: reqwest::blocking::Client,
    settings: NetatmoSettings,
}

impl NetatmoClient {
    pub fn new(http: reqwest::blocking::Client, settings: NetatmoSettings) -> Self {
        Self { http, settings }
    }

    /// Builds the public-data request for a bounding box.
    pub fn build_request(&self, params: &FetchParams) -> Result<reqwest::blocking::Request, FetchError> {
        let FetchParams::BoundingBox { lat_ne, lon_ne, lat_sw, lon_sw } = *params else {
            return Err(FetchError::InvalidParams(
                "Netatmo needs a bounding box (NE and SW corners)".to_string(),
            ));
        };

        let url = format!("{}/{}", self.settings.base_url.trim_end_matches('/'), ENDPOINT);
        let request = self
            .http
            .get(url)
            .bearer_auth(&self.settings.token)
            .query(&[
                ("lat_ne", lat_ne.to_string()),
                ("lon_ne", lon_ne.to_string()),
                ("lat_sw", lat_sw.to_string()),
                ("lon_sw", lon_sw.to_string()),
                ("filter", "false".to_string()),
            ])
            .build()?;

        Ok(request)
    }
}

impl WeatherProvider for NetatmoClient {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Netatmo
    }

    fn fetch(&self, params: &FetchParams) -> Result<Value, FetchError> {
        let request = self.build_request(params)?;
        execute_json(&self.http, request)
    }
}

// ============================================================================
// Payload Mapping
// ============================================================================

/// Splits a `getpublicdata` response into per-station payloads.
///
/// A missing `body` means no stations. A `body` that is not a list is a
/// shape error for the whole payload.
pub fn station_entries(payload: &Value) -> Result<&[Value], MappingError> {
    match payload.get(BODY_KEY) {
        None | Some(Value::Null) => Ok(&[]),
        Some(Value::Array(entries)) => Ok(entries.as_slice()),
        Some(_) => Err(MappingError::new(BODY_KEY)),
    }
}

/// Joins city and street, skipping whichever part is absent or blank.
pub fn station_name(city: Option<&str>, street: Option<&str>) -> String {
    [city, street]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(NAME_SEPARATOR)
}

/// Zips every typed sensor record into `values`.
///
/// Each record declares measurement names in `type` and carries result
/// rows in `res`, keyed by epoch seconds, with one value per declared name.
/// When a record holds several rows the newest one is used. If two records
/// report the same measurement, the newer row wins. Across records the
/// newest row supplies the unit timestamp.
fn merge_measures(measures: &Value, values: &mut FieldValues) {
    let Some(records) = measures.as_object() else {
        return;
    };

    let mut newest: Option<(f64, &str)> = None;
    let mut field_epochs: BTreeMap<Field, f64> = BTreeMap::new();

    for record in records.values() {
        let Some(types) = record.get("type").and_then(Value::as_array) else {
            continue;
        };
        let Some(rows) = record.get("res").and_then(Value::as_object) else {
            continue;
        };

        let latest_row = rows
            .iter()
            .filter_map(|(epoch, row)| epoch.trim().parse::<f64>().ok().map(|e| (e, epoch, row)))
            .max_by(|a, b| a.0.total_cmp(&b.0));
        let Some((epoch, epoch_key, row)) = latest_row else {
            continue;
        };

        for (index, type_name) in types.iter().enumerate() {
            let field = type_name.as_str().and_then(Field::from_measurement);
            let value = row.get(index).filter(|v| !v.is_null());
            let (Some(field), Some(value)) = (field, value) else {
                continue;
            };
            if field_epochs.get(&field).is_some_and(|&seen| seen > epoch) {
                continue;
            }
            field_epochs.insert(field, epoch);
            values.insert(field, value.clone());
        }

        if newest.is_none_or(|(current, _)| epoch >= current) {
            newest = Some((epoch, epoch_key.as_str()));
        }
    }

    if let Some((_, epoch_key)) = newest {
        values.insert(Field::Timestamp, Value::String(epoch_key.to_string()));
    }
}

/// Maps one element of `body` onto a station + reading unit.
pub fn map_station(entry: &Value) -> Result<MappedUnit, MappingError> {
    let mut values = mapper::extract(entry, FIELD_MAP);

    if let Some(measures) = path::resolve(entry, MEASURES_PATH) {
        merge_measures(measures, &mut values);
    }

    let name = station_name(
        values.get(&Field::City).and_then(Value::as_str),
        values.get(&Field::Locality).and_then(Value::as_str),
    );
    values.insert(Field::Name, Value::String(name));

    mapper::into_unit(&values, ProviderKind::Netatmo)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::fixtures::*;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn client() -> NetatmoClient {
        let settings = NetatmoSettings {
            token: "tok123".to_string(),
            base_url: "https://api.netatmo.com/api".to_string(),
        };
        NetatmoClient::new(reqwest::blocking::Client::new(), settings)
    }

    // --- Request construction ----------------------------------------------

    #[test]
    fn test_request_carries_bearer_token_and_bbox() {
        let params = FetchParams::BoundingBox {
            lat_ne: 45.4968,
            lon_ne: 9.2193,
            lat_sw: 45.4953,
            lon_sw: 9.216,
        };
        let request = client().build_request(&params).expect("bbox params should build");
        let url = request.url().as_str();

        assert!(url.starts_with("https://api.netatmo.com/api/getpublicdata?"), "got: {}", url);
        assert!(url.contains("lat_ne=45.4968"));
        assert!(url.contains("lon_sw=9.216"));
        assert!(url.contains("filter=false"));

        let auth = request
            .headers()
            .get(reqwest::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok());
        assert_eq!(auth, Some("Bearer tok123"));
    }

    #[test]
    fn test_point_params_rejected() {
        let err = client()
            .build_request(&FetchParams::Point { lat: 1.0, lon: 2.0 })
            .unwrap_err();
        assert!(matches!(err, FetchError::InvalidParams(_)));
    }

    // --- Fan-out -----------------------------------------------------------

    #[test]
    fn test_station_entries_from_body() {
        let payload = netatmo_three_stations_one_malformed();
        assert_eq!(station_entries(&payload).expect("list body").len(), 3);
    }

    #[test]
    fn test_missing_body_means_no_stations() {
        assert!(station_entries(&json!({"status": "ok"})).expect("no body").is_empty());
    }

    #[test]
    fn test_non_list_body_is_shape_error() {
        let err = station_entries(&json!({"body": {"_id": "x"}})).unwrap_err();
        assert_eq!(err.field, "body");
    }

    // --- Names -------------------------------------------------------------

    #[test]
    fn test_station_name_joins_city_and_street() {
        assert_eq!(station_name(Some("Milan"), Some("Via Roma")), "Milan - Via Roma");
    }

    #[test]
    fn test_station_name_degrades_without_crashing() {
        assert_eq!(station_name(Some("Milan"), None), "Milan");
        assert_eq!(station_name(None, Some("Via Roma")), "Via Roma");
        assert_eq!(station_name(Some("Milan"), Some("  ")), "Milan");
        assert_eq!(station_name(None, None), "");
    }

    // --- Mapping -----------------------------------------------------------

    #[test]
    fn test_field_map_paths_are_well_formed() {
        for (field, p) in FIELD_MAP {
            assert!(path::is_valid(p), "bad path for {:?}: {}", field, p);
        }
        assert!(path::is_valid(MEASURES_PATH));
    }

    #[test]
    fn test_multi_sensor_zip_assigns_values_by_position() {
        let unit = map_station(&netatmo_milan_station()).expect("fixture should map");

        assert_eq!(unit.reading.temperature, 18.3);
        assert_eq!(unit.reading.humidity, Some(47));
        assert_eq!(unit.reading.feels_like, None);
        assert_eq!(
            unit.reading.timestamp,
            Utc.timestamp_opt(1741362399, 0).unwrap()
        );
    }

    #[test]
    fn test_station_identity_from_place() {
        let unit = map_station(&netatmo_milan_station()).expect("fixture should map");

        assert_eq!(unit.station.source, ProviderKind::Netatmo);
        assert_eq!(unit.station.source_id, "70:ee:50:71:30:ae");
        assert_eq!(unit.station.name, "Milan - Test Locality");
        assert_eq!(unit.station.city.as_deref(), Some("Milan"));
        assert_eq!(unit.station.locality.as_deref(), Some("Test Locality"));
        // location is [lon, lat]
        assert_eq!(unit.station.longitude, Some(9.22794373449619));
        assert_eq!(unit.station.latitude, Some(45.4832984744368));
    }

    #[test]
    fn test_records_without_type_are_skipped() {
        let entry = json!({
            "_id": "70:ee:50:00:00:01",
            "place": {"location": [9.0, 45.0], "city": "Milan"},
            "measures": {
                "02:00:00:00:00:01": {"res": {"1741362399": [12.0, 60]}, "type": ["temperature", "humidity"]},
                "05:00:00:00:00:01": {"rain_60min": 0.2, "rain_24h": 1.1, "rain_live": 0, "rain_timeutc": 1741362400}
            }
        });
        let unit = map_station(&entry).expect("rain gauge should be ignored");
        assert_eq!(unit.reading.temperature, 12.0);
        assert_eq!(unit.reading.timestamp.timestamp(), 1741362399);
    }

    #[test]
    fn test_pressure_module_merged_with_newest_timestamp() {
        let entry = json!({
            "_id": "70:ee:50:00:00:02",
            "place": {"location": [9.0, 45.0], "city": "Milan", "street": "Via Po"},
            "measures": {
                "02:00:00:00:00:02": {"res": {"1741362300": [11.5, 70]}, "type": ["temperature", "humidity"]},
                "70:ee:50:00:00:02": {"res": {"1741362399": [1013.2]}, "type": ["pressure"]}
            }
        });
        let unit = map_station(&entry).expect("two modules should merge");
        assert_eq!(unit.reading.temperature, 11.5);
        assert_eq!(unit.reading.humidity, Some(70));
        assert_eq!(unit.reading.pressure, Some(1013.2));
        assert_eq!(unit.reading.timestamp.timestamp(), 1741362399);
    }

    #[test]
    fn test_duplicate_measurement_takes_newer_module() {
        let entry = json!({
            "_id": "70:ee:50:00:00:05",
            "place": {"location": [9.0, 45.0], "city": "Milan", "street": "Via Dante"},
            "measures": {
                "02:00:00:00:00:aa": {"res": {"1741362999": [20.0]}, "type": ["temperature"]},
                "03:00:00:00:00:bb": {"res": {"1741360000": [10.0, 40]}, "type": ["temperature", "humidity"]}
            }
        });
        let unit = map_station(&entry).expect("both modules should merge");
        assert_eq!(unit.reading.temperature, 20.0);
        assert_eq!(unit.reading.humidity, Some(40));
        assert_eq!(unit.reading.timestamp.timestamp(), 1741362999);
    }

    #[test]
    fn test_short_value_row_leaves_field_unset() {
        let entry = json!({
            "_id": "70:ee:50:00:00:03",
            "measures": {
                "02:00:00:00:00:03": {"res": {"1741362399": [9.5]}, "type": ["temperature", "humidity"]}
            }
        });
        let unit = map_station(&entry).expect("missing humidity is optional");
        assert_eq!(unit.reading.temperature, 9.5);
        assert_eq!(unit.reading.humidity, None);
        assert_eq!(unit.station.name, "");
    }

    #[test]
    fn test_no_typed_records_fails_on_timestamp() {
        let entry = json!({
            "_id": "70:ee:50:00:00:04",
            "place": {"location": [9.0, 45.0], "city": "Milan"},
            "measures": {
                "06:00:00:00:00:04": {"wind_strength": 4, "wind_angle": 120, "wind_timeutc": 1741362399}
            }
        });
        assert_eq!(map_station(&entry).unwrap_err(), MappingError::new("timestamp"));
    }

    #[test]
    fn test_missing_measures_fails_on_timestamp() {
        let mut entry = netatmo_milan_station();
        entry.as_object_mut().unwrap().remove("measures");
        assert_eq!(map_station(&entry).unwrap_err().field, "timestamp");
    }
}
