/// OpenWeather current-weather API client and payload mapping.
///
/// One request returns one station's current conditions:
///   GET {base_url}/weather?lat=..&lon=..&appid=..&units=metric
///
/// See `fixtures.rs` for a representative response.

use serde_json::Value;

use crate::config::OpenWeatherSettings;
use crate::ingest::client::{WeatherProvider, execute_json};
use crate::ingest::mapper::{self, Field, FieldMap};
use crate::model::{FetchError, FetchParams, MappedUnit, MappingError, ProviderKind};

const ENDPOINT: &str = "weather";

/// Canonical field → payload path.
pub const FIELD_MAP: FieldMap = &[
    (Field::Temperature, "main.temp"),
    (Field::FeelsLike, "main.feels_like"),
    (Field::Humidity, "main.humidity"),
    (Field::Pressure, "main.pressure"),
    (Field::Timestamp, "dt"),
    (Field::Longitude, "coord.lon"),
    (Field::Latitude, "coord.lat"),
    (Field::Name, "name"),
    (Field::SourceId, "id"),
];

// ============================================================================
// API Client
// ============================================================================

pub struct OpenWeatherClient {
    http: reqwest::blocking::Client,
    settings: OpenWeatherSettings,
}

impl OpenWeatherClient {
    pub fn new(http: reqwest::blocking::Client, settings: OpenWeatherSettings) -> Self {
        Self { http, settings }
    }

    /// Builds the current-weather request for a single coordinate.
    pub fn build_request(&self, params: &FetchParams) -> Result<reqwest::blocking::Request, FetchError> {
        let FetchParams::Point { lat, lon } = *params else {
            return Err(FetchError::InvalidParams(
                "OpenWeather needs a point (lat, lon)".to_string(),
            ));
        };

        let url = format!("{}/{}", self.settings.base_url.trim_end_matches('/'), ENDPOINT);
        let request = self
            .http
            .get(url)
            .query(&[
                ("lat", lat.to_string()),
                ("lon", lon.to_string()),
                ("appid", self.settings.api_key.clone()),
                ("units", "metric".to_string()),
                ("lang", "en".to_string()),
                ("mode", "json".to_string()),
            ])
            .header("Accept", "application/json")
            .build()?;

        Ok(request)
    }
}

impl WeatherProvider for OpenWeatherClient {
    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenWeather
    }

    fn fetch(&self, params: &FetchParams) -> Result<Value, FetchError> {
        let request = self.build_request(params)?;
        execute_json(&self.http, request)
    }
}

// ============================================================================
// Payload Mapping
// ============================================================================

/// Maps one current-weather payload onto a station + reading unit.
///
/// `dt` is the observation time in epoch seconds. `id` is numeric in the
/// API and becomes the string `source_id`.
pub fn map_payload(payload: &Value) -> Result<MappedUnit, MappingError> {
    let values = mapper::extract(payload, FIELD_MAP);
    mapper::into_unit(&values, ProviderKind::OpenWeather)
}
