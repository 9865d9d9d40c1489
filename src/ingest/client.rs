/// Provider client capability and the shared HTTP plumbing.
///
/// Every provider performs exactly one best-effort GET per fetch. Non-2xx
/// responses keep their status code so the orchestrator can classify them
/// without sniffing error text.

use serde_json::Value;
use std::time::Duration;

use crate::config::AppConfig;
use crate::ingest::{netatmo::NetatmoClient, openweather::OpenWeatherClient};
use crate::model::{FetchError, FetchParams, ProviderKind};

/// One upstream weather provider.
pub trait WeatherProvider {
    fn kind(&self) -> ProviderKind;

    /// Performs one fetch and returns the decoded JSON body.
    fn fetch(&self, params: &FetchParams) -> Result<Value, FetchError>;
}

/// Builds the blocking HTTP client shared by both providers.
pub fn build_http_client(timeout: Duration) -> Result<reqwest::blocking::Client, FetchError> {
    let client = reqwest::blocking::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("meteomon/", env!("CARGO_PKG_VERSION")))
        .build()?;
    Ok(client)
}

/// Executes a prepared request and decodes the JSON body.
pub(crate) fn execute_json(
    client: &reqwest::blocking::Client,
    request: reqwest::blocking::Request,
) -> Result<Value, FetchError> {
    let response = client.execute(request)?;
    let status = response.status();
    let body = response.text()?;

    if !status.is_success() {
        return Err(FetchError::Status { status: status.as_u16(), body });
    }

    Ok(serde_json::from_str(&body)?)
}

// ---------------------------------------------------------------------------
// Closed set of concrete clients
// ---------------------------------------------------------------------------

pub enum ProviderClient {
    OpenWeather(OpenWeatherClient),
    Netatmo(NetatmoClient),
}

impl ProviderClient {
    /// Builds the client for `kind` from the application configuration.
    pub fn from_config(kind: ProviderKind, config: &AppConfig) -> Result<Self, FetchError> {
        let http = build_http_client(config.http.timeout())?;
        Ok(match kind {
            ProviderKind::OpenWeather => {
                ProviderClient::OpenWeather(OpenWeatherClient::new(http, config.openweather.clone()))
            }
            ProviderKind::Netatmo => {
                ProviderClient::Netatmo(NetatmoClient::new(http, config.netatmo.clone()))
            }
        })
    }
}

impl WeatherProvider for ProviderClient {
    fn kind(&self) -> ProviderKind {
        match self {
            ProviderClient::OpenWeather(c) => c.kind(),
            ProviderClient::Netatmo(c) => c.kind(),
        }
    }

    fn fetch(&self, params: &FetchParams) -> Result<Value, FetchError> {
        match self {
            ProviderClient::OpenWeather(c) => c.fetch(params),
            ProviderClient::Netatmo(c) => c.fetch(params),
        }
    }
}
