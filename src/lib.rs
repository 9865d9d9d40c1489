/// meteomon_service: weather ingestion and database availability monitoring.
///
/// # Module structure
///
/// ```text
/// meteomon_service
/// ├── model        — shared data types (Station, NewReading, FetchError, …)
/// ├── config       — config.toml + environment overrides
/// ├── logging      — source-tagged logging over tracing
/// ├── ingest
/// │   ├── client      — WeatherProvider trait, HTTP plumbing
/// │   ├── openweather — single-station fetch + schema mapping
/// │   ├── netatmo     — public-data fetch + multi-sensor mapping
/// │   ├── mapper      — canonical fields and typed conversion
/// │   ├── path        — dotted/indexed JSON path resolution
/// │   └── fixtures (test only) — representative API response payloads
/// ├── resolver     — find-or-create stations on (source, source_id)
/// ├── store
/// │   ├── pg       — PostgreSQL backend
/// │   └── memory   — in-process backend
/// ├── pipeline     — concurrent fan-out of one payload into readings
/// ├── availability — monitored database prober
/// └── dashboard    — chart series for temperatures and availability
/// ```

pub mod availability;
pub mod config;
pub mod dashboard;
pub mod ingest;
pub mod logging;
pub mod model;
pub mod pipeline;
pub mod resolver;
pub mod store;
