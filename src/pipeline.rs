/// Ingestion orchestrator
///
/// One provider payload fans out into independent units (one per station).
/// Each unit maps, resolves its station and writes one reading on its own
/// scoped thread, at most `MAX_UNIT_THREADS` at a time; each scope is the
/// barrier that waits for its chunk. A failing or panicking unit, or one
/// whose thread cannot be spawned, only contributes its own error.

use std::fmt;
use std::thread;

use serde_json::Value;

use crate::ingest::{self, client::WeatherProvider, path};
use crate::logging::{self, DataSource};
use crate::model::{FetchFailure, FetchParams, MappingError, ProviderKind, Reading, UnitError};
use crate::resolver::resolve_station;
use crate::store::WeatherStore;

/// Upper bound on unit threads alive at once for one payload.
pub const MAX_UNIT_THREADS: usize = 16;

// ---------------------------------------------------------------------------
// Batch outcome
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum BatchError {
    /// The upstream fetch failed; no unit ran.
    Fetch { failure: FetchFailure, detail: String },
    /// The payload could not be split into units.
    Payload(MappingError),
    /// One unit failed; its siblings are unaffected.
    Unit {
        index: usize,
        source_id: Option<String>,
        error: UnitError,
    },
}

impl fmt::Display for BatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatchError::Fetch { failure, .. } => write!(f, "{}", failure),
            BatchError::Payload(err) => write!(f, "{}", err),
            BatchError::Unit { index, source_id: Some(id), error } => {
                write!(f, "station {} (unit {}): {}", id, index, error)
            }
            BatchError::Unit { index, source_id: None, error } => {
                write!(f, "unit {}: {}", index, error)
            }
        }
    }
}

#[derive(Debug)]
pub struct BatchResult {
    pub provider: ProviderKind,
    /// `true` iff `errors` is empty.
    pub success: bool,
    /// Readings written by this batch, including those of a failed batch.
    pub written: usize,
    pub errors: Vec<BatchError>,
}

impl BatchResult {
    fn from_parts(provider: ProviderKind, written: usize, errors: Vec<BatchError>) -> Self {
        Self {
            provider,
            success: errors.is_empty(),
            written,
            errors,
        }
    }

    fn single_error(provider: ProviderKind, error: BatchError) -> Self {
        Self::from_parts(provider, 0, vec![error])
    }

    /// User-facing summary line.
    pub fn message(&self) -> String {
        if self.success {
            return format!("Saved {} readings", self.written);
        }
        self.errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ")
    }
}

// ---------------------------------------------------------------------------
// Orchestration
// ---------------------------------------------------------------------------

/// Ingests an already-fetched provider payload.
pub fn ingest_payload<S>(store: &S, kind: ProviderKind, payload: &Value) -> BatchResult
where
    S: WeatherStore + ?Sized,
{
    ingest_payload_bounded(store, kind, payload, MAX_UNIT_THREADS)
}

/// Like `ingest_payload`, with at most `max_threads` units in flight.
pub fn ingest_payload_bounded<S>(
    store: &S,
    kind: ProviderKind,
    payload: &Value,
    max_threads: usize,
) -> BatchResult
where
    S: WeatherStore + ?Sized,
{
    let source = DataSource::from(kind);

    let units = match ingest::split_units(kind, payload) {
        Ok(units) => units,
        Err(err) => {
            logging::error(source, None, &format!("Payload rejected: {}", err));
            return BatchResult::single_error(kind, BatchError::Payload(err));
        }
    };

    if units.is_empty() {
        logging::info(source, None, "Payload contained no stations");
        return BatchResult::from_parts(kind, 0, Vec::new());
    }

    let outcomes = run_units(&units, max_threads, |unit| ingest_unit(store, kind, unit));

    let total = outcomes.len();
    let mut written = 0;
    let mut errors = Vec::new();

    for (index, (outcome, unit)) in outcomes.into_iter().zip(&units).enumerate() {
        match outcome {
            Ok(_) => written += 1,
            Err(error) => {
                let source_id = unit_source_id(kind, unit);
                logging::log_unit_failure(source, source_id.as_deref(), &error);
                errors.push(BatchError::Unit { index, source_id, error });
            }
        }
    }

    logging::log_batch_summary(source, total, written, errors.len());
    BatchResult::from_parts(kind, written, errors)
}

/// Fetches from `provider` and ingests the payload.
///
/// A failed fetch short-circuits: no unit runs and the result carries one
/// classified error.
pub fn fetch_and_ingest<P, S>(provider: &P, store: &S, params: &FetchParams) -> BatchResult
where
    P: WeatherProvider + ?Sized,
    S: WeatherStore + ?Sized,
{
    let kind = provider.kind();
    let source = DataSource::from(kind);

    let payload = match logging::timed(source, "fetch", || provider.fetch(params)) {
        Ok(payload) => payload,
        Err(err) => {
            let failure = FetchFailure::classify(&err);
            logging::error(source, None, &format!("{}: {}", failure, err));
            return BatchResult::single_error(
                kind,
                BatchError::Fetch { failure, detail: err.to_string() },
            );
        }
    };

    logging::timed(source, "ingest", || ingest_payload(store, kind, &payload))
}

/// Runs `work` for every unit on scoped threads, `max_threads` at a time.
///
/// Returns one outcome per unit, in unit order. A unit whose thread could
/// not be spawned, or that panicked, yields `UnitError::Aborted`.
fn run_units<F>(units: &[&Value], max_threads: usize, work: F) -> Vec<Result<Reading, UnitError>>
where
    F: Fn(&Value) -> Result<Reading, UnitError> + Sync,
{
    let work = &work;
    let mut outcomes = Vec::with_capacity(units.len());

    for chunk in units.chunks(max_threads.max(1)) {
        thread::scope(|scope| {
            let handles: Vec<_> = chunk
                .iter()
                .map(|&unit| thread::Builder::new().spawn_scoped(scope, move || work(unit)))
                .collect();

            for handle in handles {
                let outcome = match handle {
                    Ok(handle) => handle.join().unwrap_or(Err(UnitError::Aborted)),
                    Err(e) => {
                        logging::error(
                            DataSource::System,
                            None,
                            &format!("Failed to spawn unit thread: {}", e),
                        );
                        Err(UnitError::Aborted)
                    }
                };
                outcomes.push(outcome);
            }
        });
    }

    outcomes
}

/// Map, resolve, write.
fn ingest_unit<S>(store: &S, kind: ProviderKind, unit: &Value) -> Result<Reading, UnitError>
where
    S: WeatherStore + ?Sized,
{
    let mapped = ingest::map_unit(kind, unit)?;
    let resolved = resolve_station(store, &mapped.station)?;
    let reading = store.insert_reading(resolved.station.id, &mapped.reading)?;
    Ok(reading)
}

/// Best-effort provider id of a raw unit, for error reports.
fn unit_source_id(kind: ProviderKind, unit: &Value) -> Option<String> {
    let key = match kind {
        ProviderKind::OpenWeather => "id",
        ProviderKind::Netatmo => "_id",
    };
    match path::resolve(unit, key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
