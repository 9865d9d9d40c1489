//! meteomon: weather ingestion and database availability monitor.
//!
//! One-shot subcommands fetch from a single provider or probe the monitored
//! database once; `run` keeps doing both on the intervals configured in
//! `[schedule]`.

use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};

use meteomon_service::availability::AvailabilityProber;
use meteomon_service::config::AppConfig;
use meteomon_service::dashboard::{self, Interval, TaskStats};
use meteomon_service::ingest::client::ProviderClient;
use meteomon_service::logging::{self, DataSource};
use meteomon_service::model::{FetchParams, ProviderKind};
use meteomon_service::pipeline::{self, BatchResult};
use meteomon_service::store::{MemoryStore, PgStore, WeatherStore};

const DEFAULT_CONFIG: &str = "config.toml";
const SCHEDULER_TICK: Duration = Duration::from_secs(1);

#[derive(Parser, Debug)]
#[command(name = "meteomon")]
#[command(about = "Weather ingestion and database availability monitor")]
struct Cli {
    /// Configuration file (defaults to ./config.toml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Keep everything in memory instead of writing to PostgreSQL
    #[arg(long)]
    dry_run: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch current weather for one point from OpenWeather
    Openweather {
        #[arg(long, allow_hyphen_values = true)]
        lat: Option<f64>,
        #[arg(long, allow_hyphen_values = true)]
        lon: Option<f64>,
    },
    /// Fetch public station data inside a bounding box from Netatmo
    Netatmo {
        #[arg(long, allow_hyphen_values = true)]
        lat_ne: Option<f64>,
        #[arg(long, allow_hyphen_values = true)]
        lon_ne: Option<f64>,
        #[arg(long, allow_hyphen_values = true)]
        lat_sw: Option<f64>,
        #[arg(long, allow_hyphen_values = true)]
        lon_sw: Option<f64>,
    },
    /// Probe the monitored database once and record the result
    Probe,
    /// Create the storage schema
    Migrate,
    /// Print chart series as JSON
    Series {
        /// Station id; without it the availability series is printed
        #[arg(long)]
        station: Option<i64>,
        /// 1h, 4h, 8h, 12h or 24h
        #[arg(long, default_value = "1h")]
        interval: String,
    },
    /// Ingest and probe periodically until interrupted
    Run,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    logging::init_logger(
        config.logging.min_level(),
        config.logging.file.as_deref(),
        config.logging.console_timestamps,
    );

    if let Command::Migrate = cli.command {
        if cli.dry_run {
            bail!("migrate needs a database; drop --dry-run");
        }
        let url = config.require_database_url()?;
        PgStore::connect(url)?.migrate()?;
        return Ok(());
    }

    let store = open_store(&config, cli.dry_run)?;

    match cli.command {
        Command::Openweather { lat, lon } => {
            let params = FetchParams::Point {
                lat: lat.unwrap_or(config.region.latitude),
                lon: lon.unwrap_or(config.region.longitude),
            };
            let result = fetch_once(ProviderKind::OpenWeather, &config, store.as_ref(), &params)?;
            report(&result)
        }
        Command::Netatmo { lat_ne, lon_ne, lat_sw, lon_sw } => {
            let region = &config.region;
            let params = FetchParams::BoundingBox {
                lat_ne: lat_ne.unwrap_or(region.lat_ne),
                lon_ne: lon_ne.unwrap_or(region.lon_ne),
                lat_sw: lat_sw.unwrap_or(region.lat_sw),
                lon_sw: lon_sw.unwrap_or(region.lon_sw),
            };
            let result = fetch_once(ProviderKind::Netatmo, &config, store.as_ref(), &params)?;
            report(&result)
        }
        Command::Probe => {
            let prober = AvailabilityProber::new(config.monitored_database.clone());
            println!("{}", prober.probe(store.as_ref()));
            Ok(())
        }
        Command::Migrate => Ok(()),
        Command::Series { station, interval } => {
            print_series(store.as_ref(), station, Interval::from_label(&interval))
        }
        Command::Run => run(&config, store.as_ref()),
    }
}

fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    match path {
        Some(path) => AppConfig::load(path).with_context(|| format!("loading {}", path.display())),
        None if Path::new(DEFAULT_CONFIG).exists() => {
            AppConfig::load(DEFAULT_CONFIG).with_context(|| format!("loading {}", DEFAULT_CONFIG))
        }
        None => Ok(AppConfig::from_environment()),
    }
}

fn open_store(config: &AppConfig, dry_run: bool) -> Result<Box<dyn WeatherStore>> {
    if dry_run {
        logging::info(DataSource::System, None, "Dry run: using in-memory store");
        return Ok(Box::new(MemoryStore::new()));
    }
    let url = config.require_database_url()?;
    let store = PgStore::connect(url).context("connecting to storage database")?;
    Ok(Box::new(store))
}

fn fetch_once(
    kind: ProviderKind,
    config: &AppConfig,
    store: &dyn WeatherStore,
    params: &FetchParams,
) -> Result<BatchResult> {
    let client = ProviderClient::from_config(kind, config)
        .with_context(|| format!("building {} client", kind))?;
    Ok(pipeline::fetch_and_ingest(&client, store, params))
}

fn report(result: &BatchResult) -> Result<()> {
    println!("{}", result.message());
    if !result.success {
        bail!("{} ingestion finished with {} error(s)", result.provider, result.errors.len());
    }
    Ok(())
}

fn print_series(store: &dyn WeatherStore, station: Option<i64>, interval: Interval) -> Result<()> {
    let now = chrono::Utc::now();
    let json = match station {
        Some(id) => match dashboard::temperature_series(store, id, interval, now)? {
            Some(series) => serde_json::to_string_pretty(&series)?,
            None => bail!("station {} not found", id),
        },
        None => serde_json::to_string_pretty(&dashboard::availability_series(store, interval, now)?)?,
    };
    println!("{}", json);
    Ok(())
}

// ---------------------------------------------------------------------------
// Scheduler loop
// ---------------------------------------------------------------------------

/// A periodic ingestion task; `None` interval means disabled.
struct ScheduledFetch {
    client: ProviderClient,
    params: FetchParams,
    every: Option<Duration>,
    next_due: Instant,
}

fn every(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

fn probe_forever(prober: &AvailabilityProber, store: &dyn WeatherStore, interval: Duration) {
    loop {
        prober.probe(store);
        thread::sleep(interval);
    }
}

fn run(config: &AppConfig, store: &dyn WeatherStore) -> Result<()> {
    let schedule = &config.schedule;
    let mut fetches = vec![
        ScheduledFetch {
            client: ProviderClient::from_config(ProviderKind::OpenWeather, config)?,
            params: config.region.point(),
            every: every(schedule.openweather_every_secs),
            next_due: Instant::now(),
        },
        ScheduledFetch {
            client: ProviderClient::from_config(ProviderKind::Netatmo, config)?,
            params: config.region.bounding_box(),
            every: every(schedule.netatmo_every_secs),
            next_due: Instant::now(),
        },
    ];
    fetches.retain(|f| f.every.is_some());

    let probe_every = every(schedule.probe_every_secs);
    if fetches.is_empty() && probe_every.is_none() {
        bail!("every task is disabled in [schedule]");
    }

    logging::info(
        DataSource::System,
        None,
        &format!(
            "Scheduler started: {} ingestion task(s), probe {}",
            fetches.len(),
            if probe_every.is_some() { "enabled" } else { "disabled" }
        ),
    );

    thread::scope(|scope| {
        if let Some(interval) = probe_every {
            let prober = AvailabilityProber::new(config.monitored_database.clone());
            scope.spawn(move || probe_forever(&prober, store, interval));
        }

        if fetches.is_empty() {
            return;
        }

        let mut stats = TaskStats::new();
        loop {
            let now = Instant::now();
            for task in fetches.iter_mut() {
                let Some(interval) = task.every else { continue };
                if now < task.next_due {
                    continue;
                }
                let result = pipeline::fetch_and_ingest(&task.client, store, &task.params);
                let source = DataSource::from(result.provider);
                if !result.success {
                    logging::warn(source, None, &result.message());
                }

                let finished = chrono::Utc::now();
                stats.record(finished, result.success);
                let last_hour = stats.counts(Interval::OneHour, finished);
                logging::info(
                    source,
                    None,
                    &format!(
                        "Scheduled tasks in the last hour: {} succeeded, {} failed",
                        last_hour.successes, last_hour.failures
                    ),
                );
                task.next_due = now + interval;
            }
            thread::sleep(SCHEDULER_TICK);
        }
    });

    Ok(())
}
