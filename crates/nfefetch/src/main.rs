use log::{error, info};

use nfefetch::batch::BatchReport;
use nfefetch::registry::CompanyRegistry;
use nfefetch::retry::RetryStats;
use nfefetch::state::StateStore;
use nfefetch::{validator, Config};

const DEFAULT_CONFIG_PATH: &str = "config/nfefetch.json";

fn init_logging() {
    if let Err(e) = tracing_log::LogTracer::init() {
        eprintln!("Failed to bridge log records into tracing: {}", e);
    }

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to install tracing subscriber: {}", e);
    }
}

fn main() {
    std::process::exit(run());
}

fn run() -> i32 {
    init_logging();

    let config_path = std::env::var("NFEFETCH_CONFIG")
        .unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let command = std::env::args().nth(1).unwrap_or_else(|| "status".to_string());

    info!("Loading configuration from {}", config_path);
    let config = match nfefetch::load_config(&config_path) {
        Ok(config) => config,
        Err(e) => {
            error!("Configuration not usable: {}", e);
            return 1;
        }
    };

    match command.as_str() {
        "status" => status(&config),
        "reset" => reset(&config),
        "purge" => purge(&config),
        other => {
            eprintln!(
                "Unknown command '{}' (expected: status, reset or purge)",
                other
            );
            1
        }
    }
}

/// Prints the registry validation summary and the current batch state.
fn status(config: &Config) -> i32 {
    let registry = CompanyRegistry::new(&config.registry_path);
    let rows = registry.load();
    let validation = validator::validate_batch(rows.iter().map(|r| r.raw_id.as_str()));
    println!(
        "Registry: {} row(s), {} valid ({:.0}%)",
        validation.total,
        validation.valid.len(),
        validation.validity_rate * 100.0
    );

    let store = StateStore::open(&config.state_path, config.max_attempts);
    let report = BatchReport::from_store(&store, RetryStats::default(), 0);
    print!("{}", report);

    if let Some(stats) = store.time_stats() {
        println!(
            "Attempts between {} and {} ({} of {} touched)",
            stats.first_attempt_at.to_rfc3339(),
            stats.last_attempt_at.to_rfc3339(),
            stats.touched_entities,
            stats.total_entities
        );
    }
    0
}

/// Wipes the state store for a non-resumable full re-run.
fn reset(config: &Config) -> i32 {
    let mut store = StateStore::open(&config.state_path, config.max_attempts);
    match store.reset() {
        Ok(()) => {
            info!("State store cleared");
            0
        }
        Err(e) => {
            error!("Could not reset state store: {}", e);
            1
        }
    }
}

/// Runs the retention sweep over old DONE/FAILED records.
fn purge(config: &Config) -> i32 {
    let mut store = StateStore::open(&config.state_path, config.max_attempts);
    let purged = store.purge_old_checkpoints(config.retention_days);
    println!(
        "Purged checkpoint data from {} record(s) older than {} day(s)",
        purged, config.retention_days
    );
    0
}
