//! Zone Monitor CLI
//!
//! Usage:
//!   zone-monitor zones [--geojson zones.geojson]
//!   zone-monitor classify --lat 28.7499 --lng 77.1175
//!   zone-monitor track --track demo-data/walk.json --interval-ms 5000
//!   zone-monitor fleet --subjects demo-data/tourists.json --sos demo-data/sos.json
//!
//! The zone table comes from `--zones`, else `GEOFENCE_ZONES`, else the
//! table embedded in the `geofence` crate.

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use geofence::{export, loader, ContainmentPolicy, FleetAssessor, ZoneEvaluator, ZoneSet};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use zone_monitor::monitor::{DEFAULT_ACQUISITION_TIMEOUT_MS, DEFAULT_INTERVAL_MS};
use zone_monitor::{
    LocationProvider, MonitorConfig, ReplayProvider, StaticProvider, TracingNotifier, ZoneMonitor,
};

#[derive(Parser, Debug)]
#[command(
    name = "zone-monitor",
    about = "Classify positions against safety zones and watch for zone changes"
)]
struct Args {
    /// Path to zone table JSON file
    #[arg(short, long, global = true)]
    zones: Option<PathBuf>,

    /// Containment policy for overlapping zones: first-match or most-severe
    #[arg(long, global = true, default_value = "first-match")]
    policy: ContainmentPolicy,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate and list the zone table
    Zones {
        /// Also write the zones as GeoJSON
        #[arg(long)]
        geojson: Option<PathBuf>,
    },

    /// Classify a single position
    Classify {
        #[arg(long, allow_negative_numbers = true)]
        lat: f64,
        #[arg(long, allow_negative_numbers = true)]
        lng: f64,
    },

    /// Poll a location source and report zone changes
    Track {
        /// Track JSON file to replay
        #[arg(short, long, conflicts_with_all = ["lat", "lng"])]
        track: Option<PathBuf>,

        /// Fixed latitude (with --lng) instead of a track
        #[arg(long, allow_negative_numbers = true)]
        lat: Option<f64>,

        /// Fixed longitude (with --lat) instead of a track
        #[arg(long, allow_negative_numbers = true)]
        lng: Option<f64>,

        /// Polling interval in milliseconds
        #[arg(long, default_value_t = DEFAULT_INTERVAL_MS)]
        interval_ms: u64,

        /// Per-poll acquisition timeout in milliseconds
        #[arg(long, default_value_t = DEFAULT_ACQUISITION_TIMEOUT_MS)]
        timeout_ms: u64,

        /// Stop after this many polls
        #[arg(long)]
        max_cycles: Option<u64>,
    },

    /// Assess a subject roster and SOS feed
    Fleet {
        /// Subject roster JSON file
        #[arg(short, long)]
        subjects: PathBuf,

        /// SOS reports JSON file
        #[arg(long)]
        sos: Option<PathBuf>,

        /// Also write the snapshot as GeoJSON
        #[arg(long)]
        geojson: Option<PathBuf>,
    },
}

fn init_logging(verbose: bool) {
    let default = if verbose {
        "zone_monitor=debug,geofence=debug,info"
    } else {
        "info"
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn resolve_zones(path: Option<&Path>) -> Result<ZoneSet> {
    let from_env = std::env::var_os("GEOFENCE_ZONES").map(PathBuf::from);
    match path.map(Path::to_path_buf).or(from_env) {
        Some(p) => loader::load_zones(&p).with_context(|| format!("loading zones from {:?}", p)),
        None => {
            info!("Using embedded zone table");
            Ok(loader::embedded_zones()?)
        }
    }
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    info!("Writing {:?}", path);
    let file = File::create(path)?;
    let writer = BufWriter::new(file);
    serde_json::to_writer_pretty(writer, value)?;
    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let zones = resolve_zones(args.zones.as_deref())?;
    let evaluator = ZoneEvaluator::new(zones).with_policy(args.policy);

    match args.command {
        Command::Zones { geojson } => {
            for (i, zone) in evaluator.zones().iter().enumerate() {
                info!(
                    "  #{:<2} {:10} {:>8.0} m  {}  {}",
                    i,
                    zone.kind,
                    zone.radius_m,
                    zone.center,
                    zone.label()
                );
            }
            print_json(evaluator.zones())?;
            if let Some(path) = geojson {
                write_json(&path, &export::zones_to_geojson(evaluator.zones()))?;
            }
        }

        Command::Classify { lat, lng } => {
            let classification = evaluator.classify_coords(Some(lat), Some(lng))?;
            print_json(&classification)?;
        }

        Command::Track {
            track,
            lat,
            lng,
            interval_ms,
            timeout_ms,
            max_cycles,
        } => {
            if interval_ms == 0 {
                bail!("--interval-ms must be greater than zero");
            }

            let provider: Arc<dyn LocationProvider> = match track {
                Some(path) => Arc::new(ReplayProvider::load(&path)?),
                None if lat.is_some() || lng.is_some() => {
                    Arc::new(StaticProvider::from_coords(lat, lng)?)
                }
                None => bail!("track needs either --track <file> or --lat/--lng"),
            };

            let config = MonitorConfig {
                interval: Duration::from_millis(interval_ms),
                acquisition_timeout: Duration::from_millis(timeout_ms),
                max_cycles,
            };
            let mut monitor = ZoneMonitor::new(Arc::new(evaluator));

            tokio::select! {
                _ = monitor.run(provider, &TracingNotifier, &config) => {}
                _ = tokio::signal::ctrl_c() => info!("Interrupted"),
            }

            print_json(monitor.summary())?;
        }

        Command::Fleet {
            subjects,
            sos,
            geojson,
        } => {
            let subjects = loader::load_subjects(&subjects)?;
            let sos = match sos {
                Some(path) => loader::load_sos_reports(&path)?,
                None => Vec::new(),
            };

            let snapshot = FleetAssessor::new(evaluator).assess(&subjects, &sos, Utc::now());
            let summary = snapshot.summary();
            info!(
                "{} subjects: {} safe, {} warning, {} emergency; {} active alerts",
                summary.total,
                summary.safe,
                summary.warning,
                summary.emergency,
                summary.active_alerts
            );

            print_json(&snapshot)?;
            if let Some(path) = geojson {
                write_json(&path, &export::snapshot_to_geojson(&snapshot))?;
            }
        }
    }

    Ok(())
}
