use std::{path::{Path, PathBuf}, sync::Arc, time::Duration};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use run_tracker_engine::{
    archive::{SessionArchiver, SessionDatabase},
    configuration::Configuration,
    gpx_util::{read_gpx, GpxReplaySource},
    persistence::{self, FileSnapshotStore, PersistenceGateway},
    platform::{FixedPlatformStatus, Platform},
    replay::{replay_track, resume_position, BatteryEvent},
    TrackerError, TrackingEngine,
};
use run_tracker_lib::{session_record::CompletedSessionRecord, tracking_state::TrackingPhase};
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "run_tracker")]
#[command(about = "Record running sessions and browse the session archive", long_about = None)]
struct Cli {
    /// Path to a key = value configuration file. Defaults apply if it is missing
    #[arg(long, default_value = "run_tracker.conf")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a GPX track as a live session and archive the result
    Replay {
        gpx_file: PathBuf,
        /// Battery reading to inject after the given number of fixes, as <index>:<percent>
        #[arg(long = "battery-at")]
        battery_at: Vec<BatteryEvent>,
        /// Delay between replayed fixes
        #[arg(long, default_value_t = 0)]
        pace_ms: u64,
    },
    /// List archived sessions
    History,
    /// Show the unfinished session, if one is stored
    Status,
    /// Delete the unfinished session. BE CAREFUL
    Discard,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| format!("{}=trace,run_tracker_engine=debug", env!("CARGO_CRATE_NAME")).into())
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = Configuration::load(&cli.config)?;

    match cli.command {
        Commands::Replay { gpx_file, battery_at, pace_ms } => {
            replay(&config, &gpx_file, &battery_at, Duration::from_millis(pace_ms)).await?;
        },
        Commands::History => {
            let db = SessionDatabase::connect(&config.database_path()).await?;
            let sessions = db.find_all().await?;
            if sessions.is_empty() {
                println!("No sessions archived yet");
            }
            for session in sessions {
                print_session(&session);
            }
        },
        Commands::Status => {
            match snapshot_store(&config).load().await {
                Ok(Some(snapshot)) => {
                    println!(
                        "{:?} session, {:.1} m over {} points, started at {} ms",
                        snapshot.phase(),
                        snapshot.distance_meters,
                        snapshot.path_points.len(),
                        snapshot.start_time
                    );
                },
                Ok(None) => println!("No unfinished session"),
                Err(err) => println!("Stored session is unreadable and will be ignored: {:?}", err),
            }
        },
        Commands::Discard => {
            snapshot_store(&config).clear().await.map_err(TrackerError::from)?;
            println!("Unfinished session discarded");
        },
    }

    Ok(())
}

fn snapshot_store(config: &Configuration) -> FileSnapshotStore {
    FileSnapshotStore::new(config.snapshot_path(), config.persistence_timeout, config.persistence_retries)
}

async fn replay(config: &Configuration, gpx_file: &Path, battery_at: &[BatteryEvent], pace: Duration) -> anyhow::Result<()> {
    let fixes = read_gpx(gpx_file)?;
    if fixes.is_empty() {
        bail!("{:?} has no track points", gpx_file);
    }
    let total = fixes.len();

    let store = Arc::new(snapshot_store(config));
    let stored = persistence::load_or_absent(store.as_ref()).await;
    let start_at = resume_position(stored.as_ref(), total);
    if start_at > 0 {
        println!("Continuing the stored session from track point {} of {}", start_at, total);
    }

    let (fix_tx, mut fix_rx) = mpsc::channel(16);
    let source = GpxReplaySource::new(fixes, fix_tx, pace).starting_at(start_at);
    let status = FixedPlatformStatus {
        providers_enabled: true,
        permission_granted: true,
    };
    let platform = Platform::new(Box::new(source), Box::new(status), Box::new(status));

    let archive = SessionDatabase::connect(&config.database_path()).await
        .context("Opening the session archive")?;
    let engine = TrackingEngine::initialize(config, store, Arc::new(archive), platform).await;

    match engine.state().await.phase {
        TrackingPhase::Active => tracing::info!("Continuing recovered session"),
        TrackingPhase::Paused => engine.resume().await,
        _ => engine.start().await,
    }

    let outcome = replay_track(&engine, &mut fix_rx, start_at, total, battery_at).await;
    if outcome.battery_stopped {
        println!("Battery critical, session stopped after {} of {} fixes", outcome.delivered, outcome.total);
    }

    match outcome.record {
        Some(record) => print_session(&record),
        None => println!("Session covered no distance, nothing archived"),
    }

    engine.shutdown().await;
    Ok(())
}

fn print_session(session: &CompletedSessionRecord) {
    let seconds = session.duration_millis / 1000;
    println!(
        "#{:<4} {}  {:>8.2} km  {:02}:{:02}:{:02}  {} points",
        session.session_id,
        session.start_time.format("%Y-%m-%d %H:%M"),
        session.distance_meters / 1000.0,
        seconds / 3600,
        seconds % 3600 / 60,
        seconds % 60,
        session.path_points.len()
    );
}
