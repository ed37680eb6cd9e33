use clap::Parser;
use log::{debug, error, info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use server::config::MonitorConfig;
use server::driver::TickDriver;
use server::host::Roster;
use server::monitor::Monitor;
use server::sim::{MatchScript, SimulatedServer};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tokio::time::{interval, sleep, Duration, Instant, MissedTickBehavior};

/// Runs the behavior monitor against a simulated match.
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// JSON settings file, reloaded when it changes on disk
    #[clap(short, long)]
    config: Option<PathBuf>,
    /// Number of simulated human players
    #[clap(short, long, default_value = "10")]
    players: usize,
    /// How many of them never move
    #[clap(short, long, default_value = "2")]
    idle: usize,
    /// Simulation steps per second
    #[clap(short, long, default_value = "64")]
    tick_rate: u32,
    /// Override the monitor period in seconds
    #[clap(long)]
    timer: Option<f32>,
    /// Stop after this many seconds
    #[clap(short, long)]
    duration: Option<u64>,
    /// Seed for the simulation and the monitor
    #[clap(long)]
    seed: Option<u64>,
}

const RELOAD_POLL: Duration = Duration::from_secs(2);

/// Main-method of the application.
/// Parses arguments, loads the settings and runs the server loop until
/// Ctrl+C or the requested duration elapses.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info (or debug) to see monitor output");
    }

    let mut config = load_config(args.config.as_deref(), args.timer)?;
    let seed = args.seed.unwrap_or_else(rand::random);
    info!(
        "Starting monitor: {} players ({} idle), {} steps/s, period {:.2}s, seed {}",
        args.players,
        args.idle,
        args.tick_rate,
        config.tick_period().as_secs_f32(),
        seed
    );

    let mut rng = StdRng::seed_from_u64(seed);
    let mut host = SimulatedServer::populate(args.players, args.idle, &mut rng);
    let script = MatchScript::default();

    let (mut driver, mut fired_rx) = TickDriver::new(Monitor::with_seed(seed));
    driver.start(&config);

    let step_secs = 1.0 / args.tick_rate.max(1) as f32;
    let mut step_timer = interval(Duration::from_secs_f32(step_secs));
    step_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut reload_timer = interval(RELOAD_POLL);
    reload_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut config_mtime = args.config.as_deref().and_then(modified_at);

    let started = Instant::now();
    let mut script_clock = Duration::ZERO;

    let deadline = sleep(
        args.duration
            .map(Duration::from_secs)
            .unwrap_or(Duration::MAX / 4),
    );
    tokio::pin!(deadline);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    // Skip the first tick since it fires immediately
    step_timer.tick().await;
    reload_timer.tick().await;

    loop {
        tokio::select! {
            Some(fired) = fired_rx.recv() => {
                let now = std::time::Instant::now();
                if let Some(summary) = driver.on_timer_fired(fired, &mut host, &config, now) {
                    if summary.warnings + summary.deferred + summary.kicks > 0 {
                        info!(
                            "Pass: {} warnings, {} queued, {} kicks",
                            summary.warnings, summary.deferred, summary.kicks
                        );
                    }
                }
            }
            _ = step_timer.tick() => {
                let elapsed = started.elapsed();
                for event in script.events_between(script_clock, elapsed) {
                    debug!("Match event: {:?}", event);
                    let follow_up = host.on_phase(&event);
                    driver.handle_event(&event, &config);
                    for extra in follow_up {
                        driver.handle_event(&extra, &config);
                    }
                }
                script_clock = elapsed;

                host.advance(step_secs, &mut rng);
                driver.step(&mut host, &config);
            }
            _ = reload_timer.tick() => {
                let Some(path) = args.config.as_deref() else {
                    continue;
                };
                let mtime = modified_at(path);
                if mtime == config_mtime {
                    continue;
                }
                config_mtime = mtime;

                match load_config(Some(path), args.timer) {
                    Ok(reloaded) => {
                        info!("Reloaded settings from {}", path.display());
                        driver.on_config_changed(&config, &reloaded);
                        config = reloaded;
                    }
                    Err(e) => warn!("Keeping previous settings: {}", e),
                }
            }
            _ = &mut deadline => {
                info!("Requested duration elapsed, shutting down");
                break;
            }
            result = &mut shutdown => {
                if let Err(e) = result {
                    error!("Failed to listen for Ctrl+C: {}", e);
                }
                info!("Received Ctrl+C, shutting down gracefully...");
                break;
            }
        }
    }

    driver.stop();
    info!(
        "Stopped with {} players left, {} kicked",
        host.players().len(),
        host.kicked.len()
    );
    Ok(())
}

/// Settings from `path` (defaults when absent) with the CLI period override
/// applied.
fn load_config(path: Option<&Path>, timer: Option<f32>) -> Result<MonitorConfig, server::ConfigError> {
    let mut config = match path {
        Some(path) if path.exists() => MonitorConfig::from_file(path)?,
        Some(path) => {
            warn!("{} not found, using default settings", path.display());
            MonitorConfig::default()
        }
        None => MonitorConfig::default(),
    };
    if let Some(timer) = timer {
        config.timer = timer;
    }
    config.validate()?;
    Ok(config)
}

fn modified_at(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|meta| meta.modified()).ok()
}
