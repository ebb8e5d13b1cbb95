//! Study Companion CLI
//!
//! Focus monitoring for study sessions.

use chrono::Utc;
use clap::{Parser, Subcommand};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use study_companion::{
    clock::{system_clock, Clock, ManualClock},
    config::Config,
    core::{
        aggregate, chi_squared_fit, format_duration, format_timer, NudgePolicy, SessionStats,
        StateTally,
    },
    detection::{
        adjusted_weights, CameraConfig, DetectionSample, DetectionService, FocusState,
        StateSimulator, SyntheticCamera,
    },
    monitor::{FocusMonitor, MonitorError, TickReport},
    schedule::spawn_periodic,
    session::{create_shared_store, SessionReport},
    transparency::create_shared_log_with_persistence,
    PRIVACY_DECLARATION, VERSION,
};
use tracing_subscriber::EnvFilter;

#[cfg(feature = "client")]
use study_companion::{ApiClient, ApiConfig};

#[derive(Parser)]
#[command(name = "study-companion")]
#[command(version = VERSION)]
#[command(about = "Focus monitoring for study sessions", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API for a dashboard
    Serve {
        /// Port to listen on (0 picks a free port)
        #[arg(long)]
        port: Option<u16>,

        /// Seed for the detection simulator
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Monitor a study session from the terminal
    Monitor {
        /// Stop after this many seconds (runs until Ctrl+C otherwise)
        #[arg(long)]
        duration: Option<u64>,

        /// Seed for the detection simulator
        #[arg(long)]
        seed: Option<u64>,

        /// Seconds between detections
        #[arg(long)]
        interval: Option<u64>,

        /// Do not show nudges
        #[arg(long)]
        no_nudges: bool,
    },

    /// Sample the simulator and compare against its weights
    Simulate {
        /// Number of samples to draw
        #[arg(long, default_value = "10000")]
        samples: u64,

        /// Simulated session age in minutes
        #[arg(long, default_value = "0")]
        minutes: f64,

        /// Seed for the simulator
        #[arg(long)]
        seed: Option<u64>,

        /// Feed each sample the previous one, one second apart
        #[arg(long)]
        chained: bool,
    },

    /// Recompute and show statistics of an exported session
    Stats {
        /// Exported session report (JSON)
        file: PathBuf,
    },

    /// Show configuration and, if one is running, the server's session
    Status {
        /// Port of the running server
        #[arg(long)]
        port: Option<u16>,
    },

    /// Pause detection
    Pause,

    /// Resume detection
    Resume,

    /// Display privacy declaration
    Privacy,

    /// Show configuration
    Config,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("study_companion=info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { port, seed } => cmd_serve(port, seed).await,
        Commands::Monitor {
            duration,
            seed,
            interval,
            no_nudges,
        } => cmd_monitor(duration, seed, interval, no_nudges).await,
        Commands::Simulate {
            samples,
            minutes,
            seed,
            chained,
        } => cmd_simulate(samples, minutes, seed, chained),
        Commands::Stats { file } => cmd_stats(&file),
        Commands::Status { port } => cmd_status(port).await,
        Commands::Pause => cmd_pause(),
        Commands::Resume => cmd_resume(),
        Commands::Privacy => cmd_privacy(),
        Commands::Config => cmd_config(),
    }
}

fn load_config() -> Config {
    match Config::load() {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!("Could not load configuration, using defaults: {e}");
            Config::default()
        }
    }
}

#[cfg(feature = "server")]
async fn cmd_serve(port: Option<u16>, seed: Option<u64>) {
    use study_companion::server::{run, ServerConfig};

    let config = load_config();
    let mut server_config = ServerConfig::from_config(&config);
    if let Some(port) = port {
        server_config.port = port;
    }
    if seed.is_some() {
        server_config.seed = seed;
    }

    println!("Study Companion v{VERSION}");
    println!();

    let (addr, shutdown_tx) = match run(server_config).await {
        Ok(started) => started,
        Err(e) => {
            eprintln!("Error starting server: {e}");
            std::process::exit(1);
        }
    };

    println!("Listening on http://{addr}");
    println!("Press Ctrl+C to stop");

    if let Err(e) = tokio::signal::ctrl_c().await {
        eprintln!("Error waiting for Ctrl+C: {e}");
    }
    let _ = shutdown_tx.send(());
    // Let in-flight requests and the stats refresher wind down.
    tokio::time::sleep(Duration::from_millis(200)).await;
    println!("Server stopped.");
}

#[cfg(not(feature = "server"))]
async fn cmd_serve(_port: Option<u16>, _seed: Option<u64>) {
    eprintln!("Error: server feature not enabled at compile time");
    std::process::exit(1);
}

async fn cmd_monitor(
    duration: Option<u64>,
    seed: Option<u64>,
    interval: Option<u64>,
    no_nudges: bool,
) {
    println!("Study Companion v{VERSION}");
    println!();

    let mut config = load_config();
    if let Some(secs) = interval {
        config.detection_interval = Duration::from_secs(secs.max(1));
    }
    if seed.is_some() {
        config.seed = seed;
    }
    if no_nudges {
        config.nudges_enabled = false;
    }
    if let Err(e) = config.ensure_directories() {
        eprintln!("Warning: Could not create directories: {e}");
    }

    let clock = system_clock();
    let store = create_shared_store(clock.clone());
    let detector = match config.seed {
        Some(seed) => DetectionService::with_seed(clock.clone(), seed),
        None => DetectionService::new(clock.clone()),
    }
    .with_processing_delay(config.processing_delay())
    .with_history_capacity(config.history_capacity);
    let camera = Box::new(SyntheticCamera::new(CameraConfig::default(), clock.clone()));
    let transparency = create_shared_log_with_persistence(config.transparency_path());

    let monitor = match FocusMonitor::start(
        store,
        Arc::new(detector),
        camera,
        NudgePolicy::new(config.nudges_enabled),
    )
    .await
    {
        Ok(monitor) => Arc::new(monitor.with_transparency(transparency.clone())),
        Err(MonitorError::Camera(e)) if e.is_permission_error() => {
            eprintln!("Error: Camera access denied.");
            eprintln!();
            eprintln!("Allow camera access for this application and try again.");
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("Error starting monitor: {e}");
            std::process::exit(1);
        }
    };

    let started = match monitor.store().read().await.get_session(monitor.session_id()) {
        Some(session) => session.start_time,
        None => clock.now(),
    };

    println!("Session: {}", monitor.session_id());
    println!("  Detection interval: {}s", config.detection_interval.as_secs());
    println!("  Stats interval: {}s", config.stats_interval.as_secs());
    println!(
        "  Nudges: {}",
        if config.nudges_enabled {
            "enabled"
        } else {
            "disabled"
        }
    );
    println!();

    let mut paused = config.paused;
    if paused {
        monitor.pause();
        println!("Detection is currently paused.");
        println!("Run `study-companion resume` to start detecting.");
        println!();
    }
    println!("Press Ctrl+C to stop");
    println!();

    let detection = {
        let monitor = monitor.clone();
        spawn_periodic(config.detection_interval, move || {
            let monitor = monitor.clone();
            async move {
                match monitor.tick().await {
                    Ok(TickReport::Detected {
                        sample,
                        event: Some(_),
                        nudge,
                    }) => {
                        println!(
                            "\r[{}] {} ({:.0}% confidence)          ",
                            sample.timestamp.format("%H:%M:%S"),
                            sample.state,
                            sample.confidence * 100.0
                        );
                        if let Some(nudge) = nudge {
                            println!("    {}: {}", nudge.title, nudge.message);
                        }
                    }
                    Ok(_) => {}
                    Err(e) => tracing::warn!("Detection failed: {e}"),
                }
            }
        })
    };

    let stats = {
        let monitor = monitor.clone();
        spawn_periodic(config.stats_interval, move || {
            let monitor = monitor.clone();
            async move {
                match monitor.refresh_stats().await {
                    Ok(session) => tracing::debug!(
                        focus_score = session.focus_score,
                        total = session.total_duration,
                        "session stats refreshed"
                    ),
                    Err(e) => tracing::warn!("Stats refresh failed: {e}"),
                }
            }
        })
    };

    let timer = {
        let clock = clock.clone();
        spawn_periodic(config.timer_interval, move || {
            let elapsed = (clock.now() - started).num_seconds().max(0) as u64;
            async move {
                print!("\r  {}", format_timer(elapsed));
                let _ = std::io::stdout().flush();
            }
        })
    };

    let running = Arc::new(AtomicBool::new(true));
    if let Err(e) = ctrlc_handler(running.clone()) {
        eprintln!("Warning: Could not set Ctrl+C handler: {e}");
    }

    // Support pause/resume from another process by polling the config file.
    let deadline = duration.map(|secs| tokio::time::Instant::now() + Duration::from_secs(secs));
    let mut last_config_check = tokio::time::Instant::now();

    while running.load(Ordering::SeqCst) {
        if deadline.is_some_and(|d| tokio::time::Instant::now() >= d) {
            break;
        }

        if last_config_check.elapsed() >= Duration::from_secs(1) {
            if let Ok(cfg) = Config::load() {
                if cfg.paused != paused {
                    paused = cfg.paused;
                    if paused {
                        println!();
                        println!("Pausing detection...");
                        monitor.pause();
                    } else {
                        println!();
                        println!("Resuming detection...");
                        monitor.resume();
                    }
                }
            }
            last_config_check = tokio::time::Instant::now();
        }

        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    detection.shutdown().await;
    stats.shutdown().await;
    timer.shutdown().await;

    println!();
    println!();
    println!("Ending session...");

    let report = match monitor.finish().await {
        Ok(report) => report,
        Err(e) => {
            eprintln!("Error ending session: {e}");
            std::process::exit(1);
        }
    };

    print_report(&report, &report.stats);
    export_report(&config, &report);

    if let Err(e) = transparency.save() {
        eprintln!("Warning: Could not save transparency log: {e}");
    }

    println!();
    println!("{}", transparency.summary());
}

fn export_report(config: &Config, report: &SessionReport) {
    let export_path = config.export_path.join(format!(
        "session_{}.json",
        Utc::now().format("%Y%m%d_%H%M%S")
    ));

    if let Some(parent) = export_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    match serde_json::to_string_pretty(report) {
        Ok(json) => {
            if let Err(e) = std::fs::write(&export_path, json) {
                eprintln!("Error writing session report: {e}");
            } else {
                println!(
                    "Exported session with {} events to {:?}",
                    report.events.len(),
                    export_path
                );
            }
        }
        Err(e) => {
            eprintln!("Error serializing session report: {e}");
        }
    }
}

fn print_report(report: &SessionReport, stats: &SessionStats) {
    println!();
    println!("Session Summary");
    println!("===============");
    println!("  Duration: {}", format_duration(stats.total_duration));
    println!("  Focus score: {}%", stats.focus_score);
    println!("  Transitions: {}", report.events.len());
    println!();
    for state in FocusState::ALL {
        let secs = stats.time_in(state);
        let share = if stats.total_duration == 0 {
            0.0
        } else {
            secs as f64 * 100.0 / stats.total_duration as f64
        };
        println!(
            "  {:<11} {:>10} ({share:.1}%)",
            state.as_str(),
            format_duration(secs)
        );
    }
}

fn cmd_simulate(samples: u64, minutes: f64, seed: Option<u64>, chained: bool) {
    if samples == 0 {
        eprintln!("Error: --samples must be at least 1");
        std::process::exit(1);
    }

    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let clock = ManualClock::new(Utc::now());
    let mut simulator = StateSimulator::new(clock.now());
    let mut previous: Option<DetectionSample> = None;
    let mut tally = StateTally::default();

    for _ in 0..samples {
        let sample = simulator.sample(&mut rng, clock.now(), minutes, previous.as_ref());
        tally.record(sample.state);
        if chained {
            clock.advance(chrono::Duration::seconds(1));
            previous = Some(sample);
        }
    }

    let expected = adjusted_weights(minutes);
    let observed = tally.proportions();

    println!("Simulated {samples} samples at {minutes} minutes");
    println!();
    println!("  {:<11} {:>8} {:>9} {:>9}", "STATE", "COUNT", "OBSERVED", "EXPECTED");
    for state in FocusState::ALL {
        let i = state.index();
        println!(
            "  {:<11} {:>8} {:>8.2}% {:>8.2}%",
            state.as_str(),
            tally.count(state),
            observed[i] * 100.0,
            expected[i] * 100.0
        );
    }
    println!();

    if chained {
        println!("Chained samples are smoothed; the fit test applies to independent draws only.");
        return;
    }

    match chi_squared_fit(&tally, &expected) {
        Ok(fit) => {
            println!(
                "Chi-squared: {:.3} (df = {}), p = {:.4}",
                fit.statistic, fit.degrees_of_freedom, fit.p_value
            );
            println!(
                "Fit at alpha 0.001: {}",
                if fit.accepts(0.001) {
                    "consistent"
                } else {
                    "REJECTED"
                }
            );
        }
        Err(e) => eprintln!("Error computing fit: {e}"),
    }
}

fn cmd_stats(file: &Path) {
    let content = match std::fs::read_to_string(file) {
        Ok(content) => content,
        Err(e) => {
            eprintln!("Error reading {file:?}: {e}");
            std::process::exit(1);
        }
    };
    let report: SessionReport = match serde_json::from_str(&content) {
        Ok(report) => report,
        Err(e) => {
            eprintln!("Error parsing session report: {e}");
            std::process::exit(1);
        }
    };

    let until = report.session.end_time.unwrap_or_else(Utc::now);
    let stats = aggregate(report.session.start_time, &report.events, until);

    println!("Session {}", report.session.id);
    print_report(&report, &stats);

    if stats != report.stats {
        println!();
        println!("Note: recomputed statistics differ from the exported ones.");
    }
}

async fn cmd_status(port: Option<u16>) {
    let config = load_config();

    println!("Study Companion Status");
    println!("======================");
    println!();

    println!("Configuration:");
    println!("  Detection interval: {}s", config.detection_interval.as_secs());
    println!("  Nudges: {}", config.nudges_enabled);
    println!("  Paused: {}", config.paused);
    println!();

    #[cfg(feature = "client")]
    {
        let api = ApiConfig::local(port.unwrap_or(config.server_port));
        match ApiClient::new(api.clone()) {
            Ok(client) => match client.health().await {
                Ok(health) => {
                    println!("Server: running at {} (v{})", api.url(), health.version);
                    match client.current_session().await {
                        Ok(session) => {
                            println!("  Current session: {}", session.id);
                            println!(
                                "  State: {} | Duration: {} | Focus score: {}%",
                                session.current_state,
                                format_duration(session.total_duration),
                                session.focus_score
                            );
                            println!(
                                "  Status: {}",
                                if session.is_active() { "active" } else { "ended" }
                            );
                        }
                        Err(e) if e.status() == Some(404) => println!("  No session started."),
                        Err(e) => eprintln!("  Could not fetch current session: {e}"),
                    }
                }
                Err(_) => println!("Server: not running on {}", api.url()),
            },
            Err(e) => eprintln!("Could not create HTTP client: {e}"),
        }
        println!();
    }
    #[cfg(not(feature = "client"))]
    let _ = port;

    let stats_path = config.transparency_path();
    if stats_path.exists() {
        if let Ok(content) = std::fs::read_to_string(&stats_path) {
            if let Ok(stats) = serde_json::from_str::<serde_json::Value>(&content) {
                println!("Cumulative Statistics:");
                if let Some(frames) = stats.get("frames_analyzed") {
                    println!("  Frames analyzed: {frames}");
                }
                if let Some(transitions) = stats.get("transitions_recorded") {
                    println!("  Transitions recorded: {transitions}");
                }
                if let Some(nudges) = stats.get("nudges_shown") {
                    println!("  Nudges shown: {nudges}");
                }
                if let Some(sessions) = stats.get("sessions_started") {
                    println!("  Sessions started: {sessions}");
                }
            }
        }
    } else {
        println!("No previous session data found.");
    }
}

fn cmd_pause() {
    let mut config = load_config();
    config.paused = true;
    if let Err(e) = config.save() {
        eprintln!("Error saving config: {e}");
        std::process::exit(1);
    }
    println!("Detection paused. Use 'study-companion resume' to continue.");
}

fn cmd_resume() {
    let mut config = load_config();
    config.paused = false;
    if let Err(e) = config.save() {
        eprintln!("Error saving config: {e}");
        std::process::exit(1);
    }
    println!("Detection resumed.");
}

fn cmd_privacy() {
    println!("{PRIVACY_DECLARATION}");
}

fn cmd_config() {
    let config = load_config();

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", Config::config_path());
    println!();
    println!(
        "{}",
        serde_json::to_string_pretty(&config).unwrap_or_else(|_| "Error".to_string())
    );
}

/// Set up Ctrl+C handler.
fn ctrlc_handler(running: Arc<AtomicBool>) -> Result<(), ctrlc::Error> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
}
