//! tamper-guard CLI
//!
//! Inspect presets and policies, and drive the engine from recorded or live
//! host event streams.

use clap::{Parser, Subcommand};
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use tamper_guard::{
    config::Config,
    core::{EngineBuilder, EventLabel, PartialPolicy, SecurityEngine, SecurityLevel, SnapshotBuilder},
    detector::HostEvent,
    guard::{Navigator, RouteGuard, RouteVerdict},
    presentation::resolve_display_text,
    DISCLAIMER, VERSION,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tamper-guard")]
#[command(version = VERSION)]
#[command(about = "Heuristic tamper detection for protected content sessions", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the flags of every security level
    Presets,

    /// Show the effective policy for a level and overrides
    Policy {
        /// Security level (low, medium, high); defaults to the configured level
        #[arg(long)]
        level: Option<String>,

        /// Override a policy key, e.g. --set blockCopy=false
        #[arg(long = "set", value_name = "KEY=VALUE")]
        overrides: Vec<String>,
    },

    /// List event labels and their display text
    Labels,

    /// Replay a JSON-lines host event script through the engine
    Replay {
        /// Script file, one host event per line
        file: PathBuf,

        #[arg(long)]
        level: Option<String>,

        #[arg(long = "set", value_name = "KEY=VALUE")]
        overrides: Vec<String>,

        /// Print the final session snapshot as JSON
        #[arg(long)]
        snapshot: bool,
    },

    /// Read JSON-lines host events from stdin until Ctrl+C or end of input.
    /// Detector ticks follow the timestamps of the events read
    Monitor {
        #[arg(long)]
        level: Option<String>,

        #[arg(long = "set", value_name = "KEY=VALUE")]
        overrides: Vec<String>,

        /// Candidate address for the network probe (requires network feature)
        #[arg(long)]
        address: Option<std::net::IpAddr>,
    },

    /// Check paths against the configured route allow-list
    Routes {
        /// Paths to check
        paths: Vec<String>,
    },

    /// Show configuration
    Config,

    /// Display what tamper-guard does and does not do
    Disclaimer,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Presets => {
            cmd_presets();
        }
        Commands::Policy { level, overrides } => {
            cmd_policy(level, &overrides);
        }
        Commands::Labels => {
            cmd_labels();
        }
        Commands::Replay {
            file,
            level,
            overrides,
            snapshot,
        } => {
            cmd_replay(&file, level, &overrides, snapshot);
        }
        Commands::Monitor {
            level,
            overrides,
            address,
        } => {
            cmd_monitor(level, &overrides, address);
        }
        Commands::Routes { paths } => {
            cmd_routes(&paths);
        }
        Commands::Config => {
            cmd_config();
        }
        Commands::Disclaimer => {
            cmd_disclaimer();
        }
    }
}

/// Resolve the level and overrides from the CLI on top of the config file.
fn resolve_policy_args(
    config: &Config,
    level: Option<String>,
    pairs: &[String],
) -> (String, PartialPolicy) {
    let level = level.unwrap_or_else(|| config.level.to_string());
    let mut overrides = config.overrides.clone();
    for pair in pairs {
        if let Err(e) = overrides.set_pair(pair) {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
    (level, overrides)
}

fn engine_builder(config: &Config, level: &str, overrides: PartialPolicy) -> EngineBuilder {
    SecurityEngine::builder(level, overrides)
        .config(config)
        .on_detect(|label: EventLabel| {
            println!(
                "[{}] Detected {label}: {}",
                chrono::Utc::now().format("%H:%M:%S"),
                label.display_text().unwrap_or("no display text")
            );
            Ok(())
        })
        .on_logout(|label: EventLabel| {
            println!("  Auto-logout triggered by {label}");
            Ok(())
        })
}

fn cmd_presets() {
    let presets: Vec<(SecurityLevel, serde_json::Value)> = SecurityLevel::ALL
        .iter()
        .filter_map(|level| {
            serde_json::to_value(level.preset())
                .ok()
                .map(|value| (*level, value))
        })
        .collect();

    let Some((_, first)) = presets.first() else {
        return;
    };
    let keys: Vec<String> = first
        .as_object()
        .map(|map| map.keys().cloned().collect())
        .unwrap_or_default();

    println!("{:<24} {:>8} {:>8} {:>8}", "flag", "low", "medium", "high");
    println!("{}", "-".repeat(51));
    for key in keys {
        let cells: String = presets
            .iter()
            .map(|(_, value)| {
                let cell = value.get(&key).map(|v| v.to_string()).unwrap_or_default();
                format!(" {cell:>8}")
            })
            .collect();
        println!("{key:<24}{cells}");
    }
}

fn cmd_policy(level: Option<String>, pairs: &[String]) {
    let config = Config::load().unwrap_or_default();
    let (level, overrides) = resolve_policy_args(&config, level, pairs);
    let policy = tamper_guard::merge_policy(&level, &overrides);

    println!("Effective policy ({})", SecurityLevel::from_name(&level));
    println!(
        "{}",
        serde_json::to_string_pretty(&policy).unwrap_or_else(|_| "Error".to_string())
    );
}

fn cmd_labels() {
    let policy = SecurityLevel::Medium.preset();
    for label in EventLabel::ALL {
        println!(
            "{:<28} {}",
            label.as_str(),
            resolve_display_text(Some(label), &policy)
        );
    }
}

fn cmd_replay(file: &Path, level: Option<String>, pairs: &[String], snapshot: bool) {
    let config = Config::load().unwrap_or_default();
    let (level, overrides) = resolve_policy_args(&config, level, pairs);

    let content = match std::fs::read_to_string(file) {
        Ok(content) => content,
        Err(e) => {
            eprintln!("Error reading {file:?}: {e}");
            std::process::exit(1);
        }
    };

    let mut engine = engine_builder(&config, &level, overrides).build();
    println!("tamper-guard v{VERSION}");
    println!("Level: {}", engine.level());
    println!("Active detectors: {:?}", engine.active_detectors());
    println!();

    let mut events = 0usize;
    for (index, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match serde_json::from_str::<HostEvent>(line) {
            Ok(event) => {
                let disposition = engine.dispatch(&event);
                events += 1;
                if disposition.prevent_default || disposition.clear_clipboard {
                    println!(
                        "  line {}: prevented default{}",
                        index + 1,
                        if disposition.clear_clipboard {
                            ", cleared clipboard"
                        } else {
                            ""
                        }
                    );
                }
            }
            Err(e) => {
                eprintln!("Warning: skipping line {}: {e}", index + 1);
            }
        }
    }
    engine.pump();

    let state = engine.state();
    println!();
    println!("Replayed {events} events");
    println!("Final state: {:?}", state.phase());
    if let Some(label) = state.last_event() {
        println!("Last event: {label}");
    }

    if snapshot {
        let snapshot = engine.snapshot(&SnapshotBuilder::new());
        println!(
            "{}",
            serde_json::to_string_pretty(&snapshot).unwrap_or_else(|_| "Error".to_string())
        );
    }

    println!();
    println!("{}", engine.audit().summary());
}

fn cmd_monitor(level: Option<String>, pairs: &[String], address: Option<std::net::IpAddr>) {
    let config = Config::load().unwrap_or_default();
    let (level, overrides) = resolve_policy_args(&config, level, pairs);

    #[allow(unused_mut)]
    let mut builder = engine_builder(&config, &level, overrides);

    #[cfg(feature = "network")]
    if let Some(address) = address {
        match tamper_guard::detector::IpApiProbe::new(
            Arc::new(tamper_guard::detector::StaticAddress(address)),
            config.thresholds.datacenter_orgs.clone(),
            config.thresholds.network_timeout,
        ) {
            Ok(probe) => builder = builder.probe(Arc::new(probe)),
            Err(e) => eprintln!("Warning: network probe unavailable: {e}"),
        }
    }
    #[cfg(not(feature = "network"))]
    if address.is_some() {
        eprintln!("Warning: --address ignored (network feature not enabled at compile time)");
    }

    let mut engine = builder.build();

    println!("tamper-guard v{VERSION}");
    println!("Level: {}", engine.level());
    println!("Active detectors: {:?}", engine.active_detectors());
    println!();
    println!("Reading host events from stdin. Press Ctrl+C to stop");
    println!();

    let running = Arc::new(AtomicBool::new(true));
    ctrlc_handler(running.clone());

    let sender = engine.sender();
    let reader_running = running.clone();
    thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else {
                break;
            };
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<HostEvent>(&line) {
                Ok(event) => {
                    if sender.send(event).is_err() {
                        break;
                    }
                }
                Err(e) => eprintln!("Warning: invalid event: {e}"),
            }
        }
        // End of input stops the monitor as well
        reader_running.store(false, Ordering::SeqCst);
    });

    engine.run(&running);

    println!();
    println!("Stopping monitor...");
    engine.dispose();
    println!();
    println!("{}", engine.audit().summary());
}

struct PrintNavigator;

impl Navigator for PrintNavigator {
    fn navigate(&mut self, path: &str) {
        println!("  -> redirect to {path}");
    }
}

fn cmd_routes(paths: &[String]) {
    let config = Config::load().unwrap_or_default();
    let mut guard = RouteGuard::from_config(&config.routes);

    if config.routes.allowed_routes.is_empty() {
        println!("No allow-list configured: every route is allowed.");
    }

    for path in paths {
        match guard.check(path, &mut PrintNavigator) {
            RouteVerdict::Allowed => println!("{path}: allowed"),
            RouteVerdict::Blocked { .. } => println!("{path}: blocked"),
        }
    }
}

fn cmd_config() {
    let config = Config::load().unwrap_or_default();

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

fn cmd_disclaimer() {
    println!("{DISCLAIMER}");
}

/// Set up Ctrl+C handler.
fn ctrlc_handler(running: Arc<AtomicBool>) {
    if let Err(e) = ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    }) {
        eprintln!("Warning: could not set Ctrl+C handler: {e}");
    }
}
