//! midi-keystroke - inject keystrokes from MIDI messages
//!
//! Listens on a MIDI input port and presses keys when an incoming message
//! matches a rule of the YAML configuration.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use midi_keystroke::config::{load_rules, StatusNames};
use midi_keystroke::input::{self, Backend, MidiListener, PortSelector, RawMessage};
use midi_keystroke::keys::{self, KeyBindings};
use midi_keystroke::Engine;

/// Capacity of the queue between the MIDI callback and the dispatch loop
const EVENT_QUEUE_SIZE: usize = 1024;

/// Send keystrokes when specific MIDI messages are received
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file in YAML syntax
    #[arg(value_name = "CONFIG", required_unless_present = "list_ports")]
    config: Option<PathBuf>,

    /// MIDI backend API (default: the one this build uses)
    #[arg(short, long, value_enum)]
    backend: Option<Backend>,

    /// MIDI input port name or number (default: open a virtual input)
    #[arg(short, long)]
    port: Option<String>,

    /// Verbose output (same as --log-level debug)
    #[arg(short, long)]
    verbose: bool,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,

    /// JSON key binding file layered over the built-in table
    /// (default: ./keybindings.json when present)
    #[arg(short, long, env = "KEYBINDINGS")]
    keybindings: Option<PathBuf>,

    /// Log key actions instead of injecting them
    #[arg(long)]
    dry_run: bool,

    /// List available MIDI input ports and exit
    #[arg(long)]
    list_ports: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let level = if args.verbose { "debug" } else { args.log_level.as_str() };
    init_logging(level, args.log_json)?;

    if args.list_ports {
        input::print_ports()?;
        return Ok(());
    }

    let config_path = args
        .config
        .as_deref()
        .context("No configuration file given")?;
    info!("Configuration file: {}", config_path.display());

    // Everything that can fail on bad configuration happens before the port opens
    let statuses = StatusNames::standard();
    let rules = load_rules(config_path, &statuses).await?;

    let cwd = std::env::current_dir().context("Failed to read working directory")?;
    let bindings = KeyBindings::discover(args.keybindings.as_deref(), &cwd)?;
    debug!("{} key bindings available", bindings.len());
    let sink = keys::open_sink(bindings, args.dry_run)?;

    let engine = Engine::new(Arc::new(rules), sink);

    let backend = Backend::ensure_available(args.backend)?;
    debug!("Using MIDI backend {}", backend);

    let (tx, rx) = mpsc::channel::<RawMessage>(EVENT_QUEUE_SIZE);
    let selector = PortSelector::from_arg(args.port.as_deref());
    let listener = MidiListener::open(&selector, tx).context("Could not open MIDI input")?;

    info!("Listening on '{}'. Press Control-C to exit.", listener.port_name());
    run(&engine, listener.port_name(), rx, shutdown_signal()).await;

    drop(listener);
    info!("MIDI input closed");
    Ok(())
}

/// Dispatch incoming messages one at a time until shutdown
async fn run(
    engine: &Engine,
    port_name: &str,
    mut rx: mpsc::Receiver<RawMessage>,
    shutdown: impl std::future::Future<Output = ()>,
) {
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            Some(message) = rx.recv() => {
                debug!("[{}] @{}us", port_name, message.timestamp_us);
                engine.handle_raw(&message.data).await;
            }

            _ = &mut shutdown => {
                break;
            }
        }
    }
}

fn init_logging(level: &str, json: bool) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_thread_names(false),
            )
            .init();
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Control-C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
