mod autostart;
mod config;
mod engine;
mod error;
mod jitter;
mod models;
mod monitor;
mod storage;
mod system;
mod tui;
mod utils;

use anyhow::{Context as _, Result};
use clap::{Args, Parser, Subcommand};
use config::{Settings, SettingsUpdate};
use engine::Engine;
use fd_lock::RwLock;
use std::fs::{File, OpenOptions};
use std::sync::mpsc;
use storage::SettingsStore;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tui::App;

#[derive(Parser)]
#[command(name = "cursorvibe")]
#[command(about = "Keeps your session awake by nudging the pointer while you are idle", long_about = None)]
struct Cli {
    /// Log more (-v debug, -vv trace). RUST_LOG takes precedence.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive status screen (default)
    Ui {
        #[command(flatten)]
        overrides: Overrides,
        /// Start jiggling right away instead of waiting for 'space'
        #[arg(long)]
        active: bool,
    },
    /// Jiggle headless until Ctrl-C
    Run {
        #[command(flatten)]
        overrides: Overrides,
        /// Stop after this long (e.g. 8h, 30m)
        #[arg(long)]
        duration: Option<String>,
    },
    /// Show or change saved settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Manage launching at login
    Autostart {
        #[command(subcommand)]
        action: AutostartAction,
    },
}

/// Session-only settings overrides.
#[derive(Args, Debug, Default, Clone, Copy)]
struct Overrides {
    /// Seconds between jitter checks
    #[arg(short, long)]
    frequency: Option<f64>,
    /// Maximum pointer displacement per axis, in pixels
    #[arg(short, long)]
    distance: Option<i32>,
    /// Seconds without pointer movement before jiggling starts
    #[arg(short, long)]
    idle_threshold: Option<u64>,
}

impl From<Overrides> for SettingsUpdate {
    fn from(o: Overrides) -> Self {
        SettingsUpdate {
            frequency: o.frequency,
            distance: o.distance,
            idle_threshold: o.idle_threshold,
        }
    }
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the saved settings
    Show,
    /// Validate and save new values
    Set {
        #[command(flatten)]
        values: Overrides,
    },
    /// Restore default jitter settings
    Reset,
}

#[derive(Subcommand)]
enum AutostartAction {
    Enable,
    Disable,
    Status,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Commands::Ui {
        overrides: Overrides::default(),
        active: false,
    });

    // The TUI owns the terminal, so its logs go to a file.
    let to_file = matches!(command, Commands::Ui { .. });
    let _log_guard = init_logging(cli.verbose, to_file)?;

    let store = SettingsStore::new()?;

    match command {
        Commands::Ui { overrides, active } => {
            let mut lock = open_lock()?;
            let _guard = lock.try_write().map_err(|_| already_running())?;

            let stored = store.load()?;
            let settings = stored.with_update(&overrides.into())?;
            let engine = Engine::new(settings, system::default_pointer()?)?;
            let autostart = autostart::is_enabled().unwrap_or(stored.run_on_startup);

            let mut app = App::new(engine, store, autostart);
            if active {
                app.engine.start()?;
            }
            tui::run_tui(&mut app)?;
            app.engine.shutdown();

            let snapshot = app.engine.snapshot();
            println!("CursorVibe stopped after {} moves.", snapshot.moves);
        }
        Commands::Run {
            overrides,
            duration,
        } => {
            let mut lock = open_lock()?;
            let _guard = lock.try_write().map_err(|_| already_running())?;

            let limit = duration
                .as_deref()
                .map(humantime::parse_duration)
                .transpose()
                .context("invalid --duration")?;
            let settings = store.load()?.with_update(&overrides.into())?;

            let mut engine = Engine::new(settings, system::default_pointer()?)?;
            let (stop_tx, stop_rx) = mpsc::channel();
            ctrlc::set_handler(move || {
                let _ = stop_tx.send(());
            })?;

            engine.start()?;
            let settings = engine.settings();
            tracing::info!(
                frequency = settings.frequency,
                distance = settings.distance,
                idle_threshold = settings.idle_threshold,
                "jiggling while idle, press Ctrl-C to stop"
            );

            match limit {
                Some(limit) => {
                    if stop_rx.recv_timeout(limit).is_err() {
                        tracing::info!("duration of {} elapsed", humantime::format_duration(limit));
                    }
                }
                None => {
                    let _ = stop_rx.recv();
                }
            }

            engine.shutdown();
            tracing::info!(moves = engine.snapshot().moves, "stopped");
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => {
                let settings = store.load()?;
                println!("# {}", store.path().display());
                println!("{}", serde_json::to_string_pretty(&settings)?);
            }
            ConfigAction::Set { values } => {
                let update: SettingsUpdate = values.into();
                if update.is_empty() {
                    anyhow::bail!("nothing to set; pass --frequency, --distance or --idle-threshold");
                }
                let settings = store.load()?.with_update(&update)?;
                store.save(&settings)?;
                println!("{}", serde_json::to_string_pretty(&settings)?);
            }
            ConfigAction::Reset => {
                let settings = Settings {
                    run_on_startup: store.load()?.run_on_startup,
                    ..Settings::default()
                };
                store.save(&settings)?;
                println!("{}", serde_json::to_string_pretty(&settings)?);
            }
        },
        Commands::Autostart { action } => match action {
            AutostartAction::Enable | AutostartAction::Disable => {
                let on = matches!(action, AutostartAction::Enable);
                let enabled = autostart::set_enabled(on)?;
                let mut settings = store.load()?;
                settings.run_on_startup = enabled;
                store.save(&settings)?;
                println!("Run on startup: {}", if enabled { "enabled" } else { "disabled" });
            }
            AutostartAction::Status => {
                let enabled = autostart::is_enabled()?;
                println!("Run on startup: {}", if enabled { "enabled" } else { "disabled" });
            }
        },
    }

    Ok(())
}

fn open_lock() -> Result<RwLock<File>> {
    let lock_path = SettingsStore::get_base_dir()?.join("cursorvibe.lock");
    let lock_file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(true)
        .open(lock_path)?;
    Ok(RwLock::new(lock_file))
}

fn already_running() -> anyhow::Error {
    anyhow::anyhow!(
        "Another instance of CursorVibe is already running. Please close it before starting a new one."
    )
}

fn init_logging(verbose: u8, to_file: bool) -> Result<Option<WorkerGuard>> {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("cursorvibe={},warn", level)));

    if to_file {
        let dir = SettingsStore::get_base_dir()?;
        let appender = tracing_appender::rolling::never(dir, "cursorvibe.log");
        let (writer, guard) = tracing_appender::non_blocking(appender);
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(writer)
            .with_ansi(false)
            .init();
        Ok(Some(guard))
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init();
        Ok(None)
    }
}
