//! bonsai-control: host runner for the watering controller.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                 Adapters (outer ring)                    │
//! │                                                          │
//! │  JsonConfigFile   SimBoard   FileScheduleStore           │
//! │  (ConfigPort)     (Board)    (ScheduleStore, time.txt)   │
//! │  SystemClock      LogDisplay LogEventSink                │
//! │                                                          │
//! │  ──────────────── Port Trait Boundary ─────────────      │
//! │                                                          │
//! │  ┌────────────────────────────────────────────────────┐  │
//! │  │  Controller ─▶ WaterScheduler ─▶ SessionController │  │
//! │  └────────────────────────────────────────────────────┘  │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! Runs until Ctrl-C, then closes the controller so the pump is left off.
#![deny(unused_must_use)]

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use tracing_subscriber::EnvFilter;

use bonsai::adapters::json_config::JsonConfigFile;
use bonsai::adapters::sim_board::SimBoard;
use bonsai::app::ports::ConfigPort;
use bonsai::app::service::{Controller, Ports};

#[derive(Parser)]
#[command(
    name = "bonsai-control",
    version,
    about = "Sense-gated pump scheduler with a durable next-water time"
)]
struct Cli {
    /// Path to the JSON config file
    #[arg(long, short)]
    config: PathBuf,

    /// Directory holding time.txt
    #[arg(long, env = "BONSAI_DATA_DIR", default_value = ".")]
    data_dir: PathBuf,

    /// Hold the simulated sense input high (wet)
    #[arg(long)]
    wet: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    info!("bonsai-control v{}", env!("CARGO_PKG_VERSION"));

    let config = JsonConfigFile::new(&cli.config)
        .load()
        .with_context(|| format!("loading {}", cli.config.display()))?;

    let mut board = SimBoard::new();
    board.line(&config.sense_pin).set(cli.wet);

    let controller = Controller::start(config, &mut board, Ports::with_data_dir(&cli.data_dir))
        .context("starting controller")?;
    info!("Readings: {}", serde_json::Value::Object(controller.readings()));

    let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(1);
    ctrlc::set_handler(move || {
        let _ = stop_tx.try_send(());
    })
    .context("installing Ctrl-C handler")?;

    let _ = stop_rx.recv();
    info!("Shutting down");
    controller.close().context("closing controller")?;
    info!("Readings: {}", serde_json::Value::Object(controller.readings()));
    Ok(())
}
