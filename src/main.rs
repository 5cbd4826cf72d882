//! Binary entrypoint for pir-screend.
//!
//! Delegates all logic to the library crate; no local modules here.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{Level, error, info};
use tracing_subscriber::{EnvFilter, fmt};

use pir_screend::config::Configuration;
use pir_screend::tasks::controller::ScreenController;
use pir_screend::tasks::{control, controller, effects, sensor};

/// Simple CLI
#[derive(Debug, Parser)]
#[command(name = "pir-screend", about = "PIR motion-sensor display power daemon")]
struct Cli {
    /// Path to YAML config file
    #[arg(short, long, value_name = "FILE", default_value = "config.yaml")]
    config: PathBuf,

    /// Increase log verbosity (repeatable)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    verbose: u8,
}

fn init_tracing(verbosity: u8) -> Result<()> {
    // map -v to log level
    let level = match verbosity {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let filter =
        EnvFilter::from_default_env().add_directive(format!("pir_screend={level}").parse()?);
    fmt().with_env_filter(filter).with_target(true).init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose)?;

    let cfg = Configuration::from_yaml_file(&cli.config)
        .with_context(|| format!("loading config from {}", cli.config.display()))?
        .validated()
        .context("validating configuration")?;

    info!(
        "screensaver after {}, poweroff after {}",
        humantime::format_duration(cfg.screensaver_delay),
        humantime::format_duration(cfg.poweroff_delay)
    );

    let cancel = CancellationToken::new();
    let (signal_tx, signal_rx) = mpsc::channel(16);
    let (effect_tx, effect_rx) = mpsc::unbounded_channel();
    let (state_tx, _) = broadcast::channel(16);

    let screen = ScreenController::new(&cfg, effect_tx, state_tx.clone());
    let controller_task = tokio::spawn(controller::run(screen, signal_rx, cancel.clone()));
    let effects_task = tokio::spawn(effects::run(cfg.effects.clone(), effect_rx, cancel.clone()));

    let sensor_task = tokio::spawn({
        let cancel = cancel.clone();
        let sensor_cfg = cfg.sensor.clone();
        let signals = signal_tx.clone();
        async move {
            if let Err(err) = sensor::run(sensor_cfg, signals, cancel.clone()).await {
                error!("motion sensor failed: {err:?}");
                cancel.cancel();
            }
        }
    });

    let control_task = cfg.control_socket.clone().map(|path| {
        tokio::spawn({
            let cancel = cancel.clone();
            let signals = signal_tx.clone();
            let states = state_tx.clone();
            async move {
                if let Err(err) = control::run(path, signals, states, cancel.clone()).await {
                    error!("control socket failed: {err:?}");
                    cancel.cancel();
                }
            }
        })
    });

    let mut sigterm = signal(SignalKind::terminate()).context("install SIGTERM handler")?;
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("interrupt received; shutting down");
            cancel.cancel();
        }
        _ = sigterm.recv() => {
            info!("SIGTERM received; shutting down");
            cancel.cancel();
        }
        _ = cancel.cancelled() => {}
    }

    // Join the controller first: it releases both timers on the way out, so
    // no pending deadline can fire once the sensor binding is gone.
    controller_task.await.context("join screen controller")??;
    sensor_task.await.context("join motion sensor")?;
    effects_task.await.context("join effect dispatcher")??;
    if let Some(task) = control_task {
        task.await.context("join control socket")?;
    }

    Ok(())
}
