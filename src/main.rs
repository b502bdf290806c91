// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/rockwatch

//! Rockwatch - rockfall risk monitoring for open-pit mines
//!
//! Runs monitoring sessions and the batch jobs that seed and refresh mine data.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use rockwatch::alerts::{build_dispatcher, AlertRelay};
use rockwatch::batch::BatchJobs;
use rockwatch::core::{ControllerEvent, Scheduler};
use rockwatch::weather::{OpenMeteoClient, StaticWeather, Weather, WeatherSource};
use rockwatch::{
    Config, Database, RiskModel, SensorDataController, SensorReading, SensorStore, SessionKey,
    SessionMode, VERSION,
};

/// Rockwatch - rockfall risk monitoring
#[derive(Parser, Debug)]
#[command(name = "rockwatch")]
#[command(version = VERSION)]
#[command(about = "Rockfall risk monitoring and alerting for open-pit mines")]
struct Args {
    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Database path, overrides the configuration
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Enable trace-level logging
    #[arg(long, global = true)]
    trace: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a monitoring session and print its final state
    Monitor {
        #[arg(long, value_enum, default_value_t = SessionMode::Simulated)]
        mode: SessionMode,

        /// Mine to watch; all mines in live mode when omitted
        #[arg(long)]
        mine: Option<String>,

        /// Stop after this many seconds instead of waiting for Ctrl+C
        #[arg(long)]
        duration_secs: Option<u64>,

        /// Simulated tick period in milliseconds
        #[arg(long)]
        tick_ms: Option<u64>,
    },

    /// Create the predefined mines, backfill their history and store their risk
    GenerateMineData,

    /// Append one weather-blended reading per mine and refresh its risk
    SyncWeatherData,

    /// Run the weather sync on a fixed interval until Ctrl+C
    Schedule {
        #[arg(long, default_value = "60")]
        every_mins: u64,
    },

    /// Score a JSON reading with both risk models
    Score {
        /// Reading as JSON
        reading: String,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.trace {
        Level::TRACE
    } else if args.debug {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_file(args.debug)
        .with_line_number(args.debug)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Rockwatch v{}", VERSION);

    let config_path = args.config.clone().unwrap_or_else(Config::default_path);
    let mut config = Config::load_or_create(&config_path)?;
    if let Some(db) = args.db {
        config.database.path = db;
    }
    info!("Configuration loaded from {:?}", config_path);

    let rt = tokio::runtime::Runtime::new()?;
    match args.command {
        Command::Monitor {
            mode,
            mine,
            duration_secs,
            tick_ms,
        } => {
            if let Some(ms) = tick_ms {
                config.session.tick_interval_ms = ms;
            }
            let key = SessionKey {
                mode,
                mine_id: mine,
            };
            rt.block_on(run_monitor(config, key, duration_secs))
        }
        Command::GenerateMineData => rt.block_on(async {
            let mut jobs = batch_jobs(&config)?;
            let report = jobs.generate_mine_data().await;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok::<(), anyhow::Error>(())
        }),
        Command::SyncWeatherData => rt.block_on(async {
            let mut jobs = batch_jobs(&config)?;
            let report = jobs.sync_weather_data().await;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok::<(), anyhow::Error>(())
        }),
        Command::Schedule { every_mins } => rt.block_on(run_schedule(config, every_mins)),
        Command::Score { reading } => {
            let reading: SensorReading =
                serde_json::from_str(&reading).context("reading must be a JSON SensorReading")?;
            for model in [RiskModel::ThresholdBand, RiskModel::WeightedFraction] {
                let risk = model.assess(&reading);
                println!("{:<18} {:.3} {}", model.name(), risk.probability, risk.level);
            }
            Ok(())
        }
    }
}

fn open_store(config: &Config) -> Result<Arc<dyn SensorStore>> {
    let db = Database::open(&config.database)
        .with_context(|| format!("opening database {:?}", config.database.path))?;
    Ok(Arc::new(db))
}

fn batch_jobs(config: &Config) -> Result<BatchJobs> {
    let store = open_store(config)?;

    let weather: Arc<dyn WeatherSource> = if config.weather.enabled {
        Arc::new(OpenMeteoClient::new(&config.weather)?)
    } else {
        Arc::new(StaticWeather(Weather {
            temperature: config.weather.fallback_temperature,
            rainfall: config.weather.fallback_rainfall,
        }))
    };

    let jobs = BatchJobs::new(
        store,
        weather,
        config.batch.clone(),
        &config.generator,
        &config.weather,
    );

    Ok(match build_dispatcher(&config.alerts)? {
        Some(dispatcher) => jobs.with_alerts(dispatcher, config.alerts.threshold),
        None => jobs,
    })
}

/// Run one session until Ctrl+C or the requested duration
async fn run_monitor(config: Config, key: SessionKey, duration_secs: Option<u64>) -> Result<()> {
    let store = open_store(&config)?;
    let controller = SensorDataController::new(
        key,
        config.session.clone(),
        &config.generator,
        Arc::clone(&store),
    );

    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    if let Some(dispatcher) = build_dispatcher(&config.alerts)? {
        let relay = AlertRelay::new(
            dispatcher,
            Arc::clone(&store),
            Duration::from_secs(config.alerts.cooldown_secs),
        );
        let events = controller.subscribe();
        let shutdown = shutdown_tx.subscribe();
        tokio::spawn(async move { relay.run(events, shutdown).await });
    }

    let mut events = controller.subscribe();
    let mut shutdown = shutdown_tx.subscribe();
    let printer = tokio::spawn(async move {
        loop {
            tokio::select! {
                received = events.recv() => match received {
                    Ok(event) => match event.payload {
                        ControllerEvent::Updated { reading, risk } => info!(
                            "{} {} displacement={:.2} strain={:.0} pore={:.1} rain={:.1} -> {:.2} {}",
                            reading.timestamp.format("%H:%M:%S"),
                            reading.mine_id,
                            reading.displacement,
                            reading.strain,
                            reading.pore_pressure,
                            reading.rainfall,
                            risk.probability,
                            risk.level
                        ),
                        ControllerEvent::Degraded(reason) => warn!("Session degraded: {:?}", reason),
                        ControllerEvent::StateChanged(state) => info!("Session state: {:?}", state),
                        ControllerEvent::Critical { .. } => {}
                    },
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                _ = shutdown.recv() => break,
            }
        }
    });

    controller.start().await?;

    match duration_secs {
        Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
        None => {
            info!("Press Ctrl+C to stop");
            tokio::signal::ctrl_c().await?;
        }
    }

    controller.stop();
    let _ = shutdown_tx.send(());
    let _ = printer.await;

    println!("{}", serde_json::to_string_pretty(&controller.snapshot())?);
    Ok(())
}

/// Periodic weather sync until Ctrl+C
async fn run_schedule(config: Config, every_mins: u64) -> Result<()> {
    let jobs = Arc::new(Mutex::new(batch_jobs(&config)?));
    let scheduler = Scheduler::new();

    scheduler
        .add_task(
            "sync-weather-data",
            Duration::from_secs(every_mins.max(1) * 60),
            move || {
                let jobs = Arc::clone(&jobs);
                async move {
                    let report = jobs.lock().await.sync_weather_data().await;
                    info!("Scheduled sync: {}", report.message);
                }
            },
        )
        .await;

    let (shutdown_tx, shutdown_rx) = broadcast::channel::<()>(1);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = shutdown_tx.send(());
        }
    });

    info!("Weather sync scheduled every {} minute(s); press Ctrl+C to stop", every_mins);
    scheduler.run(shutdown_rx).await
}
