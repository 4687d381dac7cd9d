//! CLI entry point for the GTFS-RT arrival board tool.
//!
//! Provides subcommands for watching configured boards continuously, running
//! a single update cycle, and checking the realtime feeds.

use std::ffi::OsStr;
use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use gtfs_rt_board::{
    config::Config,
    merge::{BoardSummary, board_for},
    poll::{FeedStatus, PollingController, Snapshot, feed_client},
    realtime::{fetch_trip_updates, fetch_vehicle_positions},
};
use tracing::info;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "gtfs_rt_board")]
#[command(about = "Live transit arrival boards from a GTFS schedule and GTFS-RT feeds", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll the schedule and realtime feeds, printing boards as they update
    Watch {
        /// Path to the JSON config file
        #[arg(short, long, default_value = "config.json")]
        config: String,
    },
    /// Run a single update cycle and print the snapshot as JSON
    Next {
        /// Path to the JSON config file
        #[arg(short, long, default_value = "config.json")]
        config: String,
    },
    /// Fetch the realtime feeds once and report what they contain
    CheckFeed {
        /// Path to the JSON config file
        #[arg(short, long, default_value = "config.json")]
        config: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/gtfs_rt_board.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("gtfs_rt_board.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse().unwrap()));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse().unwrap()));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Watch { config } => {
            let config = Config::load(&config)?;
            watch_boards(config).await?;
        }
        Commands::Next { config } => {
            let config = Config::load(&config)?;
            let controller = PollingController::new(config);
            let snapshot = controller.refresh().await;
            println!("{}", serde_json::to_string_pretty(&*snapshot)?);
        }
        Commands::CheckFeed { config } => {
            let config = Config::load(&config)?;
            let client = feed_client(&config);

            let updates = fetch_trip_updates(&client, &config.trip_update_url).await?;
            info!(trip_updates = updates.len(), "Trip update feed OK");

            match &config.vehicle_position_url {
                Some(url) => {
                    let positions = fetch_vehicle_positions(&client, url).await?;
                    info!(vehicles = positions.len(), "Vehicle position feed OK");
                }
                None => info!("No vehicle position url configured, skipping"),
            }
        }
    }

    Ok(())
}

/// Runs the polling loop and prints every published snapshot.
async fn watch_boards(config: Config) -> Result<()> {
    let controller = Arc::new(PollingController::new(config.clone()));
    let mut rx = controller.subscribe();

    let runner = controller.clone();
    tokio::spawn(async move { runner.run().await });

    loop {
        rx.changed().await?;
        let snapshot = rx.borrow_and_update().clone();
        print_boards(&config, &snapshot);
    }
}

fn print_boards(config: &Config, snapshot: &Snapshot) {
    let mut header = format!("Arrivals as of {}", snapshot.generated_at.format("%H:%M:%S"));
    if snapshot.stale {
        header.push_str(" [stale]");
    }
    if snapshot.feed_status == FeedStatus::Degraded {
        header.push_str(" [schedule only]");
    }
    println!("{header}");

    for departure in &config.departures {
        let summary = BoardSummary::of(board_for(
            &snapshot.boards,
            &departure.route,
            &departure.stop_name,
        ));
        let label = departure
            .name
            .clone()
            .unwrap_or_else(|| format!("{} @ {}", departure.route, departure.stop_name));

        match summary.due_in {
            Some(minutes) => {
                let mut line = format!("  {label}: due in {minutes} min");
                if let Some(scheduled) = &summary.departure_time {
                    line.push_str(&format!(" (scheduled {scheduled})"));
                }
                if let Some(next) = summary.next_due_in {
                    line.push_str(&format!(", then {next} min"));
                }
                if let Some(position) = summary.position {
                    line.push_str(&format!(
                        " [vehicle at {:.5}, {:.5}]",
                        position.latitude, position.longitude
                    ));
                }
                println!("{line}");
            }
            None => println!("  {label}: -"),
        }
    }
}
