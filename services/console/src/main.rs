mod config;
mod player;
mod prompt;
mod render;
mod rtvi_adapter;

use crate::config::Config;
use crate::prompt::Input;
use anyhow::{Context, Result};
use clap::Parser;
use guide_console_core::robot::RobotClient;
use guide_console_core::session::{ConnectParams, SessionManager, VoiceSession};
use guide_console_core::telemetry::TelemetryClient;
use guide_console_core::tour::TourSequencer;
use guide_console_core::{Console, ErrorLog};
use std::sync::Arc;
use tokio::io::AsyncBufReadExt;
use tracing_subscriber::fmt::time::ChronoLocal;

#[derive(Parser)]
#[command(version, about = "Operator console for the guided tour robot")]
struct Cli {
    /// Start in simulation mode instead of talking to the robot backend
    #[arg(long)]
    simulation: bool,
    /// Run without a voice session; questions are unavailable
    #[arg(long)]
    no_voice: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // --- 1. Load Configuration ---
    let config = Config::from_env().context("Failed to load application configuration")?;

    // --- 2. Initialize Logging ---
    // Logs go to stderr so the prompt on stdout stays readable.
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(ChronoLocal::rfc_3339())
        .with_writer(std::io::stderr)
        .init();
    for warning in &config.warnings {
        tracing::warn!("{}", warning);
    }
    tracing::info!("Configuration loaded successfully. Starting guide console...");

    // --- 3. Parse Command-Line Arguments ---
    let args = Cli::parse();

    // --- 4. Voice Session ---
    let errors = ErrorLog::new();
    let session: Arc<dyn VoiceSession> = if args.no_voice {
        Arc::new(rtvi_adapter::NoVoice::new())
    } else {
        let client_config = rtvi_client::Config::builder()
            .with_mic_enabled(false)
            .build();
        Arc::new(rtvi_adapter::RtviSession::new(rtvi_client::Client::new(
            client_config,
        )))
    };
    let params = ConnectParams {
        webrtc_url: config.webrtc_url.clone(),
        ice_servers: config.ice_servers.clone(),
    };
    let manager = Arc::new(SessionManager::new(session, params, errors.clone()));

    // --- 5. Tour ---
    let (audio_tx, audio_rx) = tokio::sync::mpsc::channel(16);
    let player = player::ProcessPlayer::new(
        config.audio_player.clone(),
        config.audio_asset_dir.clone(),
        audio_tx,
    );
    let robot = RobotClient::new(&config.robot_api_url);
    let sequencer = TourSequencer::new(robot, player, manager, errors.clone())
        .with_max_poll_attempts(config.max_poll_attempts)
        .with_simulation_mode(args.simulation);

    let console = Console::new(sequencer, errors);
    let snapshots = console.snapshots();
    let (command_tx, command_rx) = tokio::sync::mpsc::channel(32);
    let console_handle = tokio::spawn(console.run(command_rx, audio_rx));

    // Print what changes, as it changes.
    let mut changes = snapshots.clone();
    let renderer = tokio::spawn(async move {
        let mut prev = changes.borrow_and_update().clone();
        while changes.changed().await.is_ok() {
            let next = changes.borrow_and_update().clone();
            for line in render::diff(&prev, &next) {
                println!("{line}");
            }
            prev = next;
        }
    });

    // --- 6. Operator Prompt ---
    let telemetry = TelemetryClient::new(&config.api_base_url);
    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    println!("Type `help` for the list of commands.");

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read from stdin")? else {
                    break;
                };
                match prompt::parse(&line) {
                    Ok(None) => {}
                    Ok(Some(Input::Console(command))) => {
                        if command_tx.send(command).await.is_err() {
                            tracing::error!("Console loop has stopped");
                            break;
                        }
                    }
                    Ok(Some(Input::Status)) => {
                        let snapshot = snapshots.borrow().clone();
                        for line in render::status(&snapshot) {
                            println!("{line}");
                        }
                    }
                    Ok(Some(Input::Telemetry)) => {
                        let dashboard = telemetry.dashboard().await;
                        for line in render::telemetry(&dashboard) {
                            println!("{line}");
                        }
                    }
                    Ok(Some(Input::Quit)) => break,
                    Err(e) => println!("{e}"),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Received Ctrl-C, shutting down...");
                break;
            }
        }
    }

    // Closing the command channel stops the tour and cancels its timers.
    drop(command_tx);
    console_handle.await.context("Console loop panicked")?;
    renderer.abort();
    tracing::info!("Shutting down...");
    Ok(())
}
