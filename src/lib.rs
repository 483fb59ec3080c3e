//! Input Replay - record mouse and keyboard input, then play it back.
//!
//! This is the main library crate. It provides the recorder (capture,
//! persistence, replay) and a console front end driven by `run`.

pub mod capture;
pub mod commands;
pub mod config;
pub mod recorder;
pub mod replay;
pub mod utils;

use commands::recording::{self as cmd, RecorderState};
use config::RecorderConfig;
use recorder::{ControlNotice, RecordingCoordinator};
use replay::EnigoBackend;
use std::io::BufRead;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const HELP: &str = "Commands: record, stop, replay, cancel, status, help, quit (Esc stops recording or replay)";

/// Initialize logging and run the console front end until `quit`.
pub async fn run() -> anyhow::Result<()> {
    // Initialize tracing/logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "input_replay=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Input Replay v{}", env!("CARGO_PKG_VERSION"));

    let config = RecorderConfig::from_env();
    config.validate()?;
    tracing::debug!("Recording file: {}", config.recording_path.display());

    let (notice_tx, mut notice_rx) = mpsc::unbounded_channel();
    let coordinator =
        RecordingCoordinator::new(config, Arc::new(EnigoBackend::new())).with_notices(notice_tx);
    if let Err(e) = coordinator.attach_global_listener() {
        tracing::warn!("Global listener unavailable, Esc will not work: {}", e);
    }
    let state = RecorderState::new(coordinator);

    let mut lines = spawn_stdin_reader()?;
    println!("{}", state.coordinator.status_message());
    println!("{}", HELP);

    loop {
        tokio::select! {
            line = lines.recv() => match line {
                Some(line) => {
                    if !handle_command(&state, line.trim()).await {
                        break;
                    }
                }
                None => break,
            },
            Some(notice) = notice_rx.recv() => print_notice(&notice),
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted");
                break;
            }
        }
    }

    cmd::shutdown(&state).await.map_err(anyhow::Error::msg)?;
    tracing::info!("Goodbye");
    Ok(())
}

/// Forward stdin lines from a plain thread so a pending read never holds up
/// runtime shutdown.
fn spawn_stdin_reader() -> anyhow::Result<mpsc::UnboundedReceiver<String>> {
    let (tx, rx) = mpsc::unbounded_channel();
    utils::spawn_named("stdin-reader", move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    })?;
    Ok(rx)
}

/// Returns `false` when the console should exit.
async fn handle_command(state: &RecorderState, command: &str) -> bool {
    let result = match command {
        "" => return true,
        "record" => cmd::start_recording(state).await.map(|()| None),
        "stop" => cmd::stop_recording(state).await.map(|_| None),
        "replay" => cmd::start_replay(state).await.map(|_| None),
        "cancel" => cmd::cancel_replay(state)
            .await
            .map(|stopped| (!stopped).then(|| "Nothing is replaying".to_string())),
        "status" => cmd::get_status(state).await.map(|status| {
            Some(format!(
                "[{}] {} ({} events stored)",
                status.phase, status.message, status.event_count
            ))
        }),
        "help" => Ok(Some(HELP.to_string())),
        "quit" | "exit" => return false,
        other => Ok(Some(format!("Unknown command '{}'. {}", other, HELP))),
    };

    match result {
        Ok(Some(message)) => println!("{}", message),
        Ok(None) => {}
        Err(e) => println!("{}", e),
    }
    true
}

fn print_notice(notice: &ControlNotice) {
    match notice {
        ControlNotice::RecordingStarted => {
            println!("Recording... move/click/scroll then press Esc")
        }
        ControlNotice::RecordingStopped { events } => println!("Stopped. Captured {} events", events),
        ControlNotice::ReplayStarted { events } => println!("Replaying {} events...", events),
        ControlNotice::ReplayFinished(report) => println!("{}", report.status_line()),
        ControlNotice::Warning(message) => println!("Warning: {}", message),
    }
}
