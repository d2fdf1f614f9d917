//! Command implementations
//!
//! Both subcommands spawn a session and drive it from the snapshot
//! stream; `simulate` additionally feeds scripted reps into an
//! in-process peripheral so the full flow can run without hardware.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::{info, warn};

use tapfit_core::{
    NoOpRecorder, ReconnectConfig, SessionConfig, SessionState, SetRecorder,
};
use tapfit_ble::BlePuckTransport;
use tapfit_runtime::{SimulatedPuckTransport, WorkoutHandle, WorkoutSession};

use crate::cli::SessionArgs;
use crate::recorder::JsonlSetRecorder;

/// Run a session against a real Puck over BLE
pub async fn run(args: SessionArgs) -> Result<()> {
    let transport = Arc::new(BlePuckTransport::new().await?);
    let (handle, _join) = WorkoutSession::spawn(
        transport,
        session_config(&args),
        reconnect_config(&args),
        recorder(&args)?,
    );

    info!("Scanning for Puck (timeout {}s)...", args.connect_timeout);
    drive(handle, &session_config(&args), None).await
}

/// Run a session against an in-process simulated Puck
pub async fn simulate(args: SessionArgs) -> Result<()> {
    let transport = SimulatedPuckTransport::new();
    let (handle, _join) = WorkoutSession::spawn(
        Arc::new(transport.clone()),
        session_config(&args),
        reconnect_config(&args),
        recorder(&args)?,
    );

    spawn_rep_driver(transport, handle.clone());
    drive(handle, &session_config(&args), Some(Duration::from_secs(2))).await
}

fn session_config(args: &SessionArgs) -> SessionConfig {
    SessionConfig::default()
        .with_total_sets(args.sets)
        .with_target_reps(args.reps)
        .with_rest_seconds(args.rest)
}

fn reconnect_config(args: &SessionArgs) -> ReconnectConfig {
    ReconnectConfig {
        connect_timeout: Duration::from_secs(args.connect_timeout),
        ..ReconnectConfig::default()
    }
}

fn recorder(args: &SessionArgs) -> Result<Arc<dyn SetRecorder>> {
    match &args.out {
        Some(path) => {
            info!("Recording completed sets to {}", path.display());
            Ok(Arc::new(JsonlSetRecorder::open(path)?))
        }
        None => Ok(Arc::new(NoOpRecorder)),
    }
}

/// Feed one rep into the simulated Puck every 600ms while a set is live
fn spawn_rep_driver(sim: SimulatedPuckTransport, handle: WorkoutHandle) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_millis(600));
        loop {
            interval.tick().await;
            match handle.snapshot().state {
                SessionState::InSet { .. } => {
                    sim.push_rep();
                }
                SessionState::Done => break,
                _ => {}
            }
        }
    });
}

/// Drive a session from the snapshot stream until it finishes.
///
/// Starts set 1 as soon as pairing completes, renders every state
/// change, and maps Ctrl-C to an explicit end. With `auto_skip_rest`
/// set, rest periods are cut short after the given pause.
async fn drive(
    handle: WorkoutHandle,
    config: &SessionConfig,
    auto_skip_rest: Option<Duration>,
) -> Result<()> {
    let mut snapshots = handle.subscribe();
    let mut seen_active = false;

    handle.handshake()?;

    loop {
        let snapshot = snapshots.borrow_and_update().clone();
        render(&snapshot, config);

        match &snapshot.state {
            SessionState::Idle => {
                if let Some(error) = &snapshot.last_error {
                    anyhow::bail!("session aborted: {}", error);
                }
                if seen_active {
                    info!("Session ended");
                    return Ok(());
                }
            }
            SessionState::AwaitStart => {
                seen_active = true;
                handle.start_workout()?;
            }
            SessionState::Rest { .. } => {
                if let Some(pause) = auto_skip_rest {
                    if !snapshot.is_reconnecting() {
                        tokio::time::sleep(pause).await;
                        handle.skip_rest()?;
                    }
                }
            }
            SessionState::Done => {
                info!("Workout complete: {} sets recorded", config.total_sets);
                return Ok(());
            }
            _ => {
                seen_active = true;
            }
        }

        tokio::select! {
            changed = snapshots.changed() => {
                if changed.is_err() {
                    warn!("Session task stopped unexpectedly");
                    return Ok(());
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupt received, ending workout");
                handle.end_workout()?;
            }
        }
    }
}

fn render(snapshot: &tapfit_runtime::WorkoutSnapshot, config: &SessionConfig) {
    let reconnect = if snapshot.is_reconnecting() {
        format!(" (reconnecting, attempt {})", snapshot.reconnect.attempts)
    } else {
        String::new()
    };

    match &snapshot.state {
        SessionState::Idle => info!("Idle{}", reconnect),
        SessionState::Connecting => info!("Connecting to Puck..."),
        SessionState::AwaitStart => info!("Paired, ready to start"),
        SessionState::InSet { set_index, reps } => info!(
            "Set {}/{}: {}/{} reps{}",
            set_index, config.total_sets, reps, config.target_reps, reconnect
        ),
        SessionState::Rest { set_index, seconds } => info!(
            "Rest after set {}/{}: {}s remaining{}",
            set_index, config.total_sets, seconds, reconnect
        ),
        SessionState::Done => info!("Done"),
    }
}
