//! Consumer Adapter
//!
//! `WorkoutHandle` is the only surface the UI sees: idempotent commands
//! in, immutable snapshots out. It performs no business logic itself;
//! every command is forwarded to the session task's serialized dispatch
//! path, and re-renders hang off the watch channel.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use tapfit_core::{
    PuckTransport, ReconnectConfig, Result, SessionConfig, SetRecorder, TapfitError,
};

use crate::session_task::{WorkoutCommand, WorkoutSessionTask, WorkoutSnapshot};
use crate::supervisor::ReconnectSupervisor;

// ----------------------------------------------------------------------------
// Session Wiring
// ----------------------------------------------------------------------------

/// A running workout session: supervisor task + session task
pub struct WorkoutSession;

impl WorkoutSession {
    /// Spawn the supervisor and session tasks and return the consumer
    /// handle. The session ends when every handle is dropped.
    pub fn spawn(
        transport: Arc<dyn PuckTransport>,
        session_config: SessionConfig,
        reconnect_config: ReconnectConfig,
        recorder: Arc<dyn SetRecorder>,
    ) -> (WorkoutHandle, JoinHandle<()>) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (link_command_tx, link_command_rx) = mpsc::unbounded_channel();
        let (supervisor_event_tx, supervisor_event_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshot_rx) = watch::channel(WorkoutSessionTask::initial_snapshot());

        let mut supervisor = ReconnectSupervisor::new(
            transport,
            reconnect_config,
            link_command_rx,
            supervisor_event_tx,
        );
        tokio::spawn(async move { supervisor.run().await });

        let mut session_task = WorkoutSessionTask::new(
            session_config,
            recorder,
            command_rx,
            link_command_tx,
            supervisor_event_rx,
            snapshot_tx,
        );
        let join = tokio::spawn(async move { session_task.run().await });

        (
            WorkoutHandle {
                command_tx,
                snapshot_rx,
            },
            join,
        )
    }
}

// ----------------------------------------------------------------------------
// Consumer Handle
// ----------------------------------------------------------------------------

/// Handle to a running session, cloneable per consumer
#[derive(Clone)]
pub struct WorkoutHandle {
    command_tx: mpsc::UnboundedSender<WorkoutCommand>,
    snapshot_rx: watch::Receiver<WorkoutSnapshot>,
}

impl WorkoutHandle {
    /// Pair with the wearable. No-op unless the session is idle.
    pub fn handshake(&self) -> Result<()> {
        self.send(WorkoutCommand::Handshake)
    }

    /// Begin set 1. No-op unless the device is paired and waiting.
    pub fn start_workout(&self) -> Result<()> {
        self.send(WorkoutCommand::Start)
    }

    /// Cut the current rest countdown short. No-op outside rest.
    pub fn skip_rest(&self) -> Result<()> {
        self.send(WorkoutCommand::SkipRest)
    }

    /// Abort the session and disconnect. No-op when already idle.
    pub fn end_workout(&self) -> Result<()> {
        self.send(WorkoutCommand::End)
    }

    /// Current snapshot of the session
    pub fn snapshot(&self) -> WorkoutSnapshot {
        self.snapshot_rx.borrow().clone()
    }

    /// Watch receiver for state-change notifications
    pub fn subscribe(&self) -> watch::Receiver<WorkoutSnapshot> {
        self.snapshot_rx.clone()
    }

    fn send(&self, command: WorkoutCommand) -> Result<()> {
        self.command_tx
            .send(command)
            .map_err(|_| TapfitError::SessionTaskStopped)
    }
}
