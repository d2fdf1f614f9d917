//! Workout Session Task
//!
//! The serialized dispatch path of the session core: consumer commands,
//! supervisor events, and rest-countdown ticks all funnel through one
//! tokio task that owns the state machine. The task also owns the rest
//! interval timer; the timer exists only while the state is `Rest`, so
//! leaving the state cancels it structurally and re-entries can never
//! leak a second countdown.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{debug, warn};

use tapfit_core::{
    CompletedSet, PuckNotification, SessionConfig, SessionEffect, SessionError, SessionEvent,
    SessionState, SetRecorder, CMD_RESET,
};

use crate::supervisor::{LinkCommand, SupervisorEvent};

// ----------------------------------------------------------------------------
// Snapshots and Commands
// ----------------------------------------------------------------------------

/// Reconnection progress, reset on every successful connect
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconnectState {
    pub is_reconnecting: bool,
    pub attempts: u32,
}

/// Immutable view of the session handed to consumers.
///
/// `generation` increments every time the session object is replaced
/// (return to idle, or reset after `Done`); consumers holding state
/// from an older generation must treat it as stale.
#[derive(Debug, Clone, Serialize)]
pub struct WorkoutSnapshot {
    pub generation: u64,
    pub state: SessionState,
    pub reconnect: ReconnectState,
    pub last_error: Option<SessionError>,
}

impl WorkoutSnapshot {
    pub fn is_reconnecting(&self) -> bool {
        self.reconnect.is_reconnecting
    }
}

/// Commands accepted from the consumer adapter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkoutCommand {
    Handshake,
    Start,
    SkipRest,
    End,
}

// ----------------------------------------------------------------------------
// Session Task
// ----------------------------------------------------------------------------

enum Wakeup {
    Command(Option<WorkoutCommand>),
    Supervisor(Option<SupervisorEvent>),
    RestTick,
}

/// Owns the session state machine and executes its effects
pub struct WorkoutSessionTask {
    config: SessionConfig,
    state: SessionState,
    generation: u64,
    reconnect: ReconnectState,
    last_error: Option<SessionError>,
    recorder: Arc<dyn SetRecorder>,
    command_rx: mpsc::UnboundedReceiver<WorkoutCommand>,
    supervisor_tx: mpsc::UnboundedSender<LinkCommand>,
    supervisor_rx: mpsc::UnboundedReceiver<SupervisorEvent>,
    snapshot_tx: watch::Sender<WorkoutSnapshot>,
    rest_interval: Option<Interval>,
}

impl WorkoutSessionTask {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: SessionConfig,
        recorder: Arc<dyn SetRecorder>,
        command_rx: mpsc::UnboundedReceiver<WorkoutCommand>,
        supervisor_tx: mpsc::UnboundedSender<LinkCommand>,
        supervisor_rx: mpsc::UnboundedReceiver<SupervisorEvent>,
        snapshot_tx: watch::Sender<WorkoutSnapshot>,
    ) -> Self {
        Self {
            config,
            state: SessionState::Idle,
            generation: 0,
            reconnect: ReconnectState::default(),
            last_error: None,
            recorder,
            command_rx,
            supervisor_tx,
            supervisor_rx,
            snapshot_tx,
            rest_interval: None,
        }
    }

    /// Initial snapshot published before the task starts
    pub fn initial_snapshot() -> WorkoutSnapshot {
        WorkoutSnapshot {
            generation: 0,
            state: SessionState::Idle,
            reconnect: ReconnectState::default(),
            last_error: None,
        }
    }

    /// Main dispatch loop
    pub async fn run(&mut self) {
        loop {
            // The rest countdown pauses while reconnecting: remaining
            // seconds are part of the preserved session progress
            let ticking = !self.reconnect.is_reconnecting;

            let wakeup = tokio::select! {
                command = self.command_rx.recv() => Wakeup::Command(command),
                event = self.supervisor_rx.recv() => Wakeup::Supervisor(event),
                _ = rest_tick(&mut self.rest_interval), if ticking => Wakeup::RestTick,
            };

            match wakeup {
                Wakeup::Command(None) => {
                    // All handles dropped; shut the supervisor down too
                    let _ = self.supervisor_tx.send(LinkCommand::Shutdown);
                    break;
                }
                Wakeup::Command(Some(command)) => self.handle_command(command).await,
                Wakeup::Supervisor(None) => {
                    warn!("Supervisor task ended, stopping session task");
                    break;
                }
                Wakeup::Supervisor(Some(event)) => self.handle_supervisor_event(event).await,
                Wakeup::RestTick => self.apply(SessionEvent::RestTick).await,
            }
        }
        debug!("Workout session task stopped");
    }

    async fn handle_command(&mut self, command: WorkoutCommand) {
        match command {
            WorkoutCommand::Handshake => {
                // A fresh pairing attempt clears the previously surfaced error
                self.last_error = None;
                self.apply(SessionEvent::Handshake).await;
            }
            WorkoutCommand::Start => self.apply(SessionEvent::Start).await,
            WorkoutCommand::SkipRest => self.apply(SessionEvent::SkipRest).await,
            WorkoutCommand::End => {
                if self.state == SessionState::Done {
                    // Done is terminal in the machine; ending from it
                    // replaces the session with a fresh idle one
                    self.state = SessionState::Idle;
                    self.generation += 1;
                    self.reconnect = ReconnectState::default();
                    self.sync_rest_timer();
                    self.publish();
                } else {
                    self.apply(SessionEvent::End).await;
                }
            }
        }
    }

    async fn handle_supervisor_event(&mut self, event: SupervisorEvent) {
        match event {
            SupervisorEvent::Connected => {
                self.reconnect = ReconnectState::default();
                self.apply(SessionEvent::Connected).await;
            }
            SupervisorEvent::ConnectFailed(error) => {
                self.apply(SessionEvent::ConnectFailed(error)).await;
            }
            SupervisorEvent::Notification(frame) => match PuckNotification::decode(&frame) {
                Some(note) => self.apply(SessionEvent::Notification(note)).await,
                None => debug!("Dropping unrecognized Puck frame: {:02X?}", frame),
            },
            SupervisorEvent::Reconnecting { attempt } => {
                self.reconnect = ReconnectState {
                    is_reconnecting: true,
                    attempts: attempt,
                };
                self.publish();
            }
            SupervisorEvent::Reconnected => {
                self.reconnect = ReconnectState::default();
                // Restart the countdown spacing so the pause does not
                // burst queued ticks into the resumed rest
                if self.rest_interval.is_some() {
                    self.rest_interval = Some(new_rest_interval());
                }
                self.publish();
            }
            SupervisorEvent::ReconnectExhausted => {
                self.reconnect = ReconnectState::default();
                self.apply(SessionEvent::ReconnectExhausted).await;
            }
        }
    }

    /// Feed one event through the machine and execute its effects
    async fn apply(&mut self, event: SessionEvent) {
        let state = std::mem::take(&mut self.state);
        let was_idle = state == SessionState::Idle;

        let transition = state.transition(&self.config, event);
        self.state = transition.new_state;
        if let Some(error) = transition.error {
            self.last_error = Some(error);
        }

        // Returning to idle ends the session object's lifetime: bump the
        // generation so anything queued against the old session reads as
        // stale, and forget reconnection progress
        if !was_idle && self.state == SessionState::Idle {
            self.generation += 1;
            self.reconnect = ReconnectState::default();
        }

        for effect in transition.effects {
            self.run_effect(effect).await;
        }

        self.sync_rest_timer();
        self.publish();
    }

    async fn run_effect(&mut self, effect: SessionEffect) {
        match effect {
            SessionEffect::Connect => {
                let _ = self.supervisor_tx.send(LinkCommand::Connect);
            }
            SessionEffect::WriteReset => {
                let _ = self.supervisor_tx.send(LinkCommand::Write(vec![CMD_RESET]));
            }
            SessionEffect::Disconnect => {
                let _ = self.supervisor_tx.send(LinkCommand::Disconnect);
            }
            SessionEffect::RecordSet { set_index, reps } => {
                let set = CompletedSet {
                    set_index,
                    reps,
                    completed_at_ms: unix_millis(),
                };
                // Persistence is write-only from the session's view;
                // failures never affect workout state
                if let Err(error) = self.recorder.record_set(set).await {
                    warn!("Failed to record set {}: {}", set_index, error);
                }
            }
        }
    }

    /// The rest interval exists exactly while the state is `Rest`
    fn sync_rest_timer(&mut self) {
        match (&self.state, self.rest_interval.is_some()) {
            (SessionState::Rest { .. }, false) => {
                self.rest_interval = Some(new_rest_interval());
            }
            (SessionState::Rest { .. }, true) => {}
            (_, true) => {
                self.rest_interval = None;
            }
            (_, false) => {}
        }
    }

    fn publish(&self) {
        self.snapshot_tx.send_replace(WorkoutSnapshot {
            generation: self.generation,
            state: self.state.clone(),
            reconnect: self.reconnect,
            last_error: self.last_error.clone(),
        });
    }
}

fn new_rest_interval() -> Interval {
    let mut interval = interval_at(
        Instant::now() + Duration::from_secs(1),
        Duration::from_secs(1),
    );
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

/// Tick when a rest countdown is running; otherwise park the branch
async fn rest_tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
