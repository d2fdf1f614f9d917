//! Reconnection Supervisor
//!
//! Owns the single active device handle and its link event stream. The
//! session task never touches the transport directly; it sends link
//! commands here and receives coarse supervisor events back. Unexpected
//! disconnects are absorbed by a bounded exponential backoff loop and
//! only surface to the session as `ReconnectExhausted` once the retry
//! budget is spent.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use tapfit_core::{
    ConnectOptions, DeviceHandle, LinkEvent, LinkEventReceiver, PuckTransport, ReconnectConfig,
    SessionError,
};

// ----------------------------------------------------------------------------
// Commands and Events
// ----------------------------------------------------------------------------

/// Commands the session task sends to the supervisor
#[derive(Debug)]
pub enum LinkCommand {
    /// Establish the initial connection (first handshake, no retries)
    Connect,
    /// Write a command frame to the peripheral
    Write(Vec<u8>),
    /// Tear the link down; also aborts an in-flight reconnect
    Disconnect,
    /// Disconnect and stop the supervisor task
    Shutdown,
}

/// Events the supervisor reports to the session task
#[derive(Debug, PartialEq, Eq)]
pub enum SupervisorEvent {
    /// Initial connect succeeded
    Connected,
    /// Initial connect failed; surfaced once to the consumer
    ConnectFailed(SessionError),
    /// Raw notification frame from the peripheral
    Notification(Vec<u8>),
    /// An unexpected disconnect happened; retry `attempt` is starting
    Reconnecting { attempt: u32 },
    /// The link is back; session progress is untouched
    Reconnected,
    /// Retry budget spent; the session must be abandoned
    ReconnectExhausted,
}

// ----------------------------------------------------------------------------
// Supervisor Task
// ----------------------------------------------------------------------------

/// Supervises one transport link for the lifetime of a session task
pub struct ReconnectSupervisor {
    transport: Arc<dyn PuckTransport>,
    config: ReconnectConfig,
    command_rx: mpsc::UnboundedReceiver<LinkCommand>,
    event_tx: mpsc::UnboundedSender<SupervisorEvent>,
    device: Option<DeviceHandle>,
    link_events: Option<LinkEventReceiver>,
}

impl ReconnectSupervisor {
    pub fn new(
        transport: Arc<dyn PuckTransport>,
        config: ReconnectConfig,
        command_rx: mpsc::UnboundedReceiver<LinkCommand>,
        event_tx: mpsc::UnboundedSender<SupervisorEvent>,
    ) -> Self {
        Self {
            transport,
            config,
            command_rx,
            event_tx,
            device: None,
            link_events: None,
        }
    }

    /// Main supervisor loop: link commands from the session task and
    /// events from the live link funnel through one dispatch path.
    pub async fn run(&mut self) {
        loop {
            tokio::select! {
                command = self.command_rx.recv() => {
                    match command {
                        Some(LinkCommand::Connect) => self.handle_connect().await,
                        Some(LinkCommand::Write(payload)) => self.handle_write(&payload).await,
                        Some(LinkCommand::Disconnect) => self.handle_disconnect().await,
                        Some(LinkCommand::Shutdown) | None => {
                            self.handle_disconnect().await;
                            break;
                        }
                    }
                }

                event = recv_link_event(&mut self.link_events) => {
                    match event {
                        Some(LinkEvent::Notification(frame)) => {
                            self.emit(SupervisorEvent::Notification(frame));
                        }
                        // A dropped sender and an explicit Disconnected
                        // event both mean the link died under us
                        Some(LinkEvent::Disconnected) | None => {
                            self.run_reconnect_loop().await;
                        }
                    }
                }
            }
        }
        debug!("Reconnect supervisor stopped");
    }

    async fn handle_connect(&mut self) {
        if self.device.is_some() {
            // Connect while already linked; the session machine guards
            // against this, so just report the link as up
            self.emit(SupervisorEvent::Connected);
            return;
        }

        match self.try_connect().await {
            Ok(()) => self.emit(SupervisorEvent::Connected),
            Err(error) => {
                warn!("Handshake connect failed: {}", error);
                self.emit(SupervisorEvent::ConnectFailed(error));
            }
        }
    }

    async fn try_connect(&mut self) -> Result<(), SessionError> {
        let options = ConnectOptions::puck(self.config.connect_timeout);
        match self.transport.connect_first(options).await {
            Ok(connection) => {
                info!(
                    "Linked to Puck {} ({:?})",
                    connection.device.device_id, connection.device.name
                );
                self.device = Some(connection.device);
                self.link_events = Some(connection.events);
                Ok(())
            }
            Err(error) => Err(SessionError::from(&error)),
        }
    }

    async fn handle_write(&mut self, payload: &[u8]) {
        let Some(device) = &self.device else {
            warn!("Dropping {}-byte write, link is down", payload.len());
            return;
        };
        // Write failures on command frames are non-fatal; the set
        // continues and a broken link shows up as a disconnect event
        if let Err(error) = self.transport.write(device, payload).await {
            warn!("Write to {} failed: {}", device.device_id, error);
        }
    }

    async fn handle_disconnect(&mut self) {
        // Drop the event stream first so nothing queued on the old link
        // can be delivered after the disconnect
        self.link_events = None;
        if let Some(device) = self.device.take() {
            if let Err(error) = self.transport.disconnect(&device).await {
                warn!("Disconnect from {} failed: {}", device.device_id, error);
            }
        }
    }

    /// Bounded exponential backoff after an unexpected disconnect.
    ///
    /// Disconnect/shutdown commands interrupt the backoff immediately;
    /// further disconnect events cannot arrive while this runs because
    /// the failed link's stream is dropped up front, so attempts are
    /// never duplicated.
    async fn run_reconnect_loop(&mut self) {
        self.link_events = None;
        if let Some(stale) = self.device.take() {
            let _ = self.transport.disconnect(&stale).await;
        }
        warn!("Puck link lost unexpectedly, reconnecting");

        for attempt in 1..=self.config.max_attempts {
            self.emit(SupervisorEvent::Reconnecting { attempt });

            let delay = self.config.delay_for_attempt(attempt);
            tokio::select! {
                _ = sleep(delay) => {}
                command = self.command_rx.recv() => {
                    match command {
                        Some(LinkCommand::Disconnect) | Some(LinkCommand::Shutdown) | None => {
                            info!("Reconnect aborted by session");
                            return;
                        }
                        Some(LinkCommand::Write(payload)) => {
                            warn!("Dropping {}-byte write while reconnecting", payload.len());
                        }
                        Some(LinkCommand::Connect) => {}
                    }
                }
            }

            // The transport enforces the per-attempt deadline via
            // ConnectOptions, so no extra timeout wrapper is needed
            match self.try_connect().await {
                Ok(()) => {
                    info!("Reconnected after {} attempt(s)", attempt);
                    self.emit(SupervisorEvent::Reconnected);
                    return;
                }
                Err(error) => {
                    warn!("Reconnect attempt {} failed: {}", attempt, error);
                }
            }
        }

        warn!(
            "Reconnect budget of {} attempts exhausted",
            self.config.max_attempts
        );
        self.emit(SupervisorEvent::ReconnectExhausted);
    }

    fn emit(&self, event: SupervisorEvent) {
        if self.event_tx.send(event).is_err() {
            debug!("Session task gone, dropping supervisor event");
        }
    }
}

/// Receive from the link when one exists; otherwise park the branch
async fn recv_link_event(events: &mut Option<LinkEventReceiver>) -> Option<LinkEvent> {
    match events {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
