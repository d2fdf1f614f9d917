//! Simulated Puck peripheral
//!
//! An in-process `PuckTransport` that mirrors the firmware test
//! harness: reps are injected as `[0x01]` / `[0x01, n]` frames and the
//! link can be dropped on demand. Used by the CLI's `simulate` command
//! and the runtime integration tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;

use tapfit_core::{
    ConnectOptions, Connection, DeviceHandle, LinkEvent, LinkEventSender, PuckNotification,
    PuckTransport, TransportError,
};

// ----------------------------------------------------------------------------
// Simulated Transport
// ----------------------------------------------------------------------------

/// Scriptable transport standing in for a real Puck
#[derive(Clone, Default)]
pub struct SimulatedPuckTransport {
    inner: Arc<Mutex<SimState>>,
}

#[derive(Default)]
struct SimState {
    /// Errors returned by upcoming connect attempts, in order
    scripted_failures: VecDeque<TransportError>,
    /// Sender for the currently linked session, if any
    link: Option<LinkEventSender>,
    /// Every frame written by the host, oldest first
    writes: Vec<Vec<u8>>,
    connect_count: u32,
}

impl SimulatedPuckTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, SimState> {
        self.inner.lock().expect("sim transport lock poisoned")
    }

    /// Queue an error for the next connect attempt
    pub fn fail_next_connect(&self, error: TransportError) {
        self.state().scripted_failures.push_back(error);
    }

    /// Inject a raw notification frame; returns false if no link is up
    pub fn push_frame(&self, frame: Vec<u8>) -> bool {
        let state = self.state();
        match &state.link {
            Some(tx) => tx.send(LinkEvent::Notification(frame)).is_ok(),
            None => false,
        }
    }

    /// Inject one rep motion
    pub fn push_rep(&self) -> bool {
        self.push_frame(PuckNotification::Rep.encode())
    }

    /// Inject an absolute rep-count report
    pub fn push_rep_count(&self, count: u8) -> bool {
        self.push_frame(PuckNotification::RepCount(count).encode())
    }

    /// Drop the link as if the peripheral walked out of range
    pub fn drop_link(&self) {
        let mut state = self.state();
        if let Some(tx) = state.link.take() {
            let _ = tx.send(LinkEvent::Disconnected);
        }
    }

    /// Whether a session currently holds the link
    pub fn is_linked(&self) -> bool {
        self.state().link.is_some()
    }

    /// Total connect attempts seen, including failed ones
    pub fn connect_count(&self) -> u32 {
        self.state().connect_count
    }

    /// Frames the host has written so far
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.state().writes.clone()
    }
}

#[async_trait]
impl PuckTransport for SimulatedPuckTransport {
    async fn connect_first(&self, _options: ConnectOptions) -> Result<Connection, TransportError> {
        let mut state = self.state();
        state.connect_count += 1;

        if let Some(error) = state.scripted_failures.pop_front() {
            return Err(error);
        }

        let (tx, rx) = mpsc::unbounded_channel();
        state.link = Some(tx);

        Ok(Connection {
            device: DeviceHandle {
                device_id: "sim-puck".to_string(),
                name: Some("Puck.js".to_string()),
            },
            events: rx,
        })
    }

    async fn write(&self, _device: &DeviceHandle, payload: &[u8]) -> Result<(), TransportError> {
        let mut state = self.state();
        if state.link.is_none() {
            return Err(TransportError::NotConnected);
        }
        state.writes.push(payload.to_vec());
        Ok(())
    }

    async fn disconnect(&self, _device: &DeviceHandle) -> Result<(), TransportError> {
        // Dropping the sender without emitting Disconnected implements
        // the explicit-disconnect suppression contract
        self.state().link = None;
        Ok(())
    }
}
