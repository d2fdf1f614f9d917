//! Transport seam between the session runtime and the BLE stack
//!
//! The runtime never touches btleplug directly; it drives a
//! [`PuckTransport`] implementation, which keeps the session logic
//! testable against a scripted in-process peripheral.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::errors::TransportError;

// ----------------------------------------------------------------------------
// Device Handle
// ----------------------------------------------------------------------------

/// Handle to a connected peripheral, returned by a successful
/// [`PuckTransport::connect_first`]. Owned exclusively by the
/// reconnection supervisor for the duration of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceHandle {
    /// Transport-specific device identifier
    pub device_id: String,
    /// Advertised device name, when available
    pub name: Option<String>,
}

// ----------------------------------------------------------------------------
// Link Events
// ----------------------------------------------------------------------------

/// Asynchronous events pushed by a live connection.
///
/// `Disconnected` fires at most once per connection, and never after the
/// owner called [`PuckTransport::disconnect`] on the same handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// Raw notification frame from the peripheral
    Notification(Vec<u8>),
    /// The link dropped unexpectedly
    Disconnected,
}

/// Receiving side of a connection's event stream
pub type LinkEventReceiver = mpsc::UnboundedReceiver<LinkEvent>;

/// Sending side, held by transport implementations
pub type LinkEventSender = mpsc::UnboundedSender<LinkEvent>;

// ----------------------------------------------------------------------------
// Connect Options
// ----------------------------------------------------------------------------

/// Parameters for a first-match connect
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    /// Service UUID the peripheral must advertise
    pub service: Uuid,
    /// Characteristic used for commands and notifications
    pub characteristic: Uuid,
    /// Overall scan + connect deadline
    pub timeout: Duration,
}

impl ConnectOptions {
    /// Options for the Puck wearable with the given deadline
    pub fn puck(timeout: Duration) -> Self {
        Self {
            service: crate::protocol::PUCK_SERVICE_UUID,
            characteristic: crate::protocol::PUCK_CHARACTERISTIC_UUID,
            timeout,
        }
    }
}

// ----------------------------------------------------------------------------
// Transport Trait
// ----------------------------------------------------------------------------

/// A live connection: the handle plus its event stream
pub struct Connection {
    pub device: DeviceHandle,
    pub events: LinkEventReceiver,
}

/// BLE transport operations needed by the session runtime.
///
/// Callers must serialize `connect_first` calls for a logical session;
/// implementations are not required to support concurrent scans.
#[async_trait]
pub trait PuckTransport: Send + Sync {
    /// Scan for and connect to the first peripheral advertising
    /// `options.service`, subscribe to `options.characteristic`, and
    /// return the handle plus the connection's event stream.
    async fn connect_first(&self, options: ConnectOptions) -> Result<Connection, TransportError>;

    /// Write a command frame to the peripheral's characteristic.
    async fn write(&self, device: &DeviceHandle, payload: &[u8]) -> Result<(), TransportError>;

    /// Disconnect from the peripheral. Idempotent: succeeds even if the
    /// link is already gone, and suppresses any pending `Disconnected`
    /// event for this handle.
    async fn disconnect(&self, device: &DeviceHandle) -> Result<(), TransportError>;
}
