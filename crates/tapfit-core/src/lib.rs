//! Core session logic for the TapFit Puck wearable
//!
//! This crate holds everything that is pure or a contract: the rep
//! session state machine, the Puck wire protocol, the transport and
//! recorder trait seams, configuration, and the error taxonomy. All
//! I/O lives in `tapfit-ble` (the btleplug transport) and
//! `tapfit-runtime` (the tokio session task and reconnection
//! supervisor).
//!
//! ## Architecture
//!
//! - [`session`] - the tagged-union session state machine
//! - [`protocol`] - Puck BLE service/characteristic UUIDs and frame codec
//! - [`transport`] - the `PuckTransport` seam the runtime drives
//! - [`recorder`] - write-only persistence seam for completed sets
//! - [`config`] - session shape and reconnect backoff configuration
//! - [`errors`] - `thiserror` taxonomy and the crate `Result` alias

pub mod config;
pub mod errors;
pub mod protocol;
pub mod recorder;
pub mod session;
pub mod transport;

pub use config::{ReconnectConfig, SessionConfig};
pub use errors::{RecorderError, Result, SessionError, TapfitError, TransportError};
pub use protocol::{PuckNotification, CMD_RESET, PUCK_CHARACTERISTIC_UUID, PUCK_SERVICE_UUID};
pub use recorder::{CompletedSet, NoOpRecorder, SetRecorder};
pub use session::{SessionEffect, SessionEvent, SessionState, StateTransition};
pub use transport::{
    ConnectOptions, Connection, DeviceHandle, LinkEvent, LinkEventReceiver, LinkEventSender,
    PuckTransport,
};
