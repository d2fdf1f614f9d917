//! Bluetooth Low Energy transport for the TapFit Puck wearable
//!
//! Implements the `PuckTransport` trait from `tapfit-core` on top of
//! btleplug: filtered scanning for the Puck service, first-match
//! connect under a deadline, notify subscription, and a per-connection
//! forwarder that pumps notifications and a single-shot disconnect
//! event into the link stream.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use tapfit_ble::BlePuckTransport;
//! use tapfit_core::{ConnectOptions, PuckTransport};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let transport = BlePuckTransport::new().await?;
//! let connection = transport
//!     .connect_first(ConnectOptions::puck(Duration::from_secs(10)))
//!     .await?;
//! println!("connected to {}", connection.device.device_id);
//! # Ok(())
//! # }
//! ```

mod transport;

pub use transport::BlePuckTransport;
