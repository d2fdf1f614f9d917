//! Session orchestration for the TapFit Puck core
//!
//! Wires the pure state machine from `tapfit-core` to a transport:
//!
//! - [`supervisor`] - owns the device handle, absorbs unexpected
//!   disconnects behind a bounded backoff loop
//! - [`session_task`] - the serialized dispatch path that owns the
//!   state machine, the rest timer, and the generation counter
//! - [`handle`] - the consumer adapter: commands in, snapshots out
//! - [`sim`] - an in-process scripted peripheral for tests and demos

pub mod handle;
pub mod session_task;
pub mod sim;
pub mod supervisor;

pub use handle::{WorkoutHandle, WorkoutSession};
pub use session_task::{ReconnectState, WorkoutCommand, WorkoutSnapshot};
pub use sim::SimulatedPuckTransport;
pub use supervisor::{LinkCommand, ReconnectSupervisor, SupervisorEvent};
