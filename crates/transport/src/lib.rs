//! Sync transport: ships registry snapshots between peers and applies received
//! ones on the simulation context.
//!
//! # Invariants
//! - A received snapshot is never applied on the calling (network) thread.
//! - The caller waits at most the configured timeout; the scheduled remap may
//!   still finish afterwards.
//! - This crate reports errors; it never disconnects a peer.

mod channel;
mod error;
mod packet;
mod queue;

pub use channel::{DEFAULT_SYNC_TIMEOUT, SYNC_CHANNEL, SyncChannel};
pub use error::SyncError;
pub use packet::SyncPacket;
pub use queue::{ScheduleError, SimulationHandle, SimulationQueue, Task, spawn_simulation};

pub fn crate_info() -> &'static str {
    "regsync-transport v0.1.0"
}
