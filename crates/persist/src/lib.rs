//! Persistence: snapshot codec and the rotating backup chain.
//!
//! # Invariants
//! - Encoding a snapshot never mutates registry state.
//! - Backup files are owned by [`BackupChain`]; nothing else reads or writes them.
//! - A structural remap failure during load is fatal at any generation.

mod backup;
mod error;
mod snapshot;

pub use backup::{BackupChain, LoadOutcome, SaveOutcome};
pub use error::{BackupError, DecodeError, EncodeError};
pub use snapshot::{Audience, SnapshotCodec};

pub fn crate_info() -> &'static str {
    "regsync-persist v0.1.0"
}
