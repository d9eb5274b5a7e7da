use regsync_kernel::{Mismatch, RemapError};
use regsync_persist::{DecodeError, EncodeError};
use std::time::Duration;

/// Errors delivered to a sync receiver's error callback.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("malformed sync packet: {0}")]
    Framing(String),
    #[error("packet on channel {found}, expected {expected}")]
    WrongChannel {
        found: String,
        expected: &'static str,
    },
    #[error("failed to decode registry snapshot: {0}")]
    Decode(#[from] DecodeError),
    #[error("failed to encode registry snapshot: {0}")]
    Encode(#[from] EncodeError),
    #[error("remapping registries failed: {0}")]
    Remap(#[from] RemapError),
    #[error("registry mismatch: {}", join(.0))]
    Mismatch(Vec<Mismatch>),
    #[error("timed out after {0:?} waiting for the simulation context")]
    Timeout(Duration),
    #[error("simulation context dropped the remap task")]
    Cancelled,
}

impl SyncError {
    /// Transport or scheduling failure, as opposed to bad data. Callers may retry these.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::Cancelled)
    }
}

fn join(mismatches: &[Mismatch]) -> String {
    mismatches
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
