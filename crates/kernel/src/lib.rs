//! Registry kernel: the live name-to-id tables and the engine that reconciles
//! them against snapshots.
//!
//! # Invariants
//! - After a successful remap every live name holds exactly one id and every
//!   id is held by exactly one name.
//! - A registry either accepts a whole table or rejects it untouched.
//! - Snapshot eligibility (extensible + remappable) is decided once, at
//!   registration time.

pub mod directory;
pub mod error;
pub mod registry;
pub mod remap;

pub use directory::RegistryDirectory;
pub use error::{DirectoryError, RegisterError, RemapError};
pub use registry::{
    Mismatch, MismatchKind, Registry, RemapReport, RemappableRegistry, SimpleRegistry,
};
pub use remap::RemapOutcome;

pub fn crate_info() -> &'static str {
    "regsync-kernel v0.1.0"
}
