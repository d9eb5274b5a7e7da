use regsync_common::RawId;

/// Structural failure while remapping. Always fatal to the containing
/// `apply`/`unmap` call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RemapError {
    #[error("registry {registry}: id {id} claimed by both {first} and {second}")]
    DuplicateId {
        registry: String,
        id: RawId,
        first: String,
        second: String,
    },
    #[error("registry {registry}: no raw ids left to allocate for {entry}")]
    IdSpaceExhausted { registry: String, entry: String },
    #[error("registry {registry} rejected remap: {reason}")]
    Rejected { registry: String, reason: String },
}

impl RemapError {
    /// Name of the registry that failed.
    pub fn registry(&self) -> &str {
        match self {
            Self::DuplicateId { registry, .. }
            | Self::IdSpaceExhausted { registry, .. }
            | Self::Rejected { registry, .. } => registry,
        }
    }
}

/// Errors from building a registry directory.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DirectoryError {
    #[error("registry {0} is already registered")]
    Duplicate(String),
}

/// Errors adding an entry to a registry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegisterError {
    #[error("no raw ids left to allocate for {0}")]
    IdSpaceExhausted(String),
}
