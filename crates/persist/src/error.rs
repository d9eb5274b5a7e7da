use regsync_kernel::RemapError;
use std::path::PathBuf;

/// Errors turning a snapshot into bytes.
#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CBOR serialization error: {0}")]
    Cbor(String),
}

/// Malformed or incompatible snapshot bytes.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("decompression failed: {0}")]
    Decompress(#[source] std::io::Error),
    #[error("CBOR deserialization error: {0}")]
    Cbor(String),
    #[error("snapshot is missing the {0} field")]
    MissingField(&'static str),
    #[error("snapshot format version mismatch: got v{found}, expected v{expected}")]
    UnsupportedVersion { found: u32, expected: u32 },
    #[error("snapshot inflates past the {limit} byte limit")]
    TooLarge { limit: usize },
}

/// Errors from the on-disk backup chain.
#[derive(Debug, thiserror::Error)]
pub enum BackupError {
    #[error("IO error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("integrity check failed for {}", path.display())]
    Integrity { path: PathBuf },
    #[error("failed to decode {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: DecodeError,
    },
    #[error(transparent)]
    Encode(#[from] EncodeError),
    #[error("remapping world from backup generation {generation} failed: {source}")]
    Remap {
        generation: usize,
        #[source]
        source: RemapError,
    },
    #[error("all {depth} registry backup generations are unusable; last failure: {last}")]
    Exhausted {
        depth: usize,
        #[source]
        last: Box<BackupError>,
    },
    #[error("no registry backup found in {}", dir.display())]
    NotFound { dir: PathBuf },
}
