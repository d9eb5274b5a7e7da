//! Rotating on-disk backup chain for registry snapshots.
//!
//! Layout inside the world directory:
//! ```text
//! data/
//!   registry.dat       - generation 0 (newest)
//!   registry.dat.1     - generation 1
//!   ...
//!   registry.dat.<K-1> - oldest generation kept
//!   registry.dat.tmp   - staging file while a save is in flight
//! ```
//!
//! Each file is a SHA-256 digest of the payload followed by the payload
//! (CBOR+zstd snapshot bytes).

use regsync_common::{BackupConfig, RemapMode, Snapshot};
use regsync_kernel::{RegistryDirectory, RemapOutcome, remap};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::BackupError;
use crate::snapshot::{Audience, SnapshotCodec};

const DIGEST_LEN: usize = 32;

/// Which generation a successful load applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadOutcome {
    pub generation: usize,
    pub remap: RemapOutcome,
}

/// Result of a save cycle. Saves never fail the caller.
#[derive(Debug)]
pub enum SaveOutcome {
    /// A new generation 0 was written and older ones shifted.
    Written,
    /// Live tables match the last written snapshot; nothing touched.
    Unchanged,
    /// Writing failed; retried on the next cycle.
    Failed(BackupError),
}

/// Owner of one world's registry backup files.
#[derive(Debug)]
pub struct BackupChain {
    root: PathBuf,
    config: BackupConfig,
    codec: SnapshotCodec,
    last_written: Option<Snapshot>,
}

impl BackupChain {
    pub fn new(world_dir: impl AsRef<Path>, config: BackupConfig, codec: SnapshotCodec) -> Self {
        let root = world_dir.as_ref().join(&config.directory);
        Self {
            root,
            config,
            codec,
            last_written: None,
        }
    }

    /// Number of generations kept (at least one).
    pub fn depth(&self) -> usize {
        self.config.depth.max(1)
    }

    /// Directory holding the generation files.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of generation `index`; 0 carries no suffix.
    pub fn generation_path(&self, index: usize) -> PathBuf {
        if index == 0 {
            self.root.join(&self.config.file_name)
        } else {
            self.root.join(format!("{}.{index}", self.config.file_name))
        }
    }

    fn staging_path(&self) -> PathBuf {
        self.root.join(format!("{}.tmp", self.config.file_name))
    }

    /// Indices of generation files currently on disk.
    pub fn existing_generations(&self) -> Vec<usize> {
        (0..self.depth())
            .filter(|i| self.generation_path(*i).exists())
            .collect()
    }

    /// Whether any generation exists. A world without one has never been saved.
    pub fn has_any_generation(&self) -> bool {
        !self.existing_generations().is_empty()
    }

    /// Read, verify, and decode one generation without applying it.
    pub fn read_generation(&self, index: usize) -> Result<Snapshot, BackupError> {
        read_verified(self.generation_path(index))
    }

    /// Settle a staging file left behind by an interrupted save.
    ///
    /// A verified staged snapshot with no slot 0 beside it is the newest state
    /// and is moved into slot 0. Any other leftover is discarded. Returns
    /// whether a snapshot was recovered.
    pub fn recover_staged(&self) -> Result<bool, BackupError> {
        let staging = self.staging_path();
        if !staging.exists() {
            return Ok(false);
        }
        let slot0 = self.generation_path(0);
        if !slot0.exists() {
            match read_verified(staging.clone()) {
                Ok(_) => {
                    fs::rename(&staging, &slot0).map_err(|source| BackupError::Io {
                        path: slot0.clone(),
                        source,
                    })?;
                    tracing::info!(path = %slot0.display(), "recovered interrupted registry save");
                    return Ok(true);
                }
                Err(e) => tracing::warn!(error = %e, "discarding unreadable staged registry save"),
            }
        } else {
            tracing::debug!(path = %staging.display(), "discarding stale staged registry save");
        }
        fs::remove_file(&staging).map_err(|source| BackupError::Io {
            path: staging,
            source,
        })?;
        Ok(false)
    }

    /// Walk the chain newest to oldest and apply the first readable generation
    /// authoritatively.
    ///
    /// Missing generations are skipped. A read failure falls through to the
    /// next generation unless it is the last one. A remap failure is fatal at
    /// any generation. Finding nothing usable is fatal.
    pub fn load(&self, directory: &mut RegistryDirectory) -> Result<LoadOutcome, BackupError> {
        let depth = self.depth();
        let mut last_failure = None;

        for generation in 0..depth {
            tracing::info!(
                generation,
                "loading registry backup [file {}/{}]",
                generation + 1,
                depth
            );
            let path = self.generation_path(generation);
            if !path.exists() {
                tracing::debug!(path = %path.display(), "backup generation missing");
                continue;
            }

            let snapshot = match self.read_generation(generation) {
                Ok(snapshot) => snapshot,
                Err(e) if generation + 1 >= depth => {
                    return Err(BackupError::Exhausted {
                        depth,
                        last: Box::new(e),
                    });
                }
                Err(e) => {
                    tracing::warn!(generation, error = %e, "reading registry backup failed");
                    last_failure = Some(e);
                    continue;
                }
            };

            let outcome = remap::apply(directory, &snapshot, RemapMode::Authoritative)
                .map_err(|source| BackupError::Remap { generation, source })?;
            tracing::info!(
                generation,
                registries = outcome.remapped.len(),
                "registry ids restored from backup"
            );
            return Ok(LoadOutcome {
                generation,
                remap: outcome,
            });
        }

        Err(match last_failure {
            Some(last) => BackupError::Exhausted {
                depth,
                last: Box::new(last),
            },
            None => BackupError::NotFound {
                dir: self.root.clone(),
            },
        })
    }

    /// Persist the current disk snapshot if it differs from the last one written.
    pub fn save(&mut self, directory: &RegistryDirectory) -> SaveOutcome {
        let snapshot = self.codec.encode(directory, Audience::Disk);
        if self.last_written.as_ref() == Some(&snapshot) {
            tracing::trace!("registry snapshot unchanged, skipping save");
            return SaveOutcome::Unchanged;
        }

        match self.write(&snapshot) {
            Ok(()) => {
                tracing::debug!(
                    entries = snapshot.entry_count(),
                    path = %self.generation_path(0).display(),
                    "registry snapshot saved"
                );
                self.last_written = Some(snapshot);
                SaveOutcome::Written
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to save registry backup");
                SaveOutcome::Failed(e)
            }
        }
    }

    /// World-open hook: restore ids from the chain, then save the result.
    ///
    /// An interrupted save is settled first. A world with no generation on
    /// disk is then treated as fresh: nothing is applied and `Ok(None)` is
    /// returned after the first save.
    pub fn on_world_load(
        &mut self,
        directory: &mut RegistryDirectory,
    ) -> Result<Option<LoadOutcome>, BackupError> {
        self.recover_staged()?;
        let outcome = if self.has_any_generation() {
            Some(self.load(directory)?)
        } else {
            tracing::info!(dir = %self.root.display(), "no registry backups, starting fresh");
            None
        };
        self.save(directory);
        Ok(outcome)
    }

    /// Stage the snapshot, shift generations, then move the staged file into slot 0.
    ///
    /// Renames replace their target, so no generation is deleted before the
    /// staged file takes its place.
    fn write(&self, snapshot: &Snapshot) -> Result<(), BackupError> {
        let payload = SnapshotCodec::to_bytes(snapshot)?;
        let digest = Sha256::digest(&payload);

        fs::create_dir_all(&self.root).map_err(|source| BackupError::Io {
            path: self.root.clone(),
            source,
        })?;

        let staging = self.staging_path();
        let io_err = |path: &Path| {
            let path = path.to_path_buf();
            move |source: std::io::Error| BackupError::Io { path, source }
        };
        let mut file = File::create(&staging).map_err(io_err(&staging))?;
        file.write_all(&digest).map_err(io_err(&staging))?;
        file.write_all(&payload).map_err(io_err(&staging))?;
        file.sync_all().map_err(io_err(&staging))?;
        drop(file);

        self.rotate()?;

        let slot0 = self.generation_path(0);
        fs::rename(&staging, &slot0).map_err(io_err(&slot0))?;
        Ok(())
    }

    /// Shift every generation up by one, overwriting the oldest.
    fn rotate(&self) -> Result<(), BackupError> {
        for index in (0..self.depth() - 1).rev() {
            let path = self.generation_path(index);
            if !path.exists() {
                continue;
            }
            fs::rename(&path, self.generation_path(index + 1))
                .map_err(|source| BackupError::Io { path, source })?;
        }
        Ok(())
    }
}

/// Read a digest-prefixed snapshot file and decode it.
fn read_verified(path: PathBuf) -> Result<Snapshot, BackupError> {
    let data = fs::read(&path).map_err(|source| BackupError::Io {
        path: path.clone(),
        source,
    })?;
    if data.len() < DIGEST_LEN {
        return Err(BackupError::Integrity { path });
    }
    let (digest, payload) = data.split_at(DIGEST_LEN);
    if Sha256::digest(payload).as_slice() != digest {
        return Err(BackupError::Integrity { path });
    }
    SnapshotCodec::decode(payload).map_err(|source| BackupError::Decode { path, source })
}
