use regsync_common::{Exclusions, RegistryTable, SNAPSHOT_FORMAT_VERSION, Snapshot};
use regsync_kernel::RegistryDirectory;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::io::{Read, Write};

use crate::error::{DecodeError, EncodeError};

/// Who a snapshot is built for. Network snapshots drop network-excluded registries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Audience {
    Disk,
    Network,
}

impl Audience {
    pub fn is_network(self) -> bool {
        self == Self::Network
    }
}

/// Builds snapshots from live registries and converts them to and from bytes.
///
/// The byte form is CBOR compressed with zstd. Wire payloads and backup files
/// share it.
#[derive(Debug, Clone, Default)]
pub struct SnapshotCodec {
    exclusions: Exclusions,
}

/// Decoding target with every field optional, so missing fields are
/// reported by name instead of as an opaque CBOR error.
#[derive(Deserialize)]
struct RawSnapshot {
    version: Option<u32>,
    registries: Option<BTreeMap<String, RegistryTable>>,
}

impl SnapshotCodec {
    pub fn new(exclusions: Exclusions) -> Self {
        Self { exclusions }
    }

    pub fn exclusions(&self) -> &Exclusions {
        &self.exclusions
    }

    /// Capture every snapshot-eligible registry's current name-to-id table.
    pub fn encode(&self, directory: &RegistryDirectory, audience: Audience) -> Snapshot {
        let mut snapshot = Snapshot::new();
        for (name, registry) in directory.eligible() {
            if self.exclusions.excludes(name, audience.is_network()) {
                tracing::trace!(registry = name, ?audience, "registry excluded from snapshot");
                continue;
            }
            snapshot.insert_table(name, registry.ids().into_iter().collect());
        }
        tracing::debug!(
            ?audience,
            registries = snapshot.registries.len(),
            entries = snapshot.entry_count(),
            "snapshot encoded"
        );
        snapshot
    }

    /// Serialize a snapshot to its compressed byte form.
    pub fn to_bytes(snapshot: &Snapshot) -> Result<Vec<u8>, EncodeError> {
        let mut cbor = Vec::new();
        ciborium::into_writer(snapshot, &mut cbor).map_err(|e| EncodeError::Cbor(e.to_string()))?;
        let mut encoder = zstd::Encoder::new(Vec::new(), 3)?;
        encoder.write_all(&cbor)?;
        Ok(encoder.finish()?)
    }

    /// Parse snapshot bytes. Only checks structure and version; id uniqueness
    /// is left to the registries during remap.
    pub fn decode(bytes: &[u8]) -> Result<Snapshot, DecodeError> {
        Self::decode_limited(bytes, usize::MAX)
    }

    /// Like [`SnapshotCodec::decode`], but stops inflating once the
    /// decompressed form exceeds `limit` bytes. Used for peer-supplied data.
    pub fn decode_limited(bytes: &[u8], limit: usize) -> Result<Snapshot, DecodeError> {
        let decoder = zstd::Decoder::new(bytes).map_err(DecodeError::Decompress)?;
        let cap = u64::try_from(limit).unwrap_or(u64::MAX).saturating_add(1);
        let mut cbor = Vec::new();
        decoder
            .take(cap)
            .read_to_end(&mut cbor)
            .map_err(DecodeError::Decompress)?;
        if cbor.len() > limit {
            return Err(DecodeError::TooLarge { limit });
        }

        let raw: RawSnapshot = ciborium::from_reader(cbor.as_slice())
            .map_err(|e| DecodeError::Cbor(e.to_string()))?;
        let version = raw.version.ok_or(DecodeError::MissingField("version"))?;
        if version != SNAPSHOT_FORMAT_VERSION {
            return Err(DecodeError::UnsupportedVersion {
                found: version,
                expected: SNAPSHOT_FORMAT_VERSION,
            });
        }
        let registries = raw
            .registries
            .ok_or(DecodeError::MissingField("registries"))?;
        Ok(Snapshot {
            version,
            registries,
        })
    }
}
