use crossbeam_channel::RecvTimeoutError;
use regsync_common::{DEFAULT_MAX_PAYLOAD_BYTES, RemapMode, SyncConfig};
use regsync_kernel::{RegistryDirectory, remap};
use regsync_persist::{Audience, SnapshotCodec};
use std::time::Duration;

use crate::error::SyncError;
use crate::packet::SyncPacket;
use crate::queue::SimulationHandle;

/// Channel identifier carried by every registry sync packet.
pub const SYNC_CHANNEL: &str = "registry/sync";

/// How long a receive waits for the simulation context by default.
pub const DEFAULT_SYNC_TIMEOUT: Duration = Duration::from_secs(30);

/// Both ends of the registry sync channel.
///
/// The sending side builds a packet from the live registries. The receiving
/// side decodes on the network thread and hands the remap to the simulation
/// context, waiting a bounded time for the result.
#[derive(Debug, Clone)]
pub struct SyncChannel {
    codec: SnapshotCodec,
    simulation: SimulationHandle,
    timeout: Duration,
    max_payload: usize,
}

impl SyncChannel {
    pub fn new(codec: SnapshotCodec, simulation: SimulationHandle) -> Self {
        Self {
            codec,
            simulation,
            timeout: DEFAULT_SYNC_TIMEOUT,
            max_payload: DEFAULT_MAX_PAYLOAD_BYTES,
        }
    }

    pub fn from_config(config: &SyncConfig, simulation: SimulationHandle) -> Self {
        Self::new(SnapshotCodec::new(config.exclusions.clone()), simulation)
            .with_timeout(config.sync_timeout())
            .with_max_payload(config.max_payload_bytes)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Cap on the decompressed size of a received snapshot.
    pub fn with_max_payload(mut self, bytes: usize) -> Self {
        self.max_payload = bytes;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn max_payload(&self) -> usize {
        self.max_payload
    }

    /// Encode the network snapshot of `directory` into an outbound packet.
    ///
    /// Reads registry state, so call it from the simulation context.
    pub fn build_packet(&self, directory: &RegistryDirectory) -> Result<SyncPacket, SyncError> {
        let snapshot = self.codec.encode(directory, Audience::Network);
        let payload = SnapshotCodec::to_bytes(&snapshot)?;
        tracing::debug!(
            registries = snapshot.registries.len(),
            bytes = payload.len(),
            "registry sync packet built"
        );
        Ok(SyncPacket::new(SYNC_CHANNEL, payload))
    }

    /// Route a framed packet to [`SyncChannel::on_receive`] after checking its channel.
    pub fn on_packet(
        &self,
        packet: &SyncPacket,
        should_apply: bool,
        on_error: impl FnOnce(SyncError),
    ) {
        if packet.channel != SYNC_CHANNEL {
            on_error(SyncError::WrongChannel {
                found: packet.channel.clone(),
                expected: SYNC_CHANNEL,
            });
            return;
        }
        self.on_receive(&packet.payload, should_apply, on_error);
    }

    /// Handle a received snapshot payload.
    ///
    /// Decode failures, including payloads that inflate past the size cap,
    /// are reported immediately. With `should_apply` unset the
    /// payload is only parsed. Otherwise the remote remap is scheduled on the
    /// simulation context and this thread blocks for at most the timeout.
    /// `on_error` is called at most once.
    pub fn on_receive(
        &self,
        payload: &[u8],
        should_apply: bool,
        on_error: impl FnOnce(SyncError),
    ) {
        let snapshot = match SnapshotCodec::decode_limited(payload, self.max_payload) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!(error = %e, "rejecting registry sync packet");
                on_error(e.into());
                return;
            }
        };

        if !should_apply {
            tracing::debug!(
                registries = snapshot.registries.len(),
                "registry sync packet parsed, not applying"
            );
            return;
        }

        let (reply_tx, reply_rx) = crossbeam_channel::bounded(1);
        let scheduled = self.simulation.schedule(move |directory| {
            let result = remap::apply(directory, &snapshot, RemapMode::Remote);
            if reply_tx.send(result).is_err() {
                tracing::debug!("registry sync finished after the receiver gave up");
            }
        });
        if scheduled.is_err() {
            tracing::warn!("simulation context rejected registry sync task");
            on_error(SyncError::Cancelled);
            return;
        }

        match reply_rx.recv_timeout(self.timeout) {
            Ok(Ok(outcome)) if outcome.is_clean() => {
                tracing::info!(registries = outcome.remapped.len(), "registry sync applied");
            }
            Ok(Ok(outcome)) => {
                tracing::warn!(
                    mismatches = outcome.mismatches.len(),
                    "registry sync applied with mismatches"
                );
                on_error(SyncError::Mismatch(outcome.mismatches));
            }
            Ok(Err(e)) => on_error(SyncError::Remap(e)),
            Err(RecvTimeoutError::Timeout) => {
                tracing::warn!(timeout = ?self.timeout, "registry sync timed out");
                on_error(SyncError::Timeout(self.timeout));
            }
            Err(RecvTimeoutError::Disconnected) => on_error(SyncError::Cancelled),
        }
    }
}
