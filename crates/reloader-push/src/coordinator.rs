//! Fan-out delivery of one artifact to many devices

use std::path::Path;

use futures_util::future::join_all;

use reloader_core::prelude::*;
use reloader_core::{DeviceTarget, PushSummary, TransferSession};

use crate::channel::{ChannelConfig, TransferChannel};

/// Whether devices are served one after another or all at once
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PushMode {
    #[default]
    Sequential,
    Concurrent,
}

/// Every session of one push invocation, in configured target order
#[derive(Debug, Clone)]
pub struct PushReport {
    pub sessions: Vec<TransferSession>,
    pub summary: PushSummary,
}

/// Delivers a build artifact to a list of devices.
///
/// Each target gets exactly one attempt. An unreachable device is counted as
/// failed and never stops delivery to the remaining devices.
#[derive(Debug, Clone, Default)]
pub struct AppPushCoordinator {
    config: ChannelConfig,
    mode: PushMode,
}

impl AppPushCoordinator {
    pub fn new(config: ChannelConfig, mode: PushMode) -> Self {
        Self { config, mode }
    }

    /// Push `artifact` to every target.
    ///
    /// Only a missing artifact is an error; per-device failures are recorded
    /// in the report.
    pub async fn push_artifact(
        &self,
        artifact: &Path,
        targets: &[DeviceTarget],
    ) -> Result<PushReport> {
        if !artifact.is_file() {
            return Err(Error::ArtifactNotFound {
                path: artifact.to_path_buf(),
            });
        }

        info!(
            "Pushing {} to {} device(s) ({:?})",
            artifact.display(),
            targets.len(),
            self.mode
        );

        let sessions = match self.mode {
            PushMode::Sequential => {
                let mut sessions = Vec::with_capacity(targets.len());
                for target in targets {
                    sessions.push(self.push_one(artifact, target).await);
                }
                sessions
            }
            // join_all yields results in input order
            PushMode::Concurrent => {
                join_all(targets.iter().map(|target| self.push_one(artifact, target))).await
            }
        };

        let summary = PushSummary::from_sessions(&sessions);
        info!(
            "Sent app to {} device(s), {} failed",
            summary.delivered, summary.failed
        );

        Ok(PushReport { sessions, summary })
    }

    async fn push_one(&self, artifact: &Path, target: &DeviceTarget) -> TransferSession {
        let session = TransferSession::new(target.clone());

        let mut channel = match TransferChannel::open(target, &self.config).await {
            Ok(channel) => channel,
            Err(e) => {
                warn!("Couldn't connect to device {}: {}", target, e);
                return session.failed(0, e);
            }
        };
        info!("Device connected: {}", target);

        let mut file = match tokio::fs::File::open(artifact).await {
            Ok(file) => file,
            Err(e) => {
                warn!("Failed to open {} for {}: {}", artifact.display(), target, e);
                return session.failed(0, e);
            }
        };

        match channel.send(&mut file).await {
            Ok(bytes) => {
                info!("Finished sending app to {} ({} bytes)", target, bytes);
                session.delivered(bytes)
            }
            Err(e) => {
                warn!("Sending app to {} failed: {}", target, e);
                session.failed(channel.bytes_sent(), e)
            }
        }
    }
}
