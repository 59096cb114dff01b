//! Debug orchestration: device log streams plus the mirror window
//!
//! Both halves run concurrently under one shutdown signal. Neither half's
//! failure stops the other; only the shutdown signal tears everything down.

use tokio::sync::{mpsc, watch};

use reloader_core::prelude::*;
use reloader_core::{DebugEvent, TransportMode};
use reloader_daemon::{DebugLogSupervisor, MirrorStart, MirrorSupervisor};

use crate::config::Settings;

/// What happened during one orchestration run
#[derive(Debug, Default)]
pub struct OrchestratorReport {
    /// A mirror window was launched by this run
    pub mirror_started: bool,
    /// Exit code of the mirror window, when it closed by itself
    pub mirror_exit: Option<i32>,
    /// Ended because of the shutdown signal
    pub interrupted: bool,
    /// Failures of either half; none of them stopped the other half
    pub errors: Vec<Error>,
}

/// Runs the log supervisor and the mirror supervisor side by side
#[derive(Debug, Clone)]
pub struct DebugOrchestrator {
    logs: DebugLogSupervisor,
    mirror: MirrorSupervisor,
    mode: TransportMode,
}

impl DebugOrchestrator {
    pub fn new(logs: DebugLogSupervisor, mirror: MirrorSupervisor, mode: TransportMode) -> Self {
        Self { logs, mirror, mode }
    }

    /// Build both supervisors from settings. `app_title` names the mirror
    /// window unless the settings pin a title.
    pub fn from_settings(settings: &Settings, app_title: Option<String>) -> Result<Self> {
        let logs = DebugLogSupervisor::new(
            settings.bridge(),
            settings.probe(),
            settings.logcat_config()?,
        );
        let mirror = MirrorSupervisor::new(settings.mirror_config(app_title));
        Ok(Self::new(logs, mirror, settings.devices.transport))
    }

    pub fn mode(&self) -> TransportMode {
        self.mode
    }

    /// Run until `shutdown_rx` flips to `true`, or until every log stream has
    /// ended and the mirror window (if this run opened one) has closed.
    pub async fn run(
        &self,
        event_tx: mpsc::Sender<DebugEvent>,
        shutdown_rx: watch::Receiver<bool>,
    ) -> OrchestratorReport {
        info!("Starting debug session ({})", self.mode);

        let logs = self.logs.run(event_tx.clone(), shutdown_rx.clone());
        let mirror = self.supervise_mirror(event_tx, shutdown_rx.clone());
        let (logs_result, mirror_result) = tokio::join!(logs, mirror);

        let mut report = OrchestratorReport {
            interrupted: *shutdown_rx.borrow(),
            ..OrchestratorReport::default()
        };

        if let Err(e) = logs_result {
            warn!("Log streaming failed: {}", e);
            report.errors.push(e);
        }
        match mirror_result {
            Ok((started, exit)) => {
                report.mirror_started = started;
                report.mirror_exit = exit;
            }
            Err(e) => {
                warn!("Mirroring failed: {}", e);
                report.errors.push(e);
            }
        }

        info!(
            "Debug session ended (interrupted: {}, errors: {})",
            report.interrupted,
            report.errors.len()
        );
        report
    }

    /// Returns whether a window was started and its exit code if it closed
    /// on its own.
    async fn supervise_mirror(
        &self,
        event_tx: mpsc::Sender<DebugEvent>,
        mut shutdown_rx: watch::Receiver<bool>,
    ) -> Result<(bool, Option<i32>)> {
        if *shutdown_rx.borrow() {
            return Ok((false, None));
        }

        // The wireless start delay must not hold up shutdown
        let start = tokio::select! {
            start = self.mirror.start(self.mode) => start?,
            _ = shutdown_rx.changed() => return Ok((false, None)),
        };

        let mut handle = match start {
            MirrorStart::Started(handle) => handle,
            MirrorStart::AlreadyRunning => {
                let _ = event_tx.send(DebugEvent::MirrorAlreadyRunning).await;
                return Ok((false, None));
            }
        };

        let _ = event_tx
            .send(DebugEvent::MirrorStarted { pid: handle.id() })
            .await;

        tokio::select! {
            code = handle.wait() => {
                info!("Mirror window closed (code {:?})", code);
                let _ = event_tx.send(DebugEvent::MirrorExited { code }).await;
                Ok((true, code))
            }
            _ = shutdown_rx.changed() => {
                info!("Shutdown signal received, closing mirror window");
                handle.stop().await?;
                Ok((true, None))
            }
        }
    }
}
