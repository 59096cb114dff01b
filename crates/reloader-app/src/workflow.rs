//! The build, push and debug workflows behind the CLI

use std::path::{Path, PathBuf};
use std::str::FromStr;

use tokio::sync::{mpsc, watch};

use reloader_core::prelude::*;
use reloader_core::DebugEvent;
use reloader_daemon::ToolAvailability;
use reloader_push::{AppPushCoordinator, PushReport};

use crate::config::Settings;
use crate::orchestrator::{DebugOrchestrator, OrchestratorReport};
use crate::packaging::{read_app_title, run_build};

/// Choices offered by the interactive prompt
pub const WORKFLOW_PROMPT: &str = "1 - Compile, debug and livestream\n2 - Debug and livestream";

/// What an interactive run does
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Workflow {
    /// Package the app, then debug and mirror it
    CompileAndDebug,
    /// Debug and mirror the app already on the device
    DebugOnly,
}

impl FromStr for Workflow {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "1" => Ok(Workflow::CompileAndDebug),
            "2" => Ok(Workflow::DebugOnly),
            other => Err(Error::config_invalid(format!(
                "'{}' is not an option, choose 1 or 2",
                other
            ))),
        }
    }
}

impl Workflow {
    pub fn builds(&self) -> bool {
        matches!(self, Workflow::CompileAndDebug)
    }

    /// Run the workflow in `project`. A failed build aborts before any
    /// debugging starts.
    pub async fn run(
        &self,
        settings: &Settings,
        project: &Path,
        event_tx: mpsc::Sender<DebugEvent>,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Result<OrchestratorReport> {
        if self.builds() {
            let mut build_shutdown = shutdown_rx.clone();
            tokio::select! {
                result = run_build(&settings.build.command, project) => result?,
                _ = build_shutdown.changed() => return Err(Error::Interrupted),
            }
        }

        debug_session(settings, project, event_tx, shutdown_rx).await
    }
}

/// Resolve a possibly relative path against the project root
pub fn project_file(project: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        project.join(path)
    }
}

/// Push the build artifact to every configured device.
///
/// `artifact` overrides `build.artifact` from the settings.
pub async fn push_app(
    settings: &Settings,
    project: &Path,
    artifact: Option<&Path>,
) -> Result<PushReport> {
    settings.validate()?;

    let artifact = project_file(
        project,
        artifact.unwrap_or(settings.build.artifact.as_path()),
    );
    let targets = settings.targets();
    if targets.is_empty() {
        warn!("No device addresses configured, nothing to push to");
    }

    AppPushCoordinator::new(settings.channel_config(), settings.push_mode())
        .push_artifact(&artifact, &targets)
        .await
}

/// Stream device logs and mirror the screen until shutdown
pub async fn debug_session(
    settings: &Settings,
    project: &Path,
    event_tx: mpsc::Sender<DebugEvent>,
    shutdown_rx: watch::Receiver<bool>,
) -> Result<OrchestratorReport> {
    settings.validate()?;

    let tools = ToolAvailability::check(&settings.debug.bridge_program, &settings.mirror.program);
    tools.require_bridge()?;
    if let Some(message) = tools.mirror_unavailable_message() {
        warn!("{}", message);
    }

    let title = read_app_title(&project_file(project, &settings.build.manifest));
    let orchestrator = DebugOrchestrator::from_settings(settings, Some(title))?;
    Ok(orchestrator.run(event_tx, shutdown_rx).await)
}
