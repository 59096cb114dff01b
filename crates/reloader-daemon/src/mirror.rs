//! Screen mirroring supervision
//!
//! At most one mirroring window may be active per host. Two guards enforce it:
//!
//! 1. A scan of live processes by executable name catches an instance started
//!    outside this tool.
//! 2. An exclusive [`fs2`] lock on a well-known lock file is try-acquired
//!    before launching and held by the returned [`MirrorHandle`] until the
//!    window closes, so racing callers in this or any other process lose
//!    atomically.

use std::ffi::OsStr;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::Duration;

use fs2::FileExt;
use sysinfo::{ProcessesToUpdate, System};
use tokio::sync::mpsc;

use reloader_core::prelude::*;
use reloader_core::TransportMode;

use crate::process::{ProcessEvent, SupervisedProcess};

const MIRROR_LOCK_FILE: &str = "app-reloader-mirror.lock";

/// Mirroring window configuration
#[derive(Debug, Clone)]
pub struct MirrorConfig {
    pub program: String,
    pub window_x: i32,
    pub window_y: i32,
    pub window_width: u32,
    pub always_on_top: bool,
    pub stay_awake: bool,
    pub turn_screen_off: bool,
    pub show_touches: bool,
    pub window_title: Option<String>,
    /// Pause before launching in wireless mode so the bridge can connect
    pub wireless_start_delay: Duration,
    pub lock_path: PathBuf,
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            program: "scrcpy".to_string(),
            window_x: 1200,
            window_y: 100,
            window_width: 280,
            always_on_top: true,
            stay_awake: true,
            turn_screen_off: false,
            show_touches: false,
            window_title: None,
            wireless_start_delay: Duration::from_secs(3),
            lock_path: default_lock_path(),
        }
    }
}

/// Host-wide lock file guarding the mirroring singleton
pub fn default_lock_path() -> PathBuf {
    std::env::temp_dir().join(MIRROR_LOCK_FILE)
}

/// Build the mirroring tool's argument list.
///
/// Window geometry is always applied. Cable mode adds each enabled feature
/// flag, the window title and the USB device selector; wireless mode selects
/// the network device instead.
pub fn build_mirror_args(mode: TransportMode, config: &MirrorConfig) -> Vec<String> {
    let mut args = vec![
        "--window-x".to_string(),
        config.window_x.to_string(),
        "--window-y".to_string(),
        config.window_y.to_string(),
        "--window-width".to_string(),
        config.window_width.to_string(),
    ];

    match mode {
        TransportMode::Cable => {
            if config.always_on_top {
                args.push("--always-on-top".to_string());
            }
            if config.turn_screen_off {
                args.push("--turn-screen-off".to_string());
            }
            if config.stay_awake {
                args.push("--stay-awake".to_string());
            }
            if config.show_touches {
                args.push("--show-touches".to_string());
            }
            if let Some(title) = config.window_title.as_deref().filter(|t| !t.is_empty()) {
                args.push("--window-title".to_string());
                args.push(title.to_string());
            }
            args.push("-d".to_string());
        }
        TransportMode::Wireless => args.push("-e".to_string()),
    }

    args
}

/// Check whether a process with exactly this executable name is alive
pub fn is_process_running(name: &str) -> bool {
    let mut system = System::new();
    system.refresh_processes(ProcessesToUpdate::All, true);
    let running = system
        .processes_by_exact_name(OsStr::new(name))
        .next()
        .is_some();
    running
}

/// Try to take the host-wide mirror lock without blocking.
///
/// Returns `Ok(None)` when another holder has it.
fn try_acquire_lock(path: &Path) -> Result<Option<File>> {
    let file = OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(path)
        .map_err(|e| Error::process(format!("Failed to open mirror lock {:?}: {}", path, e)))?;

    match file.try_lock_exclusive() {
        Ok(()) => Ok(Some(file)),
        Err(e)
            if e.kind() == std::io::ErrorKind::WouldBlock
                || e.raw_os_error() == fs2::lock_contended_error().raw_os_error() =>
        {
            Ok(None)
        }
        Err(e) => Err(Error::process(format!(
            "Failed to lock mirror lock {:?}: {}",
            path, e
        ))),
    }
}

/// Result of a start request
pub enum MirrorStart {
    Started(MirrorHandle),
    /// Another mirror is already active; nothing was launched
    AlreadyRunning,
}

impl std::fmt::Debug for MirrorStart {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MirrorStart::Started(handle) => write!(f, "Started(pid={:?})", handle.id()),
            MirrorStart::AlreadyRunning => write!(f, "AlreadyRunning"),
        }
    }
}

/// A running mirror window. Holds the singleton lock until dropped.
pub struct MirrorHandle {
    process: SupervisedProcess,
    events: mpsc::Receiver<ProcessEvent>,
    _lock: File,
}

impl MirrorHandle {
    pub fn id(&self) -> Option<u32> {
        self.process.id()
    }

    pub fn is_running(&self) -> bool {
        self.process.is_running()
    }

    /// Wait for the window to close, returning the exit code.
    pub async fn wait(&mut self) -> Option<i32> {
        let mut code = None;
        while let Some(event) = self.events.recv().await {
            match event {
                ProcessEvent::Exited { code: c } => code = c,
                ProcessEvent::Stdout(line) | ProcessEvent::Stderr(line) => {
                    debug!("mirror: {}", line)
                }
            }
        }
        code
    }

    /// Close the window
    pub async fn stop(&mut self) -> Result<()> {
        self.process.shutdown().await
    }
}

/// Starts the mirroring subprocess, at most once per host
#[derive(Debug, Clone)]
pub struct MirrorSupervisor {
    config: MirrorConfig,
}

impl MirrorSupervisor {
    pub fn new(config: MirrorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MirrorConfig {
        &self.config
    }

    /// Executable name the liveness scan looks for
    fn process_name(&self) -> String {
        Path::new(&self.config.program)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.config.program.clone())
    }

    /// Launch the mirror unless one is already active.
    pub async fn start(&self, mode: TransportMode) -> Result<MirrorStart> {
        if mode == TransportMode::Wireless && !self.config.wireless_start_delay.is_zero() {
            tokio::time::sleep(self.config.wireless_start_delay).await;
        }

        let Some(lock) = try_acquire_lock(&self.config.lock_path)? else {
            info!("Mirror lock held elsewhere, mirror already running");
            return Ok(MirrorStart::AlreadyRunning);
        };

        let name = self.process_name();
        let scan_name = name.clone();
        let running = tokio::task::spawn_blocking(move || is_process_running(&scan_name))
            .await
            .map_err(|e| Error::process(format!("Process scan failed: {}", e)))?;
        if running {
            info!("{} already running", name);
            return Ok(MirrorStart::AlreadyRunning);
        }

        info!("Starting {}", name);
        let (tx, events) = mpsc::channel(64);
        let process = SupervisedProcess::spawn(
            &self.config.program,
            &build_mirror_args(mode, &self.config),
            tx,
        )?;

        Ok(MirrorStart::Started(MirrorHandle {
            process,
            events,
            _lock: lock,
        }))
    }
}
