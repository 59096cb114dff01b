//! Device bridge CLI wrapper
//!
//! The bridge daemon (normally `adb`) mediates every device interaction. This
//! module invokes it; it never reimplements any of its protocol.

use std::process::Stdio;

use tokio::process::Command;

use reloader_core::prelude::*;

/// Markers `adb connect` prints on failure while still exiting with code 0
const CONNECT_FAILURE_MARKERS: &[&str] = &["failed to connect", "cannot connect", "unable to connect"];

/// Handle to the device bridge CLI
#[derive(Debug, Clone)]
pub struct Bridge {
    program: String,
}

impl Default for Bridge {
    fn default() -> Self {
        Self::new("adb")
    }
}

impl Bridge {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Run one synchronous bridge step, returning its stdout.
    async fn run(&self, args: &[&str]) -> Result<String> {
        let command = format!("{} {}", self.program, args.join(" "));
        debug!("Running: {}", command);

        let output = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    Error::tool_not_found(&self.program)
                } else {
                    Error::process(format!("Failed to run {}: {}", command, e))
                }
            })?;

        if !output.status.success() {
            return Err(Error::Subprocess {
                command,
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    pub async fn disconnect_all(&self) -> Result<()> {
        self.run(&["disconnect"]).await.map(|_| ())
    }

    pub async fn kill_server(&self) -> Result<()> {
        self.run(&["kill-server"]).await.map(|_| ())
    }

    pub async fn start_server(&self) -> Result<()> {
        self.run(&["start-server"]).await.map(|_| ())
    }

    /// Disconnect, kill and start the daemon, in that order.
    ///
    /// A failing step never stops the next one. The failures are logged and
    /// returned so callers can report them.
    pub async fn restart_daemon(&self) -> Vec<Error> {
        info!("Restarting bridge daemon");
        let mut failures = Vec::new();

        for (step, result) in [
            ("disconnect", self.disconnect_all().await),
            ("kill-server", self.kill_server().await),
            ("start-server", self.start_server().await),
        ] {
            if let Err(e) = result {
                warn!("Bridge step '{}' failed (continuing): {}", step, e);
                failures.push(e);
            }
        }

        failures
    }

    /// Clear the device log buffer
    pub async fn clear_logs(&self) -> Result<()> {
        info!("Clearing device log buffer");
        self.run(&["logcat", "-c"]).await.map(|_| ())
    }

    /// Switch the daemon to network mode on `port`
    pub async fn tcpip(&self, port: u16) -> Result<()> {
        info!("Switching bridge to network mode on port {}", port);
        self.run(&["tcpip", &port.to_string()]).await.map(|_| ())
    }

    /// Connect the daemon to a network device at `endpoint` (`ip:port`)
    pub async fn connect(&self, endpoint: &str) -> Result<()> {
        let stdout = self.run(&["connect", endpoint]).await?;
        let lowered = stdout.to_lowercase();
        if CONNECT_FAILURE_MARKERS.iter().any(|m| lowered.contains(m)) {
            return Err(Error::connect(endpoint, stdout.trim()));
        }
        info!("Bridge connected to {}", endpoint);
        Ok(())
    }

    /// Arguments for the long-running log stream, optionally bound to one device
    pub fn logcat_args(serial: Option<&str>) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(serial) = serial {
            args.push("-s".to_string());
            args.push(serial.to_string());
        }
        args.push("logcat".to_string());
        args
    }
}
