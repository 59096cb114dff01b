//! One-shot reachability probe for wireless targets

use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tokio::time::timeout;

use reloader_core::prelude::*;

/// Upper bound for a single probe, independent of the ping tool's own timeout
const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(3);

/// Pings a host once to decide whether it is worth streaming from
#[derive(Debug, Clone)]
pub struct ReachabilityProbe {
    program: String,
    timeout: Duration,
}

impl Default for ReachabilityProbe {
    fn default() -> Self {
        Self::new("ping")
    }
}

impl ReachabilityProbe {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn args(address: &str) -> Vec<String> {
        #[cfg(windows)]
        let count_flag = "-n";
        #[cfg(not(windows))]
        let count_flag = "-c";

        vec![count_flag.to_string(), "1".to_string(), address.to_string()]
    }

    /// Returns `true` if one ping to `address` succeeds within the timeout.
    ///
    /// Never fails: a missing ping tool, a non-zero exit or a timeout all
    /// count as unreachable.
    pub async fn is_reachable(&self, address: &str) -> bool {
        let status = Command::new(&self.program)
            .args(Self::args(address))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .status();

        let reachable = match timeout(self.timeout, status).await {
            Ok(Ok(status)) => status.success(),
            Ok(Err(e)) => {
                warn!("Failed to run {} for {}: {}", self.program, address, e);
                false
            }
            Err(_) => {
                debug!("Probe of {} timed out after {:?}", address, self.timeout);
                false
            }
        };

        if reachable {
            info!("{} is active", address);
        } else {
            info!("{} is not active", address);
        }
        reachable
    }
}
