//! Domain types shared across the workspace

use std::fmt;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// How the host reaches its devices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportMode {
    /// Direct physical connection
    #[default]
    #[serde(alias = "usb", alias = "USB")]
    Cable,
    /// Network-reachable device
    #[serde(alias = "wifi", alias = "WIFI")]
    Wireless,
}

impl fmt::Display for TransportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportMode::Cable => write!(f, "cable"),
            TransportMode::Wireless => write!(f, "wireless"),
        }
    }
}

/// A configured device endpoint. Immutable once read from configuration.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceTarget {
    pub address: String,
    pub port: u16,
    pub transport_mode: TransportMode,
}

impl DeviceTarget {
    pub fn new(address: impl Into<String>, port: u16, transport_mode: TransportMode) -> Self {
        Self {
            address: address.into(),
            port,
            transport_mode,
        }
    }

    /// `address:port` form used for sockets and `adb connect`
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }
}

impl fmt::Display for DeviceTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.endpoint())
    }
}

/// Outcome of a single push attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferOutcome {
    #[default]
    Pending,
    Delivered,
    Failed,
}

/// One push attempt against one target. No retries happen within a session.
#[derive(Debug, Clone)]
pub struct TransferSession {
    pub target: DeviceTarget,
    pub bytes_sent: u64,
    pub outcome: TransferOutcome,
    /// Failure reason, set when `outcome` is `Failed`
    pub error: Option<String>,
}

impl TransferSession {
    pub fn new(target: DeviceTarget) -> Self {
        Self {
            target,
            bytes_sent: 0,
            outcome: TransferOutcome::Pending,
            error: None,
        }
    }

    pub fn delivered(mut self, bytes_sent: u64) -> Self {
        self.bytes_sent = bytes_sent;
        self.outcome = TransferOutcome::Delivered;
        self
    }

    pub fn failed(mut self, bytes_sent: u64, error: impl ToString) -> Self {
        self.bytes_sent = bytes_sent;
        self.outcome = TransferOutcome::Failed;
        self.error = Some(error.to_string());
        self
    }
}

/// Read-only aggregate over all sessions of one push invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct PushSummary {
    pub attempted: usize,
    pub delivered: usize,
    pub failed: usize,
}

impl PushSummary {
    pub fn from_sessions<'a>(sessions: impl IntoIterator<Item = &'a TransferSession>) -> Self {
        sessions
            .into_iter()
            .fold(Self::default(), |mut summary, session| {
                summary.attempted += 1;
                match session.outcome {
                    TransferOutcome::Delivered => summary.delivered += 1,
                    TransferOutcome::Failed => summary.failed += 1,
                    TransferOutcome::Pending => {}
                }
                summary
            })
    }
}

/// Events emitted by the debug log and mirror supervisors
#[derive(Debug, Clone)]
pub enum DebugEvent {
    /// A filtered device log line. `device` is `None` for the cable stream.
    LogLine {
        device: Option<String>,
        line: String,
        at: DateTime<Local>,
    },
    /// A wireless target failed its reachability probe and was skipped
    DeviceUnreachable { address: String },
    /// A log stream ended (process exited or was stopped)
    StreamEnded {
        device: Option<String>,
        code: Option<i32>,
    },
    MirrorStarted { pid: Option<u32> },
    MirrorAlreadyRunning,
    MirrorExited { code: Option<i32> },
}

impl DebugEvent {
    pub fn log_line(device: Option<String>, line: impl Into<String>) -> Self {
        Self::LogLine {
            device,
            line: line.into(),
            at: Local::now(),
        }
    }
}
