//! # reloader-daemon - Device Process Management
//!
//! Wraps every native subprocess the tool relies on: the device bridge CLI,
//! the per-device log streams and the screen mirroring window.
//!
//! Depends on [`reloader_core`] for domain types and error handling.
//!
//! ## Public API
//!
//! ### Process Management
//! - [`SupervisedProcess`] - Spawn and cancel a long-running child, forwarding its output
//! - [`ProcessEvent`] - Stdout/stderr lines and the exit code of a supervised child
//!
//! ### Device Bridge
//! - [`Bridge`] - Restart, clear, network mode and connect steps of the bridge CLI
//! - [`ReachabilityProbe`] - One-shot ping used before wireless streaming
//!
//! ### Supervisors
//! - [`DebugLogSupervisor`] - Cable or wireless filtered log streaming
//! - [`MirrorSupervisor`] - Single-instance screen mirroring
//!
//! ### Platform Utilities
//! - [`ToolAvailability`] - Check for the bridge and mirroring tools

pub mod bridge;
pub mod logcat;
pub mod mirror;
pub mod probe;
pub mod process;
#[cfg(any(test, feature = "test-helpers"))]
pub mod test_utils;
pub mod tool_availability;

pub use bridge::Bridge;
pub use logcat::{stream_filtered_logs, DebugLogSupervisor, LogFilter, LogcatConfig, DEFAULT_LOG_FILTER};
pub use mirror::{
    build_mirror_args, default_lock_path, is_process_running, MirrorConfig, MirrorHandle,
    MirrorStart, MirrorSupervisor,
};
pub use probe::ReachabilityProbe;
pub use process::{ProcessEvent, SupervisedProcess};
pub use tool_availability::ToolAvailability;
