//! # reloader-core - Core Domain Types
//!
//! Foundation crate for app-reloader. Provides domain types, error handling
//! and logging setup shared by every other crate in the workspace.
//!
//! This crate has **zero internal dependencies** -- it only depends on external
//! crates (serde, chrono, thiserror, tracing).
//!
//! ## Public API
//!
//! ### Domain Types (`types`)
//! - [`DeviceTarget`] - A configured device address plus port and transport mode
//! - [`TransportMode`] - Cable (direct) or wireless connection to devices
//! - [`TransferSession`], [`TransferOutcome`] - One push attempt against one device
//! - [`PushSummary`] - Aggregate counts over a whole push invocation
//! - [`DebugEvent`] - Events emitted by the log and mirror supervisors
//!
//! ### Error Handling (`error`)
//! - [`Error`] - Custom error enum with `fatal` vs `recoverable` classification
//! - [`Result`] - Type alias for `std::result::Result<T, Error>`
//!
//! ## Prelude
//!
//! Import commonly used types with:
//! ```rust
//! use reloader_core::prelude::*;
//! ```

pub mod error;
pub mod logging;
pub mod prelude;
pub mod types;

pub use error::{Error, Result};
pub use types::{
    DebugEvent, DeviceTarget, PushSummary, TransferOutcome, TransferSession, TransportMode,
};
