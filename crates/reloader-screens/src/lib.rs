//! # reloader-screens - Hot Reload Registry
//!
//! Runs inside the app on the device. Maps human-readable screen names to
//! loadable UI units and swaps a unit for a freshly loaded version on every
//! activation, so edited code takes effect without restarting the process.
//!
//! - [`derive_identity()`] - Screen name to module and type identities
//! - [`ModuleLoader`], [`FactoryLoader`] - Resolve a module identity to a fresh module
//! - [`ScreenRegistry`] - Load, reload, construct and switch screens

pub mod loader;
pub mod naming;
pub mod registry;

pub use loader::{FactoryLoader, ModuleFactory, ModuleLoader, Screen, ScreenModule, SimpleModule};
pub use naming::{derive_identity, ScreenIdentity};
pub use registry::ScreenRegistry;
