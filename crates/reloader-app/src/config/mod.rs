//! Configuration file parsing for app-reloader
//!
//! Supports:
//! - `.reloader/config.toml` - Device, debug, mirror and build settings

pub mod settings;
pub mod types;

pub use settings::{config_path, init_config_dir, load_settings, save_settings, RELOADER_DIR};
pub use types::*;
