//! reloader-app - Configuration and orchestration for app-reloader
//!
//! Reads the project's `.reloader/config.toml`, turns it into the device,
//! push and mirror configurations the lower crates expect, and drives the
//! build, push and debug workflows the CLI exposes.

pub mod config;
pub mod orchestrator;
pub mod packaging;
pub mod signals;
pub mod workflow;

pub use config::{init_config_dir, load_settings, save_settings, Settings};
pub use orchestrator::{DebugOrchestrator, OrchestratorReport};
pub use packaging::{read_app_title, run_build, UNKNOWN_APP};
pub use signals::spawn_signal_handler;
pub use workflow::{debug_session, project_file, push_app, Workflow, WORKFLOW_PROMPT};

pub use reloader_daemon::ToolAvailability;
