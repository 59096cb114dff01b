//! Settings parser for .reloader/config.toml

use std::path::{Path, PathBuf};

use reloader_core::prelude::*;

use super::types::Settings;

const CONFIG_FILENAME: &str = "config.toml";
pub const RELOADER_DIR: &str = ".reloader";

/// Location of the settings file for `project_path`
pub fn config_path(project_path: &Path) -> PathBuf {
    project_path.join(RELOADER_DIR).join(CONFIG_FILENAME)
}

/// Load settings from .reloader/config.toml
///
/// Returns default settings if the file doesn't exist or can't be parsed.
pub fn load_settings(project_path: &Path) -> Settings {
    let config_path = config_path(project_path);

    if !config_path.exists() {
        debug!("No config file at {:?}, using defaults", config_path);
        return Settings::default();
    }

    match std::fs::read_to_string(&config_path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(settings) => {
                debug!("Loaded settings from {:?}", config_path);
                settings
            }
            Err(e) => {
                warn!("Failed to parse {:?}: {}", config_path, e);
                Settings::default()
            }
        },
        Err(e) => {
            warn!("Failed to read {:?}: {}", config_path, e);
            Settings::default()
        }
    }
}

/// Create the default config file in .reloader/ if there is none.
///
/// Returns whether a file was written.
pub fn init_config_dir(project_path: &Path) -> Result<bool> {
    let reloader_dir = project_path.join(RELOADER_DIR);

    if !reloader_dir.exists() {
        std::fs::create_dir_all(&reloader_dir)
            .map_err(|e| Error::config(format!("Failed to create .reloader dir: {}", e)))?;
    }

    let config_path = reloader_dir.join(CONFIG_FILENAME);
    if config_path.exists() {
        debug!("Config already present at {:?}", config_path);
        return Ok(false);
    }

    let default_content = r#"# app-reloader configuration

[devices]
# Device addresses, pushed to in this order
addresses = []
push_port = 8050
# "cable" or "wireless"
transport = "cable"
bridge_port = 5555
connect_timeout_ms = 1000
concurrent_push = false

[debug]
bridge_program = "adb"
ping_program = "ping"
# Only log lines matching this regex are shown
log_filter = "I python"

[mirror]
program = "scrcpy"
window_x = 1200
window_y = 100
window_width = 280
always_on_top = true
stay_awake = true
turn_screen_off = false
show_touches = false
# window_title = "My App"   # Defaults to the title in the build manifest
wireless_start_delay_ms = 3000

[build]
command = "buildozer -v android debug deploy run"
manifest = "buildozer.spec"
artifact = "app_copy.zip"
"#;
    std::fs::write(&config_path, default_content)
        .map_err(|e| Error::config(format!("Failed to write config.toml: {}", e)))?;

    info!("Created {:?}", config_path);
    Ok(true)
}

/// Save settings to .reloader/config.toml
///
/// Uses atomic write (temp file + rename).
pub fn save_settings(project_path: &Path, settings: &Settings) -> Result<()> {
    let reloader_dir = project_path.join(RELOADER_DIR);

    if !reloader_dir.exists() {
        std::fs::create_dir_all(&reloader_dir)
            .map_err(|e| Error::config(format!("Failed to create .reloader dir: {}", e)))?;
    }

    let config_path = reloader_dir.join(CONFIG_FILENAME);
    let temp_path = reloader_dir.join(".config.toml.tmp");

    let content = toml::to_string_pretty(settings)
        .map_err(|e| Error::config(format!("Failed to serialize settings: {}", e)))?;
    let full_content = format!("# app-reloader configuration\n\n{}", content);

    std::fs::write(&temp_path, &full_content)
        .map_err(|e| Error::config(format!("Failed to write temp file: {}", e)))?;

    std::fs::rename(&temp_path, &config_path)
        .map_err(|e| Error::config(format!("Failed to rename temp file: {}", e)))?;

    info!("Saved settings to {:?}", config_path);
    Ok(())
}
