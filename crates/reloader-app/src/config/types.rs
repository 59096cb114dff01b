//! Configuration types for app-reloader
//!
//! `Settings` mirrors `.reloader/config.toml` section by section. Every field
//! has a serde default, so a file only needs the values it changes.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use reloader_core::prelude::*;
use reloader_core::{DeviceTarget, TransportMode};
use reloader_daemon::{
    default_lock_path, Bridge, LogFilter, LogcatConfig, MirrorConfig, ReachabilityProbe,
    DEFAULT_LOG_FILTER,
};
use reloader_push::{ChannelConfig, PushMode, DEFAULT_CHUNK_SIZE, DEFAULT_PUSH_PORT};

/// Application settings (.reloader/config.toml)
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Settings {
    #[serde(default)]
    pub devices: DeviceSettings,

    #[serde(default)]
    pub debug: DebugSettings,

    #[serde(default)]
    pub mirror: MirrorSettings,

    #[serde(default)]
    pub build: BuildSettings,
}

/// Which devices to reach and how
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct DeviceSettings {
    /// Device addresses, in push order
    #[serde(default)]
    pub addresses: Vec<String>,

    /// Port the on-device receiver listens on
    #[serde(default = "default_push_port")]
    pub push_port: u16,

    /// Port the bridge daemon uses in network mode
    #[serde(default = "default_bridge_port")]
    pub bridge_port: u16,

    /// "cable" or "wireless" ("usb" / "wifi" also accepted)
    #[serde(default)]
    pub transport: TransportMode,

    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Push to all devices at once instead of one after another
    #[serde(default)]
    pub concurrent_push: bool,
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            addresses: Vec::new(),
            push_port: default_push_port(),
            bridge_port: default_bridge_port(),
            transport: TransportMode::default(),
            connect_timeout_ms: default_connect_timeout_ms(),
            chunk_size: default_chunk_size(),
            concurrent_push: false,
        }
    }
}

/// Device log streaming settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct DebugSettings {
    #[serde(default = "default_bridge_program")]
    pub bridge_program: String,

    #[serde(default = "default_ping_program")]
    pub ping_program: String,

    /// Regex a log line must match to be shown
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

impl Default for DebugSettings {
    fn default() -> Self {
        Self {
            bridge_program: default_bridge_program(),
            ping_program: default_ping_program(),
            log_filter: default_log_filter(),
        }
    }
}

/// Screen mirroring window settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct MirrorSettings {
    #[serde(default = "default_mirror_program")]
    pub program: String,

    #[serde(default = "default_window_x")]
    pub window_x: i32,

    #[serde(default = "default_window_y")]
    pub window_y: i32,

    #[serde(default = "default_window_width")]
    pub window_width: u32,

    #[serde(default = "default_true")]
    pub always_on_top: bool,

    #[serde(default = "default_true")]
    pub stay_awake: bool,

    #[serde(default)]
    pub turn_screen_off: bool,

    #[serde(default)]
    pub show_touches: bool,

    /// Defaults to the app title from the build manifest
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_title: Option<String>,

    #[serde(default = "default_wireless_start_delay_ms")]
    pub wireless_start_delay_ms: u64,
}

impl Default for MirrorSettings {
    fn default() -> Self {
        Self {
            program: default_mirror_program(),
            window_x: default_window_x(),
            window_y: default_window_y(),
            window_width: default_window_width(),
            always_on_top: true,
            stay_awake: true,
            turn_screen_off: false,
            show_touches: false,
            window_title: None,
            wireless_start_delay_ms: default_wireless_start_delay_ms(),
        }
    }
}

/// External packaging step
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct BuildSettings {
    #[serde(default = "default_build_command")]
    pub command: String,

    /// Manifest the app title is read from
    #[serde(default = "default_manifest")]
    pub manifest: PathBuf,

    /// Archive pushed to devices
    #[serde(default = "default_artifact")]
    pub artifact: PathBuf,
}

impl Default for BuildSettings {
    fn default() -> Self {
        Self {
            command: default_build_command(),
            manifest: default_manifest(),
            artifact: default_artifact(),
        }
    }
}

fn default_push_port() -> u16 {
    DEFAULT_PUSH_PORT
}

fn default_bridge_port() -> u16 {
    5555
}

fn default_connect_timeout_ms() -> u64 {
    1000
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_bridge_program() -> String {
    "adb".to_string()
}

fn default_ping_program() -> String {
    "ping".to_string()
}

fn default_log_filter() -> String {
    DEFAULT_LOG_FILTER.to_string()
}

fn default_mirror_program() -> String {
    "scrcpy".to_string()
}

fn default_window_x() -> i32 {
    1200
}

fn default_window_y() -> i32 {
    100
}

fn default_window_width() -> u32 {
    280
}

fn default_wireless_start_delay_ms() -> u64 {
    3000
}

fn default_build_command() -> String {
    "buildozer -v android debug deploy run".to_string()
}

fn default_manifest() -> PathBuf {
    PathBuf::from("buildozer.spec")
}

fn default_artifact() -> PathBuf {
    PathBuf::from("app_copy.zip")
}

fn default_true() -> bool {
    true
}

impl Settings {
    /// Reject values no run could succeed with
    pub fn validate(&self) -> Result<()> {
        let devices = &self.devices;
        if devices.transport == TransportMode::Wireless && devices.addresses.is_empty() {
            return Err(Error::config_invalid(
                "wireless transport needs at least one entry in devices.addresses",
            ));
        }
        if devices.connect_timeout_ms == 0 {
            return Err(Error::config_invalid("devices.connect_timeout_ms must be > 0"));
        }
        if devices.chunk_size == 0 {
            return Err(Error::config_invalid("devices.chunk_size must be > 0"));
        }
        if self.mirror.window_width == 0 {
            return Err(Error::config_invalid("mirror.window_width must be > 0"));
        }
        LogFilter::new(&self.debug.log_filter)?;
        Ok(())
    }

    /// Push targets in configured order
    pub fn targets(&self) -> Vec<DeviceTarget> {
        self.devices
            .addresses
            .iter()
            .map(|address| {
                DeviceTarget::new(
                    address.clone(),
                    self.devices.push_port,
                    self.devices.transport,
                )
            })
            .collect()
    }

    pub fn channel_config(&self) -> ChannelConfig {
        ChannelConfig {
            connect_timeout: Duration::from_millis(self.devices.connect_timeout_ms),
            chunk_size: self.devices.chunk_size,
        }
    }

    pub fn push_mode(&self) -> PushMode {
        if self.devices.concurrent_push {
            PushMode::Concurrent
        } else {
            PushMode::Sequential
        }
    }

    pub fn bridge(&self) -> Bridge {
        Bridge::new(self.debug.bridge_program.clone())
    }

    pub fn probe(&self) -> ReachabilityProbe {
        ReachabilityProbe::new(self.debug.ping_program.clone())
    }

    pub fn logcat_config(&self) -> Result<LogcatConfig> {
        Ok(LogcatConfig {
            mode: self.devices.transport,
            addresses: self.devices.addresses.clone(),
            bridge_port: self.devices.bridge_port,
            filter: LogFilter::new(&self.debug.log_filter)?,
        })
    }

    /// Mirror window settings; `fallback_title` is used when no title is set
    pub fn mirror_config(&self, fallback_title: Option<String>) -> MirrorConfig {
        let mirror = &self.mirror;
        MirrorConfig {
            program: mirror.program.clone(),
            window_x: mirror.window_x,
            window_y: mirror.window_y,
            window_width: mirror.window_width,
            always_on_top: mirror.always_on_top,
            stay_awake: mirror.stay_awake,
            turn_screen_off: mirror.turn_screen_off,
            show_touches: mirror.show_touches,
            window_title: mirror.window_title.clone().or(fallback_title),
            wireless_start_delay: Duration::from_millis(mirror.wireless_start_delay_ms),
            lock_path: default_lock_path(),
        }
    }
}
