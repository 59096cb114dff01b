//! Tool availability checking
//!
//! Resolves the external collaborators (the device bridge and the mirroring
//! tool) on `PATH` once at startup so missing tools are reported up front
//! instead of as a failed spawn halfway through an orchestration.

use std::path::{Path, PathBuf};

use reloader_core::prelude::*;

/// Resolved locations of the external tools
#[derive(Debug, Clone, Default)]
pub struct ToolAvailability {
    /// Resolved device bridge executable (e.g. `adb`)
    pub bridge: Option<PathBuf>,

    /// Resolved mirroring executable (e.g. `scrcpy`)
    pub mirror: Option<PathBuf>,

    bridge_program: String,
    mirror_program: String,
}

impl ToolAvailability {
    /// Check tool availability (run once at startup)
    pub fn check(bridge_program: &str, mirror_program: &str) -> Self {
        Self {
            bridge: Self::resolve(bridge_program),
            mirror: Self::resolve(mirror_program),
            bridge_program: bridge_program.to_string(),
            mirror_program: mirror_program.to_string(),
        }
    }

    fn resolve(program: &str) -> Option<PathBuf> {
        which::which(program)
            .inspect_err(|e| debug!("{} not found: {}", program, e))
            .ok()
    }

    /// Get user-friendly message for an unavailable bridge
    pub fn bridge_unavailable_message(&self) -> Option<String> {
        self.bridge.is_none().then(|| {
            format!(
                "'{}' not found. Install Android platform-tools or set debug.bridge_program.",
                self.bridge_program
            )
        })
    }

    /// Get user-friendly message for an unavailable mirroring tool
    pub fn mirror_unavailable_message(&self) -> Option<String> {
        self.mirror.is_none().then(|| {
            format!(
                "'{}' not found. Install scrcpy or set mirror.program.",
                self.mirror_program
            )
        })
    }

    /// The resolved bridge path, or a fatal error naming the missing tool
    pub fn require_bridge(&self) -> Result<&Path> {
        self.bridge
            .as_deref()
            .ok_or_else(|| Error::tool_not_found(&self.bridge_program))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_availability_default() {
        let availability = ToolAvailability::default();
        assert!(availability.bridge.is_none());
        assert!(availability.mirror.is_none());
        assert!(availability.bridge_unavailable_message().is_some());
    }

    #[test]
    fn test_missing_tools_report_messages() {
        let availability =
            ToolAvailability::check("definitely-not-adb-xyz", "definitely-not-scrcpy-xyz");
        assert!(availability
            .bridge_unavailable_message()
            .unwrap()
            .contains("definitely-not-adb-xyz"));
        assert!(availability
            .mirror_unavailable_message()
            .unwrap()
            .contains("definitely-not-scrcpy-xyz"));
        assert!(matches!(
            availability.require_bridge(),
            Err(Error::ToolNotFound { .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_available_tools_have_no_message() {
        let availability = ToolAvailability::check("sh", "sh");
        assert!(availability.bridge_unavailable_message().is_none());
        assert!(availability.mirror_unavailable_message().is_none());
        assert!(availability.require_bridge().is_ok());
    }
}
