//! External packaging step and build manifest lookups

use std::path::Path;
use std::process::Stdio;
use std::sync::LazyLock;

use regex::Regex;
use tokio::process::Command;

use reloader_core::prelude::*;

/// Title used when the manifest has none
pub const UNKNOWN_APP: &str = "UnknownApp";

/// `title = ...` at the start of a manifest line
static TITLE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*title[ \t]*=[ \t]*(.*?)[ \t]*\r?$")
        .expect("Invalid title pattern regex")
});

/// Read the app's display title from the build manifest.
///
/// Returns [`UNKNOWN_APP`] when the file is missing or has no `title` entry.
pub fn read_app_title(manifest: &Path) -> String {
    let content = match std::fs::read_to_string(manifest) {
        Ok(content) => content,
        Err(e) => {
            debug!("Could not read {:?}: {}", manifest, e);
            return UNKNOWN_APP.to_string();
        }
    };

    TITLE_PATTERN
        .captures(&content)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .filter(|title| !title.is_empty())
        .unwrap_or_else(|| UNKNOWN_APP.to_string())
}

/// Run the packaging command once in `project`, with output on the terminal.
///
/// The child is killed if the returned future is dropped.
pub async fn run_build(command: &str, project: &Path) -> Result<()> {
    let mut parts = command.split_whitespace();
    let Some(program) = parts.next() else {
        return Err(Error::config_invalid("build.command is empty"));
    };
    let args: Vec<&str> = parts.collect();

    info!("Building: {}", command);
    let status = Command::new(program)
        .args(&args)
        .current_dir(project)
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .status()
        .await
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::tool_not_found(program)
            } else {
                Error::ProcessSpawn {
                    program: program.to_string(),
                    reason: e.to_string(),
                }
            }
        })?;

    if !status.success() {
        return Err(Error::Subprocess {
            command: command.to_string(),
            code: status.code(),
            stderr: String::new(),
        });
    }

    info!("Build finished");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_reads_title() {
        let temp = tempdir().unwrap();
        let manifest = temp.path().join("buildozer.spec");
        std::fs::write(
            &manifest,
            "[app]\n\n# (str) Title of your application\ntitle = Kivy Reloader Demo\npackage.name = demo\n",
        )
        .unwrap();

        assert_eq!(read_app_title(&manifest), "Kivy Reloader Demo");
    }

    #[test]
    fn test_commented_title_is_ignored() {
        let temp = tempdir().unwrap();
        let manifest = temp.path().join("buildozer.spec");
        std::fs::write(&manifest, "[app]\n# title = Old\npackage.name = demo\n").unwrap();

        assert_eq!(read_app_title(&manifest), UNKNOWN_APP);
    }

    #[test]
    fn test_missing_manifest() {
        let temp = tempdir().unwrap();
        assert_eq!(read_app_title(&temp.path().join("nope.spec")), UNKNOWN_APP);
    }

    #[tokio::test]
    async fn test_empty_command_is_invalid() {
        let temp = tempdir().unwrap();
        let err = run_build("   ", temp.path()).await.unwrap_err();
        assert!(matches!(err, Error::ConfigInvalid { .. }));
    }

    #[tokio::test]
    async fn test_missing_build_tool() {
        let temp = tempdir().unwrap();
        let err = run_build("definitely-not-a-packager-xyz -v", temp.path())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ToolNotFound { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_build_exit_status() {
        let temp = tempdir().unwrap();
        assert!(run_build("true", temp.path()).await.is_ok());

        let err = run_build("false", temp.path()).await.unwrap_err();
        assert!(matches!(err, Error::Subprocess { code: Some(1), .. }));
    }
}
