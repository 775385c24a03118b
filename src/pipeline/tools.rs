//! Locating and running external document tools.
//!
//! The poppler utilities, qpdf and Ghostscript are driven as child
//! processes. A configured program is used directly when it is an existing
//! absolute path, otherwise it is looked up on `PATH` by file name.

use crate::error::ToolError;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Output;
use tokio::process::Command;
use tracing::debug;

/// Resolve `program` to an executable path, or `None` if it cannot be found.
pub fn locate(program: &Path) -> Option<PathBuf> {
    if program.as_os_str().is_empty() {
        return None;
    }
    if program.is_absolute() {
        if program.exists() {
            return Some(program.to_path_buf());
        }
        // A stale absolute path (e.g. a Homebrew prefix on Linux) falls back
        // to the bare name on PATH.
        return program.file_name().and_then(|name| which::which(name).ok());
    }
    which::which(program).ok()
}

/// Human-readable tool name for messages: the file name of `program`.
pub fn tool_name(program: &Path) -> String {
    program
        .file_name()
        .unwrap_or(program.as_os_str())
        .to_string_lossy()
        .into_owned()
}

/// Run `program` with `args` to completion and capture its output.
///
/// No timeout is applied. The child is killed if the future is dropped.
pub async fn run<I, S>(program: &Path, args: I) -> Result<Output, ToolError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let tool = tool_name(program);
    let exe = locate(program).ok_or_else(|| ToolError::Unavailable { tool: tool.clone() })?;
    debug!("Running {}", exe.display());
    Command::new(&exe)
        .args(args)
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|source| ToolError::Io { tool, source })
}

/// The tool's diagnostic: trimmed stderr, or stdout when stderr is empty.
pub fn diagnostic(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stderr = stderr.trim();
    if !stderr.is_empty() {
        return stderr.to_string();
    }
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// Exit code, with signal termination reported as -1.
pub fn exit_code(output: &Output) -> i32 {
    output.status.code().unwrap_or(-1)
}

/// Convert a non-zero exit into [`ToolError::Failed`].
pub fn check(program: &Path, output: &Output) -> Result<(), ToolError> {
    if output.status.success() {
        return Ok(());
    }
    Err(ToolError::Failed {
        tool: tool_name(program),
        code: exit_code(output),
        detail: diagnostic(output),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_program_is_not_located() {
        assert!(locate(Path::new("definitely-not-a-real-tool-7c1e")).is_none());
        assert!(locate(Path::new("")).is_none());
    }

    #[test]
    fn tool_name_is_file_name() {
        assert_eq!(tool_name(Path::new("/opt/homebrew/bin/pdftotext")), "pdftotext");
        assert_eq!(tool_name(Path::new("qpdf")), "qpdf");
    }

    #[tokio::test]
    async fn run_reports_unavailable() {
        let err = run(Path::new("definitely-not-a-real-tool-7c1e"), ["x"])
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Unavailable { ref tool } if tool == "definitely-not-a-real-tool-7c1e"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn run_captures_failure_diagnostic() {
        let sh = Path::new("sh");
        let out = run(sh, ["-c", "echo oops >&2; exit 3"]).await.unwrap();
        assert_eq!(exit_code(&out), 3);
        assert_eq!(diagnostic(&out), "oops");
        let err = check(sh, &out).unwrap_err();
        assert_eq!(err.to_string(), "sh failed (rc=3): oops");
    }
}
