//! Branch, commit and tag operations against the project's git repository.
//!
//! Every caller-supplied field passes through [`sanitize`] before a process
//! is spawned, and git is always invoked with a discrete argv, never through
//! a shell.

use crate::error::{FieldKind, Result, SpecflowError};
use crate::sanitize::sanitize;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

pub struct Git {
    /// `None` means look `git` up on `PATH` at call time.
    exe: Option<PathBuf>,
    workdir: PathBuf,
}

impl Git {
    pub fn new(workdir: &Path) -> Self {
        Self {
            exe: None,
            workdir: workdir.to_path_buf(),
        }
    }

    pub fn with_executable(exe: impl Into<PathBuf>, workdir: &Path) -> Self {
        Self {
            exe: Some(exe.into()),
            workdir: workdir.to_path_buf(),
        }
    }

    fn executable(&self) -> Result<PathBuf> {
        match &self.exe {
            Some(exe) => Ok(exe.clone()),
            None => which::which("git").map_err(|_| SpecflowError::GitNotFound),
        }
    }

    /// `git switch -c <branch>`
    pub fn create_branch(&self, branch: &str) -> Result<String> {
        let branch = sanitize(FieldKind::Branch, branch)?;
        self.run("switch", &["switch", "-c", branch])
    }

    /// `git commit -m <message>`
    pub fn commit(&self, message: &str) -> Result<String> {
        let message = sanitize(FieldKind::CommitMessage, message)?;
        self.run("commit", &["commit", "-m", message])
    }

    /// `git tag <tag>`
    pub fn tag(&self, tag: &str) -> Result<String> {
        let tag = sanitize(FieldKind::Tag, tag)?;
        self.run("tag", &["tag", tag])
    }

    fn run(&self, command: &str, args: &[&str]) -> Result<String> {
        let exe = self.executable()?;
        tracing::debug!(git = %exe.display(), ?args, "running git");
        let output = Command::new(&exe)
            .args(args)
            .current_dir(&self.workdir)
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .output()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    SpecflowError::GitNotFound
                } else {
                    SpecflowError::Io(e)
                }
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_owned();
            tracing::warn!(command, status = %output.status, %stderr, "git failed");
            return Err(SpecflowError::GitFailed {
                command: command.to_string(),
                status: output.status.to_string(),
                stderr,
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_owned())
    }
}
