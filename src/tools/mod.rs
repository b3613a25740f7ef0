//! Adapters for external toolchain binaries.
//!
//! Tools are located on `PATH` (or at an explicit location for the NDK's
//! `llvm-objcopy`) and run as child processes. Every invocation races the
//! run's cancellation token; a cancelled run kills the child.

pub mod defaults;
pub mod dwarfdump;
pub mod git;
pub mod objcopy;
pub mod xcodebuild;

use crate::error::{AppError, Result, ToolError};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use tokio_util::sync::CancellationToken;

/// A located external binary
#[derive(Debug, Clone)]
pub struct Tool {
    name: String,
    path: PathBuf,
}

impl Tool {
    /// Look `name` up on `PATH`
    pub fn locate(name: &str) -> Result<Self> {
        match which::which(name) {
            Ok(path) => {
                log::debug!("Found {} at {}", name, path.display());
                Ok(Self {
                    name: name.to_string(),
                    path,
                })
            }
            Err(e) => {
                log::debug!("{} not found on PATH: {}", name, e);
                Err(AppError::Tool(ToolError::ToolMissing {
                    tool: name.to_string(),
                }))
            }
        }
    }

    /// Use a binary at a known location
    pub fn at(name: &str, path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if !path.is_file() {
            return Err(AppError::Tool(ToolError::ToolMissing {
                tool: format!("{} ({})", name, path.display()),
            }));
        }
        Ok(Self {
            name: name.to_string(),
            path,
        })
    }

    /// Tool name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Resolved binary path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run to completion and return the raw output, whatever the exit status
    pub async fn output<I, S>(
        &self,
        args: I,
        cwd: Option<&Path>,
        cancel: &CancellationToken,
    ) -> Result<Output>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut cmd = tokio::process::Command::new(&self.path);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }
        log::debug!("Running {:?}", cmd.as_std());

        tokio::select! {
            _ = cancel.cancelled() => Err(AppError::Cancelled),
            output = cmd.output() => output.map_err(|e| self.failed(e.to_string())),
        }
    }

    /// Run and return trimmed stdout; a non-zero exit is `ToolFailed`
    pub async fn stdout<I, S>(
        &self,
        args: I,
        cwd: Option<&Path>,
        cancel: &CancellationToken,
    ) -> Result<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let output = self.output(args, cwd, cancel).await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let reason = if stderr.trim().is_empty() {
                format!("exited with {}", output.status)
            } else {
                stderr.trim().to_string()
            };
            return Err(self.failed(reason));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    fn failed(&self, reason: String) -> AppError {
        AppError::Tool(ToolError::ToolFailed {
            tool: self.name.clone(),
            reason,
        })
    }
}
