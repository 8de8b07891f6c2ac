//! The external filter and render tools, spawned as child processes.

use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::Path;
use std::process::{ExitStatus, Stdio};

use anyhow::Context;
use structures::RenderMode;
use tokio::fs;
use tokio::process::Command;
use tracing::debug;

use crate::config::ToolCommand;
use crate::errors::{FilterFailure, PipelineError};

/// Everything the render tool needs to draw one placemap.
#[derive(Debug, Clone, Copy)]
pub struct RenderJob<'a> {
    pub canvas: &'a str,
    pub mode: RenderMode,
    pub user_log: &'a Path,
    pub background: &'a Path,
    pub palette: &'a Path,
    pub output: &'a Path,
}

/// Extracts one user's rows from `full_log` into `output`.
///
/// A leftover `output` from an earlier run is removed first so an empty or
/// missing result is never mistaken for success.
pub async fn filter(
    tool: &ToolCommand,
    canvas: &str,
    key: &str,
    full_log: &Path,
    output: &Path,
) -> Result<(), PipelineError> {
    ensure_parent_dir(output).await?;
    remove_stale(output).await?;

    let args = vec![
        OsString::from("--user"),
        OsString::from(key),
        OsString::from("--log"),
        full_log.into(),
        OsString::from("--output"),
        output.into(),
    ];
    let status = run(tool, "filter", args).await?;

    let failure = if !status.success() {
        Some(FilterFailure::ExitStatus(status.code()))
    } else {
        match fs::metadata(output).await {
            Ok(meta) if meta.len() == 0 => Some(FilterFailure::EmptyOutput),
            Ok(_) => None,
            Err(err) if err.kind() == ErrorKind::NotFound => Some(FilterFailure::MissingOutput),
            Err(err) => {
                return Err(anyhow::Error::new(err)
                    .context(format!("could not inspect filtered log {}", output.display()))
                    .into())
            }
        }
    };

    match failure {
        Some(failure) => Err(PipelineError::Filter {
            canvas: canvas.to_string(),
            failure,
        }),
        None => Ok(()),
    }
}

pub async fn render(tool: &ToolCommand, job: RenderJob<'_>) -> Result<(), PipelineError> {
    ensure_parent_dir(job.output).await?;

    let args = vec![
        OsString::from("--log"),
        job.user_log.into(),
        OsString::from("--bg"),
        job.background.into(),
        OsString::from("--palette"),
        job.palette.into(),
        OsString::from("--screenshot"),
        OsString::from("--output"),
        job.output.into(),
        OsString::from(job.mode.as_str()),
    ];
    let status = run(tool, "render", args).await?;

    if status.success() {
        Ok(())
    } else {
        Err(PipelineError::Render {
            canvas: job.canvas.to_string(),
            mode: job.mode,
            status: status.code(),
        })
    }
}

/// Runs a tool to completion. The child is killed if this future is dropped.
///
/// `args` is never logged: the filter's arguments carry a secret key.
async fn run(tool: &ToolCommand, name: &str, args: Vec<OsString>) -> anyhow::Result<ExitStatus> {
    let output = Command::new(&tool.program)
        .args(&tool.args)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await
        .with_context(|| format!("failed to run {} tool '{}'", name, tool.program.display()))?;

    debug!(
        tool = name,
        status = ?output.status.code(),
        stdout = %String::from_utf8_lossy(&output.stdout).trim(),
        stderr = %String::from_utf8_lossy(&output.stderr).trim(),
        "tool finished"
    );

    Ok(output.status)
}

async fn ensure_parent_dir(path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .with_context(|| format!("failed to create output directory '{}'", parent.display()))?;
    }
    Ok(())
}

async fn remove_stale(path: &Path) -> anyhow::Result<()> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err).with_context(|| format!("failed to remove stale '{}'", path.display())),
    }
}
