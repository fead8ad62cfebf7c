//! External process launching, stream reading, and termination.
//!
//! All interaction with the downloader binary goes through here: eager
//! binary resolution, piped spawning with platform quirks applied, lossy
//! line-by-line stream reading, and the terminate/grace/kill reaping ladder.

use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, warn};

/// Suppresses the console window for child processes on Windows
#[cfg(windows)]
pub const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// Resolve an external tool to an absolute path.
///
/// An explicitly configured path wins; otherwise the system `PATH` is
/// searched when `search_path` allows it. Resolution happens before any
/// job launches so a missing binary fails the job up front.
pub fn resolve_tool(
    configured: Option<&Path>,
    name: &str,
    search_path: bool,
) -> Result<PathBuf> {
    if let Some(path) = configured {
        if path.is_file() {
            return Ok(path.to_path_buf());
        }
        return Err(Error::ExternalTool(format!(
            "configured path for {name} does not exist: {}",
            path.display()
        )));
    }
    if !search_path {
        return Err(Error::ExternalTool(format!(
            "{name} has no configured path and PATH search is disabled"
        )));
    }
    which::which(name)
        .map_err(|e| Error::ExternalTool(format!("{name} not found on PATH: {e}")))
}

/// Build a [`Command`] with piped stdio and platform flags applied
pub fn downloader_command(binary: &Path, args: &[String]) -> Command {
    let mut cmd = Command::new(binary);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    #[cfg(windows)]
    {
        use std::os::windows::process::CommandExt;
        cmd.creation_flags(CREATE_NO_WINDOW);
    }
    cmd
}

/// Spawn the downloader process
pub fn spawn_downloader(binary: &Path, args: &[String]) -> Result<Child> {
    debug!(binary = %binary.display(), "spawning downloader");
    downloader_command(binary, args)
        .spawn()
        .map_err(|e| Error::Launch(format!("failed to spawn {}: {e}", binary.display())))
}

/// Read a stream line by line until EOF, invoking `on_line` for each
/// stripped, non-empty line.
///
/// Invalid UTF-8 is replaced rather than treated as an error, so a single
/// mojibake line cannot kill the reader mid-download.
pub async fn read_lines_lossy<R, F, Fut>(stream: R, mut on_line: F)
where
    R: AsyncRead + Unpin,
    F: FnMut(String) -> Fut,
    Fut: std::future::Future<Output = ()>,
{
    let mut reader = BufReader::new(stream);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                let line = line.trim();
                if !line.is_empty() {
                    on_line(line.to_string()).await;
                }
            }
            Err(e) => {
                warn!(error = %e, "stream read failed, stopping reader");
                break;
            }
        }
    }
}

/// Ask the child to terminate gracefully, escalating to a hard kill.
///
/// Unix children get SIGTERM and `grace` to exit; if still alive they are
/// SIGKILLed and reaped within `kill_wait`. On other platforms the first
/// step is already a hard kill. Never returns while the child might still
/// be consuming the output file.
pub async fn terminate_and_reap(child: &mut Child, grace: Duration, kill_wait: Duration) {
    #[cfg(unix)]
    {
        if let Some(pid) = child.id() {
            // SAFETY: pid came from a live child we own; worst case the
            // signal races process exit and is a no-op.
            unsafe {
                libc::kill(pid as libc::pid_t, libc::SIGTERM);
            }
            if tokio::time::timeout(grace, child.wait()).await.is_ok() {
                return;
            }
            warn!(pid, "downloader ignored SIGTERM, killing");
        }
    }
    #[cfg(not(unix))]
    {
        let _ = grace;
    }
    if let Err(e) = child.start_kill() {
        debug!(error = %e, "kill failed, child likely already exited");
    }
    if tokio::time::timeout(kill_wait, child.wait()).await.is_err() {
        warn!("downloader did not exit after kill within the reap window");
    }
}
