//! Background (daemon) mode support

use nix::sys::signal::kill;
use nix::unistd::Pid;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum DaemonError {
    #[error("failed to detach from terminal: {0}")]
    Detach(#[from] nix::Error),

    #[error("server already running (PID: {0})")]
    AlreadyRunning(i32),

    #[error("PID file {path}: {source}")]
    PidFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Detach from the controlling terminal
///
/// Must run before the async runtime starts: only the calling thread
/// survives the fork. The working directory is kept so relative config and
/// log paths still resolve.
pub fn detach() -> Result<(), DaemonError> {
    nix::unistd::daemon(true, false)?;
    Ok(())
}

/// Owns the PID file for as long as the server runs; the file is removed on drop
#[derive(Debug)]
pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    /// Write the current PID, refusing if the file names a live process
    pub fn acquire(path: impl Into<PathBuf>) -> Result<Self, DaemonError> {
        let path = path.into();
        if let Some(pid) = ensure_not_running(&path)? {
            warn!("[DAEMON] Replacing stale PID file (PID {} is gone)", pid);
        }

        fs::write(&path, format!("{}\n", std::process::id())).map_err(|source| {
            DaemonError::PidFile {
                path: path.clone(),
                source,
            }
        })?;
        info!("[DAEMON] PID {} written to {}", std::process::id(), path.display());

        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for PidFile {
    fn drop(&mut self) {
        match fs::remove_file(&self.path) {
            Ok(()) => info!("[DAEMON] Removed {}", self.path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("[DAEMON] Failed to remove {}: {}", self.path.display(), e),
        }
    }
}

/// Fail if the PID file names a process that is still alive
///
/// Returns the PID of a stale file so the caller can report it; this may run
/// before logging is set up.
pub fn ensure_not_running(path: &Path) -> Result<Option<i32>, DaemonError> {
    match read_pid(path) {
        Some(pid) if process_alive(pid) => Err(DaemonError::AlreadyRunning(pid)),
        stale => Ok(stale),
    }
}

fn read_pid(path: &Path) -> Option<i32> {
    let text = fs::read_to_string(path).ok()?;
    text.trim().parse().ok()
}

fn process_alive(pid: i32) -> bool {
    pid > 0 && kill(Pid::from_raw(pid), None).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_pid_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("iot-server-test-{}-{}.pid", name, std::process::id()))
    }

    #[test]
    fn test_pid_file_written_and_removed() {
        let path = temp_pid_path("lifecycle");
        {
            let pid_file = PidFile::acquire(&path).expect("acquire");
            let contents = fs::read_to_string(pid_file.path()).expect("read");
            assert_eq!(contents.trim(), std::process::id().to_string());
        }
        assert!(!path.exists());
    }

    #[test]
    fn test_live_pid_refused() {
        let path = temp_pid_path("live");
        fs::write(&path, format!("{}\n", std::process::id())).expect("write");

        let result = PidFile::acquire(&path);
        assert!(matches!(result, Err(DaemonError::AlreadyRunning(_))));

        fs::remove_file(&path).expect("cleanup");
    }

    #[test]
    fn test_stale_pid_reported() {
        let path = temp_pid_path("stale");
        fs::write(&path, format!("{}\n", i32::MAX)).expect("write");

        assert_eq!(ensure_not_running(&path).expect("stale is not fatal"), Some(i32::MAX));

        fs::remove_file(&path).expect("cleanup");
        assert_eq!(ensure_not_running(&path).expect("missing file"), None);
    }

    #[test]
    fn test_garbage_pid_file_replaced() {
        let path = temp_pid_path("garbage");
        fs::write(&path, "not a pid").expect("write");

        let pid_file = PidFile::acquire(&path).expect("acquire");
        let contents = fs::read_to_string(pid_file.path()).expect("read");
        assert_eq!(contents.trim(), std::process::id().to_string());
    }
}
