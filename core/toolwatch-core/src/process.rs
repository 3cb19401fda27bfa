//! Signalling tool processes.

use crate::error::{Result, ToolwatchError};

/// Sends SIGTERM to `pid`.
///
/// The pid is not checked against the current snapshot: callers may stop
/// any process they are permitted to signal. Pid 0 and values outside the
/// positive `pid_t` range are rejected before any signal is sent, since
/// `kill(0, ..)` and negative pids address process groups.
#[cfg(unix)]
pub fn kill_process(pid: u32) -> Result<()> {
    let raw = validate_pid(pid)?;

    // SAFETY: libc::kill with SIGTERM is a standard POSIX signal delivery to a
    // single, positive pid.
    let result = unsafe { libc::kill(raw, libc::SIGTERM) };
    if result == 0 {
        tracing::info!(pid, "Sent SIGTERM");
        return Ok(());
    }

    let err = std::io::Error::last_os_error();
    match err.raw_os_error() {
        Some(libc::ESRCH) => Err(ToolwatchError::ProcessNotFound(pid)),
        Some(libc::EPERM) => {
            tracing::warn!(pid, "Not permitted to signal process");
            Err(ToolwatchError::PermissionDenied(pid))
        }
        _ => Err(ToolwatchError::Io {
            context: format!("sending SIGTERM to {}", pid),
            source: err,
        }),
    }
}

#[cfg(not(unix))]
pub fn kill_process(pid: u32) -> Result<()> {
    validate_pid(pid)?;
    Err(ToolwatchError::Io {
        context: format!("sending SIGTERM to {}", pid),
        source: std::io::Error::new(
            std::io::ErrorKind::Unsupported,
            "process signalling is only supported on unix",
        ),
    })
}

fn validate_pid(pid: u32) -> Result<i32> {
    match i32::try_from(pid) {
        Ok(raw) if raw > 0 => Ok(raw),
        _ => Err(ToolwatchError::InvalidPid(pid.to_string())),
    }
}
