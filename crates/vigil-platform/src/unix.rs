//! Unix implementation: signal-based liveness and termination.

use nix::errno::Errno;
use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;

use crate::error::{PlatformError, PlatformResult};

fn as_pid(pid: u32) -> Pid {
    #[allow(clippy::cast_possible_wrap)] // PID always fits in i32 on Unix
    Pid::from_raw(pid as i32)
}

/// Signal 0 probe. EPERM means the process exists but belongs to someone else.
pub(crate) fn pid_alive(pid: u32) -> bool {
    match kill(as_pid(pid), None) {
        Ok(()) => true,
        Err(Errno::EPERM) => true,
        Err(_) => false,
    }
}

pub(crate) fn send_term(pid: u32) -> PlatformResult<()> {
    match kill(as_pid(pid), Signal::SIGTERM) {
        Ok(()) | Err(Errno::ESRCH) => Ok(()),
        Err(e) => Err(PlatformError::probe_failed(pid, e.to_string())),
    }
}

pub(crate) fn send_kill(pid: u32) -> PlatformResult<()> {
    match kill(as_pid(pid), Signal::SIGKILL) {
        Ok(()) | Err(Errno::ESRCH) => Ok(()),
        Err(e) => Err(PlatformError::probe_failed(pid, e.to_string())),
    }
}
