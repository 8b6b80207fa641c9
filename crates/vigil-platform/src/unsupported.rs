//! Fallback implementation for platforms without Unix signals.
//!
//! Liveness is answered from the sysinfo process table; termination uses
//! sysinfo's kill support where available.

use sysinfo::{Pid, ProcessesToUpdate, System};

use crate::error::{PlatformError, PlatformResult};

pub(crate) fn pid_alive(pid: u32) -> bool {
    let mut system = System::new();
    system.refresh_processes(ProcessesToUpdate::Some(&[Pid::from_u32(pid)]), true);
    system.process(Pid::from_u32(pid)).is_some()
}

pub(crate) fn request_stop(pid: u32) -> PlatformResult<()> {
    let mut system = System::new();
    system.refresh_processes(ProcessesToUpdate::Some(&[Pid::from_u32(pid)]), true);
    match system.process(Pid::from_u32(pid)) {
        Some(process) => {
            process.kill();
            Ok(())
        }
        None => Ok(()),
    }
}

pub(crate) fn force_stop(pid: u32) -> PlatformResult<()> {
    // No graceful/forced distinction without signals
    let _ = request_stop(pid)?;
    if pid_alive(pid) {
        return Err(PlatformError::Unsupported("forced kill"));
    }
    Ok(())
}
