//! macOS enumeration via `lsof`.
//!
//! macOS exposes no procfs; `lsof -nP -iTCP -sTCP:LISTEN` in field mode is
//! the conventional source for listening sockets and their owners.

use std::process::Command;

use crate::error::{PortError, PortResult};
use crate::types::PortInfo;

/// Enumerates listening TCP ports with best-effort ownership.
pub(crate) fn enumerate() -> PortResult<Vec<PortInfo>> {
    let output = Command::new("lsof")
        .args(["-nP", "-iTCP", "-sTCP:LISTEN", "-FpcnP"])
        .output()
        .map_err(|e| PortError::enumeration(format!("lsof failed to run: {e}")))?;

    // lsof exits non-zero when nothing matches; an empty snapshot is valid
    let stdout = String::from_utf8_lossy(&output.stdout);
    Ok(parse_lsof_fields(&stdout))
}

/// Parses `lsof -F` field output: `p<pid>`, `c<command>`, `n<addr>` lines.
fn parse_lsof_fields(output: &str) -> Vec<PortInfo> {
    let mut ports = Vec::new();
    let mut current_pid: Option<u32> = None;
    let mut current_name: Option<String> = None;

    for line in output.lines() {
        match line.split_at(line.len().min(1)) {
            ("p", rest) => current_pid = rest.parse().ok(),
            ("c", rest) => current_name = Some(rest.to_string()),
            ("n", rest) => {
                let Some(port) = rest
                    .rsplit(':')
                    .next()
                    .and_then(|p| p.parse::<u16>().ok())
                else {
                    continue;
                };
                if ports
                    .iter()
                    .any(|info: &PortInfo| info.port == port && info.pid == current_pid)
                {
                    continue;
                }
                ports.push(PortInfo {
                    port,
                    pid: current_pid,
                    process_name: current_name.clone(),
                });
            }
            _ => {}
        }
    }

    ports.sort_by_key(|info| info.port);
    ports
}
