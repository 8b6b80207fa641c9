//! Linux enumeration via procfs.
//!
//! `/proc/net/tcp` and `/proc/net/tcp6` list sockets in the LISTEN state
//! together with their inode numbers; walking `/proc/<pid>/fd` maps those
//! inodes back to owning PIDs. Entries whose fd tables we cannot read
//! (other users' processes, without root) simply resolve with an unknown
//! owner.

use std::collections::HashMap;
use std::path::Path;

use crate::error::PortResult;
use crate::types::PortInfo;

const TCP_LISTEN: &str = "0A";

/// Enumerates listening TCP ports with best-effort ownership.
pub(crate) fn enumerate() -> PortResult<Vec<PortInfo>> {
    let mut port_inodes: Vec<(u16, u64)> = Vec::new();
    for table in ["/proc/net/tcp", "/proc/net/tcp6"] {
        if let Ok(content) = std::fs::read_to_string(table) {
            port_inodes.extend(parse_socket_table(&content));
        }
    }

    let inode_owners = socket_inode_owners();

    let mut seen = HashMap::new();
    for (port, inode) in port_inodes {
        let entry = match inode_owners.get(&inode) {
            Some((pid, name)) => PortInfo::owned(port, *pid, name.clone()),
            None => PortInfo::unresolved(port),
        };
        // The same port can appear in both v4 and v6 tables; prefer the
        // entry with a resolved owner.
        seen.entry(port)
            .and_modify(|existing: &mut PortInfo| {
                if existing.pid.is_none() && entry.pid.is_some() {
                    *existing = entry.clone();
                }
            })
            .or_insert(entry);
    }

    let mut ports: Vec<PortInfo> = seen.into_values().collect();
    ports.sort_by_key(|info| info.port);
    Ok(ports)
}

/// Parses one `/proc/net/tcp{,6}` table into (port, inode) pairs for
/// sockets in the LISTEN state.
fn parse_socket_table(content: &str) -> Vec<(u16, u64)> {
    content
        .lines()
        .skip(1) // header
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            // local_address = field 1, st = field 3, inode = field 9
            if fields.len() < 10 || fields[3] != TCP_LISTEN {
                return None;
            }
            let port_hex = fields[1].rsplit(':').next()?;
            let port = u16::from_str_radix(port_hex, 16).ok()?;
            let inode = fields[9].parse::<u64>().ok()?;
            Some((port, inode))
        })
        .collect()
}

/// Maps socket inodes to (pid, process name) by walking fd tables.
///
/// Unreadable fd directories are skipped silently; that is the permission
/// degradation path, not an error.
fn socket_inode_owners() -> HashMap<u64, (u32, String)> {
    let mut owners = HashMap::new();

    let Ok(proc_entries) = std::fs::read_dir("/proc") else {
        return owners;
    };

    for entry in proc_entries.flatten() {
        let Some(pid) = entry
            .file_name()
            .to_str()
            .and_then(|name| name.parse::<u32>().ok())
        else {
            continue;
        };

        let fd_dir = entry.path().join("fd");
        let Ok(fds) = std::fs::read_dir(&fd_dir) else {
            continue;
        };

        let name = read_comm(&entry.path());

        for fd in fds.flatten() {
            let Ok(target) = std::fs::read_link(fd.path()) else {
                continue;
            };
            if let Some(inode) = parse_socket_inode(&target) {
                owners.entry(inode).or_insert_with(|| (pid, name.clone()));
            }
        }
    }

    owners
}

fn read_comm(proc_dir: &Path) -> String {
    std::fs::read_to_string(proc_dir.join("comm"))
        .map(|s| s.trim().to_string())
        .unwrap_or_default()
}

/// Extracts N from a `socket:[N]` symlink target.
fn parse_socket_inode(target: &Path) -> Option<u64> {
    let s = target.to_str()?;
    s.strip_prefix("socket:[")?.strip_suffix(']')?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_parse_socket_table() {
        let table = "  sl  local_address rem_address   st tx_queue rx_queue tr tm->when retrnsmt   uid  timeout inode\n\
             0: 0100007F:1F90 00000000:0000 0A 00000000:00000000 00:00000000 00000000  1000        0 123456 1 0000000000000000 100 0 0 10 0\n\
             1: 00000000:0050 00000000:0000 01 00000000:00000000 00:00000000 00000000     0        0 654321 1 0000000000000000 100 0 0 10 0\n";
        let parsed = parse_socket_table(table);
        // Only the LISTEN (0A) row survives; 0x1F90 = 8080
        assert_eq!(parsed, vec![(8080, 123456)]);
    }

    #[test]
    fn test_parse_socket_inode() {
        assert_eq!(
            parse_socket_inode(&PathBuf::from("socket:[48879]")),
            Some(48879)
        );
        assert_eq!(parse_socket_inode(&PathBuf::from("/dev/null")), None);
        assert_eq!(parse_socket_inode(&PathBuf::from("pipe:[123]")), None);
    }

    #[test]
    fn test_enumerate_finds_own_listener() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let ports = enumerate().unwrap();
        let found = ports
            .iter()
            .find(|info| info.port == port)
            .expect("own listener must be enumerated");
        // We can always read our own fd table
        assert_eq!(found.pid, Some(std::process::id()));
    }
}
