// src/engine/process.rs

//! Process-group spawning and signalling.
//!
//! Every step runs `sh -c <command>` as the leader of a fresh process group
//! (`setsid` between fork and exec), so that killing the step also kills any
//! children it forked. Kill always targets the group, never the leader pid.

use std::io;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

/// Grace period between SIGTERM and SIGKILL escalation.
pub const KILL_GRACE: Duration = Duration::from_secs(2);

/// Spawn `command` through the shell in a new session/process group, with
/// piped stdout/stderr and no stdin.
pub fn spawn_in_group(command: &str) -> io::Result<Child> {
    use std::os::unix::process::CommandExt;

    let mut cmd = Command::new("sh");
    cmd.arg("-c")
        .arg(command)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    // Runs in the forked child before exec. setsid makes the child a
    // session and process-group leader, detached from our group.
    unsafe {
        cmd.pre_exec(|| {
            if libc::setsid() == -1 {
                return Err(io::Error::last_os_error());
            }
            Ok(())
        });
    }

    cmd.spawn()
}

/// Whether any process in the group can still be signalled.
pub fn group_alive(pgid: i32) -> bool {
    unsafe { libc::killpg(pgid, 0) == 0 }
}

pub fn terminate_group(pgid: i32) {
    unsafe {
        libc::killpg(pgid, libc::SIGTERM);
    }
}

pub fn kill_group(pgid: i32) {
    unsafe {
        libc::killpg(pgid, libc::SIGKILL);
    }
}

/// SIGTERM the group, then SIGKILL it if it is still alive after `grace`.
///
/// Blocks for up to `grace`; callers run it on a throwaway thread.
pub fn kill_group_with_grace(pgid: i32, grace: Duration) {
    debug!(pgid, "terminating process group");
    terminate_group(pgid);

    let deadline = Instant::now() + grace;
    while Instant::now() < deadline {
        if !group_alive(pgid) {
            return;
        }
        thread::sleep(Duration::from_millis(50));
    }

    if group_alive(pgid) {
        warn!(pgid, "process group unresponsive to SIGTERM; sending SIGKILL");
        kill_group(pgid);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spawn_reports_exit_code() {
        let mut child = spawn_in_group("exit 7").unwrap();
        let status = child.wait().unwrap();
        assert_eq!(status.code(), Some(7));
    }

    #[test]
    fn child_is_its_own_group_leader() {
        let mut child = spawn_in_group("sleep 5").unwrap();
        let pid = child.id() as i32;

        // setsid runs in the child between fork and exec; poll briefly until
        // it has taken effect.
        let deadline = Instant::now() + Duration::from_secs(2);
        let mut child_pgid = unsafe { libc::getpgid(pid) };
        while child_pgid != pid && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
            child_pgid = unsafe { libc::getpgid(pid) };
        }
        assert_eq!(child_pgid, pid);
        assert_ne!(child_pgid, unsafe { libc::getpgrp() });

        kill_group(pid);
        let status = child.wait().unwrap();
        assert!(status.code().is_none());
    }

    #[test]
    fn grace_kill_takes_down_forked_children() {
        // The step forks a long-lived grandchild; killing the group must
        // reach it too.
        let mut child = spawn_in_group("sleep 30 & wait").unwrap();
        let pgid = child.id() as i32;
        kill_group_with_grace(pgid, Duration::from_millis(500));
        let _ = child.wait().unwrap();
        assert!(!group_alive(pgid));
    }
}
