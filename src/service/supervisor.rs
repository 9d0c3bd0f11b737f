// src/service/supervisor.rs

//! Scoped lifetime for a long-running background service.
//!
//! The service is started in its own process group. When the owning scope
//! ends, on success, error, panic or cancellation, the whole group receives
//! SIGHUP, then SIGTERM, then SIGKILL, with a grace window after each, and
//! the leader is reaped.

use std::future::Future;
use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};

use anyhow::anyhow;
use nix::errno::Errno;
use nix::sys::signal::{Signal, killpg};
use nix::unistd::Pid;
use tokio::process::Child;
use tracing::{debug, info, warn};

use crate::errors::Result;
use crate::exec::shell_command;

const ESCALATION: [Signal; 3] = [Signal::SIGHUP, Signal::SIGTERM, Signal::SIGKILL];

/// How often the group is probed during a grace window.
const PROBE_INTERVAL: Duration = Duration::from_millis(50);

/// What the scope body may know about the running service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceInfo {
    pub process_group: i32,
    pub command: String,
}

/// The live process. Owned by a [`ServiceGuard`] and never handed out.
#[derive(Debug)]
struct ServiceHandle {
    pgid: Pid,
    command: String,
    child: Child,
}

/// Owns a running service; tears its process group down when dropped.
///
/// Prefer [`ServiceGuard::shutdown`] (or [`with_background_service`]),
/// which waits asynchronously. `Drop` performs the same escalation with
/// blocking sleeps and only runs when the scope is left abnormally.
#[derive(Debug)]
pub struct ServiceGuard {
    handle: Option<ServiceHandle>,
    grace: Duration,
}

impl ServiceGuard {
    /// Launch `command` detached into a new process group.
    ///
    /// Its stdout/stderr are inherited so the service's own log stays
    /// visible. Being started says nothing about being ready; see
    /// [`crate::service::readiness`].
    pub fn start(command: &str, cwd: &Path, grace: Duration) -> Result<Self> {
        let mut cmd = shell_command(command, cwd);
        cmd.process_group(0).stdin(Stdio::null());

        let child = cmd.spawn()?;
        let pid = child
            .id()
            .ok_or_else(|| anyhow!("service '{command}' exited before its pid was read"))?;
        let pgid = Pid::from_raw(pid as i32);

        info!(command, process_group = pid, "background service started");

        Ok(Self {
            handle: Some(ServiceHandle {
                pgid,
                command: command.to_string(),
                child,
            }),
            grace,
        })
    }

    pub fn info(&self) -> Option<ServiceInfo> {
        self.handle.as_ref().map(|h| ServiceInfo {
            process_group: h.pgid.as_raw(),
            command: h.command.clone(),
        })
    }

    /// Terminate the process group and wait for the leader to be reaped.
    pub async fn shutdown(mut self) {
        if let Some(handle) = self.handle.take() {
            terminate(handle, self.grace).await;
        }
    }
}

impl Drop for ServiceGuard {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            warn!(command = %handle.command, "service scope left abnormally; terminating");
            terminate_blocking(handle, self.grace);
        }
    }
}

/// Acquire a background service, run `body`, always release the service.
///
/// The body's result is returned unchanged after the service group has
/// been torn down.
pub async fn with_background_service<F, Fut, T>(
    command: &str,
    cwd: &Path,
    grace: Duration,
    body: F,
) -> Result<T>
where
    F: FnOnce(ServiceInfo) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let guard = ServiceGuard::start(command, cwd, grace)?;
    let info = guard
        .info()
        .ok_or_else(|| anyhow!("service guard lost its handle"))?;

    let result = body(info).await;
    guard.shutdown().await;
    result
}

/// Send `signal` to the group. Returns `false` once the group is gone.
fn signal_group(pgid: Pid, signal: Signal) -> bool {
    match killpg(pgid, signal) {
        Ok(()) => {
            debug!(process_group = pgid.as_raw(), ?signal, "signalled service group");
            true
        }
        Err(Errno::ESRCH) => false,
        Err(e) => {
            warn!(process_group = pgid.as_raw(), ?signal, error = %e, "failed to signal service group");
            true
        }
    }
}

/// True while any process in the group (leader included) exists. Reaps
/// the leader opportunistically so it does not linger as a zombie.
fn group_alive(handle: &mut ServiceHandle) -> bool {
    let _ = handle.child.try_wait();
    !matches!(killpg(handle.pgid, None), Err(Errno::ESRCH))
}

async fn terminate(mut handle: ServiceHandle, grace: Duration) {
    for signal in ESCALATION {
        if !signal_group(handle.pgid, signal) {
            break;
        }
        let window_ends = Instant::now() + grace;
        while group_alive(&mut handle) && Instant::now() < window_ends {
            tokio::time::sleep(PROBE_INTERVAL).await;
        }
        if !group_alive(&mut handle) {
            break;
        }
    }

    match handle.child.wait().await {
        Ok(status) => info!(command = %handle.command, %status, "background service stopped"),
        Err(e) => warn!(command = %handle.command, error = %e, "failed to reap background service"),
    }
}

fn terminate_blocking(mut handle: ServiceHandle, grace: Duration) {
    for signal in ESCALATION {
        if !signal_group(handle.pgid, signal) {
            break;
        }
        let window_ends = Instant::now() + grace;
        while group_alive(&mut handle) && Instant::now() < window_ends {
            std::thread::sleep(PROBE_INTERVAL);
        }
        if !group_alive(&mut handle) {
            break;
        }
    }

    // SIGKILL has been delivered by now unless the group was already gone;
    // poll until the leader is reaped.
    let reap_deadline = Instant::now() + grace.max(Duration::from_secs(1));
    loop {
        match handle.child.try_wait() {
            Ok(Some(status)) => {
                info!(command = %handle.command, %status, "background service stopped");
                return;
            }
            Ok(None) if Instant::now() < reap_deadline => std::thread::sleep(PROBE_INTERVAL),
            Ok(None) => {
                warn!(command = %handle.command, "background service leader not reaped in time");
                return;
            }
            Err(e) => {
                warn!(command = %handle.command, error = %e, "failed to reap background service");
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    /// Non-zombie processes whose process group is `pgid` (Linux `/proc`).
    fn live_members(pgid: i32) -> Vec<i32> {
        let mut members = Vec::new();
        let Ok(entries) = fs::read_dir("/proc") else {
            return members;
        };
        for entry in entries.flatten() {
            let Ok(pid) = entry.file_name().to_string_lossy().parse::<i32>() else {
                continue;
            };
            let Ok(stat) = fs::read_to_string(entry.path().join("stat")) else {
                continue;
            };
            // Fields after the parenthesised command name: state ppid pgrp ...
            let Some(rest) = stat.rfind(')').map(|i| &stat[i + 1..]) else {
                continue;
            };
            let fields: Vec<&str> = rest.split_whitespace().collect();
            if fields.len() > 2 && fields[0] != "Z" && fields[2] == pgid.to_string() {
                members.push(pid);
            }
        }
        members
    }

    fn grace() -> Duration {
        Duration::from_millis(300)
    }

    #[tokio::test]
    async fn group_is_gone_after_normal_scope_exit() {
        let tmp = std::env::temp_dir();
        let info = with_background_service("sleep 30 & sleep 30 & wait", &tmp, grace(), |info| async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            assert!(!live_members(info.process_group).is_empty());
            Ok(info)
        })
        .await
        .unwrap();

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(live_members(info.process_group).is_empty());
    }

    #[tokio::test]
    async fn group_is_gone_after_failing_scope() {
        let tmp = std::env::temp_dir();
        let mut seen = None;
        let result: Result<()> = with_background_service("sleep 30", &tmp, grace(), |info| {
            seen = Some(info.process_group);
            async move { Err(anyhow!("tests failed").into()) }
        })
        .await;

        assert!(result.is_err());
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(live_members(seen.unwrap()).is_empty());
    }

    #[tokio::test]
    async fn service_ignoring_sighup_and_sigterm_is_killed() {
        let tmp = std::env::temp_dir();
        let guard = ServiceGuard::start("trap '' HUP TERM; sleep 30 & wait", &tmp, grace()).unwrap();
        let pgid = guard.info().unwrap().process_group;
        tokio::time::sleep(Duration::from_millis(200)).await;

        let started = Instant::now();
        guard.shutdown().await;

        assert!(started.elapsed() < Duration::from_secs(5));
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(live_members(pgid).is_empty());
    }

    #[test]
    fn dropping_the_guard_terminates_the_group() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let pgid = rt.block_on(async {
            let guard = ServiceGuard::start("sleep 30", &std::env::temp_dir(), grace()).unwrap();
            let pgid = guard.info().unwrap().process_group;
            drop(guard);
            pgid
        });

        std::thread::sleep(Duration::from_millis(200));
        assert!(live_members(pgid).is_empty());
    }
}
