// src/exec/command.rs

//! Launching shell commands and capturing their output live.
//!
//! Both pipes are drained by a single `select!` loop, so a child that fills
//! its stderr pipe while we wait on stdout (or vice versa) can never stall.
//! Reads use `read_until` into buffers that outlive each loop iteration;
//! when a branch loses the race, whatever bytes it had already pulled stay
//! in its buffer and are picked up by the next iteration.

use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, warn};

use crate::errors::Result;

/// Upper bound for the post-exit drain. A grandchild that inherited our
/// pipes may keep them open forever; we only want what is already buffered.
const DRAIN_TIMEOUT: Duration = Duration::from_millis(200);

/// Build a `sh -c <command>` process rooted at `cwd`.
///
/// This is the one place processes are constructed; the service supervisor
/// starts from the same builder and layers its own process-group setup on
/// top.
pub fn shell_command(command: &str, cwd: &Path) -> Command {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(command).current_dir(cwd);
    cmd
}

/// Which pipe a chunk of output came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Stdout,
    Stderr,
}

/// Result of running one command to completion.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandOutput {
    /// Exit code; `-1` if the process was killed by a signal.
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    /// Both channels, in the order lines arrived.
    pub combined: String,
    pub elapsed_seconds: f64,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Accumulates decoded output and optionally echoes it as it arrives.
#[derive(Debug, Default)]
struct OutputCapture {
    echo: bool,
    stdout: String,
    stderr: String,
    combined: String,
}

impl OutputCapture {
    fn push(&mut self, channel: Channel, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        let text = String::from_utf8_lossy(bytes);
        if self.echo {
            match channel {
                Channel::Stdout => print!("{text}"),
                Channel::Stderr => eprint!("{text}"),
            }
        }
        match channel {
            Channel::Stdout => self.stdout.push_str(&text),
            Channel::Stderr => self.stderr.push_str(&text),
        }
        self.combined.push_str(&text);
    }

    /// Push every complete line of `buf`, then whatever partial tail is left.
    fn push_all(&mut self, channel: Channel, buf: &[u8]) {
        for line in buf.split_inclusive(|b| *b == b'\n') {
            self.push(channel, line);
        }
    }
}

/// Run `command` under `sh -c` in `cwd`, forwarding its output live when
/// `echo` is set, and return the captured result.
///
/// Only spawn/wait failures are errors; a non-zero exit is a normal
/// [`CommandOutput`].
pub async fn run_captured(command: &str, cwd: &Path, echo: bool) -> Result<CommandOutput> {
    let started = Instant::now();

    let mut child = shell_command(command, cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()?;

    let mut stdout = child.stdout.take().map(BufReader::new);
    let mut stderr = child.stderr.take().map(BufReader::new);

    let mut capture = OutputCapture {
        echo,
        ..Default::default()
    };
    let mut out_buf = Vec::new();
    let mut err_buf = Vec::new();

    let status = loop {
        tokio::select! {
            biased;

            read = read_line(&mut stdout, &mut out_buf), if stdout.is_some() => {
                match read {
                    Ok(0) => stdout = None,
                    Ok(_) => capture.push(Channel::Stdout, &std::mem::take(&mut out_buf)),
                    Err(e) => {
                        warn!(command, error = %e, "reading stdout failed; closing channel");
                        stdout = None;
                    }
                }
            }

            read = read_line(&mut stderr, &mut err_buf), if stderr.is_some() => {
                match read {
                    Ok(0) => stderr = None,
                    Ok(_) => capture.push(Channel::Stderr, &std::mem::take(&mut err_buf)),
                    Err(e) => {
                        warn!(command, error = %e, "reading stderr failed; closing channel");
                        stderr = None;
                    }
                }
            }

            status = child.wait() => break status?,
        }
    };

    // The child is gone but the pipes may still hold its last bytes.
    drain(&mut stdout, &mut out_buf).await;
    capture.push_all(Channel::Stdout, &out_buf);
    drain(&mut stderr, &mut err_buf).await;
    capture.push_all(Channel::Stderr, &err_buf);

    let exit_code = status.code().unwrap_or(-1);
    let elapsed_seconds = started.elapsed().as_secs_f64();
    debug!(command, exit_code, elapsed_seconds, "command exited");

    Ok(CommandOutput {
        exit_code,
        stdout: capture.stdout,
        stderr: capture.stderr,
        combined: capture.combined,
        elapsed_seconds,
    })
}

async fn read_line<R>(reader: &mut Option<BufReader<R>>, buf: &mut Vec<u8>) -> std::io::Result<usize>
where
    R: AsyncRead + Unpin,
{
    match reader {
        Some(r) => r.read_until(b'\n', buf).await,
        None => Ok(0),
    }
}

async fn drain<R>(reader: &mut Option<BufReader<R>>, buf: &mut Vec<u8>)
where
    R: AsyncRead + Unpin,
{
    if let Some(r) = reader.as_mut() {
        match tokio::time::timeout(DRAIN_TIMEOUT, r.read_to_end(buf)).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => debug!(error = %e, "error draining pipe after exit"),
            Err(_) => debug!("pipe still held open after exit; keeping what was buffered"),
        }
    }
}
