//! Child process execution with a hard timeout and bounded output capture.

use std::io::{Read, Write};
#[cfg(unix)]
use std::os::unix::process::CommandExt;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow};
use tracing::{debug, instrument, warn};
use wait_timeout::ChildExt;

/// How long pipe readers get to hit EOF once the process group is dead.
const READER_GRACE: Duration = Duration::from_secs(2);

type Drained = Result<(Vec<u8>, usize)>;

/// Captured child process output.
#[derive(Debug)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    /// Bytes discarded from stdout after the capture limit.
    pub stdout_dropped: usize,
    /// Bytes discarded from stderr after the capture limit.
    pub stderr_dropped: usize,
    pub timed_out: bool,
    pub elapsed: Duration,
}

impl CommandOutput {
    /// Exit code, or `-1` when killed on timeout or terminated by a signal.
    pub fn exit_code(&self) -> i32 {
        if self.timed_out {
            return -1;
        }
        self.status.code().unwrap_or(-1)
    }

    pub fn success(&self) -> bool {
        !self.timed_out && self.status.success()
    }

    /// Human-readable transcript: stdout, then stderr, then truncation notes.
    pub fn transcript(&self) -> String {
        let mut buf = String::new();
        buf.push_str(&String::from_utf8_lossy(&self.stdout));
        if self.stdout_dropped > 0 {
            buf.push_str(&format!("\n[stdout truncated {} bytes]\n", self.stdout_dropped));
        }
        if !self.stderr.is_empty() {
            if !buf.is_empty() && !buf.ends_with('\n') {
                buf.push('\n');
            }
            buf.push_str(&String::from_utf8_lossy(&self.stderr));
        }
        if self.stderr_dropped > 0 {
            buf.push_str(&format!("\n[stderr truncated {} bytes]\n", self.stderr_dropped));
        }
        buf
    }
}

/// Run `cmd` to completion, killing it if it outlives `timeout`.
///
/// Both pipes are drained on their own threads while the child runs so a chatty
/// process cannot deadlock on a full pipe. At most `output_limit_bytes` per
/// stream are kept; the rest is counted and discarded.
///
/// On unix the child leads its own process group and a timeout kills the whole
/// group, so descendants holding the pipes cannot outlive the timeout. A
/// reader still blocked after that is abandoned and its stream reported empty.
#[instrument(skip_all, fields(timeout_secs = timeout.as_secs(), output_limit_bytes))]
pub fn run_command_with_timeout(
    mut cmd: Command,
    stdin: Option<&[u8]>,
    timeout: Duration,
    output_limit_bytes: usize,
) -> Result<CommandOutput> {
    cmd.stdin(if stdin.is_some() {
        Stdio::piped()
    } else {
        Stdio::null()
    });
    cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
    #[cfg(unix)]
    cmd.process_group(0);

    let started = Instant::now();
    debug!("spawning child process");
    let mut child = cmd.spawn().context("spawn command")?;

    if let Some(input) = stdin {
        let mut pipe = child
            .stdin
            .take()
            .ok_or_else(|| anyhow!("stdin was not piped"))?;
        // A child that exits without reading stdin closes the pipe; that is not
        // an error for the caller.
        if let Err(err) = pipe.write_all(input) {
            debug!(err = %err, "child closed stdin early");
        }
    }

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow!("stdout was not piped"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| anyhow!("stderr was not piped"))?;
    let stdout_rx = spawn_reader(stdout, output_limit_bytes);
    let stderr_rx = spawn_reader(stderr, output_limit_bytes);

    let mut timed_out = false;
    let status = match child.wait_timeout(timeout).context("wait for command")? {
        Some(status) => status,
        None => {
            warn!(timeout_secs = timeout.as_secs(), "command timed out, killing");
            timed_out = true;
            kill_tree(&mut child)?;
            child.wait().context("reap killed command")?
        }
    };

    // Descendants of a child that exited on its own may still hold the pipes;
    // they get whatever is left of the timeout.
    let deadline = if timed_out {
        Instant::now() + READER_GRACE
    } else {
        started
            .checked_add(timeout)
            .unwrap_or_else(Instant::now)
            .max(Instant::now())
    };
    let mut stdout_result = recv_until(&stdout_rx, deadline);
    let mut stderr_result = recv_until(&stderr_rx, deadline);
    if !timed_out && (stdout_result.is_none() || stderr_result.is_none()) {
        warn!("output pipes held open by descendants, killing process group");
        kill_group(child.id());
        let grace = Instant::now() + READER_GRACE;
        if stdout_result.is_none() {
            stdout_result = recv_until(&stdout_rx, grace);
        }
        if stderr_result.is_none() {
            stderr_result = recv_until(&stderr_rx, grace);
        }
    }
    let (stdout, stdout_dropped) = settle_reader(stdout_result, "stdout")?;
    let (stderr, stderr_dropped) = settle_reader(stderr_result, "stderr")?;
    if stdout_dropped > 0 || stderr_dropped > 0 {
        warn!(stdout_dropped, stderr_dropped, "output truncated");
    }

    let elapsed = started.elapsed();
    debug!(exit_code = ?status.code(), timed_out, elapsed_ms = elapsed.as_millis() as u64, "command finished");
    Ok(CommandOutput {
        status,
        stdout,
        stderr,
        stdout_dropped,
        stderr_dropped,
        timed_out,
        elapsed,
    })
}

fn spawn_reader<R: Read + Send + 'static>(reader: R, limit: usize) -> Receiver<Drained> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        // A closed receiver means the caller abandoned this stream.
        let _ = tx.send(drain_limited(reader, limit));
    });
    rx
}

/// `None` if the reader has not finished by `deadline`.
fn recv_until(rx: &Receiver<Drained>, deadline: Instant) -> Option<Drained> {
    match rx.recv_timeout(deadline.saturating_duration_since(Instant::now())) {
        Ok(result) => Some(result),
        Err(RecvTimeoutError::Timeout) => None,
        Err(RecvTimeoutError::Disconnected) => Some(Err(anyhow!("output reader thread panicked"))),
    }
}

fn settle_reader(result: Option<Drained>, stream: &str) -> Result<(Vec<u8>, usize)> {
    match result {
        Some(drained) => drained.with_context(|| format!("collect {stream}")),
        None => {
            warn!(stream, "output pipe never closed, abandoning reader");
            Ok((Vec::new(), 0))
        }
    }
}

/// Kill the child and, on unix, every process in its group.
fn kill_tree(child: &mut Child) -> Result<()> {
    if kill_group(child.id()) {
        return Ok(());
    }
    child.kill().context("kill command")
}

#[cfg(unix)]
fn kill_group(pgid: u32) -> bool {
    let target = format!("-{pgid}");
    match Command::new("kill")
        .args(["-KILL", "--", &target])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
    {
        Ok(status) if status.success() => true,
        Ok(status) => {
            debug!(?status, pgid, "process group kill failed");
            false
        }
        Err(err) => {
            debug!(err = %err, pgid, "kill unavailable");
            false
        }
    }
}

#[cfg(not(unix))]
fn kill_group(_pgid: u32) -> bool {
    false
}

fn drain_limited<R: Read>(mut reader: R, limit: usize) -> Result<(Vec<u8>, usize)> {
    let mut kept = Vec::new();
    let mut dropped = 0usize;
    let mut chunk = [0u8; 8192];
    loop {
        let n = reader.read(&mut chunk).context("read output")?;
        if n == 0 {
            break;
        }
        let room = limit.saturating_sub(kept.len());
        let keep = n.min(room);
        kept.extend_from_slice(&chunk[..keep]);
        dropped += n - keep;
    }
    Ok((kept, dropped))
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> Command {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(script);
        cmd
    }

    #[test]
    fn captures_stdout_and_exit_code() {
        let out = run_command_with_timeout(
            sh("echo hello; echo oops >&2; exit 3"),
            None,
            Duration::from_secs(10),
            1_000,
        )
        .expect("run");
        assert!(!out.timed_out);
        assert!(!out.success());
        assert_eq!(out.exit_code(), 3);
        assert_eq!(out.transcript(), "hello\noops\n");
    }

    #[test]
    fn feeds_stdin() {
        let out = run_command_with_timeout(sh("cat"), Some(b"ping"), Duration::from_secs(10), 100)
            .expect("run");
        assert!(out.success());
        assert_eq!(out.stdout, b"ping");
    }

    #[test]
    fn bounds_captured_output() {
        let out = run_command_with_timeout(
            sh("head -c 5000 /dev/zero"),
            None,
            Duration::from_secs(10),
            1_000,
        )
        .expect("run");
        assert_eq!(out.stdout.len(), 1_000);
        assert_eq!(out.stdout_dropped, 4_000);
        assert!(out.transcript().contains("[stdout truncated 4000 bytes]"));
    }

    #[test]
    fn timeout_kills_descendants_holding_the_pipes() {
        let started = Instant::now();
        let out = run_command_with_timeout(
            sh("echo started; sleep 8; echo after"),
            None,
            Duration::from_millis(300),
            100,
        )
        .expect("run");
        assert!(out.timed_out);
        assert_eq!(out.exit_code(), -1);
        assert_eq!(out.stdout, b"started\n");
        assert!(started.elapsed() < Duration::from_secs(5), "{:?}", started.elapsed());
    }

    #[test]
    fn background_descendant_does_not_outlive_timeout() {
        let started = Instant::now();
        let out = run_command_with_timeout(
            sh("sleep 30 & echo done"),
            None,
            Duration::from_secs(1),
            100,
        )
        .expect("run");
        assert!(!out.timed_out);
        assert!(out.success());
        assert_eq!(out.stdout, b"done\n");
        assert!(started.elapsed() < Duration::from_secs(6), "{:?}", started.elapsed());
    }

    #[test]
    fn kills_on_timeout() {
        let out = run_command_with_timeout(
            sh("exec sleep 30"),
            None,
            Duration::from_millis(200),
            100,
        )
        .expect("run");
        assert!(out.timed_out);
        assert!(!out.success());
        assert_eq!(out.exit_code(), -1);
        assert!(out.elapsed < Duration::from_secs(10));
    }
}
