//! Shared subprocess management utilities.
//!
//! Provides [`run_command`], the spawn + capture + timeout logic used by both
//! the engine invoker and the health prober. Callers build a
//! [`tokio::process::Command`] with program, arguments and working directory;
//! everything about process lifetime is handled here.
//!
//! The child is placed in its own process group so a timeout (or a dropped
//! future) takes down anything the engine spawned, not just the engine
//! itself.

use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::executor::{ExecutionOutcome, ScriptError};

/// Default maximum stdout or stderr size captured per stream (10 MiB).
pub const DEFAULT_MAX_OUTPUT_BYTES: usize = 10 * 1024 * 1024;

/// Appended to a stream whose output exceeded the capture cap.
pub const TRUNCATION_MARKER: &str = "[output truncated]";

/// How long readers keep draining buffered output after being told to stop.
const DRAIN_WINDOW: Duration = Duration::from_millis(100);

/// Read chunk size for output pipes.
const READ_CHUNK_BYTES: usize = 8 * 1024;

/// Lifetime and memory bounds for a single subprocess.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunLimits {
    /// Wall-clock time before the process group receives SIGTERM.
    pub timeout: Duration,
    /// How long to wait after SIGTERM before sending SIGKILL.
    pub kill_grace: Duration,
    /// Bytes kept per output stream; the rest is drained and discarded.
    pub max_output_bytes: usize,
}

/// Spawn `cmd`, capture stdout/stderr, and enforce `limits`.
///
/// Stdin is closed so interactive interpreters see EOF instead of blocking.
/// Returns [`ScriptError::EngineUnavailable`] if the program cannot be
/// started; a timeout is reported as a normal [`ExecutionOutcome`] with the
/// timeout sentinel.
pub async fn run_command(
    cmd: &mut Command,
    limits: RunLimits,
) -> Result<ExecutionOutcome, ScriptError> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    #[cfg(unix)]
    cmd.process_group(0);

    let program = cmd.as_std().get_program().to_string_lossy().into_owned();
    let start = Instant::now();

    let mut child = cmd
        .spawn()
        .map_err(|source| ScriptError::EngineUnavailable {
            program: program.clone(),
            source,
        })?;
    let mut group = ProcessGroup::new(child.id());

    // Read both pipes concurrently so neither can fill up and stall the child.
    let (stop_tx, stop_rx) = watch::channel(false);
    let stdout_task = tokio::spawn(read_stream(
        child.stdout.take(),
        limits.max_output_bytes,
        stop_rx.clone(),
    ));
    let stderr_task = tokio::spawn(read_stream(
        child.stderr.take(),
        limits.max_output_bytes,
        stop_rx,
    ));

    let status = match tokio::time::timeout(limits.timeout, child.wait()).await {
        Ok(Ok(status)) => Some(status),
        Ok(Err(e)) => return Err(ScriptError::IoError(e)),
        Err(_elapsed) => {
            tracing::warn!(
                program = %program,
                timeout_ms = limits.timeout.as_millis() as u64,
                "Process exceeded timeout, terminating"
            );
            None
        }
    };
    let duration = start.elapsed();

    // One grace period covers both SIGTERM -> SIGKILL and waiting for the
    // pipes to close.
    let deadline = Instant::now() + limits.kill_grace;
    if status.is_none() {
        terminate(&mut child, &group, deadline).await;
    }

    let (stdout, stderr) =
        collect_streams(stdout_task, stderr_task, &group, deadline, &stop_tx).await;
    group.disarm();

    let stdout = stdout.into_text();
    let stderr = stderr.into_text();

    Ok(match status {
        Some(status) => ExecutionOutcome::exited(exit_code(status), stdout, stderr, duration),
        None => ExecutionOutcome::timed_out(stdout, stderr, duration),
    })
}

/// SIGTERM the group, then SIGKILL it if the leader is still alive at
/// `deadline`.
async fn terminate(child: &mut Child, group: &ProcessGroup, deadline: Instant) {
    group.signal(Signal::Terminate);
    if tokio::time::timeout_at(deadline, child.wait()).await.is_ok() {
        return;
    }

    tracing::warn!(pgid = ?group.pgid, "Process ignored SIGTERM, killing process group");
    group.signal(Signal::Kill);
    if let Err(e) = child.kill().await {
        tracing::warn!(error = %e, "Failed to kill process");
    }
}

/// Wait for both reader tasks.
///
/// Descendants that outlive the leader (or left its process group) keep the
/// pipes open. At `deadline` the group is killed and the readers are told to
/// stop; they return whatever they captured so far.
async fn collect_streams(
    stdout: JoinHandle<Captured>,
    stderr: JoinHandle<Captured>,
    group: &ProcessGroup,
    deadline: Instant,
    stop: &watch::Sender<bool>,
) -> (Captured, Captured) {
    let mut joined = std::pin::pin!(async move {
        let (out, err) = tokio::join!(stdout, stderr);
        (out.unwrap_or_default(), err.unwrap_or_default())
    });

    if let Ok(streams) = tokio::time::timeout_at(deadline, &mut joined).await {
        return streams;
    }

    tracing::warn!(pgid = ?group.pgid, "Output pipes still open after exit, abandoning them");
    group.signal(Signal::Kill);
    let _ = stop.send(true);
    joined.await
}

/// Map an exit status to a code. Signal deaths become `128 + signal`.
fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }

    128
}

/// Bytes read from one output stream.
#[derive(Debug, Default)]
struct Captured {
    bytes: Vec<u8>,
    omitted: u64,
}

impl Captured {
    /// Keep as much of `chunk` as fits under `cap`; count the rest.
    fn push(&mut self, chunk: &[u8], cap: usize) {
        let keep = cap.saturating_sub(self.bytes.len()).min(chunk.len());
        self.bytes.extend_from_slice(&chunk[..keep]);
        self.omitted += (chunk.len() - keep) as u64;
    }

    fn into_text(self) -> String {
        let mut text = String::from_utf8_lossy(&self.bytes).into_owned();
        if self.omitted > 0 {
            text.push_str(&format!(
                "\n{TRUNCATION_MARKER} ({} bytes omitted)",
                self.omitted
            ));
        }
        text
    }
}

/// Read a stream into memory, keeping at most `cap` bytes.
///
/// Anything past the cap is still drained so the writer never blocks on a
/// full pipe. Once `stop` flips, already-buffered output is drained for at
/// most [`DRAIN_WINDOW`] and the partial capture is returned.
async fn read_stream<R: AsyncRead + Unpin>(
    handle: Option<R>,
    cap: usize,
    mut stop: watch::Receiver<bool>,
) -> Captured {
    let mut captured = Captured::default();
    let Some(mut reader) = handle else {
        return captured;
    };
    let mut buf = vec![0u8; READ_CHUNK_BYTES];

    loop {
        let read = tokio::select! {
            read = reader.read(&mut buf) => Some(read),
            _ = stop.wait_for(|stopped| *stopped) => None,
        };
        match read {
            Some(Ok(0) | Err(_)) => return captured,
            Some(Ok(n)) => captured.push(&buf[..n], cap),
            None => break,
        }
    }

    let _ = tokio::time::timeout(DRAIN_WINDOW, async {
        while let Ok(n) = reader.read(&mut buf).await {
            if n == 0 {
                break;
            }
            captured.push(&buf[..n], cap);
        }
    })
    .await;
    captured
}

#[derive(Debug, Clone, Copy)]
enum Signal {
    Terminate,
    Kill,
}

/// Kill guard for the child's process group.
///
/// While armed, dropping it SIGKILLs the whole group. This covers early
/// returns and a dropped request future (client disconnect, request
/// timeout). It is disarmed once the group has been fully reaped so a
/// recycled pid is never signalled.
struct ProcessGroup {
    pgid: Option<u32>,
    armed: bool,
}

impl ProcessGroup {
    fn new(pid: Option<u32>) -> Self {
        Self {
            pgid: pid,
            armed: true,
        }
    }

    fn signal(&self, signal: Signal) {
        #[cfg(unix)]
        {
            let Some(pgid) = self.pgid else {
                return;
            };
            let sig = match signal {
                Signal::Terminate => libc::SIGTERM,
                Signal::Kill => libc::SIGKILL,
            };
            // SAFETY: kill(2) has no memory-safety preconditions; a negative
            // pid addresses the process group.
            let ret = unsafe { libc::kill(-(pgid as libc::pid_t), sig) };
            if ret != 0 {
                tracing::debug!(
                    pgid,
                    error = %std::io::Error::last_os_error(),
                    "Signal not delivered"
                );
            }
        }

        #[cfg(not(unix))]
        let _ = signal;
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for ProcessGroup {
    fn drop(&mut self) {
        if self.armed {
            self.signal(Signal::Kill);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
