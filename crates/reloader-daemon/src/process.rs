//! Supervised long-running subprocesses
//!
//! Log streams and the mirroring window are both native processes that run
//! until they exit on their own or are cancelled. [`SupervisedProcess`] owns
//! one such child and forwards its output as [`ProcessEvent`]s.

use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot, Notify};

use reloader_core::prelude::*;

/// How long `shutdown()` waits for the wait task to reap a killed child
const KILL_GRACE: Duration = Duration::from_secs(2);

/// Output and lifecycle events from a supervised process
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessEvent {
    Stdout(String),
    Stderr(String),
    Exited { code: Option<i32> },
}

/// Manages one long-running child process.
///
/// The `Child` handle is moved into a dedicated `wait_for_exit` background task
/// so the real exit code is captured. The struct keeps a kill channel, an
/// atomic exit flag for synchronous checks, and a [`Notify`] so callers can
/// await the exit without polling.
pub struct SupervisedProcess {
    program: String,
    pid: Option<u32>,
    /// Consumed on first use (or on drop).
    kill_tx: Option<oneshot::Sender<()>>,
    exited: Arc<AtomicBool>,
    exit_notify: Arc<Notify>,
}

impl SupervisedProcess {
    /// Spawn `program args...` with piped stdout/stderr.
    ///
    /// Output lines are sent to `event_tx`; a single `ProcessEvent::Exited`
    /// follows once the child has been reaped.
    pub fn spawn(
        program: &str,
        args: &[String],
        event_tx: mpsc::Sender<ProcessEvent>,
    ) -> Result<Self> {
        info!("Spawning: {} {}", program, args.join(" "));

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    Error::tool_not_found(program)
                } else {
                    Error::ProcessSpawn {
                        program: program.to_string(),
                        reason: e.to_string(),
                    }
                }
            })?;

        let pid = child.id();
        info!("{} started with PID: {:?}", program, pid);

        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(Self::stdout_reader(stdout, event_tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(Self::stderr_reader(stderr, event_tx.clone()));
        }

        let exited = Arc::new(AtomicBool::new(false));
        let exit_notify = Arc::new(Notify::new());
        let (kill_tx, kill_rx) = oneshot::channel::<()>();

        tokio::spawn(Self::wait_for_exit(
            child,
            program.to_string(),
            kill_rx,
            event_tx,
            Arc::clone(&exited),
            Arc::clone(&exit_notify),
        ));

        Ok(Self {
            program: program.to_string(),
            pid,
            kill_tx: Some(kill_tx),
            exited,
            exit_notify,
        })
    }

    /// Background task: owns `child`, waits for it to exit, emits `ProcessEvent::Exited`.
    ///
    /// Ends either when the child exits on its own or when `kill_rx` fires,
    /// in which case the child is killed first and then reaped.
    async fn wait_for_exit(
        mut child: Child,
        program: String,
        kill_rx: oneshot::Receiver<()>,
        event_tx: mpsc::Sender<ProcessEvent>,
        exited: Arc<AtomicBool>,
        exit_notify: Arc<Notify>,
    ) {
        let code: Option<i32> = tokio::select! {
            result = child.wait() => {
                match result {
                    Ok(status) => {
                        info!("{} exited with status: {:?}", program, status);
                        status.code()
                    }
                    Err(e) => {
                        error!("Error waiting for {}: {}", program, e);
                        None
                    }
                }
            }
            _ = kill_rx => {
                info!("Kill signal received, stopping {}", program);
                if let Err(e) = child.kill().await {
                    error!("Failed to kill {}: {}", program, e);
                }
                match child.wait().await {
                    Ok(status) => status.code(),
                    Err(e) => {
                        error!("Error waiting after kill of {}: {}", program, e);
                        None
                    }
                }
            }
        };

        // Flag first so `has_exited()` is true before anyone observes the event.
        exited.store(true, Ordering::Release);
        exit_notify.notify_waiters();

        let _ = event_tx.send(ProcessEvent::Exited { code }).await;
    }

    async fn stdout_reader(stdout: tokio::process::ChildStdout, tx: mpsc::Sender<ProcessEvent>) {
        forward_lines(stdout, "stdout", tx, ProcessEvent::Stdout).await;
    }

    async fn stderr_reader(stderr: tokio::process::ChildStderr, tx: mpsc::Sender<ProcessEvent>) {
        forward_lines(stderr, "stderr", tx, ProcessEvent::Stderr).await;
    }

    /// Stop the process and wait (bounded) for it to be reaped.
    pub async fn shutdown(&mut self) -> Result<()> {
        if self.has_exited() {
            debug!("{} already exited", self.program);
            return Ok(());
        }

        // Create the `notified()` future before sending the kill so the
        // notification cannot slip between the send and the await.
        let notified = self.exit_notify.notified();
        if let Some(tx) = self.kill_tx.take() {
            let _ = tx.send(());
        }
        if self.has_exited() {
            return Ok(());
        }

        tokio::time::timeout(KILL_GRACE, notified)
            .await
            .map_err(|_| Error::process(format!("{} did not exit after kill", self.program)))
    }

    /// Wait until the process exits on its own.
    pub async fn wait(&self) {
        let notified = self.exit_notify.notified();
        if self.has_exited() {
            return;
        }
        notified.await;
    }

    pub fn has_exited(&self) -> bool {
        self.exited.load(Ordering::Acquire)
    }

    pub fn is_running(&self) -> bool {
        !self.has_exited()
    }

    pub fn id(&self) -> Option<u32> {
        self.pid
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

impl Drop for SupervisedProcess {
    fn drop(&mut self) {
        if !self.has_exited() {
            warn!("{} dropped while still running, killing it", self.program);
            if let Some(tx) = self.kill_tx.take() {
                let _ = tx.send(());
            }
        }
    }
}

/// Forward every line of `stream` until EOF or until nobody listens.
///
/// Bytes that are not valid UTF-8 are replaced rather than ending the stream.
async fn forward_lines<R>(
    stream: R,
    label: &str,
    tx: mpsc::Sender<ProcessEvent>,
    wrap: fn(String) -> ProcessEvent,
) where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(stream);
    let mut buf = Vec::new();

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let line = decode_line(&buf);
                trace!("{}: {}", label, line);
                if tx.send(wrap(line)).await.is_err() {
                    debug!("{} channel closed", label);
                    break;
                }
            }
            Err(e) => {
                warn!("Failed to read {}: {}", label, e);
                break;
            }
        }
    }

    debug!("{} reader finished", label);
}

/// Strip the line terminator and decode lossily
fn decode_line(raw: &[u8]) -> String {
    let raw = raw.strip_suffix(b"\n").unwrap_or(raw);
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    String::from_utf8_lossy(raw).into_owned()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> Vec<String> {
        vec!["-c".to_string(), script.to_string()]
    }

    async fn collect_until_closed(mut rx: mpsc::Receiver<ProcessEvent>) -> Vec<ProcessEvent> {
        let mut events = Vec::new();
        while let Ok(Some(event)) =
            tokio::time::timeout(Duration::from_secs(5), rx.recv()).await
        {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_spawn_missing_program_is_tool_not_found() {
        let (tx, _rx) = mpsc::channel(4);
        let result = SupervisedProcess::spawn("definitely-not-a-real-tool-xyz", &[], tx);
        assert!(matches!(result, Err(Error::ToolNotFound { .. })));
    }

    #[tokio::test]
    async fn test_stdout_lines_then_exit_code() {
        let (tx, rx) = mpsc::channel(16);
        let _process =
            SupervisedProcess::spawn("sh", &sh("echo one; echo two; echo oops >&2; exit 3"), tx)
                .unwrap();

        let events = collect_until_closed(rx).await;

        let stdout: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                ProcessEvent::Stdout(line) => Some(line.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(stdout, vec!["one", "two"]);
        assert!(events.contains(&ProcessEvent::Stderr("oops".to_string())));

        let exits: Vec<_> = events
            .iter()
            .filter(|e| matches!(e, ProcessEvent::Exited { .. }))
            .collect();
        assert_eq!(exits, vec![&ProcessEvent::Exited { code: Some(3) }]);
    }

    #[tokio::test]
    async fn test_shutdown_kills_long_running_process() {
        let (tx, rx) = mpsc::channel(16);
        let mut process = SupervisedProcess::spawn("sh", &sh("exec sleep 60"), tx).unwrap();
        assert!(process.is_running());

        process.shutdown().await.expect("shutdown should not error");

        assert!(process.has_exited());
        let events = collect_until_closed(rx).await;
        assert!(events
            .iter()
            .any(|e| matches!(e, ProcessEvent::Exited { .. })));
    }

    #[tokio::test]
    async fn test_wait_returns_after_natural_exit() {
        let (tx, _rx) = mpsc::channel(16);
        let process = SupervisedProcess::spawn("sh", &sh("exit 0"), tx).unwrap();

        tokio::time::timeout(Duration::from_secs(5), process.wait())
            .await
            .expect("process should exit on its own");
        assert!(process.has_exited());
    }

    #[test]
    fn test_decode_line() {
        assert_eq!(decode_line(b"plain\n"), "plain");
        assert_eq!(decode_line(b"crlf\r\n"), "crlf");
        assert_eq!(decode_line(b"no newline"), "no newline");
        assert_eq!(decode_line(b"bad \xff\xfe bytes\n"), "bad \u{FFFD}\u{FFFD} bytes");
    }

    #[tokio::test]
    async fn test_invalid_utf8_line_does_not_end_stream() {
        let (tx, rx) = mpsc::channel(16);
        let _process = SupervisedProcess::spawn(
            "sh",
            &sh(r"printf 'before\n\377\376 garbage\nafter\n'"),
            tx,
        )
        .unwrap();

        let stdout: Vec<String> = collect_until_closed(rx)
            .await
            .into_iter()
            .filter_map(|e| match e {
                ProcessEvent::Stdout(line) => Some(line),
                _ => None,
            })
            .collect();
        assert_eq!(stdout.len(), 3);
        assert_eq!(stdout[0], "before");
        assert!(stdout[1].ends_with(" garbage"));
        assert_eq!(stdout[2], "after");
    }
}
