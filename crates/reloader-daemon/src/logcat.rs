//! Device log supervision
//!
//! [`DebugLogSupervisor`] prepares the bridge daemon for the configured
//! transport mode and streams filtered device logs as [`DebugEvent`]s:
//!
//! - **Cable**: restart the daemon, clear the log buffer, stream one log.
//! - **Wireless**: restart the daemon, switch it to network mode, then probe
//!   every address and stream each reachable one in its own task.
//!
//! Every stream stops when the shared shutdown flag flips to `true`.

use std::future::Future;

use regex::Regex;
use tokio::sync::{mpsc, watch};

use reloader_core::prelude::*;
use reloader_core::{DebugEvent, TransportMode};

use crate::bridge::Bridge;
use crate::probe::ReachabilityProbe;
use crate::process::{ProcessEvent, SupervisedProcess};

/// Tag the packaged app logs under
pub const DEFAULT_LOG_FILTER: &str = "I python";

/// Buffer between a log process and the stream loop
const PROCESS_EVENT_BUFFER: usize = 256;

/// Compiled filter applied to every device log line
#[derive(Debug, Clone)]
pub struct LogFilter {
    pattern: Regex,
}

impl LogFilter {
    pub fn new(pattern: &str) -> Result<Self> {
        let pattern = Regex::new(pattern)
            .map_err(|e| Error::config_invalid(format!("Invalid log filter '{}': {}", pattern, e)))?;
        Ok(Self { pattern })
    }

    pub fn matches(&self, line: &str) -> bool {
        self.pattern.is_match(line)
    }

    pub fn as_str(&self) -> &str {
        self.pattern.as_str()
    }
}

impl Default for LogFilter {
    fn default() -> Self {
        Self {
            pattern: Regex::new(DEFAULT_LOG_FILTER).expect("default log filter is a valid regex"),
        }
    }
}

/// What the log supervisor streams from
#[derive(Debug, Clone)]
pub struct LogcatConfig {
    pub mode: TransportMode,
    /// Wireless device addresses, probed in order. Ignored for cable mode.
    pub addresses: Vec<String>,
    /// Port the daemon listens on in network mode
    pub bridge_port: u16,
    pub filter: LogFilter,
}

/// Streams filtered device logs for one orchestration run
#[derive(Debug, Clone)]
pub struct DebugLogSupervisor {
    bridge: Bridge,
    probe: ReachabilityProbe,
    config: LogcatConfig,
}

impl DebugLogSupervisor {
    pub fn new(bridge: Bridge, probe: ReachabilityProbe, config: LogcatConfig) -> Self {
        Self {
            bridge,
            probe,
            config,
        }
    }

    /// Run until every stream ends or `shutdown_rx` flips to `true`.
    pub async fn run(
        &self,
        event_tx: mpsc::Sender<DebugEvent>,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Result<()> {
        match self.config.mode {
            TransportMode::Cable => self.run_cable(event_tx, shutdown_rx).await,
            TransportMode::Wireless => self.run_wireless(event_tx, shutdown_rx).await,
        }
    }

    async fn run_cable(
        &self,
        event_tx: mpsc::Sender<DebugEvent>,
        mut shutdown_rx: watch::Receiver<bool>,
    ) -> Result<()> {
        if until_shutdown(self.bridge.restart_daemon(), &mut shutdown_rx)
            .await
            .is_none()
        {
            return Ok(());
        }
        match until_shutdown(self.bridge.clear_logs(), &mut shutdown_rx).await {
            None => return Ok(()),
            Some(Err(e)) => warn!("Failed to clear device logs (continuing): {}", e),
            Some(Ok(())) => {}
        }

        stream_filtered_logs(
            &self.bridge,
            None,
            &self.config.filter,
            &event_tx,
            shutdown_rx,
        )
        .await
        .map(|_| ())
    }

    async fn run_wireless(
        &self,
        event_tx: mpsc::Sender<DebugEvent>,
        mut shutdown_rx: watch::Receiver<bool>,
    ) -> Result<()> {
        if until_shutdown(self.bridge.restart_daemon(), &mut shutdown_rx)
            .await
            .is_none()
        {
            return Ok(());
        }
        match until_shutdown(self.bridge.tcpip(self.config.bridge_port), &mut shutdown_rx).await {
            None => return Ok(()),
            Some(Err(e)) => warn!("Failed to switch bridge to network mode (continuing): {}", e),
            Some(Ok(())) => {}
        }

        let mut streams = Vec::new();

        for address in &self.config.addresses {
            let Some(reachable) =
                until_shutdown(self.probe.is_reachable(address), &mut shutdown_rx).await
            else {
                info!("Shutdown requested, skipping remaining probes");
                break;
            };

            if !reachable {
                let _ = event_tx
                    .send(DebugEvent::DeviceUnreachable {
                        address: address.clone(),
                    })
                    .await;
                continue;
            }

            let endpoint = format!("{}:{}", address, self.config.bridge_port);
            let bridge = self.bridge.clone();
            let filter = self.config.filter.clone();
            let event_tx = event_tx.clone();
            let shutdown_rx = shutdown_rx.clone();

            let stream = tokio::spawn(async move {
                bridge.connect(&endpoint).await?;
                stream_filtered_logs(&bridge, Some(&endpoint), &filter, &event_tx, shutdown_rx)
                    .await
                    .map(|_| ())
            });
            streams.push(stream);
        }

        // Streams are independent: one failing never stops the others.
        for stream in streams {
            match stream.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!("Wireless log stream failed: {}", e),
                Err(e) => error!("Wireless log stream task panicked: {}", e),
            }
        }

        Ok(())
    }
}

/// Run one setup step, giving up as soon as shutdown is requested.
///
/// Returns `None` when shutdown won.
async fn until_shutdown<F: Future>(
    step: F,
    shutdown_rx: &mut watch::Receiver<bool>,
) -> Option<F::Output> {
    if *shutdown_rx.borrow() {
        return None;
    }
    tokio::select! {
        output = step => Some(output),
        _ = shutdown_rx.changed() => None,
    }
}

/// Stream `logcat` from the bridge, forwarding lines that match `filter`.
///
/// Returns the log process exit code once it exits, or `None` when the stream
/// was stopped by shutdown or because nobody is listening any more.
pub async fn stream_filtered_logs(
    bridge: &Bridge,
    serial: Option<&str>,
    filter: &LogFilter,
    event_tx: &mpsc::Sender<DebugEvent>,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Result<Option<i32>> {
    if *shutdown_rx.borrow() {
        return Ok(None);
    }

    let device = serial.map(str::to_string);
    let (process_tx, mut process_rx) = mpsc::channel(PROCESS_EVENT_BUFFER);
    let mut process =
        SupervisedProcess::spawn(bridge.program(), &Bridge::logcat_args(serial), process_tx)?;

    info!(
        "Streaming logs from {} filtered by '{}'",
        serial.unwrap_or("cable device"),
        filter.as_str()
    );

    let mut exit_code = None;
    loop {
        tokio::select! {
            event = process_rx.recv() => {
                match event {
                    Some(ProcessEvent::Stdout(line)) => {
                        if filter.matches(&line)
                            && event_tx.send(DebugEvent::log_line(device.clone(), line)).await.is_err()
                        {
                            debug!("Debug event channel closed, stopping log stream");
                            break;
                        }
                    }
                    Some(ProcessEvent::Stderr(line)) => debug!("logcat stderr: {}", line),
                    // Keep draining: output may still be buffered behind the exit event.
                    Some(ProcessEvent::Exited { code }) => exit_code = code,
                    None => break,
                }
            }
            _ = shutdown_rx.changed() => {
                info!("Shutdown signal received, stopping log stream for {:?}", device);
                break;
            }
        }
    }

    if let Err(e) = process.shutdown().await {
        warn!("Log stream process did not stop cleanly: {}", e);
    }

    let _ = event_tx
        .send(DebugEvent::StreamEnded {
            device,
            code: exit_code,
        })
        .await;

    Ok(exit_code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_matches_app_tag() {
        let filter = LogFilter::default();
        assert!(filter.matches("01-02 10:00:00.000  1234  1234 I python  : hello"));
        assert!(!filter.matches("01-02 10:00:00.000  1234  1234 I ActivityManager: start"));
    }

    #[test]
    fn test_invalid_filter_is_config_error() {
        let result = LogFilter::new("I python(");
        assert!(matches!(result, Err(Error::ConfigInvalid { .. })));
    }

    #[cfg(unix)]
    mod with_fake_bridge {
        use super::*;
        use crate::test_utils::{read_calls, write_fake_bridge, write_script, CALLS_LOG};
        use std::time::Duration;

        fn lines(events: &[DebugEvent]) -> Vec<(Option<String>, String)> {
            events
                .iter()
                .filter_map(|e| match e {
                    DebugEvent::LogLine { device, line, .. } => Some((device.clone(), line.clone())),
                    _ => None,
                })
                .collect()
        }

        async fn drain(mut rx: mpsc::Receiver<DebugEvent>) -> Vec<DebugEvent> {
            let mut events = Vec::new();
            while let Ok(Some(event)) = tokio::time::timeout(Duration::from_secs(5), rx.recv()).await {
                events.push(event);
            }
            events
        }

        #[tokio::test]
        async fn test_cable_mode_restarts_clears_then_streams_filtered() {
            let dir = tempfile::tempdir().unwrap();
            let program = write_fake_bridge(
                dir.path(),
                &["I python  : app started", "I ActivityManager: noise", "I python  : tick"],
            );

            let supervisor = DebugLogSupervisor::new(
                Bridge::new(program.to_string_lossy()),
                ReachabilityProbe::new("true"),
                LogcatConfig {
                    mode: TransportMode::Cable,
                    addresses: vec![],
                    bridge_port: 5555,
                    filter: LogFilter::default(),
                },
            );

            let (tx, rx) = mpsc::channel(32);
            let (_shutdown_tx, shutdown_rx) = watch::channel(false);
            supervisor.run(tx, shutdown_rx).await.unwrap();

            let events = drain(rx).await;
            assert_eq!(
                lines(&events),
                vec![
                    (None, "I python  : app started".to_string()),
                    (None, "I python  : tick".to_string()),
                ]
            );
            assert_eq!(
                read_calls(dir.path()),
                vec!["disconnect", "kill-server", "start-server", "logcat -c", "logcat"]
            );
        }

        #[tokio::test]
        async fn test_wireless_mode_streams_only_reachable_devices() {
            let dir = tempfile::tempdir().unwrap();
            let program = write_fake_bridge(dir.path(), &["I python  : hello"]);

            // A probe that only answers for 10.0.0.5
            let probe_dir = tempfile::tempdir().unwrap();
            let probe = write_script(
                probe_dir.path(),
                "fake-ping",
                r#"[ "$3" = "10.0.0.5" ]"#,
            );

            let supervisor = DebugLogSupervisor::new(
                Bridge::new(program.to_string_lossy()),
                ReachabilityProbe::new(probe.to_string_lossy()),
                LogcatConfig {
                    mode: TransportMode::Wireless,
                    addresses: vec!["10.0.0.5".to_string(), "10.0.0.9".to_string()],
                    bridge_port: 5555,
                    filter: LogFilter::default(),
                },
            );

            let (tx, rx) = mpsc::channel(32);
            let (_shutdown_tx, shutdown_rx) = watch::channel(false);
            supervisor.run(tx, shutdown_rx).await.unwrap();

            let events = drain(rx).await;
            assert_eq!(
                lines(&events),
                vec![(Some("10.0.0.5:5555".to_string()), "I python  : hello".to_string())]
            );
            assert!(events.iter().any(|e| matches!(
                e,
                DebugEvent::DeviceUnreachable { address } if address == "10.0.0.9"
            )));

            let calls = read_calls(dir.path());
            assert_eq!(&calls[..4], ["disconnect", "kill-server", "start-server", "tcpip 5555"]);
            assert!(calls.contains(&"connect 10.0.0.5:5555".to_string()));
            assert!(calls.contains(&"-s 10.0.0.5:5555 logcat".to_string()));
            assert!(!calls.iter().any(|c| c.contains("10.0.0.9")));
        }

        #[tokio::test]
        async fn test_shutdown_stops_endless_stream() {
            let dir = tempfile::tempdir().unwrap();
            let program = write_script(
                dir.path(),
                "endless-bridge",
                "while true; do echo 'I python  : tick'; sleep 0.05; done",
            );
            let bridge = Bridge::new(program.to_string_lossy());

            let (tx, mut rx) = mpsc::channel(32);
            let (shutdown_tx, shutdown_rx) = watch::channel(false);

            let stream = tokio::spawn(async move {
                stream_filtered_logs(&bridge, None, &LogFilter::default(), &tx, shutdown_rx).await
            });

            // Wait for the stream to be live before cancelling it
            let first = tokio::time::timeout(Duration::from_secs(5), rx.recv())
                .await
                .unwrap();
            assert!(matches!(first, Some(DebugEvent::LogLine { .. })));

            shutdown_tx.send(true).unwrap();
            let result = tokio::time::timeout(Duration::from_secs(5), stream)
                .await
                .expect("stream should stop promptly")
                .unwrap();
            assert!(matches!(result, Ok(None)));
        }

        #[tokio::test]
        async fn test_failed_connect_does_not_stop_other_devices() {
            let dir = tempfile::tempdir().unwrap();
            let program = write_script(
                dir.path(),
                "flaky-bridge",
                &format!(
                    r#"echo "$@" >> '{calls}'
if [ "$1" = "connect" ] && [ "$2" = "10.0.0.9:5555" ]; then
  echo "failed to connect to 10.0.0.9:5555"
  exit 0
fi
if [ "$1" = "-s" ] && [ "$3" = "logcat" ]; then
  printf '%s\n' "I python  : from $2"
fi
exit 0"#,
                    calls = dir.path().join(CALLS_LOG).display()
                ),
            );

            let supervisor = DebugLogSupervisor::new(
                Bridge::new(program.to_string_lossy()),
                ReachabilityProbe::new("true"),
                LogcatConfig {
                    mode: TransportMode::Wireless,
                    addresses: vec!["10.0.0.9".to_string(), "10.0.0.5".to_string()],
                    bridge_port: 5555,
                    filter: LogFilter::default(),
                },
            );

            let (tx, rx) = mpsc::channel(32);
            let (_shutdown_tx, shutdown_rx) = watch::channel(false);
            assert!(supervisor.run(tx, shutdown_rx).await.is_ok());

            let events = drain(rx).await;
            assert_eq!(
                lines(&events),
                vec![(
                    Some("10.0.0.5:5555".to_string()),
                    "I python  : from 10.0.0.5:5555".to_string()
                )]
            );

            let calls = read_calls(dir.path());
            assert!(calls.contains(&"connect 10.0.0.9:5555".to_string()));
            assert!(!calls.contains(&"-s 10.0.0.9:5555 logcat".to_string()));
        }

        #[tokio::test]
        async fn test_invalid_utf8_in_log_keeps_streaming() {
            let dir = tempfile::tempdir().unwrap();
            let program = write_script(
                dir.path(),
                "binary-noise-bridge",
                r"printf 'I python  : before\nI native  : \377\376 garbage\nI python  : after\n'",
            );
            let bridge = Bridge::new(program.to_string_lossy());

            let (tx, rx) = mpsc::channel(32);
            let (_shutdown_tx, shutdown_rx) = watch::channel(false);
            let code = stream_filtered_logs(&bridge, None, &LogFilter::default(), &tx, shutdown_rx)
                .await
                .unwrap();
            drop(tx);

            assert_eq!(code, Some(0));
            assert_eq!(
                lines(&drain(rx).await),
                vec![
                    (None, "I python  : before".to_string()),
                    (None, "I python  : after".to_string()),
                ]
            );
        }

        #[tokio::test]
        async fn test_shutdown_during_daemon_restart_skips_setup() {
            let dir = tempfile::tempdir().unwrap();
            let program = write_script(
                dir.path(),
                "stuck-bridge",
                &format!(
                    r#"echo "$@" >> '{calls}'
[ "$1" = "start-server" ] && exec sleep 30
exit 0"#,
                    calls = dir.path().join(CALLS_LOG).display()
                ),
            );

            let supervisor = DebugLogSupervisor::new(
                Bridge::new(program.to_string_lossy()),
                ReachabilityProbe::new("true"),
                LogcatConfig {
                    mode: TransportMode::Wireless,
                    addresses: vec!["10.0.0.5".to_string()],
                    bridge_port: 5555,
                    filter: LogFilter::default(),
                },
            );

            let (tx, _rx) = mpsc::channel(32);
            let (shutdown_tx, shutdown_rx) = watch::channel(false);
            let run = tokio::spawn(async move { supervisor.run(tx, shutdown_rx).await });

            // Let the restart reach the stuck start-server step
            tokio::time::sleep(Duration::from_millis(500)).await;
            shutdown_tx.send(true).unwrap();

            let result = tokio::time::timeout(Duration::from_secs(5), run)
                .await
                .expect("setup should stop on shutdown")
                .unwrap();
            assert!(result.is_ok());

            let calls = read_calls(dir.path());
            assert!(calls.contains(&"start-server".to_string()));
            assert!(!calls.iter().any(|c| c.starts_with("tcpip") || c.starts_with("connect")));
        }
    }
}
