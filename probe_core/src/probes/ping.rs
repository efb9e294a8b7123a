//! ICMP reachability probing with a bounded retry loop

use async_trait::async_trait;
use regex::Regex;
use std::process::Stdio;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

use super::{Probe, ProbeError, ProbeResult};
use crate::config::PingProbeConfig;

/// Echo requests sent per attempt.
pub const PING_COUNT: u32 = 3;

pub const PACKET_LOSS: &str = "100% packet loss";

/// Extra time granted to the ping process on top of its own deadline.
const PROCESS_GRACE: Duration = Duration::from_secs(2);

/// Summary of one burst of echo requests.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PingStats {
    pub transmitted: u32,
    pub received: u32,
    pub packet_loss: f64,
}

impl PingStats {
    pub fn all_lost(transmitted: u32) -> Self {
        Self {
            transmitted,
            received: 0,
            packet_loss: 100.0,
        }
    }

    pub fn is_reachable(&self) -> bool {
        self.packet_loss < 100.0
    }
}

/// Sends a burst of echo requests to a host.
#[async_trait]
pub trait Pinger: Send + Sync {
    async fn ping(&self, host: &str, count: u32, timeout: Duration)
        -> Result<PingStats, ProbeError>;
}

/// Pinger backed by the platform `ping` binary found on `PATH`.
#[derive(Debug, Clone, Default)]
pub struct SystemPinger;

impl SystemPinger {
    pub fn new() -> Self {
        Self
    }

    fn args(host: &str, count: u32, timeout: Duration) -> Vec<String> {
        let deadline = timeout.as_secs_f64().ceil().max(1.0) as u64;

        #[cfg(target_os = "macos")]
        let deadline_flag = "-t";
        #[cfg(not(target_os = "macos"))]
        let deadline_flag = "-w";

        vec![
            "-n".to_string(),
            "-c".to_string(),
            count.to_string(),
            deadline_flag.to_string(),
            deadline.to_string(),
            host.to_string(),
        ]
    }
}

#[async_trait]
impl Pinger for SystemPinger {
    async fn ping(
        &self,
        host: &str,
        count: u32,
        timeout: Duration,
    ) -> Result<PingStats, ProbeError> {
        let binary = which::which("ping").map_err(|_| ProbeError::PingUnavailable)?;

        let mut command = Command::new(binary);
        command
            .args(Self::args(host, count, timeout))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = match tokio::time::timeout(timeout + PROCESS_GRACE, command.output()).await {
            Ok(result) => result?,
            Err(_) => {
                debug!("ping {} did not finish within {:?}", host, timeout + PROCESS_GRACE);
                return Ok(PingStats::all_lost(count));
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        let code = output.status.code().unwrap_or(-1);

        match parse_ping_output(&stdout) {
            Some(stats) => Ok(stats),
            None => Err(failure_from_output(host, code, &stdout, &stderr)),
        }
    }
}

/// Turns a run without a summary line into an error. Exit codes are not trusted on
/// their own: iputils also exits with 2 when the socket cannot be opened.
fn failure_from_output(host: &str, code: i32, stdout: &str, stderr: &str) -> ProbeError {
    if looks_like_resolution_failure(stderr) || looks_like_resolution_failure(stdout) {
        return ProbeError::UnknownHost(host.to_string());
    }

    ProbeError::UnexpectedOutput {
        code,
        output: format!("{}{}", stdout.trim(), stderr.trim()),
    }
}

fn summary_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(concat!(
            r"(\d+) packets transmitted, (\d+) (?:packets )?received",
            r".*?(\d+(?:\.\d+)?)% packet loss",
        ))
        .expect("packet loss pattern is valid")
    })
}

/// Extracts the summary line printed by iputils, BSD and busybox `ping`.
pub fn parse_ping_output(output: &str) -> Option<PingStats> {
    let captures = summary_pattern().captures(output)?;
    Some(PingStats {
        transmitted: captures[1].parse().ok()?,
        received: captures[2].parse().ok()?,
        packet_loss: captures[3].parse().ok()?,
    })
}

const RESOLUTION_HINTS: &[&str] = &[
    "unknown host",
    "name or service not known",
    "cannot resolve",
    "temporary failure in name resolution",
    "bad address",
];

fn looks_like_resolution_failure(output: &str) -> bool {
    let output = output.to_lowercase();
    RESOLUTION_HINTS.iter().any(|hint| output.contains(hint))
}

/// Ping probe: a burst of [`PING_COUNT`] echo requests per attempt, retried up to
/// `retry_count` times with `retry_after` between attempts.
#[derive(Clone)]
pub struct PingProbe {
    config: PingProbeConfig,
    pinger: Arc<dyn Pinger>,
}

impl PingProbe {
    pub fn new(config: PingProbeConfig) -> Self {
        Self::with_pinger(config, Arc::new(SystemPinger::new()))
    }

    pub fn with_pinger(config: PingProbeConfig, pinger: Arc<dyn Pinger>) -> Self {
        Self { config, pinger }
    }

    pub fn host(&self) -> &str {
        &self.config.host
    }
}

#[async_trait]
impl Probe for PingProbe {
    async fn check(&self) -> Result<ProbeResult, ProbeError> {
        let attempts = self.config.retry_count.saturating_add(1);
        let timeout = self.config.ping_timeout();

        for attempt in 1..=attempts {
            let stats = self.pinger.ping(&self.config.host, PING_COUNT, timeout).await?;

            if stats.is_reachable() {
                debug!(
                    attempt,
                    received = stats.received,
                    loss = stats.packet_loss,
                    "host {} reachable",
                    self.config.host
                );
                return Ok(Vec::new());
            }

            warn!(attempt, attempts, "{}", PACKET_LOSS);

            if attempt < attempts {
                tokio::time::sleep(self.config.retry_delay()).await;
            }
        }

        let errors = vec![PACKET_LOSS.to_string()];
        debug!("errors: {:?}", errors);
        Ok(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use tokio::time::Instant;

    /// Replays scripted outcomes and records when each attempt happened.
    struct ScriptedPinger {
        outcomes: Mutex<VecDeque<Result<PingStats, ProbeError>>>,
        fallback: PingStats,
        calls: Mutex<Vec<Instant>>,
    }

    impl ScriptedPinger {
        fn always(stats: PingStats) -> Arc<Self> {
            Self::scripted(Vec::new(), stats)
        }

        fn scripted(
            outcomes: Vec<Result<PingStats, ProbeError>>,
            fallback: PingStats,
        ) -> Arc<Self> {
            Arc::new(Self {
                outcomes: Mutex::new(outcomes.into()),
                fallback,
                calls: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> Vec<Instant> {
            self.calls.lock().clone()
        }
    }

    #[async_trait]
    impl Pinger for ScriptedPinger {
        async fn ping(
            &self,
            _host: &str,
            count: u32,
            _timeout: Duration,
        ) -> Result<PingStats, ProbeError> {
            assert_eq!(count, PING_COUNT);
            self.calls.lock().push(Instant::now());
            self.outcomes.lock().pop_front().unwrap_or(Ok(self.fallback))
        }
    }

    fn reachable() -> PingStats {
        PingStats {
            transmitted: 3,
            received: 2,
            packet_loss: 33.3,
        }
    }

    fn config(retry_count: u32, retry_after: Duration) -> PingProbeConfig {
        let mut config = PingProbeConfig::new("192.0.2.1");
        config.retry_count = retry_count;
        config.retry_after = Some(retry_after);
        config
    }

    #[tokio::test]
    async fn test_ping_healthy_single_attempt() {
        let pinger = ScriptedPinger::always(reachable());
        let probe = PingProbe::with_pinger(config(3, Duration::from_millis(10)), pinger.clone());

        assert!(probe.check().await.unwrap().is_empty());
        assert!(probe.check().await.unwrap().is_empty());
        assert_eq!(pinger.calls().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ping_exhausts_retries() {
        let retry_after = Duration::from_millis(30);
        let pinger = ScriptedPinger::always(PingStats::all_lost(3));
        let probe = PingProbe::with_pinger(config(2, retry_after), pinger.clone());

        let started = Instant::now();
        let errors = probe.check().await.unwrap();
        let elapsed = started.elapsed();

        assert_eq!(errors, vec![PACKET_LOSS.to_string()]);

        let calls = pinger.calls();
        assert_eq!(calls.len(), 3);
        for pair in calls.windows(2) {
            assert_eq!(pair[1] - pair[0], retry_after);
        }
        // two gaps between three attempts, nothing after the last one
        assert_eq!(elapsed, retry_after * 2);
    }

    #[tokio::test]
    async fn test_ping_without_retries_makes_one_attempt() {
        let pinger = ScriptedPinger::always(PingStats::all_lost(3));
        let probe = PingProbe::with_pinger(PingProbeConfig::new("192.0.2.1"), pinger.clone());

        assert_eq!(probe.check().await.unwrap(), vec![PACKET_LOSS.to_string()]);
        assert_eq!(pinger.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_ping_success_short_circuits_retries() {
        let pinger = ScriptedPinger::scripted(
            vec![Ok(PingStats::all_lost(3)), Ok(reachable())],
            PingStats::all_lost(3),
        );
        let probe = PingProbe::with_pinger(config(4, Duration::from_millis(5)), pinger.clone());

        assert!(probe.check().await.unwrap().is_empty());
        assert_eq!(pinger.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_ping_setup_error_aborts_check() {
        let pinger = ScriptedPinger::scripted(
            vec![Err(ProbeError::UnknownHost("nowhere.invalid".to_string()))],
            reachable(),
        );
        let probe = PingProbe::with_pinger(config(2, Duration::from_millis(5)), pinger.clone());

        let result = probe.check().await;
        assert!(matches!(result, Err(ProbeError::UnknownHost(_))));
        assert_eq!(pinger.calls().len(), 1);
    }

    #[test]
    fn test_parse_iputils_output() {
        let output = "PING 10.0.0.1 (10.0.0.1) 56(84) bytes of data.\n\n\
            --- 10.0.0.1 ping statistics ---\n\
            3 packets transmitted, 0 received, 100% packet loss, time 2043ms\n";
        let stats = parse_ping_output(output).unwrap();
        assert_eq!(stats, PingStats::all_lost(3));
        assert!(!stats.is_reachable());

        let output = "3 packets transmitted, 3 received, 0% packet loss, time 2003ms\n\
            rtt min/avg/max/mdev = 0.031/0.040/0.048/0.007 ms\n";
        let stats = parse_ping_output(output).unwrap();
        assert_eq!(stats.received, 3);
        assert!(stats.is_reachable());
    }

    #[test]
    fn test_parse_bsd_and_busybox_output() {
        let bsd = "--- 1.1.1.1 ping statistics ---\n\
            3 packets transmitted, 1 packets received, 66.7% packet loss\n";
        let stats = parse_ping_output(bsd).unwrap();
        assert_eq!(stats.received, 1);
        assert!((stats.packet_loss - 66.7).abs() < f64::EPSILON);

        let busybox = "3 packets transmitted, 0 packets received, 100% packet loss\n";
        assert!(!parse_ping_output(busybox).unwrap().is_reachable());
    }

    #[test]
    fn test_parse_output_without_summary() {
        let unresolved = "ping: nowhere.invalid: Name or service not known";
        assert!(parse_ping_output(unresolved).is_none());
        assert!(looks_like_resolution_failure(unresolved));
        let bsd = "ping: cannot resolve nowhere.invalid: Unknown host";
        assert!(looks_like_resolution_failure(bsd));
        assert!(!looks_like_resolution_failure("ping: socket: Operation not permitted"));
    }

    #[test]
    fn test_failure_from_output_needs_resolution_message() {
        let unresolved = "ping: nowhere.invalid: Name or service not known\n";
        assert!(matches!(
            failure_from_output("nowhere.invalid", 2, "", unresolved),
            ProbeError::UnknownHost(host) if host == "nowhere.invalid"
        ));

        let denied = "ping: socket: Operation not permitted\n";
        match failure_from_output("10.0.0.1", 2, "", denied) {
            ProbeError::UnexpectedOutput { code, output } => {
                assert_eq!(code, 2);
                assert!(output.contains("Operation not permitted"));
            }
            other => panic!("expected unexpected output, got {:?}", other),
        }

        assert!(matches!(
            failure_from_output("10.0.0.1", 68, "", ""),
            ProbeError::UnexpectedOutput { code: 68, .. }
        ));
    }

    #[test]
    fn test_system_pinger_args() {
        let args = SystemPinger::args("10.0.0.1", 3, Duration::from_millis(1500));
        assert_eq!(args[..3], ["-n", "-c", "3"]);
        assert_eq!(args[4], "2");
        assert_eq!(args[5], "10.0.0.1");

        let args = SystemPinger::args("10.0.0.1", 3, Duration::from_millis(10));
        assert_eq!(args[4], "1");
    }

    #[tokio::test]
    #[ignore = "needs a ping binary and ICMP permissions"]
    async fn test_system_pinger_loopback() {
        let stats = SystemPinger::new()
            .ping("127.0.0.1", PING_COUNT, Duration::from_secs(5))
            .await
            .unwrap();
        assert!(stats.is_reachable());
    }
}
