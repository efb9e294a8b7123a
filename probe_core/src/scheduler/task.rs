use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::config::ResolvedProbe;
use crate::probes::{create_probe, Probe, ProbeKind};
use crate::status::{ProbeStatus, StatusSink};

/// Interval used in place of a zero one, which the timer cannot run.
pub const MIN_INTERVAL: Duration = Duration::from_secs(1);

/// The periodic loop of one probe.
///
/// The loop awaits each check before taking the next tick, so checks of the same probe
/// never overlap. Ticks that fell due during a slow check fire right after it.
pub struct ProbeTask {
    kind: ProbeKind,
    id: String,
    interval: Duration,
    probe: Arc<dyn Probe>,
}

impl ProbeTask {
    pub fn new(
        kind: ProbeKind,
        id: impl Into<String>,
        interval: Duration,
        probe: Arc<dyn Probe>,
    ) -> Self {
        let id = id.into();
        let interval = if interval.is_zero() {
            warn!(
                "Probe {} {} has a zero check interval, using {:?}",
                kind, id, MIN_INTERVAL
            );
            MIN_INTERVAL
        } else {
            interval
        };

        Self {
            kind,
            id,
            interval,
            probe,
        }
    }

    pub fn from_config(resolved: &ResolvedProbe) -> Self {
        Self::new(
            resolved.kind(),
            resolved.id(),
            resolved.interval,
            create_probe(&resolved.config),
        )
    }

    pub fn kind(&self) -> ProbeKind {
        self.kind
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Runs until `token` is cancelled. The first check happens one interval after start.
    pub async fn run(self, status: StatusSink, token: CancellationToken) {
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Burst);

        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let result = tokio::select! {
                biased;
                _ = token.cancelled() => break,
                result = self.probe.check() => result,
            };

            match result {
                Ok(errors) => {
                    let probe_status = ProbeStatus::from_errors(&errors);
                    debug!(status = ?probe_status, "check completed");
                    status.set(self.kind, &self.id, probe_status);
                }
                Err(e) => {
                    error!("Check could not run, tick skipped: {}", e);
                }
            }
        }

        debug!("probe loop stopped");
    }
}
