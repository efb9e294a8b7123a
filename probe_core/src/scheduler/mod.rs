//! Periodic execution of the configured probes
//!
//! The [`Scheduler`] owns one [`ProbeTask`] per probe. Once started, every task runs on
//! its own tokio task with its own timer; the only state they share is the
//! [`StatusSink`]. All tasks hang off one cancellation token so they can be stopped
//! together.

pub mod task;


pub use task::ProbeTask;

use futures_util::future::join_all;
use std::collections::HashSet;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, info_span, warn, Instrument};

use crate::config::ResolvedProbe;
use crate::status::{StatusKey, StatusSink};

pub struct Scheduler {
    status: StatusSink,
    pending: Vec<ProbeTask>,
    keys: HashSet<StatusKey>,
    token: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

impl Scheduler {
    pub fn new(status: StatusSink) -> Self {
        Self {
            status,
            pending: Vec::new(),
            keys: HashSet::new(),
            token: CancellationToken::new(),
            handles: Vec::new(),
        }
    }

    pub fn with_probes<'a>(
        status: StatusSink,
        probes: impl IntoIterator<Item = &'a ResolvedProbe>,
    ) -> Self {
        let mut scheduler = Self::new(status);
        for probe in probes {
            scheduler.add(probe);
        }
        scheduler
    }

    /// Registers a configured probe; its executor is chosen here, once.
    pub fn add(&mut self, probe: &ResolvedProbe) {
        info!(
            "Adding {} probe for {} every {:?}",
            probe.kind(),
            probe.id(),
            probe.interval
        );
        self.add_task(ProbeTask::from_config(probe));
    }

    pub fn add_task(&mut self, task: ProbeTask) {
        let key = StatusKey::new(task.kind(), task.id());
        if !self.keys.insert(key) {
            warn!(
                "Probe {} {} is configured more than once, \
                 its status reflects whichever check finished last",
                task.kind(),
                task.id()
            );
        }
        self.pending.push(task);
    }

    /// Number of probes registered, started or not.
    pub fn len(&self) -> usize {
        self.pending.len() + self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn running(&self) -> usize {
        self.handles.len()
    }

    pub fn status(&self) -> &StatusSink {
        &self.status
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Spawns every registered probe that is not running yet.
    pub fn start(&mut self) {
        let tasks: Vec<ProbeTask> = self.pending.drain(..).collect();
        info!("Starting {} probe loops", tasks.len());

        for task in tasks {
            let span = info_span!("probe", kind = %task.kind(), id = %task.id());
            let status = self.status.clone();
            let token = self.token.child_token();
            self.handles
                .push(tokio::spawn(task.run(status, token).instrument(span)));
        }
    }

    /// Cancels every probe loop and waits for them to return.
    pub async fn shutdown(self) {
        self.token.cancel();
        for result in join_all(self.handles).await {
            if let Err(e) = result {
                warn!("Probe loop ended abnormally: {}", e);
            }
        }
        info!("All probe loops stopped");
    }
}
