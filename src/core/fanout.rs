//! Fan-out delivery of serialized events
//!
//! The coordinator hands each payload over as a job on a bounded queue and
//! only waits when that queue is full. A single worker drains jobs in order
//! and, within a job, sends to every recipient concurrently (bounded by
//! `max_concurrent_sends`). Jobs are processed one after another, so every
//! connection sees events in the order the coordinator produced them.

use futures_util::stream::{self, StreamExt};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

use crate::core::connection::{Connection, ConnectionId};
use crate::core::intake::{HubEvent, WeakIntakeSender};
use crate::core::registry::RegistrySnapshot;

/// Which connections of a snapshot a job targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recipients {
    /// Every connection, optionally skipping one
    All { except: Option<ConnectionId> },
    /// A single connection
    Only(ConnectionId),
}

impl Recipients {
    fn includes(&self, id: ConnectionId) -> bool {
        match self {
            Recipients::All { except } => *except != Some(id),
            Recipients::Only(target) => *target == id,
        }
    }
}

/// One payload to deliver against one registry snapshot
#[derive(Debug)]
struct FanoutJob {
    label: &'static str,
    payload: Arc<str>,
    snapshot: Arc<RegistrySnapshot>,
    recipients: Recipients,
}

/// Outcome of one job, for logging and tests
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub attempted: usize,
    pub delivered: usize,
    pub failed: Vec<ConnectionId>,
}

/// Cloneable handle the coordinator uses to enqueue deliveries
#[derive(Clone)]
pub struct FanoutSender {
    jobs: mpsc::Sender<FanoutJob>,
}

impl FanoutSender {
    /// Create the sender and the worker that must be spawned to drive it
    ///
    /// `failures` is the coordinator's intake. It is held weakly so the
    /// worker never keeps the hub alive on its own.
    pub fn new(
        job_capacity: usize,
        write_timeout: Duration,
        max_concurrent_sends: usize,
        failures: WeakIntakeSender,
    ) -> (Self, FanoutWorker) {
        let (tx, rx) = mpsc::channel(job_capacity.max(1));
        let worker = FanoutWorker {
            jobs: rx,
            write_timeout,
            max_concurrent_sends: max_concurrent_sends.max(1),
            failures,
            evicted: HashSet::new(),
        };
        (Self { jobs: tx }, worker)
    }

    /// Enqueue a delivery, waiting while the job queue is full
    ///
    /// Returns false if the worker has stopped.
    pub async fn dispatch(
        &self,
        label: &'static str,
        payload: Arc<str>,
        snapshot: Arc<RegistrySnapshot>,
        recipients: Recipients,
    ) -> bool {
        let job = FanoutJob {
            label,
            payload,
            snapshot,
            recipients,
        };
        if self.jobs.send(job).await.is_err() {
            log::error!("Fan-out worker has stopped, dropping {} delivery", label);
            return false;
        }
        true
    }
}

/// Drives queued deliveries
pub struct FanoutWorker {
    jobs: mpsc::Receiver<FanoutJob>,
    write_timeout: Duration,
    max_concurrent_sends: usize,
    failures: WeakIntakeSender,
    // Connections already reported as failed but possibly still in snapshots
    evicted: HashSet<ConnectionId>,
}

impl FanoutWorker {
    pub async fn run(mut self) {
        log::debug!(
            "Fan-out worker started (write timeout {:?}, {} concurrent sends)",
            self.write_timeout,
            self.max_concurrent_sends
        );

        while let Some(job) = self.jobs.recv().await {
            let label = job.label;
            let started = Instant::now();
            let report = self.deliver(job).await;
            log::debug!(
                "Delivered {} to {}/{} connections in {:?}",
                label,
                report.delivered,
                report.attempted,
                started.elapsed()
            );
        }

        log::info!("Fan-out worker shutting down");
    }

    async fn deliver(&mut self, job: FanoutJob) -> DeliveryReport {
        // Ids are never reused, so an evicted id missing from a newer
        // snapshot has been unregistered for good
        self.evicted.retain(|id| job.snapshot.contains(*id));

        let targets: Vec<Connection> = job
            .snapshot
            .pairs()
            .iter()
            .map(|entry| &entry.connection)
            .filter(|conn| job.recipients.includes(conn.id()) && !self.evicted.contains(&conn.id()))
            .cloned()
            .collect();

        let attempted = targets.len();
        let write_timeout = self.write_timeout;
        let payload = job.payload;

        let failed: Vec<ConnectionId> = stream::iter(targets)
            .map(|conn| {
                let payload = Arc::clone(&payload);
                async move {
                    match conn.send_text(&payload, write_timeout).await {
                        Ok(()) => {
                            log::trace!("Frame queued for {}", conn.id());
                            None
                        }
                        Err(e) => {
                            log::warn!("Error sending message to client {}: {}", conn.id(), e);
                            Some(conn.id())
                        }
                    }
                }
            })
            .buffer_unordered(self.max_concurrent_sends)
            .filter_map(|outcome| async move { outcome })
            .collect()
            .await;

        for id in &failed {
            self.evicted.insert(*id);
            self.report_failure(*id);
        }

        DeliveryReport {
            attempted,
            delivered: attempted - failed.len(),
            failed,
        }
    }

    // Must not wait on the coordinator
    fn report_failure(&self, id: ConnectionId) {
        match self.failures.upgrade() {
            Some(intake) => intake.send_detached(HubEvent::Unregister(id)),
            None => log::debug!("Hub stopped before {} could be unregistered", id),
        }
    }
}
