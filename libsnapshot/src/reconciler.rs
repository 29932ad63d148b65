use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use common::{Disk, Selector, Snapshot, Target};
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, error, info, warn};

use crate::api::{ComputeApi, MetricsReporter};
use crate::operation::{DEFAULT_POLL_INTERVAL, Operation, OperationPoller};
use crate::retention::{RetentionWindow, evaluate};

#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    /// Zones searched for target disks.
    pub zones: Vec<String>,
    pub poll_interval: Duration,
}

impl ReconcilerConfig {
    pub fn new(zones: Vec<String>) -> Self {
        ReconcilerConfig {
            zones,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// What one reconciliation cycle did.
#[derive(Debug, Default)]
pub struct CycleReport {
    pub targets_evaluated: usize,
    pub targets_skipped: usize,
    pub disks_evaluated: usize,
    pub disks_skipped: usize,
    pub creates_issued: usize,
    pub creates_failed: usize,
    pub deletes_issued: usize,
    pub deletes_failed: usize,
    /// Pollers started during the cycle, one per issued action.
    pub pollers: Vec<JoinHandle<Operation>>,
}

/// Periodically brings the snapshots of every target's disks in line with
/// the target's policy.
pub struct Reconciler {
    api: Arc<dyn ComputeApi>,
    metrics: Arc<dyn MetricsReporter>,
    config: ReconcilerConfig,
}

impl Reconciler {
    pub fn new(
        api: Arc<dyn ComputeApi>,
        metrics: Arc<dyn MetricsReporter>,
        config: ReconcilerConfig,
    ) -> Self {
        Reconciler {
            api,
            metrics,
            config,
        }
    }

    /// Run a cycle every `watch_interval`, starting immediately. Never returns.
    ///
    /// Pollers are detached: a new cycle does not wait for the previous
    /// cycle's operations to settle.
    pub async fn run(&self, targets: &[Target], watch_interval: Duration) {
        let mut ticker = interval(watch_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let report = self.reconcile_once(targets, Utc::now()).await;
            debug!(
                targets = report.targets_evaluated,
                skipped = report.targets_skipped,
                creates = report.creates_issued,
                deletes = report.deletes_issued,
                "reconciliation cycle finished"
            );
        }
    }

    /// One pass over all targets. A target whose disks cannot be resolved is
    /// logged and skipped; the others are still evaluated.
    pub async fn reconcile_once(&self, targets: &[Target], now: DateTime<Utc>) -> CycleReport {
        let mut report = CycleReport::default();

        for target in targets {
            let window = RetentionWindow::new(now, &target.policy);

            let disks = match &target.selector {
                Selector::Label(label) => self.api.disks_by_label(label, &self.config.zones).await,
                Selector::Description(desc) => {
                    self.api
                        .disks_by_description(desc, &self.config.zones)
                        .await
                }
            };
            let disks = match disks {
                Ok(disks) => disks,
                Err(e) => {
                    error!(selector = %target.selector, "failed to resolve disks: {e}");
                    report.targets_skipped += 1;
                    continue;
                }
            };

            debug!(
                selector = %target.selector,
                disks = disks.len(),
                "resolved target"
            );
            self.check_and_snap_disks(&disks, &window, &mut report).await;
            report.targets_evaluated += 1;
        }

        report
    }

    async fn check_and_snap_disks(
        &self,
        disks: &[Disk],
        window: &RetentionWindow,
        report: &mut CycleReport,
    ) {
        for disk in disks {
            debug!(disk = %disk.name, "checking disk");

            let snapshots = match self.api.list_owned_snapshots(&disk.self_link).await {
                Ok(snapshots) => snapshots,
                Err(e) => {
                    error!(disk = %disk.name, "failed to list snapshots: {e}");
                    report.disks_skipped += 1;
                    continue;
                }
            };
            let owned: Vec<Snapshot> = snapshots.into_iter().filter(|s| s.is_owned()).collect();

            let decision = evaluate(&owned, window);
            if decision.skipped > 0 {
                warn!(
                    disk = %disk.name,
                    skipped = decision.skipped,
                    "ignored snapshots with unparseable timestamps"
                );
            }

            for snapshot in decision.to_delete {
                self.delete_snapshot(disk, snapshot, report).await;
            }
            if decision.snapshot_needed {
                self.create_snapshot(disk, report).await;
            }
            report.disks_evaluated += 1;
        }
    }

    async fn delete_snapshot(&self, disk: &Disk, snapshot: &Snapshot, report: &mut CycleReport) {
        info!(
            disk = %disk.name,
            snapshot = %snapshot.name,
            "attempting to delete snapshot"
        );
        match self.api.delete_snapshot(&snapshot.name).await {
            Ok(op) => {
                self.metrics.report_delete_outcome(&disk.name, true);
                report.deletes_issued += 1;
                report.pollers.push(self.poll(Operation::global(op)));
            }
            Err(e) => {
                error!(snapshot = %snapshot.name, "error deleting snapshot: {e}");
                self.metrics.report_delete_outcome(&disk.name, false);
                report.deletes_failed += 1;
            }
        }
    }

    async fn create_snapshot(&self, disk: &Disk, report: &mut CycleReport) {
        debug!(disk = %disk.name, "attempting to snapshot disk");
        match self.api.create_snapshot(&disk.name, &disk.zone).await {
            Ok(op) => {
                info!(disk = %disk.name, operation = %op, "new snapshot requested");
                self.metrics.report_create_outcome(&disk.name, true);
                report.creates_issued += 1;
                report
                    .pollers
                    .push(self.poll(Operation::zonal(op, disk.zone.clone())));
            }
            Err(e) => {
                error!(disk = %disk.name, "error creating snapshot: {e}");
                self.metrics.report_create_outcome(&disk.name, false);
                report.creates_failed += 1;
            }
        }
    }

    fn poll(&self, operation: Operation) -> JoinHandle<Operation> {
        OperationPoller::new(operation, self.api.clone(), self.metrics.clone())
            .with_interval(self.config.poll_interval)
            .spawn()
    }
}
