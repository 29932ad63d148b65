#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use common::{Disk, Matcher, OWNER_LABEL, OWNER_LABEL_VALUE, Snapshot};
use libsnapshot::api::{ComputeApi, ComputeError, MetricsReporter, OperationStatus, ScopeKind};

#[derive(Default)]
struct FakeState {
    disks: HashMap<String, Vec<Disk>>,
    failing_selectors: HashSet<String>,
    snapshots: HashMap<String, Vec<Snapshot>>,
    failing_listings: HashSet<String>,
    fail_create: bool,
    fail_delete: bool,
    statuses: HashMap<String, VecDeque<Result<OperationStatus, String>>>,

    resolved: Vec<String>,
    created: Vec<(String, String)>,
    deleted: Vec<String>,
    status_queries: Vec<String>,
}

/// Deterministic in-memory cloud. Operations without a scripted status
/// report `DONE` on the first query.
#[derive(Default)]
pub struct FakeCompute {
    state: Mutex<FakeState>,
}

impl FakeCompute {
    pub fn with_label_disks(self, label: Matcher, disks: Vec<Disk>) -> Self {
        self.state
            .lock()
            .unwrap()
            .disks
            .insert(format!("label {label}"), disks);
        self
    }

    pub fn with_description_disks(self, desc: Matcher, disks: Vec<Disk>) -> Self {
        self.state
            .lock()
            .unwrap()
            .disks
            .insert(format!("description {desc}"), disks);
        self
    }

    pub fn failing_label(self, label: Matcher) -> Self {
        self.state
            .lock()
            .unwrap()
            .failing_selectors
            .insert(format!("label {label}"));
        self
    }

    pub fn with_snapshots(self, disk: &Disk, snapshots: Vec<Snapshot>) -> Self {
        self.state
            .lock()
            .unwrap()
            .snapshots
            .insert(disk.self_link.clone(), snapshots);
        self
    }

    pub fn failing_listing(self, disk: &Disk) -> Self {
        self.state
            .lock()
            .unwrap()
            .failing_listings
            .insert(disk.self_link.clone());
        self
    }

    pub fn failing_create(self) -> Self {
        self.state.lock().unwrap().fail_create = true;
        self
    }

    pub fn failing_delete(self) -> Self {
        self.state.lock().unwrap().fail_delete = true;
        self
    }

    pub fn with_statuses(
        self,
        operation: &str,
        statuses: Vec<Result<OperationStatus, String>>,
    ) -> Self {
        self.state
            .lock()
            .unwrap()
            .statuses
            .insert(operation.to_string(), statuses.into());
        self
    }

    pub fn resolved(&self) -> Vec<String> {
        self.state.lock().unwrap().resolved.clone()
    }

    pub fn created(&self) -> Vec<(String, String)> {
        self.state.lock().unwrap().created.clone()
    }

    pub fn deleted(&self) -> Vec<String> {
        self.state.lock().unwrap().deleted.clone()
    }

    pub fn status_queries(&self) -> Vec<String> {
        self.state.lock().unwrap().status_queries.clone()
    }

    fn resolve(&self, key: String) -> Result<Vec<Disk>, ComputeError> {
        let mut state = self.state.lock().unwrap();
        state.resolved.push(key.clone());
        if state.failing_selectors.contains(&key) {
            return Err(ComputeError::Api {
                context: "error listing disks".to_string(),
                status: 503,
                message: "backend unavailable".to_string(),
            });
        }
        Ok(state.disks.get(&key).cloned().unwrap_or_default())
    }

    fn next_status(&self, operation: &str) -> Result<OperationStatus, ComputeError> {
        let mut state = self.state.lock().unwrap();
        state.status_queries.push(operation.to_string());
        let queued = state.statuses.get_mut(operation);
        match queued.and_then(|q| q.pop_front()) {
            None | Some(Ok(OperationStatus::Done)) => Ok(OperationStatus::Done),
            Some(Ok(status)) => Ok(status),
            Some(Err(message)) => Err(ComputeError::OperationFailed {
                operation: operation.to_string(),
                message,
            }),
        }
    }
}

#[async_trait]
impl ComputeApi for FakeCompute {
    async fn disks_by_label(
        &self,
        label: &Matcher,
        _zones: &[String],
    ) -> Result<Vec<Disk>, ComputeError> {
        self.resolve(format!("label {label}"))
    }

    async fn disks_by_description(
        &self,
        description: &Matcher,
        _zones: &[String],
    ) -> Result<Vec<Disk>, ComputeError> {
        self.resolve(format!("description {description}"))
    }

    async fn list_owned_snapshots(
        &self,
        disk_self_link: &str,
    ) -> Result<Vec<Snapshot>, ComputeError> {
        let state = self.state.lock().unwrap();
        if state.failing_listings.contains(disk_self_link) {
            let err = anyhow::anyhow!("error requesting snapshots list");
            return Err(ComputeError::Other(err));
        }
        let snapshots = state.snapshots.get(disk_self_link).cloned();
        Ok(snapshots.unwrap_or_default())
    }

    async fn create_snapshot(&self, disk_name: &str, zone: &str) -> Result<String, ComputeError> {
        let mut state = self.state.lock().unwrap();
        let call = (disk_name.to_string(), zone.to_string());
        state.created.push(call);
        if state.fail_create {
            return Err(ComputeError::Other(anyhow::anyhow!("test error")));
        }
        Ok(format!("create-{disk_name}"))
    }

    async fn delete_snapshot(&self, snapshot_name: &str) -> Result<String, ComputeError> {
        let mut state = self.state.lock().unwrap();
        state.deleted.push(snapshot_name.to_string());
        if state.fail_delete {
            return Err(ComputeError::Other(anyhow::anyhow!("test error")));
        }
        Ok(format!("delete-{snapshot_name}"))
    }

    async fn zonal_operation_status(
        &self,
        operation: &str,
        _zone: &str,
    ) -> Result<OperationStatus, ComputeError> {
        self.next_status(operation)
    }

    async fn global_operation_status(
        &self,
        operation: &str,
    ) -> Result<OperationStatus, ComputeError> {
        self.next_status(operation)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetricEvent {
    Create(String, bool),
    Delete(String, bool),
    Operation(ScopeKind, bool),
}

impl MetricEvent {
    pub fn create(disk_name: &str, success: bool) -> Self {
        MetricEvent::Create(disk_name.to_string(), success)
    }

    pub fn delete(disk_name: &str, success: bool) -> Self {
        MetricEvent::Delete(disk_name.to_string(), success)
    }
}

#[derive(Default)]
pub struct RecordingMetrics {
    events: Mutex<Vec<MetricEvent>>,
}

impl RecordingMetrics {
    pub fn events(&self) -> Vec<MetricEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl MetricsReporter for RecordingMetrics {
    fn report_create_outcome(&self, disk_name: &str, success: bool) {
        self.events
            .lock()
            .unwrap()
            .push(MetricEvent::Create(disk_name.to_string(), success));
    }

    fn report_delete_outcome(&self, disk_name: &str, success: bool) {
        self.events
            .lock()
            .unwrap()
            .push(MetricEvent::Delete(disk_name.to_string(), success));
    }

    fn report_operation_outcome(&self, scope: ScopeKind, success: bool) {
        self.events
            .lock()
            .unwrap()
            .push(MetricEvent::Operation(scope, success));
    }
}

pub fn disk(name: &str) -> Disk {
    Disk {
        name: name.to_string(),
        zone: "europe-west2-a".to_string(),
        self_link: format!("projects/test/zones/europe-west2-a/disks/{name}"),
    }
}

/// A create call as recorded by `FakeCompute::created`.
pub fn created_in_zone(disk_name: &str) -> (String, String) {
    (disk_name.to_string(), "europe-west2-a".to_string())
}

pub fn owned_snapshot(name: &str, disk: &Disk, at: DateTime<Utc>) -> Snapshot {
    Snapshot {
        name: name.to_string(),
        creation_timestamp: at.to_rfc3339_opts(SecondsFormat::Millis, false),
        source_disk: disk.self_link.clone(),
        labels: HashMap::from([(OWNER_LABEL.to_string(), OWNER_LABEL_VALUE.to_string())]),
    }
}
