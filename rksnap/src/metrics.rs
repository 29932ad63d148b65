//! Prometheus counters for snapshot actions and operation outcomes.

use libsnapshot::api::{MetricsReporter, ScopeKind};
use metrics::{counter, describe_counter, with_local_recorder};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle, PrometheusRecorder};

pub const CREATE_API_CALL_COUNT: &str = "gcp_disk_snapshotter_create_api_call_count";
pub const DELETE_API_CALL_COUNT: &str = "gcp_disk_snapshotter_delete_api_call_count";
pub const OPERATION_COUNT: &str = "gcp_disk_snapshotter_operation_count";

/// Owns its recorder instead of installing a global one, so each reporter
/// renders only what it recorded.
pub struct PrometheusReporter {
    recorder: PrometheusRecorder,
}

impl Default for PrometheusReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl PrometheusReporter {
    pub fn new() -> Self {
        let recorder = PrometheusBuilder::new().build_recorder();
        with_local_recorder(&recorder, || {
            describe_counter!(
                CREATE_API_CALL_COUNT,
                "Success metric for snapshots created per disk"
            );
            describe_counter!(
                DELETE_API_CALL_COUNT,
                "Success metric for snapshots deletion per disk"
            );
            describe_counter!(
                OPERATION_COUNT,
                "Success metric for operations initiated by disk snapshotter"
            );
        });
        PrometheusReporter { recorder }
    }

    pub fn handle(&self) -> PrometheusHandle {
        self.recorder.handle()
    }

    fn increment(&self, name: &'static str, labels: [(&'static str, String); 2]) {
        with_local_recorder(&self.recorder, || counter!(name, &labels).increment(1));
    }
}

fn outcome_labels(disk_name: &str, success: bool) -> [(&'static str, String); 2] {
    [
        ("disk", disk_name.to_string()),
        ("success", success.to_string()),
    ]
}

impl MetricsReporter for PrometheusReporter {
    fn report_create_outcome(&self, disk_name: &str, success: bool) {
        self.increment(CREATE_API_CALL_COUNT, outcome_labels(disk_name, success));
    }

    fn report_delete_outcome(&self, disk_name: &str, success: bool) {
        self.increment(DELETE_API_CALL_COUNT, outcome_labels(disk_name, success));
    }

    fn report_operation_outcome(&self, scope: ScopeKind, success: bool) {
        self.increment(
            OPERATION_COUNT,
            [
                ("operation_type", scope.as_str().to_string()),
                ("success", success.to_string()),
            ],
        );
    }
}
