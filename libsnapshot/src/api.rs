use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use common::{Disk, Matcher, Snapshot};

#[derive(Debug, thiserror::Error)]
pub enum ComputeError {
    #[error("{context}: request failed with status {status}: {message}")]
    Api {
        context: String,
        status: u16,
        message: String,
    },
    /// The cloud side accepted the call but reported errors on the operation itself.
    #[error("operation {operation} failed: {message}")]
    OperationFailed { operation: String, message: String },
    #[error("{context}: {source}")]
    Transport {
        context: String,
        #[source]
        source: anyhow::Error,
    },
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Status string of a cloud operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationStatus {
    Pending,
    Running,
    Done,
    Other(String),
}

impl FromStr for OperationStatus {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "PENDING" => OperationStatus::Pending,
            "RUNNING" => OperationStatus::Running,
            "DONE" => OperationStatus::Done,
            other => OperationStatus::Other(other.to_string()),
        })
    }
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationStatus::Pending => write!(f, "PENDING"),
            OperationStatus::Running => write!(f, "RUNNING"),
            OperationStatus::Done => write!(f, "DONE"),
            OperationStatus::Other(s) => write!(f, "{s}"),
        }
    }
}

/// Metric label for where an operation lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScopeKind {
    Zonal,
    Global,
}

impl ScopeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScopeKind::Zonal => "zonal",
            ScopeKind::Global => "global",
        }
    }
}

/// The cloud surface the reconciler drives.
///
/// Create and delete return an opaque operation id (a name or a link) which is
/// later handed back to the matching status query.
#[async_trait]
pub trait ComputeApi: Send + Sync {
    async fn disks_by_label(
        &self,
        label: &Matcher,
        zones: &[String],
    ) -> Result<Vec<Disk>, ComputeError>;

    async fn disks_by_description(
        &self,
        description: &Matcher,
        zones: &[String],
    ) -> Result<Vec<Disk>, ComputeError>;

    /// Snapshots of the disk that carry the ownership label.
    async fn list_owned_snapshots(
        &self,
        disk_self_link: &str,
    ) -> Result<Vec<Snapshot>, ComputeError>;

    async fn create_snapshot(&self, disk_name: &str, zone: &str) -> Result<String, ComputeError>;

    async fn delete_snapshot(&self, snapshot_name: &str) -> Result<String, ComputeError>;

    async fn zonal_operation_status(
        &self,
        operation: &str,
        zone: &str,
    ) -> Result<OperationStatus, ComputeError>;

    async fn global_operation_status(
        &self,
        operation: &str,
    ) -> Result<OperationStatus, ComputeError>;
}

/// Receives terminal outcomes. Implementations are shared by every poller task
/// and must be safe to call concurrently.
pub trait MetricsReporter: Send + Sync {
    fn report_create_outcome(&self, disk_name: &str, success: bool);

    fn report_delete_outcome(&self, disk_name: &str, success: bool);

    fn report_operation_outcome(&self, scope: ScopeKind, success: bool);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_status_parse() {
        assert_eq!("DONE".parse::<OperationStatus>(), Ok(OperationStatus::Done));
        assert_eq!(
            "RUNNING".parse::<OperationStatus>(),
            Ok(OperationStatus::Running)
        );
        assert_eq!(
            "ABORTING".parse::<OperationStatus>(),
            Ok(OperationStatus::Other("ABORTING".to_string()))
        );
        assert_eq!(OperationStatus::Pending.to_string(), "PENDING");
    }
}
