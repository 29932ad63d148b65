//! JSON shapes of the Compute Engine v1 resources rksnap touches.

use std::collections::HashMap;

use common::{Disk, Snapshot};
use libsnapshot::api::{ComputeError, OperationStatus};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListPage<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
    pub next_page_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiskResource {
    pub name: String,
    pub zone: String,
    pub self_link: String,
    #[serde(default)]
    pub labels: HashMap<String, String>,
    #[serde(default)]
    pub description: String,
}

impl From<DiskResource> for Disk {
    fn from(d: DiskResource) -> Self {
        Disk {
            name: d.name,
            zone: d.zone,
            self_link: d.self_link,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotResource {
    pub name: String,
    #[serde(default)]
    pub creation_timestamp: String,
    #[serde(default)]
    pub source_disk: String,
    #[serde(default)]
    pub labels: HashMap<String, String>,
}

impl From<SnapshotResource> for Snapshot {
    fn from(s: SnapshotResource) -> Self {
        Snapshot {
            name: s.name,
            creation_timestamp: s.creation_timestamp,
            source_disk: s.source_disk,
            labels: s.labels,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SnapshotRequest {
    pub name: String,
    pub description: String,
    pub labels: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationResource {
    pub name: String,
    #[serde(default)]
    pub self_link: String,
    #[serde(default)]
    pub status: String,
    pub error: Option<OperationErrors>,
}

#[derive(Debug, Deserialize)]
pub struct OperationErrors {
    #[serde(default)]
    pub errors: Vec<OperationErrorItem>,
}

#[derive(Debug, Deserialize)]
pub struct OperationErrorItem {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
}

impl OperationResource {
    /// Handle passed back to the status queries: the link when present.
    pub fn handle(&self) -> String {
        if self.self_link.is_empty() {
            self.name.clone()
        } else {
            self.self_link.clone()
        }
    }

    /// Status of the operation, or the errors it carries joined by `,`.
    pub fn into_status(self) -> Result<OperationStatus, ComputeError> {
        if let Some(err) = self.error.filter(|e| !e.errors.is_empty()) {
            let message = err
                .errors
                .iter()
                .map(|e| e.message.as_str())
                .collect::<Vec<_>>()
                .join(",");
            return Err(ComputeError::OperationFailed {
                operation: self.name,
                message,
            });
        }
        let Ok(status) = self.status.parse::<OperationStatus>();
        Ok(status)
    }
}

#[derive(Debug, Deserialize)]
pub struct GoogleErrorBody {
    pub error: GoogleError,
}

#[derive(Debug, Deserialize)]
pub struct GoogleError {
    #[serde(default)]
    pub message: String,
}
