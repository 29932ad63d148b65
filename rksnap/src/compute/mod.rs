pub mod auth;
pub mod wire;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use common::{Disk, Matcher, OWNER_LABEL, OWNER_LABEL_VALUE, Snapshot, snapshot_name};
use libsnapshot::api::{ComputeApi, ComputeError, OperationStatus};
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::compute::auth::TokenSource;
use crate::compute::wire::{
    DiskResource, GoogleErrorBody, ListPage, OperationResource, SnapshotRequest, SnapshotResource,
};

pub const DEFAULT_COMPUTE_ENDPOINT: &str = "https://compute.googleapis.com/compute/v1";

/// Zones and operations may be given either as names or as full resource links.
pub fn resource_name(link: &str) -> &str {
    link.rsplit('/').next().unwrap_or(link)
}

/// Compute Engine REST client scoped to one project.
pub struct GceClient {
    http: reqwest::Client,
    base_url: String,
    project: String,
    snap_prefix: String,
    tokens: Arc<dyn TokenSource>,
}

impl GceClient {
    pub fn new(
        project: impl Into<String>,
        snap_prefix: impl Into<String>,
        tokens: Arc<dyn TokenSource>,
    ) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("rksnap/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(GceClient {
            http,
            base_url: DEFAULT_COMPUTE_ENDPOINT.to_string(),
            project: project.into(),
            snap_prefix: snap_prefix.into(),
            tokens,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}/projects/{}/{path}", self.base_url, self.project)
    }

    async fn send<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
        context: &str,
    ) -> Result<T, ComputeError> {
        let token = self
            .tokens
            .token()
            .await
            .map_err(|source| ComputeError::Transport {
                context: format!("{context}: failed to obtain access token"),
                source,
            })?;
        let res = builder
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| transport(context, e))?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(api_error(context, status, &body));
        }
        res.json::<T>().await.map_err(|e| transport(context, e))
    }

    /// Follow `nextPageToken` until the listing is exhausted.
    async fn list_all<T: DeserializeOwned>(
        &self,
        url: &str,
        context: &str,
    ) -> Result<Vec<T>, ComputeError> {
        let mut items = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut req = self.http.get(url);
            if let Some(token) = &page_token {
                req = req.query(&[("pageToken", token.as_str())]);
            }
            let page: ListPage<T> = self.send(req, context).await?;
            items.extend(page.items);
            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => return Ok(items),
            }
        }
    }

    async fn list_disks(&self, zones: &[String]) -> Result<Vec<DiskResource>, ComputeError> {
        let mut disks = Vec::new();
        for zone in zones {
            let url = self.url(&format!("zones/{}/disks", resource_name(zone)));
            disks.extend(self.list_all(&url, "error listing disks").await?);
        }
        Ok(disks)
    }
}

fn transport(context: &str, e: reqwest::Error) -> ComputeError {
    ComputeError::Transport {
        context: context.to_string(),
        source: e.into(),
    }
}

fn api_error(context: &str, status: StatusCode, body: &str) -> ComputeError {
    let message = serde_json::from_str::<GoogleErrorBody>(body)
        .map(|b| b.error.message)
        .ok()
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| body.to_string());
    ComputeError::Api {
        context: context.to_string(),
        status: status.as_u16(),
        message,
    }
}

#[async_trait]
impl ComputeApi for GceClient {
    async fn disks_by_label(
        &self,
        label: &Matcher,
        zones: &[String],
    ) -> Result<Vec<Disk>, ComputeError> {
        let disks = self.list_disks(zones).await?;
        Ok(disks
            .into_iter()
            .filter(|d| label.matches_labels(&d.labels))
            .map(Disk::from)
            .collect())
    }

    async fn disks_by_description(
        &self,
        description: &Matcher,
        zones: &[String],
    ) -> Result<Vec<Disk>, ComputeError> {
        let disks = self.list_disks(zones).await?;
        Ok(disks
            .into_iter()
            .filter(|d| match description.matches_description(&d.description) {
                Ok(matched) => matched,
                Err(e) => {
                    debug!(
                        disk = %d.name,
                        "skipping disk, description is not a JSON map: {e}"
                    );
                    false
                }
            })
            .map(Disk::from)
            .collect())
    }

    async fn list_owned_snapshots(
        &self,
        disk_self_link: &str,
    ) -> Result<Vec<Snapshot>, ComputeError> {
        let url = self.url("global/snapshots");
        let snapshots: Vec<SnapshotResource> = self
            .list_all(&url, "error requesting snapshots list")
            .await?;
        Ok(snapshots
            .into_iter()
            .map(Snapshot::from)
            .filter(|s| s.is_owned() && s.source_disk == disk_self_link)
            .collect())
    }

    async fn create_snapshot(&self, disk_name: &str, zone: &str) -> Result<String, ComputeError> {
        let url = self.url(&format!(
            "zones/{}/disks/{disk_name}/createSnapshot",
            resource_name(zone)
        ));
        let body = SnapshotRequest {
            name: snapshot_name(&self.snap_prefix, disk_name, Utc::now()),
            description: format!("Snapshot of {disk_name}"),
            labels: HashMap::from([(OWNER_LABEL.to_string(), OWNER_LABEL_VALUE.to_string())]),
        };
        let request = self.http.post(url).json(&body);
        let op: OperationResource = self.send(request, "error taking disk snapshot").await?;
        Ok(op.handle())
    }

    async fn delete_snapshot(&self, snapshot_name: &str) -> Result<String, ComputeError> {
        let url = self.url(&format!("global/snapshots/{snapshot_name}"));
        let op: OperationResource = self
            .send(self.http.delete(url), "error deleting snapshot")
            .await?;
        Ok(op.handle())
    }

    async fn zonal_operation_status(
        &self,
        operation: &str,
        zone: &str,
    ) -> Result<OperationStatus, ComputeError> {
        let url = self.url(&format!(
            "zones/{}/operations/{}",
            resource_name(zone),
            resource_name(operation)
        ));
        let op: OperationResource = self
            .send(self.http.get(url), "error getting zonal operation")
            .await?;
        op.into_status()
    }

    async fn global_operation_status(
        &self,
        operation: &str,
    ) -> Result<OperationStatus, ComputeError> {
        let url = self.url(&format!("global/operations/{}", resource_name(operation)));
        let op: OperationResource = self
            .send(self.http.get(url), "error getting global operation")
            .await?;
        op.into_status()
    }
}
