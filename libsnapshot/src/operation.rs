use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info};

use crate::api::{ComputeApi, MetricsReporter, OperationStatus, ScopeKind};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Where an operation has to be queried. Snapshot creation is zonal,
/// snapshot deletion is global.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationScope {
    Zonal { zone: String },
    Global,
}

impl OperationScope {
    pub fn kind(&self) -> ScopeKind {
        match self {
            OperationScope::Zonal { .. } => ScopeKind::Zonal,
            OperationScope::Global => ScopeKind::Global,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationState {
    InFlight,
    Done,
    Failed(String),
}

impl OperationState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, OperationState::InFlight)
    }
}

/// An in-flight create or delete, owned by exactly one poller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    pub id: String,
    pub scope: OperationScope,
    state: OperationState,
}

impl Operation {
    pub fn zonal(id: impl Into<String>, zone: impl Into<String>) -> Self {
        Operation {
            id: id.into(),
            scope: OperationScope::Zonal { zone: zone.into() },
            state: OperationState::InFlight,
        }
    }

    pub fn global(id: impl Into<String>) -> Self {
        Operation {
            id: id.into(),
            scope: OperationScope::Global,
            state: OperationState::InFlight,
        }
    }

    pub fn state(&self) -> &OperationState {
        &self.state
    }
}

/// Drives one operation to `Done` or `Failed`.
///
/// A status query error is terminal: it is reported as a failure and never
/// retried. There is no timeout; the poller lives until the operation settles.
pub struct OperationPoller {
    operation: Operation,
    api: Arc<dyn ComputeApi>,
    metrics: Arc<dyn MetricsReporter>,
    interval: Duration,
}

impl OperationPoller {
    pub fn new(
        operation: Operation,
        api: Arc<dyn ComputeApi>,
        metrics: Arc<dyn MetricsReporter>,
    ) -> Self {
        OperationPoller {
            operation,
            api,
            metrics,
            interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn operation(&self) -> &Operation {
        &self.operation
    }

    /// Query the status once and apply the resulting transition.
    /// Does nothing once the operation is terminal.
    pub async fn step(&mut self) -> &OperationState {
        if self.operation.state.is_terminal() {
            return &self.operation.state;
        }

        let kind = self.operation.scope.kind();
        let status = match &self.operation.scope {
            OperationScope::Zonal { zone } => {
                self.api
                    .zonal_operation_status(&self.operation.id, zone)
                    .await
            }
            OperationScope::Global => self.api.global_operation_status(&self.operation.id).await,
        };

        match status {
            Err(e) => {
                error!(operation = %self.operation.id, scope = kind.as_str(), "operation failed: {e}");
                self.operation.state = OperationState::Failed(e.to_string());
                self.metrics.report_operation_outcome(kind, false);
            }
            Ok(OperationStatus::Done) => {
                info!(operation = %self.operation.id, scope = kind.as_str(), "operation succeeded");
                self.operation.state = OperationState::Done;
                self.metrics.report_operation_outcome(kind, true);
            }
            Ok(status) => {
                debug!(operation = %self.operation.id, %status, "operation still in progress");
            }
        }

        &self.operation.state
    }

    pub async fn run(mut self) -> Operation {
        loop {
            if self.step().await.is_terminal() {
                return self.operation;
            }
            sleep(self.interval).await;
        }
    }

    /// Detach the poller onto the runtime.
    pub fn spawn(self) -> JoinHandle<Operation> {
        tokio::spawn(self.run())
    }
}
