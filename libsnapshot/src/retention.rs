use chrono::{DateTime, Utc};
use common::{Policy, Snapshot};
use tracing::warn;

/// Thresholds derived once per target evaluation so every disk of a target
/// is judged against the same instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionWindow {
    /// Snapshots created before this are deleted.
    pub retention_start: DateTime<Utc>,
    /// A snapshot created after this makes a new one unnecessary.
    pub last_accepted_creation: DateTime<Utc>,
}

impl RetentionWindow {
    pub fn new(now: DateTime<Utc>, policy: &Policy) -> Self {
        RetentionWindow {
            retention_start: now
                .checked_sub_signed(policy.retention())
                .unwrap_or(DateTime::<Utc>::MIN_UTC),
            last_accepted_creation: now
                .checked_sub_signed(policy.interval())
                .unwrap_or(DateTime::<Utc>::MIN_UTC),
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct Decision<'a> {
    pub to_delete: Vec<&'a Snapshot>,
    pub snapshot_needed: bool,
    /// Snapshots left out because their timestamp could not be parsed.
    pub skipped: usize,
}

/// Classify the owned snapshots of one disk.
///
/// The deletion set and the `snapshot_needed` flag are computed independently:
/// with a misconfigured policy (interval longer than retention) a single
/// snapshot may both be deleted and satisfy the cadence.
pub fn evaluate<'a>(snapshots: &'a [Snapshot], window: &RetentionWindow) -> Decision<'a> {
    let mut decision = Decision {
        to_delete: Vec::new(),
        snapshot_needed: true,
        skipped: 0,
    };

    for snap in snapshots {
        let created = match snap.created_at() {
            Ok(ts) => ts.with_timezone(&Utc),
            Err(e) => {
                warn!(
                    snapshot = %snap.name,
                    timestamp = %snap.creation_timestamp,
                    "failed to parse snapshot timestamp: {e}"
                );
                decision.skipped += 1;
                continue;
            }
        };

        if created < window.retention_start {
            decision.to_delete.push(snap);
        }
        if created > window.last_accepted_creation {
            decision.snapshot_needed = false;
        }
    }

    decision
}
