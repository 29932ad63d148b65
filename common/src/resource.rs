use std::collections::HashMap;

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};

/// Label stamped on every snapshot rksnap creates. Only snapshots carrying it
/// take part in retention decisions.
pub const OWNER_LABEL: &str = "gcp_disk_snapshotter";
pub const OWNER_LABEL_VALUE: &str = "true";

/// GCE resource names are limited to 63 bytes.
const MAX_NAME_LEN: usize = 63;
const NAME_TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

/// A disk selected by a target. Re-fetched every cycle, never cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Disk {
    pub name: String,
    /// Zone name or zone link, the client accepts both.
    pub zone: String,
    /// Stable reference that snapshots record as their source disk.
    pub self_link: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub name: String,
    /// RFC 3339 timestamp with zone offset, as reported by the API.
    pub creation_timestamp: String,
    pub source_disk: String,
    #[serde(default)]
    pub labels: HashMap<String, String>,
}

impl Snapshot {
    pub fn is_owned(&self) -> bool {
        self.labels
            .get(OWNER_LABEL)
            .is_some_and(|v| v == OWNER_LABEL_VALUE)
    }

    pub fn created_at(&self) -> Result<DateTime<FixedOffset>, chrono::ParseError> {
        DateTime::parse_from_rfc3339(&self.creation_timestamp)
    }
}

/// Build the name of a new snapshot: `<prefix><disk>-<YYYYmmddHHMMSS>`.
/// The prefix and disk part are shortened at a char boundary when the result
/// would exceed 63 bytes. The timestamp suffix is always kept.
pub fn snapshot_name(prefix: &str, disk_name: &str, at: DateTime<Utc>) -> String {
    let suffix = format!("-{}", at.format(NAME_TIMESTAMP_FORMAT));
    let budget = MAX_NAME_LEN - suffix.len();
    let mut name = String::with_capacity(MAX_NAME_LEN);
    for c in prefix.chars().chain(disk_name.chars()) {
        if name.len() + c.len_utf8() > budget {
            break;
        }
        name.push(c);
    }
    name.push_str(&suffix);
    name
}
