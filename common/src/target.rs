use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::Path;

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read snapshot config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse JSON snapshot config: {0}")]
    Json(#[from] serde_json::Error),
    #[error("failed to parse YAML snapshot config: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("{kind} target #{index} has an empty key")]
    EmptyKey { kind: &'static str, index: usize },
}

/// A key/value pair matched against a disk's labels or its JSON description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Matcher {
    pub key: String,
    pub value: String,
}

impl Matcher {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Matcher {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn matches_labels(&self, labels: &HashMap<String, String>) -> bool {
        labels.get(&self.key).is_some_and(|v| *v == self.value)
    }

    /// Disk descriptions are expected to hold a flat JSON object of strings.
    /// Anything else is reported as an error so the caller can skip the disk.
    pub fn matches_description(&self, description: &str) -> Result<bool, serde_json::Error> {
        let fields: HashMap<String, String> = serde_json::from_str(description)?;
        Ok(self.matches_labels(&fields))
    }
}

impl fmt::Display for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.key, self.value)
    }
}

/// Cadence and retention applied to every disk a target resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Policy {
    /// Minimum spacing between accepted snapshots.
    pub interval_seconds: u64,
    /// Maximum snapshot age before deletion.
    pub retention_period_hours: u64,
}

impl Policy {
    pub fn interval(&self) -> TimeDelta {
        i64::try_from(self.interval_seconds)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .unwrap_or(TimeDelta::MAX)
    }

    pub fn retention(&self) -> TimeDelta {
        i64::try_from(self.retention_period_hours)
            .ok()
            .and_then(TimeDelta::try_hours)
            .unwrap_or(TimeDelta::MAX)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelTarget {
    pub label: Matcher,
    #[serde(rename = "intervalSeconds", default)]
    pub interval_seconds: u64,
    #[serde(rename = "retentionPeriodHours", default)]
    pub retention_period_hours: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescriptionTarget {
    pub description: Matcher,
    #[serde(rename = "intervalSeconds", default)]
    pub interval_seconds: u64,
    #[serde(rename = "retentionPeriodHours", default)]
    pub retention_period_hours: u64,
}

/// The policy document loaded once at startup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotConfigs {
    #[serde(rename = "Labels", alias = "labels", default)]
    pub labels: Vec<LabelTarget>,
    #[serde(rename = "Descriptions", alias = "descriptions", default)]
    pub descriptions: Vec<DescriptionTarget>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    Label(Matcher),
    Description(Matcher),
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::Label(m) => write!(f, "label {m}"),
            Selector::Description(m) => write!(f, "description {m}"),
        }
    }
}

/// One policy unit: which disks, and how often / how long to keep their snapshots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub selector: Selector,
    pub policy: Policy,
}

impl SnapshotConfigs {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (index, t) in self.labels.iter().enumerate() {
            if t.label.key.is_empty() {
                return Err(ConfigError::EmptyKey {
                    kind: "label",
                    index,
                });
            }
        }
        for (index, t) in self.descriptions.iter().enumerate() {
            if t.description.key.is_empty() {
                return Err(ConfigError::EmptyKey {
                    kind: "description",
                    index,
                });
            }
        }
        Ok(())
    }

    /// Flattens the document into targets, label targets first.
    pub fn targets(&self) -> Vec<Target> {
        let labels = self.labels.iter().map(|t| Target {
            selector: Selector::Label(t.label.clone()),
            policy: Policy {
                interval_seconds: t.interval_seconds,
                retention_period_hours: t.retention_period_hours,
            },
        });
        let descriptions = self.descriptions.iter().map(|t| Target {
            selector: Selector::Description(t.description.clone()),
            policy: Policy {
                interval_seconds: t.interval_seconds,
                retention_period_hours: t.retention_period_hours,
            },
        });
        labels.chain(descriptions).collect()
    }
}

/// Read and validate the snapshot policy file. `.json` files go through serde_json,
/// everything else through serde_yaml.
pub fn load_snapshot_configs<P: AsRef<Path>>(path: P) -> Result<SnapshotConfigs, ConfigError> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;
    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    let cfg: SnapshotConfigs = if is_json {
        serde_json::from_str(&content)?
    } else {
        serde_yaml::from_str(&content)?
    };
    cfg.validate()?;
    Ok(cfg)
}
