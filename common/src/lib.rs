pub mod resource;
pub mod target;

pub use resource::{Disk, OWNER_LABEL, OWNER_LABEL_VALUE, Snapshot, snapshot_name};
pub use target::{
    ConfigError, DescriptionTarget, LabelTarget, Matcher, Policy, Selector, SnapshotConfigs,
    Target, load_snapshot_configs,
};
