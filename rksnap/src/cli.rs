use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use clap::builder::NonEmptyStringValueParser;

use crate::compute::DEFAULT_COMPUTE_ENDPOINT;

#[derive(Parser, Debug)]
#[command(
    name = "rksnap",
    version,
    about = "Creates and expires GCE disk snapshots according to a retention policy"
)]
pub struct Cli {
    /// GCP project to use
    #[arg(
        long,
        env = "RKSNAP_PROJECT",
        value_parser = NonEmptyStringValueParser::new()
    )]
    pub project: String,

    /// Comma separated list of zones where the project's disks may live
    #[arg(
        long,
        env = "RKSNAP_ZONES",
        required = true,
        value_delimiter = ',',
        value_parser = NonEmptyStringValueParser::new()
    )]
    pub zones: Vec<String>,

    /// Path of the file holding the label and description targets
    #[arg(long = "conf-file", alias = "conf_file", env = "RKSNAP_CONF_FILE")]
    pub conf_file: PathBuf,

    /// Prefix for created snapshots
    #[arg(
        long,
        alias = "snap_prefix",
        env = "RKSNAP_SNAP_PREFIX",
        default_value = ""
    )]
    pub snap_prefix: String,

    /// Interval between watch cycles in seconds
    #[arg(
        long,
        alias = "watch_interval",
        env = "RKSNAP_WATCH_INTERVAL",
        default_value_t = 60,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub watch_interval: u64,

    /// Log level; RUST_LOG takes precedence when set
    #[arg(
        long,
        alias = "log_level",
        env = "RKSNAP_LOG_LEVEL",
        default_value = "info"
    )]
    pub log_level: String,

    /// Address of the metrics and health endpoints
    #[arg(long, env = "RKSNAP_LISTEN_ADDR", default_value = "0.0.0.0:5000")]
    pub listen_addr: SocketAddr,

    /// Compute Engine API base URL
    #[arg(
        long,
        env = "RKSNAP_COMPUTE_ENDPOINT",
        default_value = DEFAULT_COMPUTE_ENDPOINT,
        hide = true
    )]
    pub compute_endpoint: String,
}
