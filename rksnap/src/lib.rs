pub mod cli;
pub mod compute;
pub mod http;
pub mod logging;
pub mod metrics;
