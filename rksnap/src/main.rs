use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use common::load_snapshot_configs;
use libsnapshot::reconciler::{Reconciler, ReconcilerConfig};
use rksnap::cli::Cli;
use rksnap::compute::{GceClient, auth};
use rksnap::metrics::PrometheusReporter;
use rksnap::{http, logging};
use tracing::{debug, error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(&cli.log_level)?;

    let configs = load_snapshot_configs(&cli.conf_file)
        .with_context(|| format!("failed to load {}", cli.conf_file.display()))?;
    debug!("reading configuration");
    for d in &configs.descriptions {
        debug!("description: {}", d.description);
    }
    for l in &configs.labels {
        debug!("label: {}", l.label);
    }
    let targets = configs.targets();

    let reporter = Arc::new(PrometheusReporter::new());
    let handle = reporter.handle();
    let listen_addr = cli.listen_addr;
    tokio::spawn(async move {
        if let Err(e) = http::serve(listen_addr, handle).await {
            error!("{e:#}");
        }
    });

    let client = GceClient::new(&cli.project, &cli.snap_prefix, auth::default_token_source())?
        .with_base_url(&cli.compute_endpoint);
    let reconciler = Reconciler::new(
        Arc::new(client),
        reporter,
        ReconcilerConfig::new(cli.zones.clone()),
    );

    info!(
        project = %cli.project,
        zones = ?cli.zones,
        targets = targets.len(),
        "starting snapshot reconciliation every {}s",
        cli.watch_interval
    );
    tokio::select! {
        _ = reconciler.run(&targets, Duration::from_secs(cli.watch_interval)) => {}
        res = tokio::signal::ctrl_c() => {
            res.context("failed to listen for shutdown signal")?;
            info!("shutting down, in-flight operations are abandoned");
        }
    }
    Ok(())
}
