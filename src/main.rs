mod batch;
mod collector;
mod config;
mod display;
mod error;
mod logging;
mod metrics;
mod monitor;
mod netdev;
mod rate;
mod sampler;
mod upload;

use std::{env, sync::Arc};

use anyhow::{Context, Result, bail};
use tokio::task::JoinSet;

use crate::{
    config::Config,
    monitor::{InterfaceMonitor, Pipeline},
};

#[tokio::main]
async fn main() -> Result<()> {
    logging::init();
    let cfg = Config::from_env()?;

    match env::args().nth(1).as_deref() {
        None | Some("agent") => run_agent(&cfg).await,
        Some("collector") => collector::run(&cfg).await,
        Some(other) => bail!("unknown command {other:?}, expected 'agent' or 'collector'"),
    }
}

async fn run_agent(cfg: &Config) -> Result<()> {
    let pipeline = Arc::new(Pipeline::from_config(cfg));

    // Seznam rozhraní se bere z prvního čtení; co přibude později, se nesleduje.
    let mut interfaces: Vec<String> = Vec::new();
    for sample in pipeline
        .sampler
        .sample_all()
        .context("initial read of network statistics")?
    {
        if cfg.monitors(&sample.interface_name) && !interfaces.contains(&sample.interface_name) {
            interfaces.push(sample.interface_name);
        }
    }

    if interfaces.is_empty() {
        bail!(
            "no interface in {} to monitor (NET_INTERFACES filter: {:?})",
            pipeline.sampler.path().display(),
            cfg.interface_filter.as_ref().map(|re| re.as_str())
        );
    }

    tracing::info!(
        source = %pipeline.sampler.path().display(),
        interfaces = ?interfaces,
        poll_interval = ?cfg.poll_interval,
        batch_size = cfg.upload.batch_size,
        upload_url = %cfg.upload.url,
        upload_timeout = ?cfg.upload.timeout,
        "starting bandwidth monitor"
    );
    if let Some(uploader) = &pipeline.uploader {
        tracing::info!(url = %uploader.url(), "batched upload enabled");
    } else {
        tracing::info!("batched upload disabled (UPLOAD_BATCH_SIZE=0)");
    }

    let mut tasks = JoinSet::new();
    for name in interfaces {
        tasks.spawn(InterfaceMonitor::new(pipeline.clone(), name).run());
    }

    // Tasky běží do konce procesu; vrátí se jen při fatální chybě.
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                let err = anyhow::Error::new(e);
                crate::log_anyhow_with_source!(err, "interface monitor stopped");
                return Err(err);
            }
            Err(e) => return Err(e).context("interface monitor task failed"),
        }
    }

    Ok(())
}
