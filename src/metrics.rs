use std::collections::HashMap;

use anyhow::{Context, Result};
use prometheus::{IntCounter, IntGaugeVec, Opts, Registry};

use crate::{config::Config, netdev::InterfaceSample};

/// Metriky kolektoru: co přišlo přes /bandwidth/upload.
pub struct CollectorMetrics {
    pub registry: Registry,

    pub batches_total: IntCounter,
    pub samples_total: IntCounter,
    pub rejected_batches_total: IntCounter,

    /// Poslední nahlášené kumulativní `bytes` čítače.
    /// Labels: interface="eth0|lo|..."
    pub received_bytes: IntGaugeVec,
    pub transmitted_bytes: IntGaugeVec,
}

impl CollectorMetrics {
    pub fn new(cfg: &Config) -> Result<Self> {
        let registry = Registry::new_custom(None, None)?;

        let batches_total = int_counter(
            &registry,
            cfg,
            "bandwidth_upload_batches_total",
            "Number of sample batches accepted by the collector",
        )?;

        let samples_total = int_counter(
            &registry,
            cfg,
            "bandwidth_upload_samples_total",
            "Number of interface samples accepted by the collector",
        )?;

        let rejected_batches_total = int_counter(
            &registry,
            cfg,
            "bandwidth_upload_rejected_batches_total",
            "Number of upload requests whose body was not a valid sample batch",
        )?;

        let received_bytes = int_gauge_vec(
            &registry,
            cfg,
            "bandwidth_interface_received_bytes",
            "Last reported cumulative received bytes per interface",
            &["interface"],
        )?;

        let transmitted_bytes = int_gauge_vec(
            &registry,
            cfg,
            "bandwidth_interface_transmitted_bytes",
            "Last reported cumulative transmitted bytes per interface",
            &["interface"],
        )?;

        Ok(Self {
            registry,
            batches_total,
            samples_total,
            rejected_batches_total,
            received_bytes,
            transmitted_bytes,
        })
    }

    /// Započítá přijatou dávku. Vzorky jdou v pořadí, takže poslední vyhrává.
    pub fn record_batch(&self, batch: &[InterfaceSample]) {
        self.batches_total.inc();
        self.samples_total.inc_by(batch.len() as u64);

        for sample in batch {
            let labels = [sample.interface_name.as_str()];
            self.received_bytes
                .with_label_values(&labels)
                .set(clamp_i64(sample.received_bytes()));
            self.transmitted_bytes
                .with_label_values(&labels)
                .set(clamp_i64(sample.transmitted_bytes()));
        }
    }
}

fn clamp_i64(v: u64) -> i64 {
    i64::try_from(v).unwrap_or(i64::MAX)
}

fn make_opts(
    name: &str,
    help: &str,
    namespace: Option<String>,
    const_labels: HashMap<String, String>,
) -> Opts {
    let mut opts = Opts::new(name, help);
    if let Some(ns) = namespace {
        // prefix už má trailing '_', Opts si oddělovač přidá sám
        let ns = ns.trim_end_matches('_').to_string();
        if !ns.is_empty() {
            opts = opts.namespace(ns);
        }
    }
    if !const_labels.is_empty() {
        opts = opts.const_labels(const_labels);
    }
    opts
}

fn int_counter(registry: &Registry, cfg: &Config, name: &str, help: &str) -> Result<IntCounter> {
    let opts = make_opts(
        name,
        help,
        cfg.metrics_prefix.clone(),
        cfg.static_labels.clone(),
    );
    let c = IntCounter::with_opts(opts).context(format!("create int counter {}", name))?;
    registry
        .register(Box::new(c.clone()))
        .context(format!("register int counter {}", name))?;
    Ok(c)
}

fn int_gauge_vec(
    registry: &Registry,
    cfg: &Config,
    name: &str,
    help: &str,
    label_names: &[&str],
) -> Result<IntGaugeVec> {
    let opts = make_opts(
        name,
        help,
        cfg.metrics_prefix.clone(),
        cfg.static_labels.clone(),
    );
    let v = IntGaugeVec::new(opts, label_names)
        .context(format!("create int gauge vec {}", name))?;
    registry
        .register(Box::new(v.clone()))
        .context(format!("register int gauge vec {}", name))?;
    Ok(v)
}
