use std::{collections::HashMap, env, net::SocketAddr, path::PathBuf, time::Duration};

use anyhow::{Context, Result, bail};
use hyper::Uri;
use regex::Regex;

use crate::netdev::MalformedRowPolicy;

/// Jak se v konzoli ukazuje propustnost.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateMode {
    /// Surová delta za jeden poll, vydávaná za bytes/sec.
    Delta,
    /// Delta vydělená skutečně uběhlým časem mezi vzorky.
    PerSecond,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayMode {
    /// Receiving/Transmitting v bytes/sec.
    Rate,
    /// Kumulativní Received/Transmitted čítače.
    Totals,
}

#[derive(Debug, Clone)]
pub struct UploadConfig {
    /// Cílový endpoint kolektoru (POST, application/json).
    pub url: Uri,

    /// Maximální velikost dávky; 0 = upload vypnutý.
    pub batch_size: usize,

    /// Timeout jednoho HTTP volání.
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Soubor se statistikami rozhraní, typicky /proc/net/dev.
    pub netdev_path: PathBuf,

    /// Jak často se čtou čítače. Default 1s, minimum 1s.
    pub poll_interval: Duration,

    pub upload: UploadConfig,

    /// Pokud je nastaveno, sledují se jen rozhraní, která regexu odpovídají.
    pub interface_filter: Option<Regex>,

    pub rate_mode: RateMode,
    pub display_mode: DisplayMode,
    pub malformed_rows: MalformedRowPolicy,

    /// Adresa, na které poslouchá kolektor (`bandwidth-monitor collector`).
    pub collector_listen: SocketAddr,

    /// Prefix / namespace pro metriky kolektoru
    pub metrics_prefix: Option<String>,

    /// Statické labely nalepené na všechny metriky kolektoru
    pub static_labels: HashMap<String, String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Stejné jako `from_env`, jen s vlastním zdrojem hodnot (kvůli testům).
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let netdev_path = lookup("NETDEV_PATH").unwrap_or_else(|| "/proc/net/dev".to_string());

        let poll_interval_secs = lookup("POLL_INTERVAL_SECS")
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(1)
            .max(1); // nechceme 0 → busy loop

        let url = lookup("UPLOAD_URL")
            .unwrap_or_else(|| "http://localhost:8080/bandwidth/upload".to_string())
            .parse::<Uri>()
            .context("UPLOAD_URL parse error")?;

        let batch_size = lookup("UPLOAD_BATCH_SIZE")
            .map(|s| s.trim().parse::<usize>())
            .transpose()
            .context("UPLOAD_BATCH_SIZE parse error")?
            .unwrap_or(5);

        let timeout_secs = lookup("UPLOAD_TIMEOUT_SECS")
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(10)
            .max(1);

        let interface_filter = lookup("NET_INTERFACES")
            .filter(|s| !s.trim().is_empty())
            .map(|s| Regex::new(s.trim()))
            .transpose()
            .context("NET_INTERFACES is not a valid regex")?;

        let rate_mode = parse_rate_mode(lookup("RATE_MODE").as_deref())?;
        let display_mode = parse_display_mode(lookup("DISPLAY_MODE").as_deref())?;
        let malformed_rows = parse_malformed_rows(lookup("MALFORMED_ROWS").as_deref())?;

        let listen = lookup("COLLECTOR_LISTEN").unwrap_or_else(|| "0.0.0.0:8080".to_string());
        let collector_listen: SocketAddr =
            listen.parse().context("COLLECTOR_LISTEN parse error")?;

        let metrics_prefix = lookup("METRICS_PREFIX")
            .and_then(normalize_prefix)
            .or_else(|| lookup("METRICS_NAMESPACE").and_then(normalize_prefix));

        let static_labels =
            parse_static_labels(&lookup("METRICS_STATIC_LABELS").unwrap_or_default());

        Ok(Self {
            netdev_path: PathBuf::from(netdev_path),
            poll_interval: Duration::from_secs(poll_interval_secs),
            upload: UploadConfig {
                url,
                batch_size,
                timeout: Duration::from_secs(timeout_secs),
            },
            interface_filter,
            rate_mode,
            display_mode,
            malformed_rows,
            collector_listen,
            metrics_prefix,
            static_labels,
        })
    }

    /// Má se rozhraní sledovat? Bez filtru ano, vždy.
    pub fn monitors(&self, interface_name: &str) -> bool {
        self.interface_filter
            .as_ref()
            .is_none_or(|re| re.is_match(interface_name))
    }
}

fn parse_rate_mode(raw: Option<&str>) -> Result<RateMode> {
    match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
        None | Some("") | Some("per_second") => Ok(RateMode::PerSecond),
        Some("delta") => Ok(RateMode::Delta),
        Some(other) => bail!("RATE_MODE must be 'delta' or 'per_second', got {other:?}"),
    }
}

fn parse_display_mode(raw: Option<&str>) -> Result<DisplayMode> {
    match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
        None | Some("") | Some("rate") => Ok(DisplayMode::Rate),
        Some("totals") => Ok(DisplayMode::Totals),
        Some(other) => bail!("DISPLAY_MODE must be 'rate' or 'totals', got {other:?}"),
    }
}

fn parse_malformed_rows(raw: Option<&str>) -> Result<MalformedRowPolicy> {
    match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
        None | Some("") | Some("skip") => Ok(MalformedRowPolicy::Skip),
        Some("fail") => Ok(MalformedRowPolicy::Fail),
        Some(other) => bail!("MALFORMED_ROWS must be 'skip' or 'fail', got {other:?}"),
    }
}

fn parse_static_labels(s: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();
    if s.trim().is_empty() {
        return map;
    }

    for pair in s.split(',') {
        let pair = pair.trim();
        if pair.is_empty() {
            continue;
        }
        if let Some((k, v)) = pair.split_once('=') {
            let key = k.trim();
            let val = v.trim();
            if !key.is_empty() {
                map.insert(key.to_string(), val.to_string());
            }
        }
    }

    map
}

fn normalize_prefix(raw: String) -> Option<String> {
    let trimmed = raw.trim();

    if trimmed.is_empty() {
        return None;
    }

    // ořežeme všechny trailing '_' a pak přidáme přesně jeden
    let trimmed = trimmed.trim_end_matches('_');
    if trimmed.is_empty() {
        return None;
    }

    Some(format!("{trimmed}_"))
}
