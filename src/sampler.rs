use std::path::{Path, PathBuf};

use time::OffsetDateTime;

use crate::{
    error::MonitorError,
    netdev::{self, InterfaceSample, MalformedRowPolicy},
};

/// Čte statistiky rozhraní vždy znovu ze souboru, nic se necachuje.
#[derive(Debug, Clone)]
pub struct Sampler {
    path: PathBuf,
    policy: MalformedRowPolicy,
}

impl Sampler {
    pub fn new(path: impl Into<PathBuf>, policy: MalformedRowPolicy) -> Self {
        Self {
            path: path.into(),
            policy,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Všechna rozhraní z jednoho konzistentního snapshotu souboru.
    pub fn sample_all(&self) -> Result<Vec<InterfaceSample>, MonitorError> {
        // celý soubor jedním čtením - nikdy nevidíme polovinu řádku
        let raw =
            std::fs::read_to_string(&self.path).map_err(|source| MonitorError::SourceUnreadable {
                path: self.path.clone(),
                source,
            })?;

        netdev::parse(&raw, OffsetDateTime::now_utc(), self.policy)
    }

    /// First record named `interface_name`, or `None` when the interface is
    /// not present in this read.
    pub fn sample_one(&self, interface_name: &str) -> Result<Option<InterfaceSample>, MonitorError> {
        Ok(self
            .sample_all()?
            .into_iter()
            .find(|s| s.interface_name == interface_name))
    }
}
