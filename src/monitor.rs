//! Polling loop of one monitored interface.
//!
//! Každé rozhraní má vlastní task s vlastním předchozím vzorkem a vlastní
//! dávkou; mezi tasky se nesdílí žádný měnitelný stav.

use std::{sync::Arc, time::Duration};

use crate::{
    batch::BatchBuffer,
    config::{Config, DisplayMode, RateMode},
    display::{self, DisplayLines},
    error::MonitorError,
    netdev::InterfaceSample,
    rate,
    sampler::Sampler,
    upload::Uploader,
};

/// Read-only část pipeline sdílená všemi tasky.
pub struct Pipeline {
    pub sampler: Sampler,
    pub batches: BatchBuffer,
    /// `None`, pokud je dávkování vypnuté (`UPLOAD_BATCH_SIZE=0`).
    pub uploader: Option<Uploader>,
    pub poll_interval: Duration,
    pub rate_mode: RateMode,
    pub display_mode: DisplayMode,
}

impl Pipeline {
    pub fn from_config(cfg: &Config) -> Self {
        let batches = BatchBuffer::new(cfg.upload.batch_size);
        let uploader = batches.is_enabled().then(|| Uploader::new(&cfg.upload));

        Self {
            sampler: Sampler::new(&cfg.netdev_path, cfg.malformed_rows),
            batches,
            uploader,
            poll_interval: cfg.poll_interval,
            rate_mode: cfg.rate_mode,
            display_mode: cfg.display_mode,
        }
    }
}

pub struct InterfaceMonitor {
    interface: String,
    pipeline: Arc<Pipeline>,
    previous: Option<InterfaceSample>,
    batch: Vec<InterfaceSample>,
}

impl InterfaceMonitor {
    pub fn new(pipeline: Arc<Pipeline>, interface: impl Into<String>) -> Self {
        Self {
            interface: interface.into(),
            pipeline,
            previous: None,
            batch: Vec::new(),
        }
    }

    /// Počet vzorků čekajících na další flush.
    pub fn pending(&self) -> usize {
        self.batch.len()
    }

    /// Jeden poll: přečíst vzorek, spočítat řádky pro displej, přidat do dávky
    /// a případně dávku odeslat.
    ///
    /// Upload blokuje jen tenhle task, ostatní rozhraní běží dál. Vrací `None`,
    /// pokud rozhraní v tomhle čtení chybí nebo ještě nemáme s čím porovnat.
    pub async fn tick(&mut self) -> Result<Option<DisplayLines>, MonitorError> {
        let Some(current) = self.pipeline.sampler.sample_one(&self.interface)? else {
            tracing::debug!(interface = %self.interface, "interface not present, skipping cycle");
            return Ok(None);
        };

        let lines = match self.pipeline.display_mode {
            DisplayMode::Totals => Some(display::totals_lines(&current)),
            DisplayMode::Rate => self.previous.as_ref().map(|previous| {
                display::rate_lines(
                    &self.interface,
                    rate::rate(previous, &current),
                    rate::elapsed_secs(previous, &current),
                    self.pipeline.rate_mode,
                )
            }),
        };

        let batch = std::mem::take(&mut self.batch);
        let (batch, flushed) = self
            .pipeline
            .batches
            .add_and_maybe_flush(batch, current.clone());
        self.batch = batch;
        tracing::trace!(interface = %self.interface, pending = self.pending(), "sample queued");

        if let (Some(full), Some(uploader)) = (flushed, self.pipeline.uploader.as_ref()) {
            uploader.deliver(full).await;
        }

        self.previous = Some(current);
        Ok(lines)
    }

    /// Běží, dokud nenastane fatální chyba (nečitelný zdroj, strict parse).
    pub async fn run(mut self) -> Result<(), MonitorError> {
        tracing::info!(interface = %self.interface, "monitoring interface");

        loop {
            if let Some(lines) = self.tick().await? {
                // výstup pro konzumenta displeje, ne log
                print!("{lines}");
            }
            tokio::time::sleep(self.pipeline.poll_interval).await;
        }
    }
}
