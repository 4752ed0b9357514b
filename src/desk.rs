//! The label desk: queue, adapters and the operations a user performs.
//!
//! [`LabelDesk`] is what the CLI (or any other front end) talks to. It owns
//! the [`LabelStore`] and the three adapters, and exposes the user actions:
//! add files, remove one label, clear the queue, export the ready labels as a
//! PDF, print one label directly, and report which optional capabilities are
//! available.
//!
//! Adding files spawns one Tokio task per label with no concurrency limit;
//! labels are independent and finish in any order.

use crate::config::DeskConfig;
use crate::document::{assemble_labels_async, save_document, LabelDocument};
use crate::error::DeskError;
use crate::item::{LabelId, LabelItem, LabelStatus};
use crate::pipeline::extract::{resolve_extractor, Extractor};
use crate::pipeline::ingest::collect_label_files;
use crate::pipeline::process::{process_label, PipelineContext, PipelineOutcome};
use crate::pipeline::render::{LabelaryRasterizer, Rasterizer};
use crate::printer::{print_markup, PrintTransport, SerialTransport};
use crate::store::LabelStore;
use futures::future::join_all;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::{JoinError, JoinHandle};
use tracing::{info, warn};

/// Optional capabilities, shown to the user as status indicators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Capabilities {
    /// An LLM credential is configured; shipment fields will be extracted.
    pub extraction: bool,
    /// The serial transport is usable on this system.
    pub direct_print: bool,
}

/// Pipelines started by one [`LabelDesk::add_files`] call.
///
/// The pipelines run on their own tasks; dropping the batch does not stop
/// them.
pub struct IngestBatch {
    /// Ids of the queued labels, in queue order.
    pub ids: Vec<LabelId>,
    pub(crate) handles: Vec<JoinHandle<PipelineOutcome>>,
    pub(crate) ctx: PipelineContext,
}

impl IngestBatch {
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Wait for every pipeline of the batch to settle.
    ///
    /// Returns the outcome per label, in queue order.
    pub async fn settle(self) -> Vec<PipelineOutcome> {
        let total = self.ids.len();
        let outcomes: Vec<PipelineOutcome> = join_all(self.handles)
            .await
            .into_iter()
            .map(joined_outcome)
            .collect();

        let ready = outcomes
            .iter()
            .filter(|o| **o == PipelineOutcome::Settled(LabelStatus::Ready))
            .count();
        report_batch_complete(&self.ctx, total, ready);
        outcomes
    }
}

/// Flatten a finished pipeline task; a panicked task counts as discarded.
pub(crate) fn joined_outcome(joined: Result<PipelineOutcome, JoinError>) -> PipelineOutcome {
    match joined {
        Ok(outcome) => outcome,
        Err(e) => {
            warn!("Label pipeline task failed: {}", e);
            PipelineOutcome::Discarded
        }
    }
}

pub(crate) fn report_batch_complete(ctx: &PipelineContext, total: usize, ready: usize) {
    info!("Batch settled: {}/{} labels ready", ready, total);
    if let Some(ref cb) = ctx.progress {
        cb.on_batch_complete(total, ready);
    }
}

/// Queue of labels plus the services that process them.
#[derive(Clone)]
pub struct LabelDesk {
    config: DeskConfig,
    ctx: PipelineContext,
    transport: Arc<dyn PrintTransport>,
}

impl LabelDesk {
    /// Build a desk with the real adapters described by `config`:
    /// Labelary over HTTP, an LLM extractor if a key is configured, and the
    /// serial port transport.
    pub fn from_config(config: DeskConfig) -> Result<Self, DeskError> {
        let rasterizer = Arc::new(LabelaryRasterizer::from_config(&config)?);
        let extractor = resolve_extractor(&config);
        let transport = Arc::new(SerialTransport::from_device(config.device.as_deref()));
        Ok(Self::with_adapters(config, rasterizer, extractor, transport))
    }

    /// Build a desk from explicit adapters.
    pub fn with_adapters(
        config: DeskConfig,
        rasterizer: Arc<dyn Rasterizer>,
        extractor: Option<Arc<dyn Extractor>>,
        transport: Arc<dyn PrintTransport>,
    ) -> Self {
        let ctx = PipelineContext {
            store: LabelStore::new(),
            rasterizer,
            extractor,
            progress: config.progress_callback.clone(),
        };
        Self {
            config,
            ctx,
            transport,
        }
    }

    pub fn config(&self) -> &DeskConfig {
        &self.config
    }

    pub fn store(&self) -> &LabelStore {
        &self.ctx.store
    }

    pub fn capabilities(&self) -> Capabilities {
        Capabilities {
            extraction: self.ctx.extractor.is_some(),
            direct_print: self.transport.is_supported(),
        }
    }

    // ── Ingestion ────────────────────────────────────────────────────────

    /// Queue the label files among `inputs` and start their pipelines.
    ///
    /// Non-label files are dropped; directories are walked. Must be called
    /// from within a Tokio runtime.
    pub fn add_files<P: AsRef<Path>>(&self, inputs: &[P]) -> IngestBatch {
        let files = collect_label_files(inputs);
        self.spawn_pipelines(files)
    }

    /// [`add_files`](Self::add_files) and wait for every label to settle.
    pub async fn process_files<P: AsRef<Path>>(&self, inputs: &[P]) -> Vec<LabelId> {
        let batch = self.add_files(inputs);
        let ids = batch.ids.clone();
        batch.settle().await;
        ids
    }

    fn enqueue(&self, files: Vec<PathBuf>) -> Vec<(LabelId, PathBuf)> {
        let items: Vec<LabelItem> = files.iter().map(LabelItem::pending).collect();
        let queued: Vec<(LabelId, PathBuf)> =
            items.iter().map(|i| (i.id, i.source.clone())).collect();
        self.ctx.store.append(items);

        info!("Queued {} label file(s)", queued.len());
        if let Some(ref cb) = self.ctx.progress {
            cb.on_batch_start(queued.len());
        }
        queued
    }

    fn spawn_pipelines(&self, files: Vec<PathBuf>) -> IngestBatch {
        let queued = self.enqueue(files);
        let mut ids = Vec::with_capacity(queued.len());
        let mut handles = Vec::with_capacity(queued.len());

        for (id, source) in queued {
            let ctx = self.ctx.clone();
            ids.push(id);
            handles.push(tokio::spawn(async move {
                process_label(&ctx, id, &source).await
            }));
        }

        IngestBatch {
            ids,
            handles,
            ctx: self.ctx.clone(),
        }
    }

    // ── Queue actions ────────────────────────────────────────────────────

    pub fn items(&self) -> Vec<LabelItem> {
        self.ctx.store.snapshot()
    }

    pub fn get(&self, id: LabelId) -> Option<LabelItem> {
        self.ctx.store.get(id)
    }

    pub fn ready_items(&self) -> Vec<LabelItem> {
        self.ctx.store.ready_items()
    }

    /// Remove one label. In-flight work for it finishes and is discarded.
    pub fn remove(&self, id: LabelId) -> bool {
        self.ctx.store.remove(id)
    }

    /// Empty the queue. In-flight work finishes and is discarded.
    pub fn clear(&self) -> usize {
        self.ctx.store.clear()
    }

    // ── Output ───────────────────────────────────────────────────────────

    /// Assemble the ready labels into a PDF without saving it.
    pub async fn assemble_pdf(&self) -> Result<Option<LabelDocument>, DeskError> {
        assemble_labels_async(self.ready_items(), self.config.geometry).await
    }

    /// Assemble the ready labels and save them to `path` (or the configured
    /// default). Returns `Ok(None)` and writes nothing when no label is ready.
    pub async fn export_pdf(&self, path: Option<&Path>) -> Result<Option<PathBuf>, DeskError> {
        let Some(doc) = self.assemble_pdf().await? else {
            info!("No ready labels; nothing to export");
            return Ok(None);
        };
        let target = path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.config.output_path.clone());
        tokio::task::spawn_blocking(move || save_document(&doc, &target))
            .await
            .map_err(|e| DeskError::Internal(format!("PDF write task panicked: {}", e)))?
            .map(Some)
    }

    /// Send the raw markup of a queued label to the printer.
    ///
    /// A label whose file has not been read yet, or could not be read, is
    /// refused before the device is touched.
    pub async fn print_label(&self, id: LabelId) -> Result<(), DeskError> {
        let item = self.get(id).ok_or(DeskError::UnknownLabel { id })?;
        if item.raw_content.is_empty() {
            return Err(DeskError::NothingToPrint { name: item.name });
        }
        self.print_markup(&item.raw_content).await
    }

    /// Send arbitrary markup to the printer.
    pub async fn print_markup(&self, markup: &str) -> Result<(), DeskError> {
        print_markup(Arc::clone(&self.transport), markup, self.config.baud_rate)
            .await
            .map_err(DeskError::from)
    }
}
