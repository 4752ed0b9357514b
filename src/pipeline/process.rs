//! The per-label pipeline: read → (render ‖ extract) → write back.
//!
//! Render and extraction are independent, so they are issued together and
//! joined. The results are written back in a single store patch keyed by the
//! label id. Nothing here is cancelled: if the label was removed while its
//! calls were in flight, the calls still finish and the write-back finds no
//! item and does nothing.

use crate::item::{LabelId, LabelStatus, RenderedPreview, ShipmentMetadata};
use crate::pipeline::extract::Extractor;
use crate::pipeline::ingest::read_markup;
use crate::pipeline::render::Rasterizer;
use crate::progress::ProgressCallback;
use crate::store::LabelStore;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Shared collaborators for every pipeline of a desk.
#[derive(Clone)]
pub struct PipelineContext {
    pub store: LabelStore,
    pub rasterizer: Arc<dyn Rasterizer>,
    pub extractor: Option<Arc<dyn Extractor>>,
    pub progress: Option<ProgressCallback>,
}

/// Final state of one pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineOutcome {
    /// Settled with the given status and written back.
    Settled(LabelStatus),
    /// Settled, but the label had been removed; the result was discarded.
    Discarded,
}

/// Run the pipeline for the queued label `id`, reading markup from `source`.
pub async fn process_label(ctx: &PipelineContext, id: LabelId, source: &Path) -> PipelineOutcome {
    let start = Instant::now();
    let name = display_name(source);

    let markup = match read_markup(source).await {
        Ok(text) => text,
        Err(e) => {
            warn!("{}: could not read label file: {}", name, e);
            let applied = ctx.store.patch(id, |item| item.status = LabelStatus::Error);
            if let Some(ref cb) = ctx.progress {
                cb.on_label_error(id, &name);
            }
            return outcome(applied, LabelStatus::Error);
        }
    };

    ctx.store.patch(id, |item| {
        item.raw_content = markup.clone();
        item.status = LabelStatus::Processing;
    });
    if let Some(ref cb) = ctx.progress {
        cb.on_label_start(id, &name);
    }

    let (preview, metadata) = render_and_extract(ctx, &markup).await;
    let status = settle_status(preview.as_ref());
    let has_metadata = metadata.is_some();

    let applied = ctx.store.patch(id, |item| {
        item.preview = preview;
        item.metadata = metadata;
        item.status = status;
    });

    debug!(
        "{}: {} (metadata: {}) in {:?}",
        name,
        status,
        has_metadata,
        start.elapsed()
    );

    if let Some(ref cb) = ctx.progress {
        match status {
            LabelStatus::Ready => cb.on_label_ready(id, &name, has_metadata),
            _ => cb.on_label_error(id, &name),
        }
    }

    outcome(applied, status)
}

/// Issue both remote calls and wait for both to settle.
async fn render_and_extract(
    ctx: &PipelineContext,
    markup: &str,
) -> (Option<RenderedPreview>, Option<ShipmentMetadata>) {
    let render = ctx.rasterizer.rasterize(markup);
    let extract = async {
        match ctx.extractor {
            Some(ref extractor) => extractor.extract(markup).await,
            None => None,
        }
    };
    tokio::join!(render, extract)
}

/// A label is ready exactly when the rasterizer produced a non-empty preview.
pub fn settle_status(preview: Option<&RenderedPreview>) -> LabelStatus {
    match preview {
        Some(p) if !p.is_empty() => LabelStatus::Ready,
        _ => LabelStatus::Error,
    }
}

fn outcome(applied: bool, status: LabelStatus) -> PipelineOutcome {
    if applied {
        PipelineOutcome::Settled(status)
    } else {
        PipelineOutcome::Discarded
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
