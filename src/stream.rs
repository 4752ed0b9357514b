//! Streaming ingestion: emit labels as their pipelines settle.
//!
//! [`LabelDesk::process_files`] returns only after every label is done.
//! [`ingest_stream`] instead yields a snapshot of each label the moment its
//! render and extraction have both finished, so a front end can show cards
//! as they arrive. Order is completion order, not queue order.
//!
//! The pipelines are spawned when [`ingest_stream`] is called, exactly as
//! with [`LabelDesk::add_files`]. Polling the stream only observes them:
//! a stream that is dropped or never polled still leaves every label
//! settled in the queue. Labels removed from the queue while in flight are
//! not yielded.

use crate::desk::{joined_outcome, report_batch_complete, LabelDesk};
use crate::item::{LabelId, LabelItem, LabelStatus};
use crate::pipeline::process::{PipelineContext, PipelineOutcome};
use futures::future::{BoxFuture, FutureExt};
use futures::stream::{self, FuturesUnordered, StreamExt};
use std::path::Path;
use std::pin::Pin;
use tokio_stream::Stream;
use tracing::info;

/// A boxed stream of settled labels.
pub type LabelStream = Pin<Box<dyn Stream<Item = LabelItem> + Send>>;

type Settling = FuturesUnordered<BoxFuture<'static, (LabelId, PipelineOutcome)>>;

struct StreamState {
    settling: Settling,
    ctx: PipelineContext,
    total: usize,
    ready: usize,
}

/// Queue the label files among `inputs`, start their pipelines, and stream
/// each label back as it settles.
///
/// `on_batch_complete` fires once the stream is exhausted.
pub fn ingest_stream<P: AsRef<Path>>(desk: &LabelDesk, inputs: &[P]) -> LabelStream {
    let batch = desk.add_files(inputs);
    let total = batch.len();

    let settling: Settling = batch
        .ids
        .into_iter()
        .zip(batch.handles)
        .map(|(id, handle)| handle.map(move |joined| (id, joined_outcome(joined))).boxed())
        .collect();

    let state = StreamState {
        settling,
        ctx: batch.ctx,
        total,
        ready: 0,
    };

    info!("Streaming {} label(s)", total);
    Box::pin(stream::unfold(Some(state), next_settled))
}

async fn next_settled(state: Option<StreamState>) -> Option<(LabelItem, Option<StreamState>)> {
    let mut state = state?;
    while let Some((id, outcome)) = state.settling.next().await {
        let PipelineOutcome::Settled(status) = outcome else {
            continue;
        };
        if status == LabelStatus::Ready {
            state.ready += 1;
        }
        // Removed between write-back and now.
        if let Some(item) = state.ctx.store.get(id) {
            return Some((item, Some(state)));
        }
    }
    report_batch_complete(&state.ctx, state.total, state.ready);
    None
}
