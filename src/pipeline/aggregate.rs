//! Conversion task aggregation.
//!
//! A stage launches all of its tasks together and only then waits. No task
//! is cancelled because another one failed: every task settles, its error
//! (if any) is collected, and the stage decides afterwards.
//!
//! ## Why re-scan the image directory?
//!
//! An engine writes one file per rendered page, and the page count of an
//! input is not known up front. Task completion order says nothing about
//! page order either. Listing the directory after the last task settled is
//! the only reliable way to learn the full output set.

use crate::config::EngineKind;
use crate::convert::ConversionState;
use crate::error::{Pdf2OfficeError, TaskError};
use crate::pipeline::invoke::{invoke, Invocation, InvocationOutcome};
use crate::pipeline::naming::{scan_sorted, GeneratedImage};
use crate::pipeline::{crop, StageContext};
use crate::progress::{PipelineEvent, Stage};
use futures::future::join_all;
use futures::stream::{self, StreamExt};
use std::future::Future;
use std::time::Instant;
use tracing::{info, warn};

/// Await every task, bounded to `limit` in flight when set.
///
/// Results come back in completion order when a limit is set and in
/// submission order otherwise; callers must not rely on either.
pub async fn run_all<F>(tasks: impl IntoIterator<Item = F>, limit: Option<usize>) -> Vec<F::Output>
where
    F: Future,
{
    match limit {
        None => join_all(tasks).await,
        Some(n) => stream::iter(tasks).buffer_unordered(n).collect().await,
    }
}

/// Run one invocation under the configured timeout and report it.
pub(crate) async fn run_invocation(
    ctx: &StageContext<'_>,
    stage: Stage,
    engine: Option<EngineKind>,
    invocation: Invocation,
) -> InvocationOutcome {
    let outcome = invoke(&invocation, ctx.config.invocation_timeout).await;
    report_task(ctx, stage, engine, &outcome);
    outcome
}

/// Emit the per-task event for a settled task.
pub(crate) fn report_task(
    ctx: &StageContext<'_>,
    stage: Stage,
    engine: Option<EngineKind>,
    outcome: &InvocationOutcome,
) {
    if let Some(ref e) = outcome.error {
        warn!("{}{} task failed: {}", ctx.config.log_prefix(), stage, e);
    }
    ctx.config.emit(PipelineEvent::TaskComplete {
        stage,
        engine,
        command: outcome.command.clone(),
        elapsed_ms: outcome.elapsed_ms,
        error: outcome.error.clone(),
    });
}

/// Errors of every failed task, in the order given.
pub fn collect_errors(outcomes: Vec<InvocationOutcome>) -> Vec<TaskError> {
    outcomes.into_iter().filter_map(|o| o.error).collect()
}

/// Turn a settled stage into `Ok(())` or a [`Pdf2OfficeError::StageFailed`],
/// emitting the matching stage event.
pub(crate) fn settle_stage(
    ctx: &StageContext<'_>,
    stage: Stage,
    errors: Vec<TaskError>,
    started: Instant,
    output: Vec<std::path::PathBuf>,
) -> Result<(), Pdf2OfficeError> {
    let elapsed_ms = started.elapsed().as_millis() as u64;
    if errors.is_empty() {
        info!(
            "{}{} stage complete: {} files in {}ms",
            ctx.config.log_prefix(),
            stage,
            output.len(),
            elapsed_ms
        );
        ctx.config.emit(PipelineEvent::StageComplete {
            stage,
            output,
            elapsed_ms,
        });
        Ok(())
    } else {
        warn!(
            "{}{} stage failed: {} errors after {}ms",
            ctx.config.log_prefix(),
            stage,
            errors.len(),
            elapsed_ms
        );
        ctx.config.emit(PipelineEvent::StageFailed {
            stage,
            errors: errors.clone(),
            elapsed_ms,
        });
        Err(Pdf2OfficeError::StageFailed { stage, errors })
    }
}

/// Finish the rasterise stage once all of its tasks have settled.
///
/// Fails with every collected error if any task failed; otherwise lists the
/// image directory, sorts it, runs the last-page cropper (when enabled) and
/// returns the sorted images.
pub(crate) async fn finish_raster_stage(
    ctx: &StageContext<'_>,
    errors: Vec<TaskError>,
    started: Instant,
) -> Result<Vec<GeneratedImage>, Pdf2OfficeError> {
    ctx.transition(ConversionState::Aggregating);

    if !errors.is_empty() {
        return settle_stage(ctx, Stage::Rasterize, errors, started, Vec::new()).map(|_| Vec::new());
    }

    let sorted = scan_sorted(ctx.img_dir()).await?;
    let paths = sorted.iter().map(|img| img.path.clone()).collect();
    settle_stage(ctx, Stage::Rasterize, Vec::new(), started, paths)?;

    crop::crop_last_images(ctx, &sorted).await;
    Ok(sorted)
}
