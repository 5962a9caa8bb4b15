//! MuPDF adapter: one `mutool draw` (or `mudraw`) process per PDF input.
//!
//! Inputs that are already PNG images skip the rasteriser entirely: they are
//! copied into the image directory as `img-{i}-1.png`, so a request can mix
//! PDFs and pre-rendered pages and still come out in request order.

use crate::config::{EngineKind, Executable};
use crate::convert::ConversionState;
use crate::error::{Pdf2OfficeError, TaskError};
use crate::pipeline::aggregate::{
    collect_errors, finish_raster_stage, report_task, run_all, run_invocation,
};
use crate::pipeline::invoke::{absolute, Invocation, InvocationOutcome};
use crate::pipeline::naming::{image_file_name, image_template, GeneratedImage, PageKey};
use crate::pipeline::StageContext;
use crate::progress::Stage;
use futures::future::Either;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::info;

/// Page number given to a copied PNG input (MuPDF numbers pages from 1).
const COPIED_PAGE: u64 = 1;

/// The MuPDF command rasterising input number `source`.
pub fn mupdf_invocation(
    mupdf: &Executable,
    density: u32,
    img_dir: &Path,
    source: usize,
    input: &Path,
) -> Invocation {
    Invocation::new(mupdf)
        .arg("-r")
        .arg(density.to_string())
        .arg("-o")
        .arg(image_template(source))
        .arg(absolute(input))
        .in_dir(img_dir)
}

/// True for inputs that are already rasterised.
pub fn is_png(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("png"))
}

/// Rasterise every input with MuPDF, copying PNG inputs through.
pub async fn convert(
    ctx: &StageContext<'_>,
    inputs: &[PathBuf],
) -> Result<Vec<GeneratedImage>, Pdf2OfficeError> {
    let started = Instant::now();
    let density = ctx.config.effective_density();
    info!(
        "{}MuPDF: {} inputs at {} DPI",
        ctx.config.log_prefix(),
        inputs.len(),
        density
    );
    ctx.transition(ConversionState::Converting);

    let mupdf = &ctx.config.executables.mupdf;
    let tasks = inputs.iter().enumerate().map(|(source, input)| {
        if is_png(input) {
            Either::Left(copy_png(ctx, source, input))
        } else {
            let inv = mupdf_invocation(mupdf, density, ctx.img_dir(), source, input);
            Either::Right(run_invocation(
                ctx,
                Stage::Rasterize,
                Some(EngineKind::Mupdf),
                inv,
            ))
        }
    });
    let outcomes = run_all(tasks, ctx.config.max_concurrent_processes).await;

    finish_raster_stage(ctx, collect_errors(outcomes), started).await
}

/// Copy a PNG input to its place in the image directory.
async fn copy_png(ctx: &StageContext<'_>, source: usize, input: &Path) -> InvocationOutcome {
    let start = Instant::now();
    let target = ctx
        .img_dir()
        .join(image_file_name(PageKey::new(source, COPIED_PAGE)));
    let command = format!("copy {} {}", input.display(), target.display());

    let error = tokio::fs::copy(input, &target)
        .await
        .err()
        .map(|e| TaskError::CopyFailed {
            from: input.to_path_buf(),
            to: target.clone(),
            detail: e.to_string(),
        });

    let outcome = InvocationOutcome {
        command,
        elapsed_ms: start.elapsed().as_millis() as u64,
        stderr: String::new(),
        error,
    };
    report_task(ctx, Stage::Rasterize, Some(EngineKind::Mupdf), &outcome);
    outcome
}
