//! Ghostscript adapter: one `gs` process per input file.
//!
//! Ghostscript numbers the pages itself through the `%d` in the output
//! template, so each input `i` produces `img-{i}-1.png`, `img-{i}-2.png`, …
//! in the image directory. The `pngalpha` device keeps transparency;
//! `-dMaxBitmap` is raised so large pages do not fail for lack of band
//! buffer memory.

use crate::config::{EngineKind, Executable};
use crate::convert::ConversionState;
use crate::error::Pdf2OfficeError;
use crate::pipeline::aggregate::{collect_errors, finish_raster_stage, run_all, run_invocation};
use crate::pipeline::invoke::{absolute, Invocation};
use crate::pipeline::naming::{image_template, GeneratedImage};
use crate::pipeline::StageContext;
use crate::progress::Stage;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::info;

/// Band buffer ceiling passed as `-dMaxBitmap`.
const MAX_BITMAP_BYTES: u64 = 500_000_000;

/// The `gs` command rasterising input number `source`.
pub fn gs_invocation(
    gs: &Executable,
    density: u32,
    img_dir: &Path,
    source: usize,
    input: &Path,
) -> Invocation {
    Invocation::new(gs)
        .arg("-q")
        .arg("-dQUIET")
        .arg("-dSAFER")
        .arg("-sDEVICE=pngalpha")
        .arg(format!("-dMaxBitmap={MAX_BITMAP_BYTES}"))
        .arg(format!("-r{density}"))
        .arg("-o")
        .arg(image_template(source))
        .arg(absolute(input))
        .in_dir(img_dir)
}

/// Rasterise every input with Ghostscript.
pub async fn convert(
    ctx: &StageContext<'_>,
    inputs: &[PathBuf],
) -> Result<Vec<GeneratedImage>, Pdf2OfficeError> {
    let started = Instant::now();
    let density = ctx.config.effective_density();
    info!(
        "{}Ghostscript: {} inputs at {} DPI",
        ctx.config.log_prefix(),
        inputs.len(),
        density
    );
    ctx.transition(ConversionState::Converting);

    let gs = &ctx.config.executables.ghostscript;
    let tasks = inputs.iter().enumerate().map(|(source, input)| {
        let inv = gs_invocation(gs, density, ctx.img_dir(), source, input);
        run_invocation(ctx, Stage::Rasterize, Some(EngineKind::Ghostscript), inv)
    });
    let outcomes = run_all(tasks, ctx.config.max_concurrent_processes).await;

    finish_raster_stage(ctx, collect_errors(outcomes), started).await
}
