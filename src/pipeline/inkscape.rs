//! Inkscape adapter: split every PDF into single pages, then export each
//! page to PNG.
//!
//! Inkscape imports one page of a PDF at a time, so a multi-page input is
//! first cut up with `pdfseparate` into `pdf-{i}-{p}.pdf` files in the
//! staging `pdf` directory. Once every split has settled the directory is
//! listed and sorted, and each single page becomes one export:
//!
//! ```text
//! inkscape -d 150 --export-png={img}/img-0-3.png {pdf}/pdf-0-3.pdf
//! ```
//!
//! With [`InkscapeStrategy::FanOut`] every export is its own process, all
//! launched together. [`InkscapeStrategy::Shell`] instead feeds the export
//! lines to a single `inkscape --shell` session; it spawns one process
//! instead of hundreds but the session works through the pages one at a
//! time, which measured slower in practice.

use crate::config::{EngineKind, Executable, InkscapeStrategy};
use crate::convert::ConversionState;
use crate::error::Pdf2OfficeError;
use crate::pipeline::aggregate::{
    collect_errors, finish_raster_stage, report_task, run_all, run_invocation, settle_stage,
};
use crate::pipeline::invoke::{absolute, invoke_with_input, Invocation};
use crate::pipeline::naming::{image_file_name, scan_sorted, split_template, GeneratedImage};
use crate::pipeline::StageContext;
use crate::progress::Stage;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::info;

/// The `pdfseparate` command splitting input number `source`.
pub fn split_invocation(
    pdfseparate: &Executable,
    pdf_dir: &Path,
    source: usize,
    input: &Path,
) -> Invocation {
    Invocation::new(pdfseparate)
        .arg(absolute(input))
        .arg(split_template(source))
        .in_dir(pdf_dir)
}

/// Arguments exporting one single-page PDF to `png`.
fn export_args(density: u32, png: &Path, page: &Path) -> [String; 4] {
    [
        "-d".to_string(),
        density.to_string(),
        format!("--export-png={}", png.display()),
        page.display().to_string(),
    ]
}

/// The `inkscape` command exporting one single-page PDF.
pub fn export_invocation(inkscape: &Executable, density: u32, png: &Path, page: &Path) -> Invocation {
    export_args(density, png, page)
        .into_iter()
        .fold(Invocation::new(inkscape), |inv, a| inv.arg(a))
}

/// The stdin script for an `inkscape --shell` session: one export per
/// line, then `quit`.
pub fn shell_script(exports: &[(PathBuf, PathBuf)], density: u32) -> String {
    let mut script = String::new();
    for (png, page) in exports {
        script.push_str(&format!(
            "-d {} \"--export-png={}\" \"{}\"\n",
            density,
            png.display(),
            page.display()
        ));
    }
    script.push_str("quit\n");
    script
}

/// Split, then export every page with Inkscape.
pub async fn convert(
    ctx: &StageContext<'_>,
    inputs: &[PathBuf],
) -> Result<Vec<GeneratedImage>, Pdf2OfficeError> {
    let pages = split_all(ctx, inputs).await?;

    let started = Instant::now();
    let density = ctx.config.effective_density();
    info!(
        "{}Inkscape: exporting {} pages at {} DPI ({:?})",
        ctx.config.log_prefix(),
        pages.len(),
        density,
        ctx.config.inkscape_strategy
    );
    ctx.transition(ConversionState::Converting);

    let exports: Vec<(PathBuf, PathBuf)> = pages
        .into_iter()
        .map(|page| (ctx.img_dir().join(image_file_name(page.key)), page.path))
        .collect();

    let inkscape = &ctx.config.executables.inkscape;
    let errors = match ctx.config.inkscape_strategy {
        InkscapeStrategy::FanOut => {
            let tasks = exports.iter().map(|(png, page)| {
                let inv = export_invocation(inkscape, density, png, page);
                run_invocation(ctx, Stage::Rasterize, Some(EngineKind::Inkscape), inv)
            });
            collect_errors(run_all(tasks, ctx.config.max_concurrent_processes).await)
        }
        InkscapeStrategy::Shell => {
            let inv = Invocation::new(inkscape).arg("--shell");
            let script = shell_script(&exports, density);
            let outcome = invoke_with_input(&inv, script, ctx.config.invocation_timeout).await;
            report_task(ctx, Stage::Rasterize, Some(EngineKind::Inkscape), &outcome);
            collect_errors(vec![outcome])
        }
    };

    finish_raster_stage(ctx, errors, started).await
}

/// Split every input into single-page PDFs and return them in page order.
async fn split_all(
    ctx: &StageContext<'_>,
    inputs: &[PathBuf],
) -> Result<Vec<GeneratedImage>, Pdf2OfficeError> {
    let started = Instant::now();
    ctx.transition(ConversionState::Splitting);

    let pdfseparate = &ctx.config.executables.pdf_separate;
    let tasks = inputs.iter().enumerate().map(|(source, input)| {
        let inv = split_invocation(pdfseparate, ctx.pdf_dir(), source, input);
        run_invocation(ctx, Stage::Split, None, inv)
    });
    let errors = collect_errors(run_all(tasks, ctx.config.max_concurrent_processes).await);
    if !errors.is_empty() {
        return settle_stage(ctx, Stage::Split, errors, started, Vec::new()).map(|_| Vec::new());
    }

    let pages = scan_sorted(ctx.pdf_dir()).await?;
    let paths = pages.iter().map(|p| p.path.clone()).collect();
    settle_stage(ctx, Stage::Split, Vec::new(), started, paths)?;
    Ok(pages)
}
