//! Last-page cropper.
//!
//! When the last page of an input does not fill a whole page, the engines
//! can leave a partially transparent row at its bottom edge, which shows up
//! as a thin horizontal line once the image sits on a slide. This stage
//! trims that row from the last image of every input with ImageMagick:
//!
//! ```text
//! convert img-0-7.png -gravity South -bordercolor none -border 1 -trim +repage -chop 0x1 img-0-7.png
//! ```
//!
//! * `-gravity South` makes `-chop` act on the bottom edge.
//! * `-bordercolor none -border 1` pads the image with one transparent pixel
//!   so that `-trim` does not also eat into the top edge.
//! * `-trim +repage` auto-crops the transparent margins and resets the
//!   page offset.
//! * `-chop 0x1` removes the single pixel row `-trim` leaves at the bottom.
//!
//! Cropping is best effort: a failure is reported but never fails the run.
//! A slide with a thin line beats no slide at all.

use crate::config::Executable;
use crate::convert::ConversionState;
use crate::error::TaskError;
use crate::pipeline::aggregate::{run_all, run_invocation, settle_stage};
use crate::pipeline::invoke::{Invocation, InvocationOutcome};
use crate::pipeline::naming::{last_page_of_each_source, GeneratedImage};
use crate::pipeline::StageContext;
use crate::progress::Stage;
use std::path::Path;
use std::time::Instant;
use tracing::debug;

/// The in-place ImageMagick command for one image.
pub fn crop_invocation(convert: &Executable, image: &Path) -> Invocation {
    Invocation::new(convert)
        .arg(image)
        .arg("-gravity")
        .arg("South")
        .arg("-bordercolor")
        .arg("none")
        .arg("-border")
        .arg("1")
        .arg("-trim")
        .arg("+repage")
        .arg("-chop")
        .arg("0x1")
        .arg(image)
}

/// Crop the last image of every input, when enabled.
///
/// Returns the errors that were reported (empty when cropping is disabled
/// or everything succeeded). The images are edited in place, so the sorted
/// list stays valid either way.
pub async fn crop_last_images(ctx: &StageContext<'_>, sorted: &[GeneratedImage]) -> Vec<TaskError> {
    if !ctx.config.crop_last_image {
        return Vec::new();
    }
    ctx.transition(ConversionState::Cropping);

    let started = Instant::now();
    let targets = last_page_of_each_source(sorted);
    debug!(
        "{}cropping {} last images",
        ctx.config.log_prefix(),
        targets.len()
    );

    let convert = &ctx.config.executables.image_magick;
    let tasks = targets.iter().map(|img| {
        run_invocation(ctx, Stage::Crop, None, crop_invocation(convert, &img.path))
    });
    let outcomes = run_all(tasks, ctx.config.max_concurrent_processes).await;
    let errors: Vec<TaskError> = outcomes.into_iter().filter_map(crop_error).collect();

    let cropped = targets.iter().map(|img| img.path.clone()).collect();
    // Crop failures never fail the run; the stage event is all that is left.
    let _ = settle_stage(ctx, Stage::Crop, errors.clone(), started, cropped);
    errors
}

/// ImageMagick reports some problems on stderr with a zero exit status;
/// for this stage either counts as a failure.
fn crop_error(outcome: InvocationOutcome) -> Option<TaskError> {
    match outcome.error {
        Some(e) => Some(e),
        None if !outcome.stderr.is_empty() => Some(TaskError::Stderr {
            command: outcome.command,
            stderr: outcome.stderr,
        }),
        None => None,
    }
}
