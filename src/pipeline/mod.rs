//! Pipeline stages for PDF-to-image conversion.
//!
//! Each submodule implements one piece of the run. The engine adapters are
//! interchangeable; everything after them (aggregation, sorting, cropping)
//! is shared.
//!
//! ## Data Flow
//!
//! ```text
//!            ┌─ ghostscript ─┐
//! inputs ──▶ ├─ mupdf ───────┤ ──▶ aggregate ──▶ naming (scan + sort) ──▶ crop
//!            └─ inkscape ────┘
//!               (split → per-page export)
//! ```
//!
//! 1. [`invoke`]      — run one external command, capture failure as data
//! 2. [`ghostscript`], [`mupdf`], [`inkscape`] — engine adapters, one
//!    invocation per input (or per page for Inkscape)
//! 3. [`aggregate`]   — await every task of a stage, then fail with all
//!    errors or discover the output by listing the image directory
//! 4. [`naming`]      — parse `img-{source}-{page}.png` names and order them
//! 5. [`crop`]        — best-effort repair of the last image of each input

pub mod aggregate;
pub mod crop;
pub mod ghostscript;
pub mod inkscape;
pub mod invoke;
pub mod mupdf;
pub mod naming;

use crate::config::ConversionConfig;
use crate::convert::ConversionState;
use crate::progress::PipelineEvent;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

/// Everything a stage needs while it runs: the config, the directories it
/// writes into, and the orchestrator's current state.
///
/// Shared by reference between all concurrent tasks of a stage.
pub struct StageContext<'a> {
    pub config: &'a ConversionConfig,
    img_dir: PathBuf,
    pdf_dir: PathBuf,
    state: Mutex<ConversionState>,
}

impl<'a> StageContext<'a> {
    pub fn new(config: &'a ConversionConfig, img_dir: PathBuf, pdf_dir: PathBuf) -> Self {
        Self {
            config,
            img_dir,
            pdf_dir,
            state: Mutex::new(ConversionState::Idle),
        }
    }

    /// Directory receiving `img-{source}-{page}.png` files.
    pub fn img_dir(&self) -> &Path {
        &self.img_dir
    }

    /// Directory receiving `pdf-{source}-{page}.pdf` files (Inkscape only).
    pub fn pdf_dir(&self) -> &Path {
        &self.pdf_dir
    }

    pub fn state(&self) -> ConversionState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Move to `to`, emitting [`PipelineEvent::StateChanged`] when the state
    /// actually changes.
    pub fn transition(&self, to: ConversionState) {
        let from = {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            std::mem::replace(&mut *state, to)
        };
        if from != to {
            debug!("{}state {} → {}", self.config.log_prefix(), from, to);
            self.config.emit(PipelineEvent::StateChanged { from, to });
        }
    }
}
