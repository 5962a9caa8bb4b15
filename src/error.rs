//! Error types for the pdf2office library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`Pdf2OfficeError`] — **Fatal**: the conversion run cannot produce an
//!   image set (staging directory unusable, a rasterisation stage failed,
//!   an image file name broke the naming contract). Returned as
//!   `Err(Pdf2OfficeError)` from [`crate::Converter::convert`] and friends.
//!
//! * [`TaskError`] — **Per-invocation**: one external process failed. Task
//!   errors are collected as data while the rest of the stage keeps running,
//!   then handed over in bulk inside [`Pdf2OfficeError::StageFailed`] or, for
//!   the crop stage, only reported through [`crate::progress::PipelineEvent`].

use crate::progress::Stage;
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the pdf2office library.
#[derive(Debug, Error)]
pub enum Pdf2OfficeError {
    // ── Staging errors ────────────────────────────────────────────────────
    /// The staging directory (or one of its `img`/`pdf` children) could not
    /// be created.
    #[error("Failed to prepare staging directory '{path}': {source}")]
    Staging {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An output directory could not be listed after a stage settled.
    #[error("Failed to read directory '{path}': {source}")]
    ScanFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Pipeline errors ───────────────────────────────────────────────────
    /// One or more external invocations of a stage failed. Every task of the
    /// stage was allowed to finish before this was returned.
    #[error("{stage} stage failed: {} of the invocations reported errors (first: {})",
        .errors.len(),
        .errors.first().map(ToString::to_string).unwrap_or_default())]
    StageFailed { stage: Stage, errors: Vec<TaskError> },

    /// A file in a staging directory does not follow the
    /// `{img|pdf}-{source}-{page}.{ext}` convention. Only the adapters name
    /// these files, so this means an internal invariant was broken.
    #[error("File '{path}' does not match the '{{img|pdf}}-{{source}}-{{page}}.{{ext}}' naming convention")]
    InvalidPageName { path: PathBuf },

    /// No input files were supplied.
    #[error("No input files to convert")]
    NoInputs,

    // ── Assembly errors ───────────────────────────────────────────────────
    /// The document assembler rejected the image list.
    #[error("Document assembly failed: {0}")]
    AssemblyFailed(String),

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Pdf2OfficeError {
    /// The per-task errors carried by a [`Pdf2OfficeError::StageFailed`], if any.
    pub fn task_errors(&self) -> &[TaskError] {
        match self {
            Pdf2OfficeError::StageFailed { errors, .. } => errors,
            _ => &[],
        }
    }
}

/// A non-fatal error for a single external invocation (or file copy).
///
/// Collected per stage rather than propagated, so that one bad input does not
/// stop the other invocations of the same stage from finishing.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum TaskError {
    /// The executable could not be started at all (not installed, not on PATH).
    #[error("failed to spawn `{command}`: {detail}")]
    SpawnFailed { command: String, detail: String },

    /// The process ran but exited unsuccessfully.
    #[error("`{command}` exited with {status}: {stderr}")]
    ExitStatus {
        command: String,
        status: String,
        stderr: String,
    },

    /// The process exited successfully but wrote diagnostics to stderr.
    /// Only the crop stage treats this as a failure.
    #[error("`{command}` reported: {stderr}")]
    Stderr { command: String, stderr: String },

    /// The process did not finish within the configured invocation timeout
    /// and was killed.
    #[error("`{command}` timed out after {after_ms}ms")]
    TimedOut { command: String, after_ms: u64 },

    /// A pre-rasterised input could not be copied into the image directory.
    #[error("failed to copy '{from}' to '{to}': {detail}")]
    CopyFailed {
        from: PathBuf,
        to: PathBuf,
        detail: String,
    },
}
