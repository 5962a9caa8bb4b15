//! # pdf2office
//!
//! Turn PDF documents into ordered page images for PowerPoint and Word
//! documents, using whichever external rasteriser is installed.
//!
//! ## Why external engines?
//!
//! Ghostscript, MuPDF and Inkscape each render some PDFs better than the
//! others, and all of them are already present on most machines that handle
//! documents. This crate does not render anything itself: it drives the
//! engine's command line, waits for every invocation, and recovers page
//! order from the file names the engines write.
//!
//! ## Pipeline Overview
//!
//! ```text
//! inputs (PDF, or PNG for MuPDF)
//!  │
//!  ├─ 1. Stage     {staging}/img and {staging}/pdf
//!  ├─ 2. Split     pdfseparate, one file per page (Inkscape only)
//!  ├─ 3. Raster    gs / mutool draw / inkscape, all invocations concurrently
//!  ├─ 4. Collect   list img/, sort by (input, page) numerically
//!  ├─ 5. Crop      ImageMagick trims the last image of each input (optional)
//!  └─ 6. Assemble  DocumentAssembler writes {staging}/output_{nanos}.{ext}
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdf2office::{ConversionConfig, Converter, EngineKind};
//! use std::path::{Path, PathBuf};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Executables come from PDF_PPT_GSPATH, PDF_PPT_MUPDF_PATH, … or the
//!     // platform defaults.
//!     let config = ConversionConfig::builder()
//!         .engine(EngineKind::Ghostscript)
//!         .density(150)
//!         .crop_last_image(true)
//!         .build()?;
//!     let images = Converter::new(config)
//!         .convert(Path::new("/tmp/deck"), &[PathBuf::from("a.pdf"), PathBuf::from("b.pdf")])
//!         .await?;
//!     println!("{} slides", images.len());
//!     Ok(())
//! }
//! ```
//!
//! ## Engines
//!
//! | Engine | Invocations | Notes |
//! |--------|-------------|-------|
//! | Ghostscript | one per input | `pngalpha` device, keeps transparency |
//! | MuPDF | one per PDF input | PNG inputs are copied through |
//! | Inkscape | one split per input, one export per page | slowest, needs `pdfseparate` |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod pipeline;
pub mod progress;
pub mod staging;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    ConversionConfig, ConversionConfigBuilder, EngineKind, Executable, Executables,
    InkscapeStrategy,
};
pub use convert::{
    convert_sync, convert_to_document, ConversionState, Converter, DocumentAssembler,
    DocumentOutput,
};
pub use error::{Pdf2OfficeError, TaskError};
pub use pipeline::naming::{GeneratedImage, PageKey};
pub use progress::{
    ChannelListener, ConversionEventListener, EventListener, NoopListener, PipelineEvent, Stage,
    TracingListener,
};
pub use staging::StagingDir;
