//! Conversion entry points.
//!
//! [`Converter`] turns a list of inputs into the sorted page images of a
//! staging directory. [`convert_to_document`] wraps a whole job around it:
//! prepare the staging directory, rasterise, hand the images to a
//! [`DocumentAssembler`] and clean up.
//!
//! ## Run lifecycle
//!
//! ```text
//! Idle ─▶ Splitting ─▶ Converting ─▶ Aggregating ─▶ Cropping ─▶ Done
//!          (Inkscape)                                (optional)
//!   any stage failure ──────────────────────────────────────────▶ Failed
//! ```
//!
//! Every transition is reported as [`PipelineEvent::StateChanged`]. There are
//! no retries: a failed stage fails the run with all of its task errors.

use crate::config::{ConversionConfig, EngineKind};
use crate::error::Pdf2OfficeError;
use crate::pipeline::naming::GeneratedImage;
use crate::pipeline::{ghostscript, inkscape, mupdf, StageContext};
use crate::progress::PipelineEvent;
use crate::staging::StagingDir;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};
use tracing::{info, warn};

/// Where a conversion run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversionState {
    Idle,
    Splitting,
    Converting,
    Aggregating,
    Cropping,
    Done,
    Failed,
}

impl fmt::Display for ConversionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConversionState::Idle => "idle",
            ConversionState::Splitting => "splitting",
            ConversionState::Converting => "converting",
            ConversionState::Aggregating => "aggregating",
            ConversionState::Cropping => "cropping",
            ConversionState::Done => "done",
            ConversionState::Failed => "failed",
        })
    }
}

/// Drives one engine over a set of inputs.
///
/// # Example
/// ```rust,no_run
/// use pdf2office::{ConversionConfig, Converter, EngineKind};
/// use std::path::{Path, PathBuf};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = ConversionConfig::builder()
///     .engine(EngineKind::Mupdf)
///     .density(150)
///     .build()?;
/// let images = Converter::new(config)
///     .convert(Path::new("/tmp/deck"), &[PathBuf::from("slides.pdf")])
///     .await?;
/// for img in &images {
///     println!("{}", img.display());
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Converter {
    config: ConversionConfig,
}

impl Converter {
    pub fn new(config: ConversionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ConversionConfig {
        &self.config
    }

    /// Rasterise `inputs` into `{output_dir}/img` and return the image paths
    /// in page order: by input position first, then by page number.
    ///
    /// `output_dir` is created if missing, along with its `img` and `pdf`
    /// children.
    pub async fn convert(
        &self,
        output_dir: &Path,
        inputs: &[PathBuf],
    ) -> Result<Vec<PathBuf>, Pdf2OfficeError> {
        let staging = StagingDir::create(output_dir).await?;
        let images = self.convert_in(&staging, inputs).await?;
        Ok(images.into_iter().map(|img| img.path).collect())
    }

    /// Like [`Converter::convert`], but into a prepared staging directory
    /// and keeping the parsed page keys.
    pub async fn convert_in(
        &self,
        staging: &StagingDir,
        inputs: &[PathBuf],
    ) -> Result<Vec<GeneratedImage>, Pdf2OfficeError> {
        if inputs.is_empty() {
            return Err(Pdf2OfficeError::NoInputs);
        }
        let start = Instant::now();
        info!(
            "{}Converting {} inputs with {} into {}",
            self.config.log_prefix(),
            inputs.len(),
            self.config.engine,
            staging.root().display()
        );

        let ctx = StageContext::new(
            &self.config,
            staging.img_dir().to_path_buf(),
            staging.pdf_dir().to_path_buf(),
        );
        let result = match self.config.engine {
            EngineKind::Ghostscript => ghostscript::convert(&ctx, inputs).await,
            EngineKind::Mupdf => mupdf::convert(&ctx, inputs).await,
            EngineKind::Inkscape => inkscape::convert(&ctx, inputs).await,
        };

        match result {
            Ok(images) => {
                ctx.transition(ConversionState::Done);
                info!(
                    "{}Conversion complete: {} images in {}ms",
                    self.config.log_prefix(),
                    images.len(),
                    start.elapsed().as_millis()
                );
                Ok(images)
            }
            Err(e) => {
                ctx.transition(ConversionState::Failed);
                warn!("{}Conversion failed: {}", self.config.log_prefix(), e);
                Err(e)
            }
        }
    }
}

// ── Document jobs ────────────────────────────────────────────────────────

/// Turns the ordered page images into an office document.
///
/// Implementations are synchronous and may be slow; they are run on the
/// blocking thread pool.
pub trait DocumentAssembler: Send + Sync {
    /// File extension of the produced document, without the dot
    /// (e.g. `"pptx"`).
    fn extension(&self) -> &str;

    /// Write a document with one page or slide per image, in the given
    /// order, to `output`.
    fn assemble(
        &self,
        images: &[PathBuf],
        output: &Path,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// Result of a successful [`convert_to_document`] job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentOutput {
    /// The assembled document, `{staging}/output_{nanos}.{ext}`.
    pub path: PathBuf,
    /// The staging directory the job ran in.
    pub staging_dir: PathBuf,
    /// Number of images handed to the assembler.
    pub page_count: usize,
    pub duration_ms: u64,
}

/// Run a whole conversion job: rasterise `inputs`, assemble the images into
/// a document and clean up.
///
/// `staging_dir` is used when it names an existing directory; otherwise a
/// fresh `pdf_ppt_*` directory is created under the system temp dir. The
/// assembler is only called when rasterisation succeeded. When
/// `config.clean` is set the image directory is removed afterwards; a
/// failure to do so is logged and reported as an event, never returned.
pub async fn convert_to_document(
    inputs: &[PathBuf],
    staging_dir: Option<&Path>,
    assembler: Arc<dyn DocumentAssembler>,
    config: &ConversionConfig,
) -> Result<DocumentOutput, Pdf2OfficeError> {
    if inputs.is_empty() {
        return Err(Pdf2OfficeError::NoInputs);
    }
    let start = Instant::now();
    config.emit(PipelineEvent::Options {
        summary: config.summary(),
    });

    let staging = StagingDir::prepare(staging_dir).await?;
    let converter = Converter::new(config.clone());
    let images: Vec<PathBuf> = converter
        .convert_in(&staging, inputs)
        .await?
        .into_iter()
        .map(|img| img.path)
        .collect();

    // ── Assemble ─────────────────────────────────────────────────────────
    let assemble_start = Instant::now();
    let output = output_path(staging.root(), assembler.extension());
    let page_count = images.len();
    {
        let output = output.clone();
        tokio::task::spawn_blocking(move || assembler.assemble(&images, &output))
            .await
            .map_err(|e| Pdf2OfficeError::Internal(format!("Assembler task panicked: {e}")))?
            .map_err(|e| Pdf2OfficeError::AssemblyFailed(e.to_string()))?;
    }
    info!(
        "{}Document saved: {}",
        config.log_prefix(),
        output.display()
    );
    config.emit(PipelineEvent::DocumentSaved {
        output: output.clone(),
        elapsed_ms: assemble_start.elapsed().as_millis() as u64,
    });

    // ── Clean ────────────────────────────────────────────────────────────
    if config.clean {
        let clean_start = Instant::now();
        let error = staging.clean_image_dir().await.err().map(|e| {
            warn!(
                "{}Failed to clean {}: {}",
                config.log_prefix(),
                staging.img_dir().display(),
                e
            );
            e.to_string()
        });
        config.emit(PipelineEvent::Cleaned {
            dir: staging.img_dir().to_path_buf(),
            elapsed_ms: clean_start.elapsed().as_millis() as u64,
            error,
        });
    }

    Ok(DocumentOutput {
        path: output,
        staging_dir: staging.root().to_path_buf(),
        page_count,
        duration_ms: start.elapsed().as_millis() as u64,
    })
}

/// Synchronous wrapper around [`convert_to_document`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_sync(
    inputs: &[PathBuf],
    staging_dir: Option<&Path>,
    assembler: Arc<dyn DocumentAssembler>,
    config: &ConversionConfig,
) -> Result<DocumentOutput, Pdf2OfficeError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Pdf2OfficeError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(convert_to_document(inputs, staging_dir, assembler, config))
}

/// `{dir}/output_{nanos}.{ext}`, unique enough for one job per staging dir.
fn output_path(dir: &Path, extension: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    dir.join(format!("output_{nanos}.{extension}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NeverCalled;

    impl DocumentAssembler for NeverCalled {
        fn extension(&self) -> &str {
            "pptx"
        }

        fn assemble(
            &self,
            _images: &[PathBuf],
            _output: &Path,
        ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
            panic!("assembler must not run");
        }
    }

    #[test]
    fn state_display_and_serde() {
        assert_eq!(ConversionState::Aggregating.to_string(), "aggregating");
        assert_eq!(
            serde_json::to_string(&ConversionState::Cropping).unwrap(),
            "\"cropping\""
        );
    }

    #[test]
    fn output_path_uses_extension() {
        let p = output_path(Path::new("/s"), "docx");
        let name = p.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("output_"));
        assert!(name.ends_with(".docx"));
        assert_eq!(p.parent(), Some(Path::new("/s")));
    }

    #[tokio::test]
    async fn empty_input_list_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = Converter::new(ConversionConfig::default())
            .convert(dir.path(), &[])
            .await
            .unwrap_err();
        assert!(matches!(err, Pdf2OfficeError::NoInputs));
    }

    #[tokio::test]
    async fn failed_conversion_skips_assembly() {
        let dir = tempfile::tempdir().unwrap();
        let config = ConversionConfig::builder()
            .executables(crate::config::Executables {
                ghostscript: crate::config::Executable::new("no-such-gs-binary-4711"),
                ..crate::config::Executables::resolve("linux", |_| None)
            })
            .build()
            .unwrap();
        let err = convert_to_document(
            &[PathBuf::from("a.pdf"), PathBuf::from("b.pdf")],
            Some(dir.path()),
            Arc::new(NeverCalled),
            &config,
        )
        .await
        .unwrap_err();
        assert_eq!(err.task_errors().len(), 2);
    }

    #[tokio::test]
    async fn missing_output_dir_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("new").join("deeper");
        let config = ConversionConfig::builder()
            .executables(crate::config::Executables {
                ghostscript: crate::config::Executable::new("no-such-gs-binary-4711"),
                ..crate::config::Executables::resolve("linux", |_| None)
            })
            .build()
            .unwrap();

        let err = Converter::new(config)
            .convert(&out, &[PathBuf::from("a.pdf")])
            .await
            .unwrap_err();

        assert_eq!(err.task_errors().len(), 1);
        assert!(out.join("img").is_dir());
        assert!(out.join("pdf").is_dir());
    }

    #[test]
    fn sync_wrapper_reports_errors() {
        let err = convert_sync(
            &[],
            None,
            Arc::new(NeverCalled),
            &ConversionConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, Pdf2OfficeError::NoInputs));
    }
}
