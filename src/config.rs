//! Configuration types for PDF-to-image conversion runs.
//!
//! All conversion behaviour is controlled through [`ConversionConfig`], built
//! via its [`ConversionConfigBuilder`]. A config is borrowed immutably for the
//! whole run, so the engine, density and executable paths cannot change while
//! external processes are in flight.
//!
//! Executable names are resolved once into an [`Executables`] value (see
//! [`Executables::from_env`]) and carried in the config, instead of being
//! looked up from the environment by each adapter.

use crate::error::Pdf2OfficeError;
use crate::progress::{EventListener, PipelineEvent};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Rasterising above this density costs a lot of time for no visible gain.
pub const DPI_DENSITY_MAX: u32 = 300;

/// Density used when none is configured (the long-standing 72 DPI default).
pub const DPI_DENSITY_DEFAULT: u32 = 72;

/// Configuration for a conversion run.
///
/// Built via [`ConversionConfig::builder()`] or using
/// [`ConversionConfig::default()`].
///
/// # Example
/// ```rust
/// use pdf2office::{ConversionConfig, EngineKind};
///
/// let config = ConversionConfig::builder()
///     .engine(EngineKind::Mupdf)
///     .density(150)
///     .crop_last_image(true)
///     .build()
///     .unwrap();
/// assert_eq!(config.effective_density(), 150);
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Which external rasteriser turns pages into PNGs. Default: Ghostscript.
    pub engine: EngineKind,

    /// Requested rasterisation density in DPI. `None` (or 0) means
    /// [`DPI_DENSITY_DEFAULT`]; values above [`DPI_DENSITY_MAX`] are clamped.
    ///
    /// A low density combined with a transparent page background can show a
    /// thin horizontal line once the image is placed on a slide (visible at
    /// 72, gone at 150).
    pub density: Option<u32>,

    /// Run the last-page cropper over the final image of every input.
    /// Requires ImageMagick `convert`. Default: false.
    pub crop_last_image: bool,

    /// Remove the image directory once the document has been assembled.
    /// Default: true.
    pub clean: bool,

    /// Resolved external executables. Default: [`Executables::from_env`].
    pub executables: Executables,

    /// How Inkscape exports are issued. Default: [`InkscapeStrategy::FanOut`].
    pub inkscape_strategy: InkscapeStrategy,

    /// Upper bound on external processes running at once within one stage.
    /// Default: `None` — every task of a stage is launched immediately.
    pub max_concurrent_processes: Option<usize>,

    /// Kill an external process that runs longer than this. Default: `None`
    /// — a hung engine hangs its stage.
    pub invocation_timeout: Option<Duration>,

    /// Free-form identifier included in log lines.
    pub job_id: Option<String>,

    /// Receives [`PipelineEvent`]s. Default: none.
    pub listener: Option<EventListener>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            engine: EngineKind::default(),
            density: None,
            crop_last_image: false,
            clean: true,
            executables: Executables::from_env(),
            inkscape_strategy: InkscapeStrategy::default(),
            max_concurrent_processes: None,
            invocation_timeout: None,
            job_id: None,
            listener: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("engine", &self.engine)
            .field("density", &self.density)
            .field("crop_last_image", &self.crop_last_image)
            .field("clean", &self.clean)
            .field("executables", &self.executables)
            .field("inkscape_strategy", &self.inkscape_strategy)
            .field("max_concurrent_processes", &self.max_concurrent_processes)
            .field("invocation_timeout", &self.invocation_timeout)
            .field("job_id", &self.job_id)
            .field(
                "listener",
                &self.listener.as_ref().map(|_| "<dyn ConversionEventListener>"),
            )
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }

    /// The density actually passed to the engines.
    pub fn effective_density(&self) -> u32 {
        effective_density(self.density)
    }

    /// Deliver an event to the configured listener, if any.
    pub(crate) fn emit(&self, event: PipelineEvent) {
        if let Some(ref listener) = self.listener {
            listener.on_event(&event);
        }
    }

    /// JSON summary of the effective options, for the `options` event.
    pub fn summary(&self) -> serde_json::Value {
        serde_json::json!({
            "engine": self.engine,
            "density": self.effective_density(),
            "crop_last_image": self.crop_last_image,
            "clean": self.clean,
            "inkscape_strategy": self.inkscape_strategy,
            "max_concurrent_processes": self.max_concurrent_processes,
            "invocation_timeout_secs": self.invocation_timeout.map(|d| d.as_secs()),
            "job_id": self.job_id,
        })
    }

    /// Prefix for log lines, e.g. `"[job-42] "`, or empty.
    pub(crate) fn log_prefix(&self) -> String {
        self.job_id
            .as_deref()
            .map(|id| format!("[{id}] "))
            .unwrap_or_default()
    }
}

/// Clamp a requested density into the supported range.
pub fn effective_density(requested: Option<u32>) -> u32 {
    match requested {
        None | Some(0) => DPI_DENSITY_DEFAULT,
        Some(d) => d.min(DPI_DENSITY_MAX),
    }
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn engine(mut self, engine: EngineKind) -> Self {
        self.config.engine = engine;
        self
    }

    /// Requested density; clamping happens in [`ConversionConfig::effective_density`].
    pub fn density(mut self, dpi: u32) -> Self {
        self.config.density = Some(dpi);
        self
    }

    pub fn crop_last_image(mut self, v: bool) -> Self {
        self.config.crop_last_image = v;
        self
    }

    pub fn clean(mut self, v: bool) -> Self {
        self.config.clean = v;
        self
    }

    pub fn executables(mut self, executables: Executables) -> Self {
        self.config.executables = executables;
        self
    }

    pub fn inkscape_strategy(mut self, strategy: InkscapeStrategy) -> Self {
        self.config.inkscape_strategy = strategy;
        self
    }

    pub fn max_concurrent_processes(mut self, n: usize) -> Self {
        self.config.max_concurrent_processes = Some(n);
        self
    }

    pub fn invocation_timeout(mut self, timeout: Duration) -> Self {
        self.config.invocation_timeout = Some(timeout);
        self
    }

    pub fn job_id(mut self, id: impl Into<String>) -> Self {
        self.config.job_id = Some(id.into());
        self
    }

    pub fn listener(mut self, listener: EventListener) -> Self {
        self.config.listener = Some(listener);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, Pdf2OfficeError> {
        let c = &self.config;
        if c.max_concurrent_processes == Some(0) {
            return Err(Pdf2OfficeError::InvalidConfig(
                "max_concurrent_processes must be ≥ 1".into(),
            ));
        }
        if c.invocation_timeout == Some(Duration::ZERO) {
            return Err(Pdf2OfficeError::InvalidConfig(
                "invocation_timeout must be greater than zero".into(),
            ));
        }
        for exe in c.executables.iter() {
            if exe.program.is_empty() {
                return Err(Pdf2OfficeError::InvalidConfig(
                    "executable program names must not be empty".into(),
                ));
            }
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// The external rasteriser used for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineKind {
    /// `gs` with the `pngalpha` device, one process per input. (default)
    #[default]
    Ghostscript,
    /// `mutool draw`, one process per input; PNG inputs are copied through.
    Mupdf,
    /// `pdfseparate` then one `inkscape` export per page.
    Inkscape,
}

impl EngineKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineKind::Ghostscript => "ghostscript",
            EngineKind::Mupdf => "mupdf",
            EngineKind::Inkscape => "inkscape",
        }
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EngineKind {
    type Err = Pdf2OfficeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "ghostscript" | "gs" => Ok(EngineKind::Ghostscript),
            "mupdf" | "mutool" => Ok(EngineKind::Mupdf),
            "inkscape" => Ok(EngineKind::Inkscape),
            other => Err(Pdf2OfficeError::InvalidConfig(format!(
                "unknown engine '{other}' (expected ghostscript, mupdf or inkscape)"
            ))),
        }
    }
}

/// How the Inkscape adapter issues its per-page exports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InkscapeStrategy {
    /// One `inkscape` process per page, all launched together. (default)
    #[default]
    FanOut,
    /// A single `inkscape --shell` session fed every export on stdin.
    ///
    /// Fewer process spawns, but the session works through the exports one
    /// at a time and ends up slower than [`InkscapeStrategy::FanOut`].
    Shell,
}

// ── Executables ──────────────────────────────────────────────────────────

/// An external program plus the arguments that always precede the
/// per-call ones (e.g. `mutool` + `draw`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Executable {
    pub program: String,
    pub args: Vec<String>,
}

impl Executable {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn with_args<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Interpret a user-supplied executable setting.
    ///
    /// A value naming an existing file is taken verbatim (so paths with
    /// spaces work); anything else is split on whitespace into program and
    /// leading arguments, e.g. `"mutool draw"`.
    pub fn parse(value: &str) -> Self {
        let value = value.trim();
        if Path::new(value).is_file() {
            return Self::new(value);
        }
        let mut parts = value.split_whitespace();
        let program = parts.next().unwrap_or_default();
        Self::with_args(program, parts)
    }
}

impl fmt::Display for Executable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for a in &self.args {
            write!(f, " {a}")?;
        }
        Ok(())
    }
}

/// Environment variable overriding the Ghostscript executable.
pub const ENV_GHOSTSCRIPT: &str = "PDF_PPT_GSPATH";
/// Environment variable overriding the MuPDF executable.
pub const ENV_MUPDF: &str = "PDF_PPT_MUPDF_PATH";
/// Environment variable overriding the Inkscape executable.
pub const ENV_INKSCAPE: &str = "PDF_PPT_INKSCAPE_PATH";
/// Environment variable overriding the ImageMagick `convert` executable.
pub const ENV_IMAGE_MAGICK: &str = "PDF_PPT_IMPATH";
/// Environment variable overriding the `pdfseparate` executable.
pub const ENV_PDF_SEPARATE: &str = "PDF_PPT_PDFSEPARATE_PATH";

/// The external programs the pipeline drives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Executables {
    pub ghostscript: Executable,
    pub mupdf: Executable,
    pub inkscape: Executable,
    pub image_magick: Executable,
    pub pdf_separate: Executable,
}

impl Executables {
    /// Resolve every executable from the `PDF_PPT_*` environment variables,
    /// falling back to defaults for the current OS.
    pub fn from_env() -> Self {
        Self::resolve(std::env::consts::OS, |key| std::env::var(key).ok())
    }

    /// Resolve for an explicit OS name (`"linux"`, `"macos"`, `"windows"`)
    /// with a custom variable lookup. Empty values count as unset.
    pub fn resolve(os: &str, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let (gs, mupdf, inkscape, im, separate) = match os {
            "windows" => (
                "gswin32c.exe",
                "mutool.exe draw",
                "inkscape",
                "convert.exe",
                "pdfseparate.exe",
            ),
            "macos" => ("gs", "mutool draw", "inkscape", "convert", "pdfseparate"),
            _ => ("gs", "mudraw", "inkscape", "convert", "pdfseparate"),
        };
        let pick = |key: &str, default: &str| {
            let value = lookup(key).filter(|v| !v.trim().is_empty());
            Executable::parse(value.as_deref().unwrap_or(default))
        };
        Self {
            ghostscript: pick(ENV_GHOSTSCRIPT, gs),
            mupdf: pick(ENV_MUPDF, mupdf),
            inkscape: pick(ENV_INKSCAPE, inkscape),
            image_magick: pick(ENV_IMAGE_MAGICK, im),
            pdf_separate: pick(ENV_PDF_SEPARATE, separate),
        }
    }

    fn iter(&self) -> impl Iterator<Item = &Executable> {
        [
            &self.ghostscript,
            &self.mupdf,
            &self.inkscape,
            &self.image_magick,
            &self.pdf_separate,
        ]
        .into_iter()
    }
}

impl Default for Executables {
    fn default() -> Self {
        Self::from_env()
    }
}
