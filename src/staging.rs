//! Staging directory handling.
//!
//! Every run writes into a staging directory with two children:
//!
//! ```text
//! {staging}/
//!  ├─ img/   img-{source}-{page}.png, written by the engines
//!  └─ pdf/   pdf-{source}-{page}.pdf, written by pdfseparate (Inkscape only)
//! ```
//!
//! The caller may name the staging directory. When it does not, or when the
//! named path is not an existing directory, a fresh directory is created
//! under the system temp dir. Fresh directories are kept after the run: the
//! assembled document lands in them and the caller decides what to do with
//! it.

use crate::error::Pdf2OfficeError;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Prefix of freshly created staging directories.
pub const STAGING_PREFIX: &str = "pdf_ppt_";

const IMG_DIR: &str = "img";
const PDF_DIR: &str = "pdf";

/// A prepared staging directory with its `img` and `pdf` children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagingDir {
    root: PathBuf,
    img: PathBuf,
    pdf: PathBuf,
}

impl StagingDir {
    /// Lay out the staging directory under an existing `root`, creating
    /// `img` and `pdf` if needed.
    pub async fn create(root: impl Into<PathBuf>) -> Result<Self, Pdf2OfficeError> {
        let root = root.into();
        let img = root.join(IMG_DIR);
        let pdf = root.join(PDF_DIR);
        for dir in [&img, &pdf] {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|source| Pdf2OfficeError::Staging {
                    path: dir.clone(),
                    source,
                })?;
        }
        debug!("staging directory ready: {}", root.display());
        Ok(Self { root, img, pdf })
    }

    /// Use `requested` when it is an existing directory, otherwise a fresh
    /// `pdf_ppt_*` directory under the system temp dir.
    pub async fn prepare(requested: Option<&Path>) -> Result<Self, Pdf2OfficeError> {
        match requested {
            Some(dir) if tokio::fs::metadata(dir).await.is_ok_and(|m| m.is_dir()) => {
                Self::create(dir).await
            }
            Some(dir) => {
                warn!(
                    "staging directory '{}' is not a directory, using a temporary one",
                    dir.display()
                );
                Self::create(fresh_temp_dir()?).await
            }
            None => Self::create(fresh_temp_dir()?).await,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Where the engines write `img-{source}-{page}.png`.
    pub fn img_dir(&self) -> &Path {
        &self.img
    }

    /// Where `pdfseparate` writes `pdf-{source}-{page}.pdf`.
    pub fn pdf_dir(&self) -> &Path {
        &self.pdf
    }

    /// Remove the image directory and everything in it.
    pub async fn clean_image_dir(&self) -> std::io::Result<()> {
        tokio::fs::remove_dir_all(&self.img).await
    }
}

/// Create a new, persistent `pdf_ppt_*` directory under the temp dir.
fn fresh_temp_dir() -> Result<PathBuf, Pdf2OfficeError> {
    tempfile::Builder::new()
        .prefix(STAGING_PREFIX)
        .tempdir()
        .map(tempfile::TempDir::keep)
        .map_err(|source| Pdf2OfficeError::Staging {
            path: std::env::temp_dir(),
            source,
        })
}
