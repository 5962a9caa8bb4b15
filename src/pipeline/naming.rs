//! Page file names: `{kind}-{source}-{page}.{ext}`.
//!
//! Engines write a number of pages per input that is only known once they
//! have finished, so the stage output is discovered by listing the directory
//! and recovering each file's position from its name:
//!
//! ```text
//! /tmp/pdf_ppt_5tz0dw/img/img-5-10.png   →  source 5, page 10
//! /tmp/pdf_ppt_5tz0dw/pdf/pdf-0-3.pdf    →  source 0, page 3
//! ```
//!
//! Both numbers are compared as integers. Page numbers are not zero-padded,
//! so a string sort would put `img-1-10.png` before `img-1-2.png`.

use crate::error::Pdf2OfficeError;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};

static PAGE_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(img|pdf)-(\d+)-(\d+)\.[A-Za-z0-9]+$").unwrap());

/// Prefix of rasterised page images.
pub const IMAGE_PREFIX: &str = "img";
/// Prefix of single-page PDFs produced by the split stage.
pub const PDF_PREFIX: &str = "pdf";

/// Position of a page: which input it came from, and where in that input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PageKey {
    /// Zero-based index of the input file within the request.
    pub source: usize,
    /// Engine-assigned page number within that input.
    pub page: u64,
}

impl PageKey {
    pub fn new(source: usize, page: u64) -> Self {
        Self { source, page }
    }

    /// Recover the key from a generated file name.
    pub fn from_path(path: &Path) -> Result<Self, Pdf2OfficeError> {
        let invalid = || Pdf2OfficeError::InvalidPageName {
            path: path.to_path_buf(),
        };
        let name = path.file_name().and_then(|n| n.to_str()).ok_or_else(invalid)?;
        let caps = PAGE_NAME.captures(name).ok_or_else(invalid)?;
        let source = caps[2].parse().map_err(|_| invalid())?;
        let page = caps[3].parse().map_err(|_| invalid())?;
        Ok(Self { source, page })
    }
}

/// A file produced by an engine, with its parsed position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedImage {
    pub path: PathBuf,
    pub key: PageKey,
}

impl GeneratedImage {
    pub fn from_path(path: PathBuf) -> Result<Self, Pdf2OfficeError> {
        let key = PageKey::from_path(&path)?;
        Ok(Self { path, key })
    }
}

/// File name for a rasterised page, e.g. `img-3-12.png`.
pub fn image_file_name(key: PageKey) -> String {
    format!("{IMAGE_PREFIX}-{}-{}.png", key.source, key.page)
}

/// Output template handed to engines that number pages themselves:
/// `img-{source}-%d.png`.
///
/// Templates are bare file names; the engine runs inside the output
/// directory. Ghostscript, MuPDF and pdfseparate each expand `%` anywhere in
/// the path they are given, and they disagree on escaping, so a directory
/// name such as `50%done` must never reach them.
pub fn image_template(source: usize) -> String {
    format!("{IMAGE_PREFIX}-{source}-%d.png")
}

/// Output template for the split stage: `pdf-{source}-%d.pdf`.
pub fn split_template(source: usize) -> String {
    format!("{PDF_PREFIX}-{source}-%d.pdf")
}

/// Parse and order paths by `(source, page)`.
///
/// The sort is stable. Any path that does not follow the naming convention
/// fails the whole call.
pub fn sort_pages<I>(paths: I) -> Result<Vec<GeneratedImage>, Pdf2OfficeError>
where
    I: IntoIterator<Item = PathBuf>,
{
    let mut pages = paths
        .into_iter()
        .map(GeneratedImage::from_path)
        .collect::<Result<Vec<_>, _>>()?;
    pages.sort_by_key(|p| p.key);
    Ok(pages)
}

/// List `dir` and return its page files in order.
pub async fn scan_sorted(dir: &Path) -> Result<Vec<GeneratedImage>, Pdf2OfficeError> {
    let scan_err = |source| Pdf2OfficeError::ScanFailed {
        path: dir.to_path_buf(),
        source,
    };
    let mut entries = tokio::fs::read_dir(dir).await.map_err(scan_err)?;
    let mut paths = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(scan_err)? {
        paths.push(entry.path());
    }
    sort_pages(paths)
}

/// The last page of every input in an already sorted list.
///
/// Picks the final element of each maximal run of pages sharing a source
/// index; the last element of the whole list is always included.
pub fn last_page_of_each_source(sorted: &[GeneratedImage]) -> Vec<&GeneratedImage> {
    sorted
        .iter()
        .enumerate()
        .filter(|(i, img)| match sorted.get(i + 1) {
            Some(next) => next.key.source != img.key.source,
            None => true,
        })
        .map(|(_, img)| img)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths(names: &[&str]) -> Vec<PathBuf> {
        names.iter().map(|n| PathBuf::from("img").join(n)).collect()
    }

    fn names(pages: &[GeneratedImage]) -> Vec<String> {
        pages
            .iter()
            .map(|p| p.path.file_name().unwrap().to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn parses_image_and_pdf_names() {
        assert_eq!(
            PageKey::from_path(Path::new("/tmp/pdf_ppt_x/img/img-5-10.png")).unwrap(),
            PageKey::new(5, 10)
        );
        assert_eq!(
            PageKey::from_path(Path::new("pdf-0-3.pdf")).unwrap(),
            PageKey::new(0, 3)
        );
    }

    #[test]
    fn rejects_foreign_names() {
        for bad in [".DS_Store", "img-1.png", "img-a-1.png", "page-1-1.png", "img-1-1"] {
            let err = PageKey::from_path(Path::new(bad)).unwrap_err();
            assert!(
                matches!(err, Pdf2OfficeError::InvalidPageName { .. }),
                "{bad}: {err}"
            );
        }
    }

    #[test]
    fn sort_is_numeric_on_both_components() {
        let sorted = sort_pages(paths(&["img-21-9.png", "img-1-1.png", "img-1-100.png"])).unwrap();
        assert_eq!(names(&sorted), ["img-1-1.png", "img-1-100.png", "img-21-9.png"]);
    }

    #[test]
    fn sort_is_idempotent() {
        let once = sort_pages(paths(&["img-2-10.png", "img-2-9.png", "img-10-1.png", "img-0-1.png"]))
            .unwrap();
        let twice = sort_pages(once.iter().map(|p| p.path.clone())).unwrap();
        assert_eq!(once, twice);
        assert_eq!(
            names(&twice),
            ["img-0-1.png", "img-2-9.png", "img-2-10.png", "img-10-1.png"]
        );
    }

    #[test]
    fn sort_fails_on_contract_violation() {
        assert!(sort_pages(paths(&["img-1-1.png", "thumbs.db"])).is_err());
    }

    #[test]
    fn last_pages_across_sources() {
        // already ordered per source, as the engines emit them
        let images: Vec<GeneratedImage> =
            paths(&["img-1-1.png", "img-1-100.png", "img-21-9.png", "img-2-1.png"])
                .into_iter()
                .map(|p| GeneratedImage::from_path(p).unwrap())
                .collect();
        let last: Vec<GeneratedImage> = last_page_of_each_source(&images)
            .into_iter()
            .cloned()
            .collect();
        assert_eq!(names(&last), ["img-1-100.png", "img-21-9.png", "img-2-1.png"]);
    }

    #[test]
    fn last_page_single_source() {
        let images = sort_pages(paths(&["img-1-0.png", "img-1-1.png", "img-1-2.png"])).unwrap();
        let last: Vec<GeneratedImage> = last_page_of_each_source(&images)
            .into_iter()
            .cloned()
            .collect();
        assert_eq!(names(&last), ["img-1-2.png"]);
    }

    #[test]
    fn last_page_of_empty_list() {
        assert!(last_page_of_each_source(&[]).is_empty());
    }

    #[test]
    fn templates() {
        assert_eq!(image_template(4), "img-4-%d.png");
        assert_eq!(split_template(0), "pdf-0-%d.pdf");
        assert_eq!(image_file_name(PageKey::new(2, 7)), "img-2-7.png");
    }

    #[tokio::test]
    async fn scan_sorted_lists_directory() {
        let dir = tempfile::tempdir().unwrap();
        for n in ["img-1-2.png", "img-0-10.png", "img-0-9.png"] {
            std::fs::write(dir.path().join(n), b"png").unwrap();
        }
        let sorted = scan_sorted(dir.path()).await.unwrap();
        assert_eq!(names(&sorted), ["img-0-9.png", "img-0-10.png", "img-1-2.png"]);
    }

    #[tokio::test]
    async fn scan_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = scan_sorted(&dir.path().join("nope")).await.unwrap_err();
        assert!(matches!(err, Pdf2OfficeError::ScanFailed { .. }));
    }
}
