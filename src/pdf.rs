//! Assembling saved screenshots into a single PDF.
//!
//! Every image becomes one page whose size matches the image at the
//! configured resolution. Pixels are embedded as 8-bit RGB and
//! Flate-compressed, so the PDF carries the screenshots losslessly.

use std::fs;
use std::path::{Path, PathBuf};

use image::RgbImage;
use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, ObjectId, Stream, dictionary};

use crate::error::SlidegrabError;

const POINTS_PER_INCH: f64 = 72.0;

/// Builds one PDF page per screenshot.
#[derive(Debug, Clone)]
pub struct PdfAssembler {
    dpi: f64,
}

impl Default for PdfAssembler {
    fn default() -> Self {
        Self { dpi: 96.0 }
    }
}

impl PdfAssembler {
    pub fn new(dpi: f64) -> Self {
        Self { dpi }
    }

    /// Collect `*.{extension}` from `images_dir`, in ordinal order, and
    /// write them to `output` as one page each. Returns the page count.
    ///
    /// Any existing `output` is removed first, so a failed run never leaves
    /// a stale document behind.
    ///
    /// # Errors
    ///
    /// Returns [`SlidegrabError::Assembly`] when the directory holds no
    /// matching images, [`SlidegrabError::ImageError`] if one cannot be
    /// decoded, and [`SlidegrabError::Pdf`] or [`SlidegrabError::IoError`]
    /// if the document cannot be written.
    pub fn assemble<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        images_dir: P,
        extension: &str,
        output: Q,
    ) -> Result<usize, SlidegrabError> {
        let output = output.as_ref();
        if output.exists() {
            fs::remove_file(output)?;
        }

        let images = collect_images(images_dir.as_ref(), extension)?;
        if images.is_empty() {
            return Err(SlidegrabError::Assembly(format!(
                "no .{extension} images in {}",
                images_dir.as_ref().display()
            )));
        }

        let mut document = Document::with_version("1.5");
        let pages_id = document.new_object_id();
        let mut kids: Vec<Object> = Vec::with_capacity(images.len());

        for path in &images {
            let image = image::open(path)?.to_rgb8();
            let page_id = self.add_page(&mut document, pages_id, image)?;
            kids.push(page_id.into());
        }

        let count = kids.len();
        document.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count as i64,
            }),
        );
        let catalog_id = document.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        document.trailer.set("Root", catalog_id);
        document.compress();
        document.save(output)?;

        log::debug!("Wrote {count} page(s) to {}", output.display());
        Ok(count)
    }

    fn add_page(
        &self,
        document: &mut Document,
        pages_id: ObjectId,
        image: RgbImage,
    ) -> Result<ObjectId, SlidegrabError> {
        let (width, height) = image.dimensions();
        let page_width = (f64::from(width) * POINTS_PER_INCH / self.dpi) as f32;
        let page_height = (f64::from(height) * POINTS_PER_INCH / self.dpi) as f32;

        let image_id = document.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => i64::from(width),
                "Height" => i64::from(height),
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
            },
            image.into_raw(),
        ));

        let content = Content {
            operations: vec![
                Operation::new("q", vec![]),
                Operation::new(
                    "cm",
                    vec![
                        page_width.into(),
                        0.into(),
                        0.into(),
                        page_height.into(),
                        0.into(),
                        0.into(),
                    ],
                ),
                Operation::new("Do", vec!["Im0".into()]),
                Operation::new("Q", vec![]),
            ],
        };
        let content_id = document.add_object(Stream::new(dictionary! {}, content.encode()?));

        Ok(document.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), page_width.into(), page_height.into()],
            "Contents" => content_id,
            "Resources" => dictionary! {
                "XObject" => dictionary! {
                    "Im0" => image_id,
                },
            },
        }))
    }
}

/// Files in `directory` with the given extension (case-insensitive),
/// sorted by their ordinal prefix, then by file name.
///
/// # Errors
///
/// Returns [`SlidegrabError::IoError`] if the directory cannot be listed.
pub fn collect_images(directory: &Path, extension: &str) -> Result<Vec<PathBuf>, SlidegrabError> {
    if !directory.is_dir() {
        return Ok(Vec::new());
    }

    let mut images = Vec::new();
    for entry in fs::read_dir(directory)? {
        let path = entry?.path();
        let matches = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case(extension));
        if matches && path.is_file() {
            images.push(path);
        }
    }
    images.sort_by(|a, b| {
        let key = |path: &PathBuf| (ordinal(path).is_none(), ordinal(path));
        key(a)
            .cmp(&key(b))
            .then_with(|| a.file_name().cmp(&b.file_name()))
    });
    Ok(images)
}

/// Leading `{ordinal}_` number of a screenshot name. Names without one sort
/// after every numbered image.
fn ordinal(path: &Path) -> Option<u64> {
    let (prefix, _) = path.file_stem()?.to_str()?.split_once('_')?;
    prefix.parse().ok()
}
