//! PDF assembly: one page per ready label, preview stretched to the page.
//!
//! Pages are sized to the label geometry (101.6 × 152.4 mm by default), so
//! the PDF prints 1:1 on a 4×6 thermal stock from any viewer. A preview that
//! fails to decode leaves its page blank and is logged; the rest of the
//! document is still produced.
//!
//! printpdf's document type is not `Send`, so assembly runs start to finish
//! inside `spawn_blocking` and only the finished bytes cross threads.

use crate::config::LabelGeometry;
use crate::error::DeskError;
use crate::item::{LabelId, LabelItem, RenderedPreview};
use printpdf::{Image, ImageTransform, Mm, PdfDocument, PdfLayerReference};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const LAYER_NAME: &str = "Label";

/// One page of an assembled document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelPage {
    pub id: LabelId,
    pub name: String,
    /// `false` when the preview could not be decoded and the page is blank.
    pub embedded: bool,
}

/// A finished multi-page label PDF.
#[derive(Debug, Clone)]
pub struct LabelDocument {
    /// Pages in document order.
    pub pages: Vec<LabelPage>,
    /// Serialised PDF.
    pub bytes: Vec<u8>,
}

impl LabelDocument {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}

/// Assemble a PDF from the ready labels in `items`, in order.
///
/// Labels that are not `Ready` or carry no preview are skipped. Returns
/// `Ok(None)` when nothing is left to print.
pub fn assemble_labels(
    items: &[LabelItem],
    geometry: LabelGeometry,
) -> Result<Option<LabelDocument>, DeskError> {
    let printable: Vec<(&LabelItem, &RenderedPreview)> = items
        .iter()
        .filter(|item| item.is_ready())
        .filter_map(|item| item.preview.as_ref().map(|p| (item, p)))
        .collect();

    if printable.is_empty() {
        debug!("No ready labels to assemble");
        return Ok(None);
    }

    let (width, height) = (Mm(geometry.width_mm()), Mm(geometry.height_mm()));
    let (doc, first_page, first_layer) =
        PdfDocument::new("Shipping labels", width, height, LAYER_NAME);

    let mut pages = Vec::with_capacity(printable.len());
    for (i, (item, preview)) in printable.iter().enumerate() {
        let layer = if i == 0 {
            doc.get_page(first_page).get_layer(first_layer)
        } else {
            let (page, layer) = doc.add_page(width, height, LAYER_NAME);
            doc.get_page(page).get_layer(layer)
        };

        let embedded = match draw_preview(layer, preview, geometry) {
            Ok(()) => true,
            Err(e) => {
                warn!("{}: preview could not be added to the PDF: {}", item.name, e);
                false
            }
        };

        pages.push(LabelPage {
            id: item.id,
            name: item.name.clone(),
            embedded,
        });
    }

    let bytes = doc
        .save_to_bytes()
        .map_err(|e| DeskError::PdfAssembly(e.to_string()))?;

    info!("Assembled {} label page(s), {} bytes", pages.len(), bytes.len());
    Ok(Some(LabelDocument { pages, bytes }))
}

/// Decode `preview` and stretch it over the whole page.
fn draw_preview(
    layer: PdfLayerReference,
    preview: &RenderedPreview,
    geometry: LabelGeometry,
) -> Result<(), image::ImageError> {
    let decoded = image::load_from_memory(preview.bytes())?;
    // Thermal previews are 1-bit/grey; flatten to RGB so no alpha mask is needed.
    let rgb = image::DynamicImage::ImageRgb8(decoded.to_rgb8());
    let (px_w, px_h) = (rgb.width().max(1) as f32, rgb.height().max(1) as f32);

    let dpi = geometry.dpi();
    let natural_w_mm = px_w / dpi * 25.4;
    let natural_h_mm = px_h / dpi * 25.4;

    Image::from_dynamic_image(&rgb).add_to_layer(
        layer,
        ImageTransform {
            translate_x: Some(Mm(0.0)),
            translate_y: Some(Mm(0.0)),
            scale_x: Some(geometry.width_mm() / natural_w_mm),
            scale_y: Some(geometry.height_mm() / natural_h_mm),
            dpi: Some(dpi),
            ..Default::default()
        },
    );
    Ok(())
}

/// [`assemble_labels`] on the blocking pool.
pub async fn assemble_labels_async(
    items: Vec<LabelItem>,
    geometry: LabelGeometry,
) -> Result<Option<LabelDocument>, DeskError> {
    tokio::task::spawn_blocking(move || assemble_labels(&items, geometry))
        .await
        .map_err(|e| DeskError::Internal(format!("PDF task panicked: {}", e)))?
}

/// Write the document to `path` atomically (temp file in the same
/// directory, then rename).
pub fn save_document(doc: &LabelDocument, path: &Path) -> Result<PathBuf, DeskError> {
    let write_err = |source: std::io::Error| DeskError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&parent).map_err(write_err)?;

    let mut tmp = tempfile::NamedTempFile::new_in(&parent).map_err(write_err)?;
    tmp.write_all(&doc.bytes).map_err(write_err)?;
    tmp.persist(path).map_err(|e| write_err(e.error))?;

    info!("Saved {} label page(s) to {}", doc.page_count(), path.display());
    Ok(path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::LabelStatus;
    use image::{GrayImage, Luma};
    use std::io::Cursor;
    use tempfile::TempDir;

    fn png_bytes(w: u32, h: u32) -> Vec<u8> {
        let img = image::DynamicImage::ImageLuma8(GrayImage::from_pixel(w, h, Luma([255])));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), image::ImageOutputFormat::Png)
            .expect("encode png");
        buf
    }

    fn ready_item(name: &str, preview: Vec<u8>) -> LabelItem {
        let mut item = LabelItem::pending(name);
        item.preview = Some(RenderedPreview::png(preview));
        item.status = LabelStatus::Ready;
        item
    }

    #[test]
    fn one_page_per_ready_label_in_order() {
        let mut failed = LabelItem::pending("broken.zpl");
        failed.status = LabelStatus::Error;
        let items = vec![
            ready_item("first.zpl", png_bytes(32, 48)),
            failed,
            ready_item("second.zpl", png_bytes(32, 48)),
        ];

        let doc = assemble_labels(&items, LabelGeometry::default())
            .expect("assembly")
            .expect("document");

        let names: Vec<&str> = doc.pages.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["first.zpl", "second.zpl"]);
        assert!(doc.pages.iter().all(|p| p.embedded));
        assert!(doc.bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn no_ready_labels_means_no_document() {
        let items = vec![LabelItem::pending("queued.zpl")];
        assert!(assemble_labels(&items, LabelGeometry::default())
            .unwrap()
            .is_none());
        assert!(assemble_labels(&[], LabelGeometry::default())
            .unwrap()
            .is_none());
    }

    #[test]
    fn ready_without_preview_is_skipped() {
        let mut odd = LabelItem::pending("odd.zpl");
        odd.status = LabelStatus::Ready;
        let items = vec![odd, ready_item("ok.zpl", png_bytes(8, 8))];

        let doc = assemble_labels(&items, LabelGeometry::default())
            .unwrap()
            .unwrap();
        assert_eq!(doc.page_count(), 1);
        assert_eq!(doc.pages[0].name, "ok.zpl");
    }

    #[test]
    fn undecodable_preview_leaves_blank_page() {
        let items = vec![
            ready_item("garbage.zpl", b"not a png".to_vec()),
            ready_item("good.zpl", png_bytes(16, 24)),
        ];
        let doc = assemble_labels(&items, LabelGeometry::default())
            .unwrap()
            .unwrap();
        assert_eq!(doc.page_count(), 2);
        assert!(!doc.pages[0].embedded);
        assert!(doc.pages[1].embedded);
    }

    #[test]
    fn save_creates_parent_dirs() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("out/labels.pdf");
        let doc = LabelDocument {
            pages: vec![],
            bytes: b"%PDF-1.3\n".to_vec(),
        };
        let saved = save_document(&doc, &target).unwrap();
        assert_eq!(saved, target);
        assert_eq!(std::fs::read(&target).unwrap(), b"%PDF-1.3\n");
    }

    #[test]
    fn async_assembly_matches_sync() {
        let items = vec![ready_item("a.zpl", png_bytes(8, 8))];
        let doc = tokio_test::block_on(assemble_labels_async(items, LabelGeometry::default()))
            .unwrap()
            .unwrap();
        assert_eq!(doc.page_count(), 1);
    }
}
