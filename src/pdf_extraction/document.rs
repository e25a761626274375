// Document access - the page geometry, text layer and raster of one PDF
use image::RgbImage;
use std::path::{Path, PathBuf};

use super::lopdf_helper;
use super::renderer::SystemPdfRenderer;
use super::text_layer::TextLayer;
use crate::config::PopplerConfig;
use crate::types::{BoundingBox, Result, ScanError};

/// What the pipeline needs from a paginated document with a text layer.
pub trait PageSource: Send {
    fn page_count(&self) -> usize;

    /// Width and height in points of a 0-based page.
    fn page_size(&self, page: usize) -> Result<(f32, f32)>;

    /// Literal text inside `clip` on `page`, untrimmed.
    fn text_in(&self, page: usize, clip: &BoundingBox) -> Result<String>;

    fn rasterize(&self, page: usize, dpi: u32) -> Result<RgbImage>;
}

/// Opens documents for the batch scanner.
pub trait DocumentLoader: Send + Sync {
    fn open(&self, path: &Path) -> Result<Box<dyn PageSource>>;
}

/// PDF backed by lopdf (geometry), pdftotext (words) and pdftoppm (pixels).
pub struct PopplerDocument {
    path: PathBuf,
    page_sizes: Vec<(f32, f32)>,
    text: TextLayer,
    renderer: SystemPdfRenderer,
}

impl PopplerDocument {
    pub fn open(path: &Path, poppler: &PopplerConfig) -> Result<Self> {
        let document = lopdf_helper::load_pdf(path)?;
        let page_sizes = lopdf_helper::page_sizes(&document)?;
        lopdf_helper::require_pages(path, &page_sizes)?;

        let text = TextLayer::from_pdf(path, poppler)?;
        if text.pages.len() != page_sizes.len() {
            tracing::warn!(
                path = %path.display(),
                pdf_pages = page_sizes.len(),
                text_pages = text.pages.len(),
                "text layer page count differs from page tree"
            );
        }

        tracing::debug!(path = %path.display(), pages = page_sizes.len(), "opened document");

        Ok(Self {
            path: path.to_path_buf(),
            page_sizes,
            text,
            renderer: SystemPdfRenderer::new(poppler.clone()),
        })
    }
}

impl PageSource for PopplerDocument {
    fn page_count(&self) -> usize {
        self.page_sizes.len()
    }

    /// The size pdftotext reports for the page, so zones line up with word
    /// coordinates. The page tree's visible box covers pages it skipped.
    fn page_size(&self, page: usize) -> Result<(f32, f32)> {
        if let Some(text) = self.text.page(page).filter(|p| p.width > 0.0 && p.height > 0.0) {
            return Ok((text.width, text.height));
        }
        self.page_sizes
            .get(page)
            .copied()
            .ok_or_else(|| ScanError::Pdf(format!("page {} not found", page + 1)))
    }

    fn text_in(&self, page: usize, clip: &BoundingBox) -> Result<String> {
        // A page without a text layer entry simply has no text
        Ok(self
            .text
            .page(page)
            .map(|p| p.text_in(clip))
            .unwrap_or_default())
    }

    fn rasterize(&self, page: usize, dpi: u32) -> Result<RgbImage> {
        self.renderer.render_page(&self.path, page, dpi)
    }
}

pub struct PopplerLoader {
    poppler: PopplerConfig,
}

impl PopplerLoader {
    pub fn new(poppler: PopplerConfig) -> Self {
        Self { poppler }
    }
}

impl DocumentLoader for PopplerLoader {
    fn open(&self, path: &Path) -> Result<Box<dyn PageSource>> {
        Ok(Box::new(PopplerDocument::open(path, &self.poppler)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn document(page_sizes: Vec<(f32, f32)>, xhtml: &str) -> PopplerDocument {
        PopplerDocument {
            path: PathBuf::from("form.pdf"),
            page_sizes,
            text: TextLayer::parse(xhtml).unwrap(),
            renderer: SystemPdfRenderer::new(PopplerConfig::default()),
        }
    }

    #[test]
    fn test_page_size_follows_text_layer() {
        // MediaBox-only geometry says 612x1008; pdftotext saw the cropped page
        let doc = document(
            vec![(612.0, 1008.0), (612.0, 1008.0)],
            r#"<doc><page width="612" height="792"></page></doc>"#,
        );
        assert_eq!(doc.page_size(0).unwrap(), (612.0, 792.0));
        assert_eq!(doc.page_size(1).unwrap(), (612.0, 1008.0));
        assert!(matches!(doc.page_size(2), Err(ScanError::Pdf(_))));
    }

    #[test]
    fn test_text_clipped_per_page() {
        let doc = document(
            vec![(612.0, 792.0)],
            r#"<doc><page width="612" height="792"><line><word xMin="10" yMin="600" xMax="60" yMax="612">Signed</word></line></page></doc>"#,
        );
        let zone = BoundingBox::new(0.0, 0.65 * 792.0, 612.0, 792.0);
        assert_eq!(doc.text_in(0, &zone).unwrap(), "Signed");
        assert_eq!(doc.text_in(3, &zone).unwrap(), "");
    }
}
