// System PDF renderer using pdftoppm
use image::RgbImage;
use std::path::Path;
use std::process::Command;
use tempfile::TempDir;

use crate::config::PopplerConfig;
use crate::types::{Result, ScanError};

pub struct SystemPdfRenderer {
    poppler: PopplerConfig,
}

impl SystemPdfRenderer {
    pub fn new(poppler: PopplerConfig) -> Self {
        Self { poppler }
    }

    /// Rasterise one page (0-based) at `dpi` into an RGB bitmap.
    pub fn render_page(&self, pdf_path: &Path, page_num: usize, dpi: u32) -> Result<RgbImage> {
        tracing::debug!(path = %pdf_path.display(), page = page_num, dpi, "rendering page with pdftoppm");

        let temp_dir = TempDir::new()?;
        let output_prefix = temp_dir.path().join("page");

        // pdftoppm pages are 1-based
        let page = (page_num + 1).to_string();

        let output = Command::new(self.poppler.tool("pdftoppm"))
            .args(["-png", "-singlefile", "-r", &dpi.to_string(), "-f", &page, "-l", &page])
            .arg(pdf_path)
            .arg(&output_prefix)
            .output()
            .map_err(|e| ScanError::Render(format!("failed to run pdftoppm: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ScanError::Render(format!("pdftoppm failed: {}", stderr.trim())));
        }

        // -singlefile writes <prefix>.png without a page suffix
        let output_file = temp_dir.path().join("page.png");
        if !output_file.exists() {
            return Err(ScanError::Render(format!(
                "pdftoppm produced no output at {}",
                output_file.display()
            )));
        }

        let image = image::open(&output_file)?.to_rgb8();
        tracing::debug!(width = image.width(), height = image.height(), "page rendered");

        Ok(image)
    }
}
