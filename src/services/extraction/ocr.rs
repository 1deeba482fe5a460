// OCR Fallback
// Rasterizes PDF pages with pdftoppm and reads them back with tesseract

use anyhow::{bail, Context, Result};
use chrono::Utc;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Reads text from a PDF whose pages carry no text layer.
pub trait OcrEngine: Send + Sync {
    /// One string per page, in page order.
    fn recognize_pdf(&self, pdf_bytes: &[u8]) -> Result<Vec<String>>;
}

#[derive(Debug, Clone)]
pub struct TesseractOcr {
    lang: String,
    dpi: u32,
}

impl TesseractOcr {
    pub fn new(lang: impl Into<String>, dpi: u32) -> Self {
        Self {
            lang: lang.into(),
            dpi,
        }
    }

    /// Both external tools are on PATH.
    pub fn available() -> bool {
        command_available("pdftoppm", "-v") && command_available("tesseract", "--version")
    }

    fn work_dir() -> PathBuf {
        let stamp = Utc::now().timestamp_nanos_opt().unwrap_or_default();
        std::env::temp_dir().join(format!("detector_ocr_{}_{}", std::process::id(), stamp))
    }

    fn rasterize(&self, pdf_path: &Path, out_dir: &Path) -> Result<Vec<PathBuf>> {
        let prefix = out_dir.join("page");
        let output = Command::new("pdftoppm")
            .arg("-r")
            .arg(self.dpi.to_string())
            .arg("-png")
            .arg(pdf_path)
            .arg(&prefix)
            .output()
            .with_context(|| format!("failed to execute pdftoppm for {}", pdf_path.display()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("pdftoppm returned non-zero exit status: {}", stderr.trim());
        }

        // pdftoppm zero-pads page numbers consistently within one run.
        let mut pages: Vec<PathBuf> = fs::read_dir(out_dir)
            .with_context(|| format!("failed to list {}", out_dir.display()))?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.extension().map_or(false, |ext| ext == "png"))
            .collect();
        pages.sort();

        if pages.is_empty() {
            bail!("pdftoppm produced no page images");
        }
        Ok(pages)
    }

    fn read_page(&self, png_path: &Path) -> Result<String> {
        let output = Command::new("tesseract")
            .arg(png_path)
            .arg("stdout")
            .arg("-l")
            .arg(&self.lang)
            .output()
            .with_context(|| format!("failed to execute tesseract for {}", png_path.display()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "tesseract returned non-zero exit status for {}: {}",
                png_path.display(),
                stderr.trim()
            );
        }

        Ok(String::from_utf8_lossy(&output.stdout)
            .replace('\u{0000}', "")
            .trim()
            .to_string())
    }
}

impl Default for TesseractOcr {
    fn default() -> Self {
        Self::new("eng", 300)
    }
}

impl OcrEngine for TesseractOcr {
    fn recognize_pdf(&self, pdf_bytes: &[u8]) -> Result<Vec<String>> {
        let work_dir = Self::work_dir();
        fs::create_dir_all(&work_dir)
            .with_context(|| format!("failed to create {}", work_dir.display()))?;

        let result = (|| {
            let pdf_path = work_dir.join("input.pdf");
            fs::write(&pdf_path, pdf_bytes)
                .with_context(|| format!("failed to write {}", pdf_path.display()))?;

            let pages = self.rasterize(&pdf_path, &work_dir)?;
            tracing::debug!(pages = pages.len(), dpi = self.dpi, "Running OCR");
            pages.iter().map(|p| self.read_page(p)).collect::<Result<Vec<_>>>()
        })();

        let _ = fs::remove_dir_all(&work_dir);
        result
    }
}

fn command_available(program: &str, version_flag: &str) -> bool {
    Command::new(program).arg(version_flag).output().is_ok()
}
