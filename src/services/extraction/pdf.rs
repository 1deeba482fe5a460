// PDF Extraction
// Text layer first; scanned documents go through OCR page by page

use std::panic::{self, AssertUnwindSafe};

use super::ocr::OcrEngine;

/// Where the returned text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PdfTextSource {
    TextLayer,
    Ocr,
}

/// Text-layer pages in order. The parser can panic on malformed input; that
/// is reported as an error like any other parse failure.
pub fn text_layer_pages(bytes: &[u8]) -> Result<Vec<String>, String> {
    match panic::catch_unwind(AssertUnwindSafe(|| pdf_extract::extract_text_from_mem_by_pages(bytes))) {
        Ok(Ok(pages)) => Ok(pages),
        Ok(Err(e)) => Err(e.to_string()),
        Err(_) => Err("PDF parser panicked on malformed input".to_string()),
    }
}

pub fn extract_pdf(
    bytes: &[u8],
    ocr: Option<&dyn OcrEngine>,
) -> Result<(String, PdfTextSource), String> {
    let layer_error = match text_layer_pages(bytes) {
        Ok(pages) => {
            let text = pages.join("\n");
            if !text.trim().is_empty() {
                return Ok((text, PdfTextSource::TextLayer));
            }
            tracing::info!(pages = pages.len(), "PDF has no text layer, falling back to OCR");
            None
        }
        Err(e) => {
            tracing::warn!(error = %e, "PDF text layer unreadable, falling back to OCR");
            Some(e)
        }
    };

    let Some(ocr) = ocr else {
        return match layer_error {
            Some(e) => Err(e),
            None => Ok((String::new(), PdfTextSource::TextLayer)),
        };
    };

    match ocr.recognize_pdf(bytes) {
        Ok(pages) => Ok((pages.join("\n"), PdfTextSource::Ocr)),
        Err(ocr_err) => Err(match layer_error {
            Some(e) => format!("{}; OCR fallback failed: {:#}", e, ocr_err),
            None => format!("OCR failed: {:#}", ocr_err),
        }),
    }
}
