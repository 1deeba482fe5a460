// Text Extraction Module
// Uploaded document bytes to plain text, dispatched on the declared file type:
// - docx: docx-rs paragraphs, zip/XML fallback
// - html: visible text
// - pdf: text layer with OCR fallback
// - ocr: pdftoppm + tesseract

pub mod docx;
pub mod html;
pub mod ocr;
pub mod pdf;

use std::sync::Arc;

use crate::error::ExtractionError;
use crate::models::{DocumentFormat, ExtractedDocument};
use crate::services::config_store::ExtractionConfig;

pub use ocr::{OcrEngine, TesseractOcr};
pub use pdf::PdfTextSource;

#[derive(Clone)]
pub struct TextExtractor {
    ocr: Option<Arc<dyn OcrEngine>>,
}

impl TextExtractor {
    pub fn new(ocr: Option<Arc<dyn OcrEngine>>) -> Self {
        Self { ocr }
    }

    pub fn from_config(config: &ExtractionConfig) -> Self {
        if !config.ocr_enabled {
            return Self::new(None);
        }
        if !TesseractOcr::available() {
            tracing::warn!("OCR enabled but pdftoppm/tesseract not found; scanned PDFs will yield no text");
        }
        Self::new(Some(Arc::new(TesseractOcr::new(config.ocr_lang.clone(), config.ocr_dpi))))
    }

    /// Extract text from an upload. Unknown extensions are rejected before any parsing.
    /// An empty result is not an error here; callers decide what "no text" means.
    pub fn extract(&self, bytes: Vec<u8>, filename: &str) -> Result<ExtractedDocument, ExtractionError> {
        let format = DocumentFormat::from_filename(filename).ok_or_else(|| {
            ExtractionError::UnsupportedFormat {
                filename: filename.to_string(),
            }
        })?;

        let extracted_text = match format {
            DocumentFormat::Txt => String::from_utf8_lossy(&bytes).into_owned(),
            DocumentFormat::Html => html::extract_html(&bytes),
            DocumentFormat::Docx => {
                docx::extract_docx(&bytes).map_err(|e| ExtractionError::failed(format, e))?
            }
            DocumentFormat::Pdf => {
                let (text, source) = pdf::extract_pdf(&bytes, self.ocr.as_deref())
                    .map_err(|e| ExtractionError::failed(format, e))?;
                tracing::debug!(source = ?source, "PDF text extracted");
                text
            }
        };

        tracing::info!(
            filename,
            format = %format,
            bytes = bytes.len(),
            chars = extracted_text.chars().count(),
            "Document extracted"
        );

        Ok(ExtractedDocument {
            raw_bytes: bytes,
            declared_format: format,
            extracted_text,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::extraction::pdf::tests::{build_pdf, FixedOcr};

    fn extractor_with_fixed_ocr() -> TextExtractor {
        TextExtractor::new(Some(Arc::new(FixedOcr("TEST"))))
    }

    #[test]
    fn test_txt_round_trip() {
        let doc = TextExtractor::new(None)
            .extract(b"Hello world".to_vec(), "note.txt")
            .unwrap();
        assert_eq!(doc.extracted_text, "Hello world");
        assert_eq!(doc.declared_format, DocumentFormat::Txt);
        assert_eq!(doc.raw_bytes, b"Hello world");
    }

    #[test]
    fn test_extension_is_case_insensitive() {
        let doc = TextExtractor::new(None)
            .extract(b"<p>Hi</p>".to_vec(), "PAGE.HTM")
            .unwrap();
        assert_eq!(doc.declared_format, DocumentFormat::Html);
        assert_eq!(doc.extracted_text, "Hi");
    }

    #[test]
    fn test_unsupported_extension() {
        let err = TextExtractor::new(None)
            .extract(b"anything".to_vec(), "data.xyz")
            .unwrap_err();
        assert!(matches!(err, ExtractionError::UnsupportedFormat { .. }));

        let err = TextExtractor::new(None)
            .extract(b"anything".to_vec(), "README")
            .unwrap_err();
        assert!(matches!(err, ExtractionError::UnsupportedFormat { .. }));
    }

    #[test]
    fn test_scanned_pdf_uses_ocr() {
        let doc = extractor_with_fixed_ocr()
            .extract(build_pdf(""), "scan.pdf")
            .unwrap();
        assert!(doc.extracted_text.contains("TEST"));
    }

    #[test]
    fn test_corrupt_docx_is_failed() {
        let err = TextExtractor::new(None)
            .extract(b"not a zip".to_vec(), "report.docx")
            .unwrap_err();
        assert!(matches!(
            err,
            ExtractionError::Failed {
                format: DocumentFormat::Docx,
                ..
            }
        ));
    }

    #[test]
    fn test_docx_paragraphs() {
        let bytes = crate::services::extraction::docx::tests::build_docx(&["Alpha", "Beta"]);
        let doc = TextExtractor::new(None).extract(bytes, "story.docx").unwrap();
        assert_eq!(doc.extracted_text, "Alpha\nBeta");
    }
}
