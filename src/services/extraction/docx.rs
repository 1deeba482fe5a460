// DOCX Extraction
// Paragraph text in document order, with a raw-XML fallback for packages docx-rs rejects

use once_cell::sync::Lazy;
use regex::Regex;
use std::io::{Cursor, Read};

use super::html::decode_entities;

static PARAGRAPH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<w:p[ >].*?</w:p>").expect("paragraph regex"));
static RUN_TEXT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<w:t(?: [^>]*)?>(.*?)</w:t>|<w:tab/>").expect("run text regex"));

pub fn extract_docx(bytes: &[u8]) -> Result<String, String> {
    match docx_rs::read_docx(bytes) {
        Ok(docx) => Ok(paragraphs_from_document(&docx.document).join("\n")),
        Err(e) => {
            tracing::debug!(error = %e, "docx-rs rejected package, reading document.xml directly");
            extract_from_document_xml(bytes)
        }
    }
}

fn paragraphs_from_document(document: &docx_rs::Document) -> Vec<String> {
    document
        .children
        .iter()
        .filter_map(|child| match child {
            docx_rs::DocumentChild::Paragraph(p) => Some(paragraph_text(p)),
            _ => None,
        })
        .collect()
}

fn paragraph_text(paragraph: &docx_rs::Paragraph) -> String {
    let mut out = String::new();
    collect_paragraph_children(&paragraph.children, &mut out);
    out
}

fn collect_paragraph_children(children: &[docx_rs::ParagraphChild], out: &mut String) {
    for child in children {
        match child {
            docx_rs::ParagraphChild::Run(run) => collect_run(run, out),
            docx_rs::ParagraphChild::Hyperlink(link) => collect_paragraph_children(&link.children, out),
            _ => {}
        }
    }
}

fn collect_run(run: &docx_rs::Run, out: &mut String) {
    for child in &run.children {
        match child {
            docx_rs::RunChild::Text(t) => out.push_str(&t.text),
            docx_rs::RunChild::Tab(_) => out.push('\t'),
            _ => {}
        }
    }
}

/// Read `word/document.xml` straight from the zip container.
fn extract_from_document_xml(bytes: &[u8]) -> Result<String, String> {
    let mut archive =
        zip::ZipArchive::new(Cursor::new(bytes)).map_err(|e| format!("not a docx package: {}", e))?;
    let mut entry = archive
        .by_name("word/document.xml")
        .map_err(|e| format!("missing word/document.xml: {}", e))?;
    let mut xml = String::new();
    entry
        .read_to_string(&mut xml)
        .map_err(|e| format!("unreadable word/document.xml: {}", e))?;

    let paragraphs: Vec<String> = PARAGRAPH_RE
        .find_iter(&xml)
        .map(|p| {
            RUN_TEXT_RE
                .captures_iter(p.as_str())
                .map(|c| match c.get(1) {
                    Some(text) => decode_entities(text.as_str()),
                    None => "\t".to_string(),
                })
                .collect::<String>()
        })
        .collect();
    Ok(paragraphs.join("\n"))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Write;

    pub fn build_docx(paragraphs: &[&str]) -> Vec<u8> {
        let mut docx = docx_rs::Docx::new();
        for p in paragraphs {
            docx = docx.add_paragraph(
                docx_rs::Paragraph::new().add_run(docx_rs::Run::new().add_text(*p)),
            );
        }
        let mut buf = Cursor::new(Vec::new());
        docx.build().pack(&mut buf).unwrap();
        buf.into_inner()
    }

    #[test]
    fn test_paragraphs_joined_in_order() {
        let bytes = build_docx(&["First paragraph.", "Second paragraph."]);
        let text = extract_docx(&bytes).unwrap();
        assert_eq!(text, "First paragraph.\nSecond paragraph.");
    }

    #[test]
    fn test_bare_document_xml_fallback() {
        let xml = r#"<?xml version="1.0"?><w:document><w:body><w:p><w:r><w:t>Tom &amp; Jerry</w:t></w:r></w:p><w:p><w:pPr/><w:r><w:t xml:space="preserve">second </w:t></w:r><w:r><w:t>line</w:t></w:r></w:p></w:body></w:document>"#;
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        writer
            .start_file("word/document.xml", zip::write::SimpleFileOptions::default())
            .unwrap();
        writer.write_all(xml.as_bytes()).unwrap();
        let bytes = writer.finish().unwrap().into_inner();

        let text = extract_docx(&bytes).unwrap();
        assert_eq!(text, "Tom & Jerry\nsecond line");
    }

    #[test]
    fn test_garbage_is_error() {
        assert!(extract_docx(b"plain bytes, not a zip").is_err());
    }
}
