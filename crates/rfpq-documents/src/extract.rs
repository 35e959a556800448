//! Text extraction for PDF and Word (DOCX) attachments.

use std::io::{Cursor, Read};

use quick_xml::events::Event;
use quick_xml::Reader;
use thiserror::Error;
use zip::ZipArchive;

const DOCX_BODY: &str = "word/document.xml";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Word,
}

impl DocumentKind {
    /// Picks an extractor from a (lowercased) `Content-Type` value.
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        if content_type.contains("pdf") {
            Some(DocumentKind::Pdf)
        } else if content_type.contains("word") || content_type.contains("document") {
            Some(DocumentKind::Word)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::Pdf => "pdf",
            DocumentKind::Word => "word",
        }
    }
}

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("pdf parsing failed: {0}")]
    Pdf(String),
    #[error("not a readable docx archive: {0}")]
    Archive(#[from] zip::result::ZipError),
    #[error("reading word/document.xml: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed word/document.xml: {0}")]
    Xml(String),
}

/// Lowercased text of the whole document.
pub fn extract_text(kind: DocumentKind, bytes: &[u8]) -> Result<String, ExtractionError> {
    match kind {
        DocumentKind::Pdf => pdf_text(bytes),
        DocumentKind::Word => docx_text(bytes),
    }
}

pub fn pdf_text(bytes: &[u8]) -> Result<String, ExtractionError> {
    let pages = pdf_extract::extract_text_from_mem_by_pages(bytes)
        .map_err(|e| ExtractionError::Pdf(e.to_string()))?;
    Ok(pages.join("\n").to_lowercase())
}

pub fn docx_text(bytes: &[u8]) -> Result<String, ExtractionError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;
    let mut xml = String::new();
    archive.by_name(DOCX_BODY)?.read_to_string(&mut xml)?;
    Ok(docx_paragraphs(&xml)?.join("\n").to_lowercase())
}

/// Paragraph texts of a WordprocessingML body, in document order.
fn docx_paragraphs(xml: &str) -> Result<Vec<String>, ExtractionError> {
    let mut reader = Reader::from_str(xml);
    let mut paragraphs = Vec::new();
    let mut current = String::new();
    let mut in_text = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"t" => in_text = true,
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => {
                    if !current.trim().is_empty() {
                        paragraphs.push(current.trim().to_string());
                    }
                    current.clear();
                }
                _ => {}
            },
            Ok(Event::Empty(e)) => {
                if matches!(e.local_name().as_ref(), b"tab" | b"br") {
                    current.push(' ');
                }
            }
            Ok(Event::Text(t)) if in_text => {
                let text = t.unescape().map_err(|e| ExtractionError::Xml(e.to_string()))?;
                current.push_str(&text);
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(ExtractionError::Xml(e.to_string())),
            _ => {}
        }
    }

    if !current.trim().is_empty() {
        paragraphs.push(current.trim().to_string());
    }
    Ok(paragraphs)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    pub(crate) fn make_test_pdf(text: &str) -> Vec<u8> {
        use lopdf::dictionary;
        use lopdf::{Document, Object, Stream};

        let mut doc = Document::with_version("1.4");
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let content = format!("BT /F1 12 Tf 100 700 Td ({text}) Tj ET");
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));
        let resources = dictionary! {
            "Font" => dictionary! {
                "F1" => font_id,
            },
        };
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Contents" => content_id,
            "Resources" => resources,
        });
        let pages_id = doc.add_object(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
        });
        if let Ok(Object::Dictionary(dict)) = doc.get_object_mut(page_id) {
            dict.set("Parent", pages_id);
        }
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut buf = Vec::new();
        doc.save_to(&mut buf).unwrap();
        buf
    }

    pub(crate) fn make_test_docx(paragraphs: &[&str]) -> Vec<u8> {
        let body = paragraphs
            .iter()
            .map(|p| format!(r#"<w:p><w:pPr><w:jc w:val="left"/></w:pPr><w:r><w:t xml:space="preserve">{p}</w:t></w:r></w:p>"#))
            .collect::<String>();
        let xml = format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{body}</w:body></w:document>"#
        );
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        zip.start_file(DOCX_BODY, SimpleFileOptions::default()).unwrap();
        zip.write_all(xml.as_bytes()).unwrap();
        zip.finish().unwrap().into_inner()
    }

    #[test]
    fn content_type_selects_extractor() {
        assert_eq!(DocumentKind::from_content_type("application/pdf"), Some(DocumentKind::Pdf));
        assert_eq!(
            DocumentKind::from_content_type(
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            ),
            Some(DocumentKind::Word)
        );
        assert_eq!(DocumentKind::from_content_type("application/msword"), Some(DocumentKind::Word));
        assert_eq!(DocumentKind::from_content_type("text/html; charset=utf-8"), None);
        assert_eq!(DocumentKind::from_content_type(""), None);
    }

    #[test]
    fn docx_paragraphs_are_joined_and_lowercased() {
        let bytes = make_test_docx(&["Scope of Work", "Install 40 Wireless Access Points &amp; cabling"]);
        let text = docx_text(&bytes).unwrap();
        assert_eq!(text, "scope of work\ninstall 40 wireless access points & cabling");
    }

    #[test]
    fn docx_runs_within_a_paragraph_concatenate() {
        let xml = r#"<w:document xmlns:w="x"><w:body><w:p><w:r><w:t>Wi</w:t></w:r><w:r><w:t>Fi</w:t></w:r><w:r><w:tab/><w:t>survey</w:t></w:r></w:p></w:body></w:document>"#;
        assert_eq!(docx_paragraphs(xml).unwrap(), vec!["WiFi survey".to_string()]);
    }

    #[test]
    fn docx_without_body_part_is_an_error() {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        zip.start_file("word/styles.xml", SimpleFileOptions::default()).unwrap();
        zip.write_all(b"<styles/>").unwrap();
        let bytes = zip.finish().unwrap().into_inner();
        assert!(matches!(docx_text(&bytes), Err(ExtractionError::Archive(_))));
        assert!(matches!(docx_text(b"not a zip"), Err(ExtractionError::Archive(_))));
    }

    #[test]
    fn pdf_text_is_lowercased() {
        let bytes = make_test_pdf("Wireless Survey");
        let text = pdf_text(&bytes).unwrap();
        assert!(text.contains("wireless"), "got: {text}");
    }
}
