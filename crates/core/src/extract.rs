//! Text extraction port plus the default implementation: `lopdf` for PDF,
//! UTF-8 passthrough for plain text and markdown. Anything else is
//! unsupported and filtered before download.

use lopdf::Document;

use crate::error::IndexError;

/// Content types the pipeline will download and extract.
pub const SUPPORTED_CONTENT_TYPES: [&str; 3] = ["application/pdf", "text/plain", "text/markdown"];

pub fn is_supported_content_type(content_type: &str) -> bool {
    let base = content_type.split(';').next().unwrap_or("").trim();
    SUPPORTED_CONTENT_TYPES.contains(&base)
}

/// Repositories often report `application/octet-stream` for everything;
/// fall back to the file extension in that case.
pub fn correct_content_type(name: &str, reported: &str) -> String {
    if !reported.is_empty() && reported != "application/octet-stream" {
        return reported.to_string();
    }

    let extension = name.rsplit_once('.').map(|(_, ext)| ext.to_lowercase());
    match extension.as_deref() {
        Some("pdf") => "application/pdf".to_string(),
        Some("txt") => "text/plain".to_string(),
        Some("md") | Some("markdown") => "text/markdown".to_string(),
        _ => reported.to_string(),
    }
}

/// Byte-level format extraction seam. Implementations return plain text;
/// structure recovery is best-effort by contract.
pub trait TextExtractor: Send + Sync {
    fn extract(&self, bytes: &[u8], content_type: &str) -> Result<String, IndexError>;
}

#[derive(Default)]
pub struct DefaultExtractor;

impl TextExtractor for DefaultExtractor {
    fn extract(&self, bytes: &[u8], content_type: &str) -> Result<String, IndexError> {
        let base = content_type.split(';').next().unwrap_or("").trim();
        match base {
            "application/pdf" => extract_pdf(bytes),
            "text/plain" | "text/markdown" => String::from_utf8(bytes.to_vec())
                .map_err(|error| IndexError::Extraction(format!("invalid utf-8: {error}"))),
            other => Err(IndexError::UnsupportedContentType(other.to_string())),
        }
    }
}

fn extract_pdf(bytes: &[u8]) -> Result<String, IndexError> {
    let document = Document::load_mem(bytes)
        .map_err(|error| IndexError::Extraction(format!("pdf parse error: {error}")))?;

    let mut text = String::new();
    for (page_no, _page_id) in document.get_pages() {
        let page_text = document
            .extract_text(&[page_no])
            .map_err(|error| IndexError::Extraction(format!("pdf text error: {error}")))?;
        if !page_text.trim().is_empty() {
            text.push_str(&page_text);
            text.push('\n');
        }
    }

    if text.trim().is_empty() {
        return Err(IndexError::Extraction(
            "pdf had no readable page text".to_string(),
        ));
    }

    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn octet_stream_is_corrected_from_extension() {
        assert_eq!(
            correct_content_type("Vedtekter v7.1.pdf", "application/octet-stream"),
            "application/pdf"
        );
        assert_eq!(correct_content_type("notes.md", ""), "text/markdown");
        assert_eq!(
            correct_content_type("unknown.xyz", "application/octet-stream"),
            "application/octet-stream"
        );
    }

    #[test]
    fn explicit_content_type_is_trusted() {
        assert_eq!(
            correct_content_type("file.bin", "text/plain"),
            "text/plain"
        );
    }

    #[test]
    fn support_check_ignores_charset_parameters() {
        assert!(is_supported_content_type("text/plain; charset=utf-8"));
        assert!(is_supported_content_type("application/pdf"));
        assert!(!is_supported_content_type(
            "application/vnd.ms-powerpoint"
        ));
    }

    #[test]
    fn plain_text_passes_through() {
        let extractor = DefaultExtractor;
        let text = extractor
            .extract("Vedtekter for BISO".as_bytes(), "text/plain")
            .unwrap();
        assert_eq!(text, "Vedtekter for BISO");
    }

    #[test]
    fn unsupported_type_is_rejected() {
        let extractor = DefaultExtractor;
        let result = extractor.extract(b"...", "image/png");
        assert!(matches!(
            result,
            Err(IndexError::UnsupportedContentType(_))
        ));
    }

    #[test]
    fn broken_pdf_surfaces_extraction_error() {
        let extractor = DefaultExtractor;
        let result = extractor.extract(b"%PDF-1.4\n%broken", "application/pdf");
        assert!(matches!(result, Err(IndexError::Extraction(_))));
    }
}
