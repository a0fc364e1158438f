//! PDF text extraction
//!
//! Text is pulled page by page with pdf_oxide. Pages that fail or carry no
//! text are skipped; the rest are trimmed and joined with a blank line.

use crate::error::{Error, Result};
use crate::types::{Document, Upload};
use pdf_oxide::converters::ConversionOptions;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Separator placed between the text of consecutive pages
pub const PAGE_SEPARATOR: &str = "\n\n";

/// Extract text from base64-encoded PDF content
/// Used for web uploads where PDF is sent as base64
pub fn extract_text_from_base64_pdf(base64_content: &str, max_bytes: usize) -> Result<String> {
    use base64::Engine;

    let bytes = base64::engine::general_purpose::STANDARD
        .decode(base64_content.trim())
        .map_err(|e| Error::parse("<base64>", format!("failed to decode base64: {}", e)))?;

    extract_text("<base64>", &bytes, max_bytes)
}

/// Extract text from a PDF held in memory
///
/// `name` only labels errors and logs. Inputs over `max_bytes` are rejected
/// before any parsing happens.
pub fn extract_text(name: &str, bytes: &[u8], max_bytes: usize) -> Result<String> {
    check_size(name, bytes.len() as u64, max_bytes)?;
    if !has_pdf_header(bytes) {
        return Err(Error::parse(name, "missing %PDF header"));
    }

    // pdf_oxide requires a file path
    let temp = TempPdf::write(bytes).map_err(|e| Error::parse(name, format!("failed to write temp PDF: {}", e)))?;
    extract_pages(name, temp.path())
}

/// Extract text from a PDF file on disk
pub fn extract_text_from_pdf(pdf_path: &Path, max_bytes: usize) -> Result<String> {
    let name = pdf_path.display().to_string();
    check_size(&name, std::fs::metadata(pdf_path)?.len(), max_bytes)?;
    extract_pages(&name, pdf_path)
}

/// Reject inputs over the upload limit
pub(crate) fn check_size(name: &str, size: u64, max_bytes: usize) -> Result<()> {
    if size > max_bytes as u64 {
        return Err(Error::parse(
            name,
            format!("file is {} bytes, limit is {} bytes", size, max_bytes),
        ));
    }
    Ok(())
}

/// Extract an upload into a [`Document`] tagged with its `source`
pub fn extract_document(upload: &Upload, max_bytes: usize) -> Result<Document> {
    let text = extract_text(&upload.name, &upload.bytes, max_bytes)?;
    Ok(Document::new(text).with_metadata("source", upload.name.clone()))
}

fn extract_pages(name: &str, pdf_path: &Path) -> Result<String> {
    let mut doc = pdf_oxide::PdfDocument::open(pdf_path)
        .map_err(|e| Error::parse(name, format!("failed to open PDF: {}", e)))?;

    let page_count = doc
        .page_count()
        .map_err(|e| Error::parse(name, format!("failed to get page count: {}", e)))?;

    let options = ConversionOptions::default();
    let mut pages = Vec::with_capacity(page_count);

    for page_idx in 0..page_count {
        match doc.to_markdown(page_idx, &options) {
            Ok(text) => {
                let text = text.trim();
                if !text.is_empty() {
                    pages.push(text.to_string());
                }
            }
            Err(e) => {
                warn!(document = name, page = page_idx + 1, error = %e, "failed to extract page");
            }
        }
    }

    debug!(document = name, pages = page_count, with_text = pages.len(), "extracted PDF");
    Ok(pages.join(PAGE_SEPARATOR))
}

fn has_pdf_header(bytes: &[u8]) -> bool {
    // The header may follow a little leading garbage
    let head = &bytes[..bytes.len().min(1024)];
    head.windows(5).any(|w| w == b"%PDF-")
}

/// Temp file removed on drop
struct TempPdf {
    path: PathBuf,
}

impl TempPdf {
    fn write(bytes: &[u8]) -> std::io::Result<Self> {
        let path = std::env::temp_dir().join(format!("finchat_pdf_{}.pdf", uuid::Uuid::new_v4()));
        std::fs::write(&path, bytes)?;
        Ok(Self { path })
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempPdf {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

#[cfg(test)]
pub(crate) mod testing {
    /// Build a minimal PDF with one Helvetica text line per page.
    /// An empty string produces a page with no text.
    pub fn minimal_pdf(pages: &[&str]) -> Vec<u8> {
        let mut objects: Vec<String> = Vec::new();
        let page_count = pages.len();
        // 1: catalog, 2: pages, 3: font, then (page, content) pairs
        let kids: Vec<String> = (0..page_count).map(|i| format!("{} 0 R", 4 + i * 2)).collect();
        objects.push("<< /Type /Catalog /Pages 2 0 R >>".to_string());
        objects.push(format!("<< /Type /Pages /Kids [{}] /Count {} >>", kids.join(" "), page_count));
        objects.push("<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>".to_string());

        for (i, text) in pages.iter().enumerate() {
            let content_id = 5 + i * 2;
            objects.push(format!(
                "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Resources << /Font << /F1 3 0 R >> >> /Contents {} 0 R >>",
                content_id
            ));
            let stream = if text.is_empty() {
                String::new()
            } else {
                let escaped = text.replace('\\', "\\\\").replace('(', "\\(").replace(')', "\\)");
                format!("BT /F1 12 Tf 72 720 Td ({}) Tj ET", escaped)
            };
            objects.push(format!("<< /Length {} >>\nstream\n{}\nendstream", stream.len(), stream));
        }

        let mut out = b"%PDF-1.4\n".to_vec();
        let mut offsets = Vec::with_capacity(objects.len());
        for (i, body) in objects.iter().enumerate() {
            offsets.push(out.len());
            out.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", i + 1, body).as_bytes());
        }

        let xref_offset = out.len();
        out.extend_from_slice(format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1).as_bytes());
        for offset in offsets {
            out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
        }
        out.extend_from_slice(
            format!(
                "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
                objects.len() + 1,
                xref_offset
            )
            .as_bytes(),
        );
        out
    }
}
