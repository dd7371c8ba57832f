//! PDF text extraction.
//!
//! Extraction is delegated to the `pdf-extract` crate, which returns the document text as a
//! single string with form-feed characters (`\x0C`) separating pages. This module splits that
//! stream back into per-page records and drops pages without any extractable text. Scanned or
//! image-only PDFs therefore yield an empty page list; the upload handler treats that as a
//! client error.

use thiserror::Error;

/// Errors raised while extracting text from an uploaded PDF.
#[derive(Debug, Error)]
pub enum PdfError {
    /// The PDF could not be parsed by the extraction library.
    #[error("PDF extraction failed: {0}")]
    Extraction(String),
}

/// A single page of extracted text.
#[derive(Debug, Clone)]
pub struct Page {
    /// 1-based page number.
    pub number: usize,
    /// Extracted text content, trimmed of surrounding whitespace.
    pub text: String,
}

/// Extract per-page text from raw PDF bytes.
///
/// Returns an empty vector when the document parses but contains no extractable text.
pub fn extract_pdf(bytes: &[u8]) -> Result<Vec<Page>, PdfError> {
    let text = pdf_extract::extract_text_from_mem(bytes)
        .map_err(|err| PdfError::Extraction(err.to_string()))?;
    Ok(split_pages(&text))
}

/// Split an extracted text stream into pages on form-feed separators.
///
/// Pages containing only whitespace are dropped and do not consume a page number, matching the
/// behavior callers expect when reporting page counts. Text without any form feed is treated as
/// a single page.
fn split_pages(text: &str) -> Vec<Page> {
    text.split('\x0C')
        .map(str::trim)
        .filter(|page| !page.is_empty())
        .enumerate()
        .map(|(index, page)| Page {
            number: index + 1,
            text: page.to_string(),
        })
        .collect()
}

/// Concatenate page texts into a single string for chunking.
pub fn concatenate_pages(pages: &[Page]) -> String {
    pages
        .iter()
        .map(|page| page.text.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}
