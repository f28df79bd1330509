use common::error::AppError;
use lopdf::Document;
use tracing::debug;

/// Extract per-page text from stored PDF bytes, enforcing the byte and page
/// caps first. Caps fail with `Validation` so the job queue treats them as
/// terminal instead of retrying a document that will never shrink.
///
/// lopdf's extractor runs page by page (page spans feed chunk metadata);
/// when it yields nothing usable the whole document goes through
/// pdf-extract, which copes with more exotic text layers at the cost of
/// page attribution.
pub fn extract_pdf_pages(
    bytes: &[u8],
    max_bytes: usize,
    max_pages: usize,
) -> Result<Vec<String>, AppError> {
    if bytes.len() > max_bytes {
        return Err(AppError::Validation(format!(
            "pdf is {} bytes, above the {max_bytes} byte cap",
            bytes.len()
        )));
    }

    let document = Document::load_mem(bytes)
        .map_err(|e| AppError::Validation(format!("file is not a readable pdf: {e}")))?;

    let mut page_numbers: Vec<u32> = document.get_pages().keys().copied().collect();
    page_numbers.sort_unstable();

    if page_numbers.is_empty() {
        return Err(AppError::Validation("pdf has no pages".into()));
    }
    if page_numbers.len() > max_pages {
        return Err(AppError::Validation(format!(
            "pdf has {} pages, above the {max_pages} page cap",
            page_numbers.len()
        )));
    }

    let pages: Vec<String> = page_numbers
        .iter()
        .map(|page| document.extract_text(&[*page]).unwrap_or_default())
        .collect();

    if pages.iter().any(|page| !page.trim().is_empty()) {
        debug!(pages = pages.len(), "extracted pdf text per page");
        return Ok(pages);
    }

    // Fallback: one undifferentiated page span beats losing the document.
    let text = pdf_extract::extract_text_from_mem(bytes)
        .map_err(|e| AppError::Processing(format!("pdf text extraction failed: {e}")))?;
    if text.trim().is_empty() {
        return Err(AppError::Processing(
            "pdf contains no extractable text layer".into(),
        ));
    }

    debug!(chars = text.len(), "extracted pdf text via fallback");
    Ok(vec![text])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_oversized_bytes_before_parsing() {
        let result = extract_pdf_pages(&[0u8; 64], 16, 300);
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[test]
    fn rejects_bytes_that_are_not_a_pdf() {
        let result = extract_pdf_pages(b"plain text masquerading as pdf", 1_000_000, 300);
        assert!(matches!(result, Err(AppError::Validation(_))));
    }
}
