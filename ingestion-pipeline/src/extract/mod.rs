pub mod pdf;
pub mod text;
pub mod url;

use crate::normalize::CleanedDocument;

/// Extraction output before normalization: pdf keeps per-page texts so page
/// spans survive into chunk metadata, the other kinds are a single body.
#[derive(Debug, Clone)]
pub enum ExtractedContent {
    Pages(Vec<String>),
    Text(String),
}

impl ExtractedContent {
    pub fn into_cleaned(self) -> CleanedDocument {
        match self {
            Self::Pages(pages) => CleanedDocument::from_pages(&pages),
            Self::Text(body) => CleanedDocument::from_text(&body),
        }
    }
}
