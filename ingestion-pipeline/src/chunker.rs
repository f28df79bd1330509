use crate::normalize::{char_slice, CleanedDocument};

/// How far back from the target cut the chunker will look for a structural
/// boundary before giving up and hard-cutting.
const BOUNDARY_TOLERANCE_CHARS: usize = 400;

/// A chunk before it becomes a stored row: text plus placement metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkPiece {
    pub ordinal: u32,
    pub text: String,
    pub char_start: usize,
    pub char_end: usize,
    pub page_start: Option<u32>,
    pub page_end: Option<u32>,
    pub section_path: Vec<String>,
}

/// Sliding-window chunker: windows of `target` chars overlapping by
/// `overlap` chars, with the window end snapped to the nearest paragraph,
/// sentence, or word boundary within a tolerance. Offsets are absolute char
/// offsets into the cleaned text, so for every piece
/// `cleaned[char_start..char_end] == text`, and consecutive pieces satisfy
/// `pieces[i].char_start == pieces[i-1].char_end - overlap`.
pub fn chunk_document(doc: &CleanedDocument, target: usize, overlap: usize) -> Vec<ChunkPiece> {
    let total = doc.text.chars().count();
    if total == 0 {
        return Vec::new();
    }

    let target = target.max(1);
    let overlap = overlap.min(target.saturating_sub(1));

    let mut pieces = Vec::new();
    let mut start = 0usize;
    let mut ordinal = 0u32;

    loop {
        let tentative_end = (start + target).min(total);
        let end = if tentative_end == total {
            total
        } else {
            let snapped = snap_to_boundary(&doc.text, start, tentative_end);
            // A snap that erases all fresh content would stall the walk.
            if snapped <= start + overlap {
                tentative_end
            } else {
                snapped
            }
        };

        let text = char_slice(&doc.text, start, end).to_string();
        let (page_start, page_end) = match doc.pages_for_range(start, end) {
            Some((min, max)) => (Some(min), Some(max)),
            None => (None, None),
        };

        pieces.push(ChunkPiece {
            ordinal,
            text,
            char_start: start,
            char_end: end,
            page_start,
            page_end,
            section_path: doc.section_path_at(start),
        });

        if end == total {
            break;
        }

        start = end - overlap;
        ordinal += 1;
    }

    pieces
}

/// Look backward from `tentative_end` (at most the tolerance, never past
/// `start`) for the best boundary: paragraph break, then sentence end, then
/// word gap. Returns the char offset to cut at, or `tentative_end` when the
/// window has no boundary at all.
fn snap_to_boundary(text: &str, start: usize, tentative_end: usize) -> usize {
    let window_start = tentative_end
        .saturating_sub(BOUNDARY_TOLERANCE_CHARS)
        .max(start + 1);
    let chars: Vec<char> = char_slice(text, window_start, tentative_end).chars().collect();

    let mut paragraph: Option<usize> = None;
    let mut sentence: Option<usize> = None;
    let mut word: Option<usize> = None;

    // Scan forward; later hits win, so each kind ends up at its last
    // (nearest-to-target) occurrence.
    for (i, &c) in chars.iter().enumerate() {
        let at = window_start + i + 1;
        match c {
            '\n' => {
                if chars.get(i + 1) == Some(&'\n') {
                    paragraph = Some(at + 1);
                } else {
                    word = Some(at);
                }
            }
            '.' | '!' | '?' => {
                let next = chars.get(i + 1);
                if next.map_or(true, |n| n.is_whitespace()) {
                    sentence = Some(at);
                }
            }
            c if c.is_whitespace() => {
                word = Some(at);
            }
            _ => {}
        }
    }

    paragraph
        .or(sentence)
        .or(word)
        .map_or(tentative_end, |cut| cut.min(tentative_end))
}
