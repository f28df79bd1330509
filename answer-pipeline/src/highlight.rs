use crate::snippet::char_slice;

/// Minimum match length before a highlight is emitted at all.
const MIN_HIGHLIGHT_CHARS: usize = 12;
/// How many mismatched chars may sit between two matched runs.
const GAP_TOLERANCE: usize = 3;
/// A run after a gap must be at least this long to extend the match.
const MIN_EXTENSION_RUN: usize = 8;

/// Best-effort location of an evidence snippet inside the full chunk text.
/// Exact match first, then longest-common-substring with a small gap
/// tolerance. Returns char offsets into the chunk text; `None` when nothing
/// of useful length matches. The returned span always satisfies
/// `chunk_text[start..end] == highlight_text`.
pub fn locate_highlight(chunk_text: &str, snippet: &str) -> Option<(usize, usize)> {
    let snippet = snippet.trim();
    if snippet.chars().count() < MIN_HIGHLIGHT_CHARS {
        return None;
    }

    if let Some(byte_at) = chunk_text.find(snippet) {
        let start = chunk_text[..byte_at].chars().count();
        return Some((start, start + snippet.chars().count()));
    }

    let chunk_chars: Vec<char> = chunk_text.chars().collect();
    let snippet_chars: Vec<char> = snippet.chars().collect();

    let (match_start, match_in_snippet, mut match_len) =
        longest_common_substring(&chunk_chars, &snippet_chars)?;

    if match_len < MIN_HIGHLIGHT_CHARS {
        return None;
    }

    // Extend across small gaps (OCR artifacts, collapsed whitespace) as long
    // as a solid run continues on both sides of the gap.
    let mut chunk_at = match_start + match_len;
    let mut snippet_at = match_in_snippet + match_len;
    loop {
        let mut extended = false;
        'gaps: for chunk_gap in 0..=GAP_TOLERANCE {
            for snippet_gap in 0..=GAP_TOLERANCE {
                let c = chunk_at + chunk_gap;
                let s = snippet_at + snippet_gap;
                let run = matching_run(&chunk_chars, c, &snippet_chars, s);
                if run >= MIN_EXTENSION_RUN {
                    chunk_at = c + run;
                    snippet_at = s + run;
                    match_len = chunk_at - match_start;
                    extended = true;
                    break 'gaps;
                }
            }
        }
        if !extended {
            break;
        }
    }

    Some((match_start, match_start + match_len))
}

fn matching_run(a: &[char], a_start: usize, b: &[char], b_start: usize) -> usize {
    let mut run = 0usize;
    while a_start + run < a.len()
        && b_start + run < b.len()
        && a[a_start + run] == b[b_start + run]
    {
        run += 1;
    }
    run
}

/// Rolling-row DP; returns (start in a, start in b, length) of the longest
/// common substring, or `None` when the strings share nothing.
fn longest_common_substring(a: &[char], b: &[char]) -> Option<(usize, usize, usize)> {
    if a.is_empty() || b.is_empty() {
        return None;
    }

    let mut previous = vec![0usize; b.len() + 1];
    let mut current = vec![0usize; b.len() + 1];
    let mut best_len = 0usize;
    let mut best_a_end = 0usize;
    let mut best_b_end = 0usize;

    for (i, &ca) in a.iter().enumerate() {
        for (j, &cb) in b.iter().enumerate() {
            if ca == cb {
                current[j + 1] = previous[j] + 1;
                if current[j + 1] > best_len {
                    best_len = current[j + 1];
                    best_a_end = i + 1;
                    best_b_end = j + 1;
                }
            } else {
                current[j + 1] = 0;
            }
        }
        std::mem::swap(&mut previous, &mut current);
        current.fill(0);
    }

    if best_len == 0 {
        None
    } else {
        Some((best_a_end - best_len, best_b_end - best_len, best_len))
    }
}

/// Extract the highlight text for a located span.
pub fn highlight_text(chunk_text: &str, start: usize, end: usize) -> String {
    char_slice(chunk_text, start, end).to_string()
}
