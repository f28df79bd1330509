/// Snippet selection for citations: the contiguous window of chunk text
/// (bounded by the configured snippet size) that covers the most question
/// terms. Offsets are char offsets within the chunk text.

/// A chosen window: the text plus its char offsets inside the chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnippetSpan {
    pub text: String,
    pub char_start: usize,
    pub char_end: usize,
}

/// Pick the best window. Candidate windows are anchored at sentence starts
/// and extended sentence-by-sentence up to `max_chars`; the window covering
/// the most distinct terms wins, earliest wins ties. Falls back to the chunk
/// prefix when nothing matches.
pub fn select_snippet(chunk_text: &str, terms: &[String], max_chars: usize) -> SnippetSpan {
    let total_chars = chunk_text.chars().count();
    if total_chars <= max_chars {
        return SnippetSpan {
            text: chunk_text.to_string(),
            char_start: 0,
            char_end: total_chars,
        };
    }

    let sentence_starts = sentence_start_offsets(chunk_text);
    let mut best: Option<(usize, SnippetSpan)> = None;

    for &anchor in &sentence_starts {
        let end = (anchor + max_chars).min(total_chars);
        // Trim the window back to the last whitespace so it doesn't end
        // mid-word (unless the window is one unbroken token).
        let window = char_slice(chunk_text, anchor, end);
        let trimmed_len = if end < total_chars {
            match window.rfind(char::is_whitespace) {
                Some(byte_at) if byte_at > 0 => window[..byte_at].chars().count(),
                _ => window.chars().count(),
            }
        } else {
            window.chars().count()
        };
        let window_end = anchor + trimmed_len;
        let text = char_slice(chunk_text, anchor, window_end).to_string();

        let coverage = covered_terms(&text, terms);
        let replace = match &best {
            Some((best_coverage, _)) => coverage > *best_coverage,
            None => true,
        };
        if replace {
            best = Some((
                coverage,
                SnippetSpan {
                    text,
                    char_start: anchor,
                    char_end: window_end,
                },
            ));
        }
    }

    best.map(|(_, span)| span).unwrap_or_else(|| SnippetSpan {
        text: char_slice(chunk_text, 0, max_chars).to_string(),
        char_start: 0,
        char_end: max_chars,
    })
}

fn covered_terms(window: &str, terms: &[String]) -> usize {
    let lower = window.to_lowercase();
    terms
        .iter()
        .filter(|term| lower.contains(term.as_str()))
        .count()
}

/// Char offsets where sentences begin (position after `.`/`!`/`?` plus
/// whitespace, and position 0).
fn sentence_start_offsets(text: &str) -> Vec<usize> {
    let mut starts = vec![0usize];
    let chars: Vec<char> = text.chars().collect();

    let mut i = 0;
    while i < chars.len() {
        if matches!(chars[i], '.' | '!' | '?' | '\n') {
            let mut next = i + 1;
            while next < chars.len() && chars[next].is_whitespace() {
                next += 1;
            }
            if next < chars.len() && next > i + 1 {
                starts.push(next);
            }
        }
        i += 1;
    }

    starts.dedup();
    starts
}

/// Slice by char offsets (chunk text is addressed in chars everywhere).
pub fn char_slice(text: &str, char_start: usize, char_end: usize) -> &str {
    let mut indices = text.char_indices().map(|(i, _)| i);
    let start = indices.clone().nth(char_start).unwrap_or(text.len());
    let end = if char_end > char_start {
        indices.nth(char_end - 1).map_or(text.len(), |byte| {
            byte + text[byte..].chars().next().map_or(0, char::len_utf8)
        })
    } else {
        start
    };
    &text[start..end]
}

/// Lowercased terms of at least three chars, deduped; the coverage alphabet
/// for snippet scoring.
pub fn query_terms(question: &str) -> Vec<String> {
    let mut terms: Vec<String> = question
        .split(|c: char| !c.is_alphanumeric())
        .map(str::to_lowercase)
        .filter(|term| term.len() >= 3)
        .collect();
    terms.sort();
    terms.dedup();
    terms
}
