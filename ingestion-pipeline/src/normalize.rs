/// Whitespace normalization and the page/section maps the chunker consumes.
/// All offsets in this module (and everything downstream of it) are measured
/// in characters of the cleaned text, not bytes.

/// Char span of a single page inside the cleaned text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageSpan {
    pub page: u32,
    pub char_start: usize,
    pub char_end: usize,
}

/// A point where the active heading trail changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionMark {
    pub char_offset: usize,
    pub path: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct CleanedDocument {
    pub text: String,
    pub page_map: Vec<PageSpan>,
    pub section_map: Vec<SectionMark>,
}

impl CleanedDocument {
    /// Build from a single text body (text and url sources).
    pub fn from_text(raw: &str) -> Self {
        let text = normalize_whitespace(raw);
        let section_map = build_section_map(&text);
        Self {
            text,
            page_map: Vec::new(),
            section_map,
        }
    }

    /// Build from per-page texts (pdf sources). Pages are joined with a
    /// blank line and each page's char span is recorded; pages are numbered
    /// from 1.
    pub fn from_pages(pages: &[String]) -> Self {
        let mut text = String::new();
        let mut page_map = Vec::new();
        let mut cursor = 0usize;

        for (index, raw_page) in pages.iter().enumerate() {
            let cleaned = normalize_whitespace(raw_page);
            if cleaned.is_empty() {
                continue;
            }

            if !text.is_empty() {
                text.push_str("\n\n");
                cursor += 2;
            }

            let char_len = cleaned.chars().count();
            page_map.push(PageSpan {
                page: u32::try_from(index + 1).unwrap_or(u32::MAX),
                char_start: cursor,
                char_end: cursor + char_len,
            });
            text.push_str(&cleaned);
            cursor += char_len;
        }

        let section_map = build_section_map(&text);
        Self {
            text,
            page_map,
            section_map,
        }
    }

    /// Pages touched by a char range, as an inclusive (min, max) pair.
    pub fn pages_for_range(&self, char_start: usize, char_end: usize) -> Option<(u32, u32)> {
        let touched: Vec<u32> = self
            .page_map
            .iter()
            .filter(|span| span.char_start < char_end && span.char_end > char_start)
            .map(|span| span.page)
            .collect();

        match (touched.iter().min(), touched.iter().max()) {
            (Some(min), Some(max)) => Some((*min, *max)),
            _ => None,
        }
    }

    /// The heading trail active at a char offset.
    pub fn section_path_at(&self, char_offset: usize) -> Vec<String> {
        self.section_map
            .iter()
            .take_while(|mark| mark.char_offset <= char_offset)
            .last()
            .map(|mark| mark.path.clone())
            .unwrap_or_default()
    }
}

/// NFC-normalize, collapse horizontal whitespace runs, strip trailing
/// space, and cap consecutive blank lines at one (so paragraph boundaries
/// stay visible to the chunker as exactly `\n\n`).
pub fn normalize_whitespace(raw: &str) -> String {
    use unicode_normalization::UnicodeNormalization;

    let composed: String = raw.nfc().collect();
    let mut lines: Vec<String> = Vec::new();
    for line in composed.replace("\r\n", "\n").replace('\r', "\n").lines() {
        let collapsed = line
            .split([' ', '\t', '\u{A0}'])
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        lines.push(collapsed);
    }

    let mut out: Vec<&str> = Vec::new();
    let mut blank_run = 0usize;
    for line in &lines {
        if line.is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        out.push(line);
    }

    out.join("\n").trim_matches('\n').to_string()
}

/// Markdown-style headings (`#` through `######`) define the section tree.
/// Each heading replaces the trail at its level and truncates deeper levels.
fn build_section_map(text: &str) -> Vec<SectionMark> {
    let mut marks = Vec::new();
    let mut stack: Vec<(usize, String)> = Vec::new();
    let mut offset = 0usize;

    for line in text.split('\n') {
        let char_len = line.chars().count();
        if let Some((level, title)) = parse_heading(line) {
            stack.retain(|(l, _)| *l < level);
            stack.push((level, title));
            marks.push(SectionMark {
                char_offset: offset,
                path: stack.iter().map(|(_, t)| t.clone()).collect(),
            });
        }
        offset += char_len + 1;
    }

    marks
}

fn parse_heading(line: &str) -> Option<(usize, String)> {
    let trimmed = line.trim_start();
    let level = trimmed.chars().take_while(|c| *c == '#').count();
    if level == 0 || level > 6 {
        return None;
    }
    let title = trimmed[level..].trim();
    if title.is_empty() {
        return None;
    }
    Some((level, title.to_string()))
}

/// Slice by char offsets. The whole crate measures offsets in chars, so this
/// is the one place the char→byte mapping happens.
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
