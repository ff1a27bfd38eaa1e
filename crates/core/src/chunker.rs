//! Structure-aware chunking for legal/statutory text, with a semantic
//! sliding-window fallback for unstructured documents.
//!
//! Statutory text must never be split away from its numeric reference: the
//! keyword-search path depends on "§ 6.3" style locators surviving inside
//! the chunk, so split sections repeat their header on every piece.

use regex::Regex;

use crate::models::{Chunk, ChunkKind};

/// Minimum viable chunk content after trimming.
const MIN_CHUNK_CHARS: usize = 50;
/// Short sections are extended forward by at most this much.
const SECTION_EXTEND_CHARS: usize = 500;
/// Sections longer than this are split into sub-chunks.
const MAX_SECTION_CHARS: usize = 2_000;
/// Semantic fallback window size.
const SEMANTIC_WINDOW_CHARS: usize = 1_200;
/// Overlap between consecutive semantic chunks.
const SEMANTIC_OVERLAP_CHARS: usize = 300;
/// Fraction of the window searched (from the back) for a boundary.
const BOUNDARY_SEARCH_FRACTION: f64 = 0.4;

/// One structural header found in the text.
#[derive(Debug, Clone)]
pub struct SectionSpan {
    pub number: String,
    pub title: String,
    /// Byte offset of the header line start.
    pub header_start: usize,
}

/// Strategy seam for structural header detection, so parser-based
/// detectors can replace the regex one without touching the splitter.
pub trait StructureDetector: Send + Sync {
    fn detect(&self, text: &str) -> Vec<SectionSpan>;
}

/// Ordered regex patterns covering Norwegian and English legal headers.
pub struct RegexStructureDetector {
    patterns: Vec<Regex>,
}

impl Default for RegexStructureDetector {
    fn default() -> Self {
        let patterns = [
            // "§ 6.3 Valg av styret" / "§6-3 ..."
            r"(?m)^[ \t]*§[ \t]*(\d+(?:[.\-]\d+)*)[ \t]*(.*)$",
            // "Kapittel 4: Organisasjon" / "Chapter 4 Organisation"
            r"(?m)^[ \t]*(?:Kapittel|Chapter)[ \t]+(\d+(?:\.\d+)*)[ \t]*[:.]?[ \t]*(.*)$",
            // "Paragraf 6.3 ..." / "Section 6.3 ..." / "Article 12 ..."
            r"(?m)^[ \t]*(?:Paragraf|Seksjon|Section|Artikkel|Article)[ \t]+(\d+(?:\.\d+)*)[ \t]*[:.]?[ \t]*(.*)$",
            // Bare numbered headers: "6.3 Styrets sammensetning"
            r"(?m)^[ \t]*(\d+(?:\.\d+)+)[ \t]+(\p{L}.{0,120})$",
        ]
        .iter()
        .map(|pattern| Regex::new(pattern).unwrap())
        .collect();

        Self { patterns }
    }
}

impl StructureDetector for RegexStructureDetector {
    fn detect(&self, text: &str) -> Vec<SectionSpan> {
        let mut sections: Vec<SectionSpan> = Vec::new();

        for pattern in &self.patterns {
            for capture in pattern.captures_iter(text) {
                let whole = capture.get(0).unwrap();
                // Earlier patterns win when two match the same line.
                if sections
                    .iter()
                    .any(|existing| existing.header_start == whole.start())
                {
                    continue;
                }

                sections.push(SectionSpan {
                    number: capture
                        .get(1)
                        .map(|m| m.as_str().replace('-', "."))
                        .unwrap_or_default(),
                    title: capture
                        .get(2)
                        .map(|m| m.as_str().trim().to_string())
                        .unwrap_or_default(),
                    header_start: whole.start(),
                });
            }
        }

        sections.sort_by_key(|section| section.header_start);
        sections
    }
}

/// Two-phase chunker: structure-aware pass first, semantic fallback when no
/// headers are found.
pub struct Chunker {
    detector: Box<dyn StructureDetector>,
}

impl Default for Chunker {
    fn default() -> Self {
        Self {
            detector: Box::new(RegexStructureDetector::default()),
        }
    }
}

impl Chunker {
    pub fn new(detector: Box<dyn StructureDetector>) -> Self {
        Self { detector }
    }

    /// Split `text` into an ordered sequence of non-empty chunks.
    pub fn chunk(&self, text: &str) -> Vec<Chunk> {
        let sections = self.detector.detect(text);
        let chunks = if sections.is_empty() {
            semantic_chunks(text)
        } else {
            structured_chunks(text, &sections)
        };

        debug_assert!(chunks.iter().all(|chunk| !chunk.content.trim().is_empty()));
        chunks
    }
}

fn structured_chunks(text: &str, sections: &[SectionSpan]) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    let mut index = 0u32;

    for (position, section) in sections.iter().enumerate() {
        let start = section.header_start;
        let natural_end = sections
            .get(position + 1)
            .map(|next| next.header_start)
            .unwrap_or(text.len());

        // Very short sections get extended forward so a bare header line
        // never becomes its own fragment.
        let mut end = natural_end;
        if end - start < MIN_CHUNK_CHARS {
            end = ceil_boundary(text, (natural_end + SECTION_EXTEND_CHARS).min(text.len()));
        }

        let content = &text[start..end];
        if content.trim().is_empty() {
            continue;
        }

        if content.len() <= MAX_SECTION_CHARS {
            chunks.push(Chunk {
                content: content.trim().to_string(),
                chunk_index: index,
                kind: ChunkKind::Structured,
                section_number: Some(section.number.clone()),
                section_title: none_if_empty(&section.title),
                start_char: start,
                end_char: end,
            });
            index += 1;
        } else {
            for part in split_long_section(content, section, start) {
                chunks.push(Chunk {
                    chunk_index: index,
                    ..part
                });
                index += 1;
            }
        }
    }

    chunks
}

/// Split an oversized section into sub-chunks. Every piece after the first
/// repeats the section header plus the tail lines of the previous piece as
/// context overlap; span offsets always point at the novel text.
fn split_long_section(content: &str, section: &SectionSpan, base_offset: usize) -> Vec<Chunk> {
    let header_line = content.lines().next().unwrap_or_default().trim();

    let mut parts: Vec<(usize, usize)> = Vec::new();
    let mut part_start = 0usize;
    let mut cursor = 0usize;

    for line in content.split_inclusive('\n') {
        if cursor + line.len() - part_start > MAX_SECTION_CHARS && cursor > part_start {
            parts.push((part_start, cursor));
            part_start = cursor;
        }
        cursor += line.len();
    }
    if part_start < content.len() {
        parts.push((part_start, content.len()));
    }

    let mut chunks = Vec::new();
    for (piece, &(start, end)) in parts.iter().enumerate() {
        let body = content[start..end].trim();
        if body.is_empty() {
            continue;
        }

        let rendered = if piece == 0 {
            body.to_string()
        } else {
            let previous = &content[parts[piece - 1].0..parts[piece - 1].1];
            let tail = trailing_lines(previous, 2);
            if tail.is_empty() {
                format!("{header_line}\n{body}")
            } else {
                format!("{header_line}\n{tail}\n{body}")
            }
        };

        chunks.push(Chunk {
            content: rendered,
            chunk_index: 0, // assigned by the caller
            kind: if piece == 0 {
                ChunkKind::Structured
            } else {
                ChunkKind::StructuredPart
            },
            section_number: Some(section.number.clone()),
            section_title: none_if_empty(&section.title),
            start_char: base_offset + start,
            end_char: base_offset + end,
        });
    }

    chunks
}

fn trailing_lines(text: &str, count: usize) -> String {
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();
    let keep = lines.len().saturating_sub(count);
    lines[keep..].join("\n")
}

/// Fixed-size sliding window with boundary alignment: the window end snaps
/// to the nearest paragraph or sentence break found in its back 40%.
fn semantic_chunks(text: &str) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    let mut index = 0u32;
    let mut start = 0usize;

    while start < text.len() {
        let hard_end = ceil_boundary(text, (start + SEMANTIC_WINDOW_CHARS).min(text.len()));
        let end = if hard_end < text.len() {
            align_to_boundary(text, start, hard_end)
        } else {
            hard_end
        };

        let content = text[start..end].trim();
        if content.len() >= MIN_CHUNK_CHARS {
            chunks.push(Chunk {
                content: content.to_string(),
                chunk_index: index,
                kind: ChunkKind::Semantic,
                section_number: None,
                section_title: None,
                start_char: start,
                end_char: end,
            });
            index += 1;
        }

        if end >= text.len() {
            break;
        }
        let next = floor_boundary(text, end.saturating_sub(SEMANTIC_OVERLAP_CHARS));
        // The window must always advance even when overlap would rewind it.
        start = next.max(start + 1);
        start = ceil_boundary(text, start);
    }

    chunks
}

fn align_to_boundary(text: &str, start: usize, hard_end: usize) -> usize {
    let window = &text[start..hard_end];
    let search_from = (window.len() as f64 * (1.0 - BOUNDARY_SEARCH_FRACTION)) as usize;
    let search_from = ceil_boundary(window, search_from);
    let zone = &window[search_from..];

    for separator in ["\n\n", ". ", "\n"] {
        if let Some(found) = zone.rfind(separator) {
            return start + search_from + found + separator.len();
        }
    }
    hard_end
}

fn none_if_empty(value: &str) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value.trim().to_string())
    }
}

fn ceil_boundary(text: &str, mut index: usize) -> usize {
    index = index.min(text.len());
    while index < text.len() && !text.is_char_boundary(index) {
        index += 1;
    }
    index
}

fn floor_boundary(text: &str, mut index: usize) -> usize {
    index = index.min(text.len());
    while index > 0 && !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}

#[cfg(test)]
mod tests {
    use super::*;

    fn statute_text() -> String {
        let mut text = String::new();
        text.push_str("§ 1 Formål\n");
        text.push_str("Foreningens formål er å fremme studentenes interesser og sikre god drift av organisasjonen i alle ledd.\n\n");
        text.push_str("§ 2 Medlemskap\n");
        text.push_str("Alle studenter ved institusjonen kan bli medlemmer. Medlemskap forutsetter betalt semesteravgift og gyldig registrering.\n\n");
        text.push_str("6.3 Styrets sammensetning\n");
        text.push_str("Styret består av leder, nestleder og fem styremedlemmer valgt av generalforsamlingen for ett år av gangen.\n");
        text
    }

    #[test]
    fn structural_headers_produce_structured_chunks() {
        let chunks = Chunker::default().chunk(&statute_text());

        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|chunk| chunk.kind == ChunkKind::Structured));
        assert_eq!(chunks[0].section_number.as_deref(), Some("1"));
        assert_eq!(chunks[1].section_number.as_deref(), Some("2"));
        assert_eq!(chunks[2].section_number.as_deref(), Some("6.3"));
        assert_eq!(chunks[2].section_title.as_deref(), Some("Styrets sammensetning"));
    }

    #[test]
    fn chunk_indices_are_strictly_increasing() {
        let chunks = Chunker::default().chunk(&statute_text());
        for pair in chunks.windows(2) {
            assert!(pair[1].chunk_index == pair[0].chunk_index + 1);
        }
    }

    #[test]
    fn no_chunk_has_empty_trimmed_content() {
        let text = statute_text();
        for chunk in Chunker::default().chunk(&text) {
            assert!(!chunk.content.trim().is_empty());
        }
    }

    #[test]
    fn structured_spans_cover_the_source_text() {
        let text = statute_text();
        let chunks = Chunker::default().chunk(&text);

        // Consecutive section spans tile the text from the first header on.
        for pair in chunks.windows(2) {
            assert!(pair[1].start_char <= pair[0].end_char);
        }
        assert_eq!(chunks.last().unwrap().end_char, text.len());
    }

    #[test]
    fn long_sections_split_and_repeat_their_header() {
        let mut text = String::from("§ 4 Generalforsamling\n");
        for line_no in 0..80 {
            text.push_str(&format!(
                "Punkt {line_no}: generalforsamlingen behandler saker som er meldt inn innen fristen.\n"
            ));
        }

        let chunks = Chunker::default().chunk(&text);
        assert!(chunks.len() > 1);
        assert_eq!(chunks[0].kind, ChunkKind::Structured);

        for part in &chunks[1..] {
            assert_eq!(part.kind, ChunkKind::StructuredPart);
            assert!(part.content.starts_with("§ 4 Generalforsamling"));
            assert_eq!(part.section_number.as_deref(), Some("4"));
        }
    }

    #[test]
    fn short_section_is_extended_forward() {
        // A bare header immediately followed by another header would yield
        // a fragment; the first section must pull in following text.
        let text = "§ 1\n§ 2 Medlemskap\nAlle studenter ved institusjonen kan bli medlemmer av organisasjonen dersom de ønsker det.\n";
        let chunks = Chunker::default().chunk(text);

        assert!(chunks[0].content.len() >= MIN_CHUNK_CHARS);
    }

    #[test]
    fn unstructured_text_falls_back_to_semantic_windows() {
        let sentence = "Dette er en vanlig setning uten noen struktur i det hele tatt. ";
        let text = sentence.repeat(60);

        let chunks = Chunker::default().chunk(&text);
        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|chunk| chunk.kind == ChunkKind::Semantic));
        assert!(chunks
            .iter()
            .all(|chunk| chunk.content.len() >= MIN_CHUNK_CHARS));

        // Consecutive windows overlap by design.
        for pair in chunks.windows(2) {
            assert!(pair[1].start_char < pair[0].end_char);
        }
    }

    #[test]
    fn semantic_window_ends_on_sentence_boundary() {
        let sentence = "The assembly convenes twice every academic year as required. ";
        let text = sentence.repeat(50);

        let chunks = Chunker::default().chunk(&text);
        let first = &chunks[0];
        assert!(first.content.ends_with('.'));
        assert!(first.content.len() <= SEMANTIC_WINDOW_CHARS);
    }

    #[test]
    fn tiny_input_yields_no_chunks() {
        assert!(Chunker::default().chunk("kort").is_empty());
        assert!(Chunker::default().chunk("   \n  ").is_empty());
    }

    #[test]
    fn multibyte_text_never_splits_inside_a_character()
    {
        let text = "æøå ".repeat(600);
        let chunks = Chunker::default().chunk(&text);
        assert!(!chunks.is_empty());
        for chunk in &chunks {
            assert!(text.is_char_boundary(chunk.start_char));
            assert!(text.is_char_boundary(chunk.end_char));
        }
    }
}
