// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Splitting algorithms backing each [`super::ChunkStrategy`].

use super::{ChunkStrategy, ChunkerConfig};

/// Dispatch to the strategy-specific splitter. Returns `(byte_offset, text)` pairs.
pub fn split(body: &str, config: &ChunkerConfig) -> Vec<(usize, String)> {
    match config.strategy {
        ChunkStrategy::Paragraph => split_paragraphs(body, config),
        ChunkStrategy::Line => split_lines(body, config),
        ChunkStrategy::Token => split_tokens(body, config),
        ChunkStrategy::Character => split_characters(body, config),
    }
}

fn split_paragraphs(body: &str, config: &ChunkerConfig) -> Vec<(usize, String)> {
    let paragraphs: Vec<(usize, &str)> = paragraph_spans(body);
    pack_units(body, &paragraphs, "\n\n", config)
}

fn split_lines(body: &str, config: &ChunkerConfig) -> Vec<(usize, String)> {
    let lines: Vec<(usize, &str)> = line_spans(body);
    pack_units(body, &lines, "\n", config)
}

fn split_tokens(body: &str, config: &ChunkerConfig) -> Vec<(usize, String)> {
    let tokens: Vec<(usize, &str)> = token_spans(body);
    pack_units(body, &tokens, " ", config)
}

/// Greedily packs a sequence of `(offset, unit)` spans into chunks bounded by
/// `max_size`, re-including the trailing units of the previous chunk up to
/// `overlap` bytes. A single oversized unit is split on raw character
/// boundaries rather than held whole, to guarantee forward progress.
fn pack_units(
    body: &str,
    units: &[(usize, &str)],
    joiner: &str,
    config: &ChunkerConfig,
) -> Vec<(usize, String)> {
    if units.is_empty() {
        return Vec::new();
    }

    let mut chunks = Vec::new();
    let mut current: Vec<usize> = Vec::new();
    let mut current_len = 0usize;

    let mut i = 0;
    while i < units.len() {
        let (_, unit) = units[i];

        if unit.len() > config.max_size {
            if !current.is_empty() {
                chunks.push(render(body, units, &current, joiner));
                current.clear();
                current_len = 0;
            }
            let (off, _) = units[i];
            for (sub_off, sub_text) in split_characters_at(unit, off, config) {
                chunks.push((sub_off, sub_text));
            }
            i += 1;
            continue;
        }

        let additional = if current.is_empty() { unit.len() } else { unit.len() + joiner.len() };
        if current_len + additional > config.max_size && !current.is_empty() {
            chunks.push(render(body, units, &current, joiner));

            let overlap_start = overlap_start_index(units, &current, config.overlap);
            current = current[overlap_start..].to_vec();
            current_len = current
                .iter()
                .map(|&idx| units[idx].1.len())
                .sum::<usize>()
                + current.len().saturating_sub(1) * joiner.len();
            continue;
        }

        current.push(i);
        current_len += additional;
        i += 1;
    }

    if !current.is_empty() {
        chunks.push(render(body, units, &current, joiner));
    }

    chunks
}

fn render(_body: &str, units: &[(usize, &str)], indices: &[usize], joiner: &str) -> (usize, String) {
    let offset = units[indices[0]].0;
    let text = indices
        .iter()
        .map(|&i| units[i].1)
        .collect::<Vec<_>>()
        .join(joiner);
    (offset, text)
}

/// Finds how many trailing units of `current` to carry into the next chunk
/// so their combined size is close to but not over `overlap` bytes.
fn overlap_start_index(units: &[(usize, &str)], current: &[usize], overlap: usize) -> usize {
    if overlap == 0 || current.len() <= 1 {
        return current.len();
    }
    let mut acc = 0usize;
    let mut start = current.len();
    for (pos, &idx) in current.iter().enumerate().rev() {
        acc += units[idx].1.len();
        if acc > overlap {
            break;
        }
        start = pos;
    }
    start.min(current.len().saturating_sub(1)).max(0)
}

fn paragraph_spans(body: &str) -> Vec<(usize, &str)> {
    let mut spans = Vec::new();
    let mut offset = 0usize;
    for part in body.split("\n\n") {
        if !part.trim().is_empty() {
            spans.push((offset, part));
        }
        offset += part.len() + 2;
    }
    spans
}

fn line_spans(body: &str) -> Vec<(usize, &str)> {
    let mut spans = Vec::new();
    let mut offset = 0usize;
    for line in body.split('\n') {
        if !line.is_empty() {
            spans.push((offset, line));
        }
        offset += line.len() + 1;
    }
    spans
}

fn token_spans(body: &str) -> Vec<(usize, &str)> {
    let mut spans = Vec::new();
    let mut offset = 0usize;
    for tok in body.split(' ') {
        if !tok.is_empty() {
            spans.push((offset, tok));
        }
        offset += tok.len() + 1;
    }
    spans
}

fn split_characters(body: &str, config: &ChunkerConfig) -> Vec<(usize, String)> {
    split_characters_at(body, 0, config)
}

/// Raw byte-window splitter, used both for the `character` strategy and as
/// the fallback for any single unit larger than `max_size`. Windows land on
/// `char` boundaries and overlap by `config.overlap` bytes; `start` always
/// advances by at least one character to guarantee termination.
fn split_characters_at(text: &str, base_offset: usize, config: &ChunkerConfig) -> Vec<(usize, String)> {
    let mut chunks = Vec::new();
    let len = text.len();
    let mut start = 0usize;

    while start < len {
        let mut end = (start + config.max_size).min(len);
        while end < len && !text.is_char_boundary(end) {
            end -= 1;
        }
        if end <= start {
            end = next_char_boundary(text, start + 1).min(len);
        }

        chunks.push((base_offset + start, text[start..end].to_string()));

        if end >= len {
            break;
        }

        let mut next_start = end.saturating_sub(config.overlap);
        while next_start > 0 && !text.is_char_boundary(next_start) {
            next_start -= 1;
        }
        start = if next_start > start { next_start } else { next_char_boundary(text, start + 1).min(len) };
    }

    chunks
}

fn next_char_boundary(text: &str, from: usize) -> usize {
    let mut i = from;
    while i < text.len() && !text.is_char_boundary(i) {
        i += 1;
    }
    i
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(max_size: usize, overlap: usize, strategy: ChunkStrategy) -> ChunkerConfig {
        ChunkerConfig { max_size, overlap, strategy }
    }

    #[test]
    fn test_paragraph_spans_basic() {
        let body = "first para\n\nsecond para\n\nthird para";
        let spans = paragraph_spans(body);
        assert_eq!(spans.len(), 3);
        assert_eq!(spans[0].1, "first para");
        assert_eq!(spans[2].1, "third para");
    }

    #[test]
    fn test_split_characters_advances_on_zero_overlap_room() {
        let config = cfg(5, 4, ChunkStrategy::Character);
        let text = "abcdefghij";
        let chunks = split_characters(text, &config);
        assert!(chunks.len() > 1);
        let mut reconstructed = String::new();
        reconstructed.push_str(&chunks[0].1);
        assert!(text.starts_with(&chunks[0].1));
    }

    #[test]
    fn test_split_characters_respects_utf8_boundaries() {
        let config = cfg(3, 0, ChunkStrategy::Character);
        let text = "a\u{00e9}b\u{00e9}c";
        let chunks = split_characters(text, &config);
        for (_, t) in &chunks {
            assert!(std::str::from_utf8(t.as_bytes()).is_ok());
        }
    }

    #[test]
    fn test_pack_units_overlap_carries_trailing_units() {
        let config = cfg(20, 10, ChunkStrategy::Line);
        let body = "line one\nline two\nline three\nline four";
        let chunks = split_lines(body, &config);
        assert!(chunks.len() >= 2);
    }

    #[test]
    fn test_oversized_unit_falls_back_to_character_split() {
        let config = cfg(10, 2, ChunkStrategy::Line);
        let body = "short\nthisisonereallylongwordwithnospaces\nshort again";
        let chunks = split_lines(body, &config);
        assert!(chunks.len() > 1);
        for (_, t) in &chunks {
            assert!(t.len() <= config.max_size + 4);
        }
    }
}
