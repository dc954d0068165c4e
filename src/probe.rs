// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! FileProbe: cheap, local content-kind detection with no network calls.
//!
//! Detection cascades through three stages, each only run if the previous
//! one didn't produce a confident answer: filename extension, magic-byte
//! sniffing, then a content-shape heuristic (JSON/XML/plain-text).

use crate::store::ContentKind;

/// Detect the [`ContentKind`] of a byte buffer, optionally aided by a
/// filename hint.
pub fn probe(bytes: &[u8], filename: Option<&str>) -> ContentKind {
    if let Some(kind) = filename.and_then(probe_extension) {
        return kind;
    }
    if let Some(kind) = probe_magic_bytes(bytes) {
        return kind;
    }
    probe_content_shape(bytes)
}

fn probe_extension(filename: &str) -> Option<ContentKind> {
    let ext = filename.rsplit('.').next()?.to_lowercase();
    let kind = match ext.as_str() {
        "md" | "markdown" => ContentKind::Markdown,
        "html" | "htm" => ContentKind::Html,
        "json" => ContentKind::Json,
        "xml" => ContentKind::Xml,
        "pdf" => ContentKind::Pdf,
        "png" | "jpg" | "jpeg" | "gif" | "webp" | "bmp" => ContentKind::Image,
        "mp4" | "mov" | "avi" | "mkv" | "webm" => ContentKind::Video,
        "rs" | "py" | "js" | "ts" | "go" | "java" | "c" | "cpp" | "h" | "rb" | "sh" => {
            ContentKind::Code
        }
        "txt" => ContentKind::Text,
        _ => return None,
    };
    Some(kind)
}

/// Well-known magic byte prefixes. Checked in order of specificity.
fn probe_magic_bytes(bytes: &[u8]) -> Option<ContentKind> {
    const PDF: &[u8] = b"%PDF-";
    const PNG: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
    const JPEG: &[u8] = &[0xFF, 0xD8, 0xFF];
    const GIF87: &[u8] = b"GIF87a";
    const GIF89: &[u8] = b"GIF89a";

    if bytes.starts_with(PDF) {
        return Some(ContentKind::Pdf);
    }
    if bytes.starts_with(PNG) {
        return Some(ContentKind::Image);
    }
    if bytes.starts_with(JPEG) || bytes.starts_with(GIF87) || bytes.starts_with(GIF89) {
        return Some(ContentKind::Image);
    }
    if bytes.len() >= 12 && &bytes[4..8] == b"ftyp" {
        return Some(ContentKind::Video);
    }
    None
}

/// Last-resort heuristic over the decoded text shape. Falls back to
/// `OctetStream` if the bytes aren't valid UTF-8 at all.
fn probe_content_shape(bytes: &[u8]) -> ContentKind {
    let text = match std::str::from_utf8(bytes) {
        Ok(t) => t,
        Err(_) => return ContentKind::OctetStream,
    };
    let trimmed = text.trim_start();

    if (trimmed.starts_with('{') || trimmed.starts_with('[')) && looks_like_json(text) {
        return ContentKind::Json;
    }
    if trimmed.starts_with("<?xml") || (trimmed.starts_with('<') && trimmed.trim_end().ends_with('>')) {
        return ContentKind::Xml;
    }
    ContentKind::Text
}

fn looks_like_json(text: &str) -> bool {
    serde_json::from_str::<serde_json::Value>(text).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_takes_priority() {
        assert_eq!(probe(b"not json at all", Some("notes.md")), ContentKind::Markdown);
    }

    #[test]
    fn test_pdf_magic_bytes() {
        let mut bytes = b"%PDF-1.4".to_vec();
        bytes.extend_from_slice(b"\n...rest of file...");
        assert_eq!(probe(&bytes, None), ContentKind::Pdf);
    }

    #[test]
    fn test_png_magic_bytes() {
        let bytes = vec![0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0];
        assert_eq!(probe(&bytes, None), ContentKind::Image);
    }

    #[test]
    fn test_json_content_shape() {
        let bytes = br#"{"name": "test", "value": 42}"#;
        assert_eq!(probe(bytes, None), ContentKind::Json);
    }

    #[test]
    fn test_plain_text_fallback() {
        let bytes = b"just some plain prose, nothing special here.";
        assert_eq!(probe(bytes, None), ContentKind::Text);
    }

    #[test]
    fn test_non_utf8_falls_back_to_octet_stream() {
        let bytes = vec![0xFF, 0xFE, 0x00, 0x01, 0x02];
        assert_eq!(probe(&bytes, None), ContentKind::OctetStream);
    }
}
