// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Prompt construction for the LLM extractor, one shape per content kind.

use crate::store::ContentKind;

const SCHEMA_INSTRUCTIONS: &str = r#"Respond with a single JSON object of the shape:
{"entities": [{"name": "...", "type": "person|organization|location|date|product|technology|event|other", "confidence": 0.0-1.0, "context": "..."}]}
Return only the JSON object, with no surrounding prose or markdown fence."#;

/// Build the extraction prompt for a chunk of `text` detected as `kind`.
pub fn build(text: &str, kind: ContentKind) -> String {
    let task = match kind {
        ContentKind::Code => {
            "Identify named entities in the following source code: function/type/class names, \
             library or dependency names, and any people or organizations mentioned in comments."
        }
        ContentKind::Json | ContentKind::Xml => {
            "Identify named entities referenced by the values in the following structured data."
        }
        _ => "Identify named entities in the following text.",
    };

    format!("{task}\n\n{SCHEMA_INSTRUCTIONS}\n\n---\n{text}\n---")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_includes_schema_and_text() {
        let prompt = build("Ada Lovelace wrote the first algorithm.", ContentKind::Text);
        assert!(prompt.contains("Ada Lovelace wrote the first algorithm."));
        assert!(prompt.contains("\"entities\""));
    }

    #[test]
    fn test_build_varies_task_by_kind() {
        let code_prompt = build("fn main() {}", ContentKind::Code);
        let text_prompt = build("fn main() {}", ContentKind::Text);
        assert_ne!(code_prompt, text_prompt);
        assert!(code_prompt.contains("source code"));
    }
}
