// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Entity extraction: LLM-backed extraction with a rule-based fallback
//! cascade, per content kind.

pub(crate) mod llm;
mod normalize;
mod prompt;
mod rule;
mod types;

pub use llm::{HttpLlmTransport, LlmClient, LlmTransport};
pub use normalize::{normalize, NormalizeOptions, NormalizedEntity};
pub use types::{ExtractOptions, ExtractionResult, ExtractorSource, RawEntity};

use crate::store::ContentKind;

/// Orchestrates the extraction cascade for one chunk of text: try the LLM
/// client first (when configured), fall back to the rule extractor on any
/// error the LLM error taxonomy marks as fallback-eligible (everything
/// except `ExtractorUnsupported`, and after the retry budget is exhausted).
pub struct Extractor<T: LlmTransport> {
    llm: Option<LlmClient<T>>,
    options: ExtractOptions,
}

impl<T: LlmTransport> Extractor<T> {
    pub fn new(llm: Option<LlmClient<T>>, options: ExtractOptions) -> Self {
        Self { llm, options }
    }

    /// Rule-only extractor, for configurations without an LLM client.
    pub fn rule_only(options: ExtractOptions) -> Extractor<llm::HttpLlmTransport> {
        Extractor { llm: None, options }
    }

    pub fn extract(&self, text: &str, kind: ContentKind) -> ExtractionResult {
        if !kind.has_rule_extractor() && self.llm.is_none() {
            return ExtractionResult { source: ExtractorSource::Rule, entities: Vec::new() };
        }

        if let Some(client) = &self.llm {
            let prompt = prompt::build(text, kind);
            match client.extract(&prompt, &self.options) {
                Ok(result) => return result,
                Err(err) if !err.triggers_fallback() => {
                    return ExtractionResult { source: ExtractorSource::Rule, entities: Vec::new() };
                }
                Err(_) => { /* fall through to rule extractor */ }
            }
        }

        rule::extract(text, kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use llm::MockLlmTransport;

    #[test]
    fn test_rule_only_extractor_uses_rule_family() {
        let extractor: Extractor<MockLlmTransport> = Extractor::new(None, ExtractOptions::default());
        let result = extractor.extract("Acme Corp was founded on 2020-01-01.", ContentKind::Text);
        assert_eq!(result.source, ExtractorSource::Rule);
        assert!(!result.entities.is_empty());
    }

    #[test]
    fn test_llm_success_skips_rule_fallback() {
        let mut mock = MockLlmTransport::new();
        mock.expect_complete().times(1).returning(|_, _| {
            Ok(r#"{"entities": [{"name": "Widget", "type": "product", "confidence": 0.8, "context": null}]}"#.to_string())
        });
        let extractor = Extractor::new(Some(LlmClient::new(mock)), ExtractOptions::default());
        let result = extractor.extract("some text", ContentKind::Text);
        assert_eq!(result.source, ExtractorSource::Llm);
    }

    #[test]
    fn test_llm_failure_falls_back_to_rule() {
        let mut mock = MockLlmTransport::new();
        mock.expect_complete()
            .times(4)
            .returning(|_, _| Err(crate::error::ExtractorError::LLMTransportError("down".to_string())));
        let extractor = Extractor::new(
            Some(LlmClient::new(mock)),
            ExtractOptions { max_retries: 3, timeout_secs: 1 },
        );
        let result = extractor.extract("Acme Corp was founded on 2020-01-01.", ContentKind::Text);
        assert_eq!(result.source, ExtractorSource::Rule);
    }
}
