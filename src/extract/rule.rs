// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Rule-based entity extraction: the fallback path when the LLM client is
//! unavailable or returns a non-retryable error. No model calls, no
//! network — pure regex and heuristics dispatched by content kind.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::store::{ContentKind, EntityType};

use super::types::{ExtractionResult, ExtractorSource, RawEntity};

/// Regex patterns used by the rule extractor's text family, keyed to the
/// entity type they capture. Confidence is fixed per pattern rather than
/// computed — these are heuristics, not a scored model. `group` selects
/// which capture group holds the reported name (0 = whole match), so a
/// pattern like the quoted-product one can match the surrounding quotes
/// while reporting only the inner text.
struct Pattern {
    regex: &'static Lazy<Regex>,
    entity_type: EntityType,
    confidence: f32,
    group: usize,
}

static RE_DATE_ISO: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b\d{4}-\d{2}-\d{2}\b").unwrap());
static RE_DATE_LONG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(January|February|March|April|May|June|July|August|September|October|November|December) \d{1,2},? \d{4}\b").unwrap()
});
static RE_PERSON_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b[A-Z][a-z]+ [A-Z][a-z]+\b").unwrap());
// Full-word suffixes only: an alternative like "Corp" would also match the
// first four letters of "Corporation" and then fail its trailing \b, so
// every suffix that is itself a prefix of a longer one needs its own
// explicit branch rather than relying on alternation order. The prefix is
// restricted to a run of capitalized words (at most 5) rather than any
// run of mixed-case text, so a name swallows neither a preceding lowercase
// connector ("the CEO of Acme Corporation" should match only "Acme
// Corporation") nor the rest of the sentence.
static RE_ORG_SUFFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b[A-Z][A-Za-z0-9&'\.]*(?:[ \-][A-Z][A-Za-z0-9&'\.]*){0,4} (Incorporated|Corporation|Corp|Inc|Limited|Ltd|Company|Co|Foundation|Institute|Holdings|Partners|LLC)\.?\b").unwrap()
});
/// Gazetteer-style location hints: a fixed list of well-known place names
/// rather than a real NER model, per §4.4's text family. Sorted longest
/// first so "New York" claims the whole span before a shorter overlapping
/// alternative could.
static LOCATION_GAZETTEER: &[&str] = &[
    "New York", "Los Angeles", "San Francisco", "Seattle", "Chicago", "Boston", "Washington",
    "Austin", "Denver", "Atlanta", "Dallas", "Houston", "Portland", "Phoenix", "Miami",
    "London", "Paris", "Berlin", "Tokyo", "Beijing", "Shanghai", "Sydney", "Toronto", "Mumbai",
    "Singapore", "Dubai", "Moscow", "Rome", "Madrid", "Amsterdam",
    "United States", "United Kingdom", "Canada", "Germany", "France", "Japan", "China", "India",
    "Australia", "Brazil", "Mexico",
];
static RE_LOCATION: Lazy<Regex> = Lazy::new(|| {
    let mut names: Vec<&str> = LOCATION_GAZETTEER.to_vec();
    names.sort_by_key(|n| std::cmp::Reverse(n.len()));
    Regex::new(&format!(r"\b({})\b", names.join("|"))).unwrap()
});
/// Quoted product-like tokens: a capitalized word or short phrase inside
/// straight quotes, e.g. `"Widget Pro"`.
static RE_QUOTED_PRODUCT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""([A-Z][A-Za-z0-9&'\- ]{1,40})""#).unwrap());
static RE_URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"https?://[^\s)>\]]+").unwrap());

/// Patterns are tried in priority order and a later, lower-priority match
/// that overlaps a span already claimed by an earlier one is dropped — see
/// [`extract_text`]. This keeps a span like "Acme Corporation" from being
/// reported as both an organization and, via the looser two-capitalized-
/// words person pattern, a person.
static TEXT_PATTERNS: Lazy<Vec<Pattern>> = Lazy::new(|| {
    vec![
        Pattern { regex: &RE_DATE_ISO, entity_type: EntityType::Date, confidence: 0.9, group: 0 },
        Pattern { regex: &RE_DATE_LONG, entity_type: EntityType::Date, confidence: 0.85, group: 0 },
        Pattern { regex: &RE_ORG_SUFFIX, entity_type: EntityType::Organization, confidence: 0.7, group: 0 },
        Pattern { regex: &RE_LOCATION, entity_type: EntityType::Location, confidence: 0.6, group: 0 },
        // Quoted tokens are a stronger signal than the generic two-word name
        // pattern and must claim their span first, or a quoted product like
        // "Widget Pro" would be swallowed as a Person match minus its quotes.
        Pattern { regex: &RE_QUOTED_PRODUCT, entity_type: EntityType::Product, confidence: 0.55, group: 1 },
        Pattern { regex: &RE_PERSON_NAME, entity_type: EntityType::Person, confidence: 0.55, group: 0 },
        Pattern { regex: &RE_URL, entity_type: EntityType::Technology, confidence: 0.6, group: 0 },
    ]
});

/// Per-language identifier patterns, repurposed from chunk-boundary
/// detection into entity capture: a named declaration becomes a
/// `Technology` entity (the identifier itself), scoped to the code family.
struct CodePattern {
    regex: &'static Lazy<Regex>,
    group: usize,
}

static RE_RUST_ITEM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^\s*(?:pub\s+)?(?:fn|struct|enum|trait|impl)\s+([A-Za-z_][A-Za-z0-9_]*)").unwrap()
});
static RE_PY_ITEM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*(?:def|class)\s+([A-Za-z_][A-Za-z0-9_]*)").unwrap());
static RE_JS_ITEM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^\s*(?:export\s+)?(?:function|class)\s+([A-Za-z_$][A-Za-z0-9_$]*)").unwrap()
});

static CODE_PATTERNS: Lazy<Vec<CodePattern>> = Lazy::new(|| {
    vec![
        CodePattern { regex: &RE_RUST_ITEM, group: 1 },
        CodePattern { regex: &RE_PY_ITEM, group: 1 },
        CodePattern { regex: &RE_JS_ITEM, group: 1 },
    ]
});

/// Dispatches to a family of heuristics by [`ContentKind`]. Returns an
/// empty entity list (not an error) for kinds with no rule family, since
/// "found nothing" is a valid extraction outcome.
pub fn extract(text: &str, kind: ContentKind) -> ExtractionResult {
    let entities = match kind {
        ContentKind::Code => extract_code(text),
        ContentKind::Json | ContentKind::Xml => extract_structured(text),
        _ => extract_text(text),
    };

    ExtractionResult {
        source: ExtractorSource::Rule,
        entities,
    }
}

fn extract_text(text: &str) -> Vec<RawEntity> {
    let mut entities = Vec::new();
    let mut claimed: Vec<(usize, usize)> = Vec::new();

    for pattern in TEXT_PATTERNS.iter() {
        for caps in pattern.regex.captures_iter(text) {
            let whole = caps.get(0).expect("capture group 0 is always present");
            if claimed.iter().any(|&(s, e)| whole.start() < e && s < whole.end()) {
                continue;
            }
            claimed.push((whole.start(), whole.end()));

            let reported = caps.get(pattern.group).unwrap_or(whole);
            entities.push(RawEntity {
                name: reported.as_str().to_string(),
                entity_type: pattern.entity_type,
                confidence: pattern.confidence,
                context: Some(surrounding_context(text, whole.start(), whole.end())),
            });
        }
    }
    entities
}

fn extract_code(text: &str) -> Vec<RawEntity> {
    let mut entities = Vec::new();
    for pattern in CODE_PATTERNS.iter() {
        for caps in pattern.regex.captures_iter(text) {
            if let Some(name) = caps.get(pattern.group) {
                entities.push(RawEntity {
                    name: name.as_str().to_string(),
                    entity_type: EntityType::Technology,
                    confidence: 0.75,
                    context: Some(surrounding_context(text, name.start(), name.end())),
                });
            }
        }
    }
    entities
}

/// For structured formats, treats the decoded string values as candidate
/// entity names, typed by heuristic (date / organization / location /
/// other) rather than emitted flat as [`EntityType::Other`].
fn extract_structured(text: &str) -> Vec<RawEntity> {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(text) else {
        return extract_text(text);
    };

    let mut entities = Vec::new();
    collect_string_values(&value, &mut entities);
    entities
}

/// Suffix words that, attached to a token with no intervening space (e.g.
/// "TechCorp"), still mark it as an organization name. Kept to unambiguous
/// multi-letter suffixes — a bare "Co" would also match the tail of words
/// like "Mexico".
const ORG_SUFFIX_WORDS: &[&str] = &[
    "incorporated", "corporation", "corp", "inc", "llc", "ltd", "limited",
    "company", "foundation", "institute", "holdings", "partners",
];

fn classify_string_value(s: &str) -> (EntityType, f32) {
    if RE_DATE_ISO.is_match(s) || RE_DATE_LONG.is_match(s) {
        (EntityType::Date, 0.85)
    } else if ORG_SUFFIX_WORDS.iter().any(|suffix| s.to_lowercase().ends_with(suffix)) {
        (EntityType::Organization, 0.7)
    } else if RE_LOCATION.is_match(s) {
        (EntityType::Location, 0.7)
    } else {
        (EntityType::Other, 0.3)
    }
}

fn collect_string_values(value: &serde_json::Value, out: &mut Vec<RawEntity>) {
    match value {
        serde_json::Value::String(s) if s.len() >= 3 && s.len() <= 80 => {
            let (entity_type, confidence) = classify_string_value(s);
            out.push(RawEntity {
                name: s.clone(),
                entity_type,
                confidence,
                context: None,
            });
        }
        serde_json::Value::Array(items) => {
            for item in items {
                collect_string_values(item, out);
            }
        }
        serde_json::Value::Object(map) => {
            for v in map.values() {
                collect_string_values(v, out);
            }
        }
        _ => {}
    }
}

fn surrounding_context(text: &str, start: usize, end: usize) -> String {
    const RADIUS: usize = 40;
    let ctx_start = text[..start].char_indices().rev().nth(RADIUS).map(|(i, _)| i).unwrap_or(0);
    let ctx_end = text[end..]
        .char_indices()
        .nth(RADIUS)
        .map(|(i, _)| end + i)
        .unwrap_or(text.len());
    text[ctx_start..ctx_end].trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_family_date_and_org() {
        let text = "Acme Corp was founded on 1999-04-12 and is doing well.";
        let result = extract(text, ContentKind::Text);
        assert!(result.entities.iter().any(|e| e.entity_type == EntityType::Date));
        assert!(result.entities.iter().any(|e| e.entity_type == EntityType::Organization));
    }

    #[test]
    fn test_text_family_matches_section_8_scenario_one() {
        let text = "John Smith is the CEO of Acme Corporation in New York. \
                     The company was founded on January 15, 2010.";
        let result = extract(text, ContentKind::Text);

        let find = |name: &str, kind: EntityType| {
            result.entities.iter().any(|e| e.name == name && e.entity_type == kind)
        };
        assert!(find("John Smith", EntityType::Person));
        assert!(find("Acme Corporation", EntityType::Organization));
        assert!(find("New York", EntityType::Location));
        assert!(find("January 15, 2010", EntityType::Date));

        // "Acme Corporation" must not also surface as a person via the
        // looser two-capitalized-words pattern.
        assert!(!find("Acme Corporation", EntityType::Person));
        assert!(result.entities.iter().all(|e| e.confidence >= 0.5));
    }

    #[test]
    fn test_org_suffix_matches_full_word_not_prefix() {
        let text = "Acme Corporation announced a merger.";
        let result = extract(text, ContentKind::Text);
        let orgs: Vec<_> = result
            .entities
            .iter()
            .filter(|e| e.entity_type == EntityType::Organization)
            .map(|e| e.name.as_str())
            .collect();
        assert_eq!(orgs, vec!["Acme Corporation"]);
    }

    #[test]
    fn test_quoted_product_token() {
        let text = r#"They shipped "Widget Pro" last week."#;
        let result = extract(text, ContentKind::Text);
        assert!(result.entities.iter().any(|e| e.name == "Widget Pro" && e.entity_type == EntityType::Product));
    }

    #[test]
    fn test_code_family_rust_items() {
        let text = "pub fn process_content() {}\nstruct Widget { id: u32 }";
        let result = extract(text, ContentKind::Code);
        let names: Vec<_> = result.entities.iter().map(|e| e.name.as_str()).collect();
        assert!(names.contains(&"process_content"));
        assert!(names.contains(&"Widget"));
    }

    #[test]
    fn test_structured_family_json_strings() {
        let text = r#"{"title": "Quarterly Report", "tags": ["finance", "q3"]}"#;
        let result = extract(text, ContentKind::Json);
        let names: Vec<_> = result.entities.iter().map(|e| e.name.as_str()).collect();
        assert!(names.contains(&"Quarterly Report"));
    }

    #[test]
    fn test_structured_family_matches_section_8_scenario_two() {
        let text = r#"{"company":"TechCorp","founded":"2015-03-22","headquarters":"Seattle"}"#;
        let result = extract(text, ContentKind::Json);

        let find = |name: &str, kind: EntityType| {
            result.entities.iter().any(|e| e.name == name && e.entity_type == kind)
        };
        assert!(find("TechCorp", EntityType::Organization));
        assert!(find("Seattle", EntityType::Location));
        assert!(find("2015-03-22", EntityType::Date));
        assert!(result.entities.iter().all(|e| e.confidence >= 0.5));
    }

    #[test]
    fn test_image_kind_falls_back_to_text_family() {
        let result = extract("no dates or orgs in here", ContentKind::Image);
        assert!(result.entities.is_empty());
    }
}
