// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! EntityNormalizer: canonicalizes, deduplicates, and caps the raw entity
//! mentions produced by either extractor before they reach the store.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use regex::Regex;
use once_cell::sync::Lazy;
use unicode_normalization::UnicodeNormalization;

use crate::store::EntityType;

use super::types::RawEntity;

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// A normalized entity, merged across every mention that resolved to the
/// same (name, type) key. `mention_count` and `max_confidence` both survive
/// the merge for callers that want them.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedEntity {
    pub name: String,
    pub entity_type: EntityType,
    pub confidence: f32,
    pub mention_count: u32,
    pub context: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NormalizeOptions {
    pub confidence_threshold: f32,
    pub max_count: usize,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.5,
            max_count: 50,
        }
    }
}

/// Canonicalize, dedup, threshold, and cap a batch of raw mentions.
///
/// Steps, per §4.5:
/// 1. NFKC-normalize and collapse internal whitespace.
/// 2. Strip surrounding punctuation, title-case person/organization/location/
///    event names (preserving acronyms), leave other types as-is.
/// 3. Merge mentions sharing a (name, type) key, keeping the max confidence
///    and concatenated mention count.
/// 4. Drop any entity whose merged confidence is below `confidence_threshold`.
/// 5. Cap to `max_count`, keeping the highest-confidence entities and
///    breaking ties by first-seen order.
pub fn normalize(raw: Vec<RawEntity>, options: &NormalizeOptions) -> Vec<NormalizedEntity> {
    let mut merged: HashMap<(String, EntityType), (NormalizedEntity, usize)> = HashMap::new();
    let mut next_seq = 0usize;

    for entity in raw {
        let canonical_name = canonicalize_name(&entity.name, entity.entity_type);
        if canonical_name.is_empty() {
            continue;
        }
        let key = (canonical_name.clone(), entity.entity_type);

        match merged.entry(key) {
            Entry::Occupied(mut occupied) => {
                let (existing, _) = occupied.get_mut();
                existing.mention_count += 1;
                if entity.confidence > existing.confidence {
                    existing.confidence = entity.confidence;
                }
                if existing.context.is_none() {
                    existing.context = entity.context.clone();
                }
            }
            Entry::Vacant(vacant) => {
                let seq = next_seq;
                next_seq += 1;
                vacant.insert((
                    NormalizedEntity {
                        name: canonical_name,
                        entity_type: entity.entity_type,
                        confidence: entity.confidence,
                        mention_count: 1,
                        context: entity.context,
                    },
                    seq,
                ));
            }
        }
    }

    let mut result: Vec<(NormalizedEntity, usize)> = merged
        .into_values()
        .filter(|(e, _)| e.confidence >= options.confidence_threshold)
        .collect();

    result.sort_by(|(a, a_seq), (b, b_seq)| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a_seq.cmp(b_seq))
    });
    result.truncate(options.max_count);
    result.into_iter().map(|(e, _)| e).collect()
}

fn canonicalize_name(raw: &str, entity_type: EntityType) -> String {
    let nfkc: String = raw.nfkc().collect();
    let collapsed = WHITESPACE.replace_all(nfkc.trim(), " ").to_string();
    let stripped = collapsed
        .trim_matches(|c: char| c.is_ascii_punctuation() && c != '\'' && c != '-')
        .to_string();

    if entity_type.is_title_cased() {
        title_case(&stripped)
    } else {
        stripped
    }
}

fn title_case(s: &str) -> String {
    s.split(' ').map(title_case_word).collect::<Vec<_>>().join(" ")
}

fn title_case_word(word: &str) -> String {
    if is_acronym(word) {
        return word.to_string();
    }
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase(),
        None => String::new(),
    }
}

/// All-caps words of five characters or fewer are kept as-is rather than
/// title-cased, so "NASA" stays "NASA" instead of becoming "Nasa".
fn is_acronym(word: &str) -> bool {
    let letters: Vec<char> = word.chars().filter(|c| c.is_alphabetic()).collect();
    !letters.is_empty() && letters.len() <= 5 && letters.iter().all(|c| c.is_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity(name: &str, entity_type: EntityType, confidence: f32) -> RawEntity {
        RawEntity { name: name.to_string(), entity_type, confidence, context: None }
    }

    #[test]
    fn test_whitespace_collapse_and_title_case() {
        let raw = vec![entity("ada   LOVELACE", EntityType::Person, 0.8)];
        let result = normalize(raw, &NormalizeOptions::default());
        assert_eq!(result[0].name, "Ada Lovelace");
    }

    #[test]
    fn test_non_title_cased_type_passes_through() {
        let raw = vec![entity("2026-07-30", EntityType::Date, 0.9)];
        let result = normalize(raw, &NormalizeOptions::default());
        assert_eq!(result[0].name, "2026-07-30");
    }

    #[test]
    fn test_merge_keeps_max_confidence_and_counts_mentions() {
        let raw = vec![
            entity("Grace Hopper", EntityType::Person, 0.6),
            entity("grace   hopper", EntityType::Person, 0.9),
        ];
        let result = normalize(raw, &NormalizeOptions::default());
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].confidence, 0.9);
        assert_eq!(result[0].mention_count, 2);
    }

    #[test]
    fn test_below_threshold_dropped() {
        let raw = vec![entity("Low Confidence", EntityType::Person, 0.2)];
        let result = normalize(raw, &NormalizeOptions { confidence_threshold: 0.5, max_count: 50 });
        assert!(result.is_empty());
    }

    #[test]
    fn test_cap_keeps_highest_confidence() {
        let raw: Vec<RawEntity> = (0..5)
            .map(|i| entity(&format!("Entity {i}"), EntityType::Other, 0.5 + i as f32 * 0.1))
            .collect();
        let result = normalize(raw, &NormalizeOptions { confidence_threshold: 0.0, max_count: 2 });
        assert_eq!(result.len(), 2);
        assert!(result[0].confidence >= result[1].confidence);
        assert_eq!(result[0].name, "Entity 4");
    }

    #[test]
    fn test_different_types_not_merged() {
        let raw = vec![
            entity("Amazon", EntityType::Organization, 0.7),
            entity("Amazon", EntityType::Location, 0.6),
        ];
        let result = normalize(raw, &NormalizeOptions::default());
        assert_eq!(result.len(), 2);
    }

    #[test]
    fn test_acronym_preserved_through_title_case() {
        let raw = vec![entity("NASA", EntityType::Organization, 0.8)];
        let result = normalize(raw, &NormalizeOptions::default());
        assert_eq!(result[0].name, "NASA");
    }

    #[test]
    fn test_surrounding_punctuation_stripped() {
        let raw = vec![entity("\"Grace Hopper\",", EntityType::Person, 0.8)];
        let result = normalize(raw, &NormalizeOptions::default());
        assert_eq!(result[0].name, "Grace Hopper");
    }

    #[test]
    fn test_tie_break_by_first_seen_order() {
        let raw = vec![
            entity("Second Entity", EntityType::Other, 0.7),
            entity("First Entity", EntityType::Other, 0.7),
        ];
        let result = normalize(raw, &NormalizeOptions::default());
        assert_eq!(result.len(), 2);
        assert_eq!(result[0].name, "Second Entity");
        assert_eq!(result[1].name, "First Entity");
    }
}
