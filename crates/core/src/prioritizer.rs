//! Version/authority resolution across duplicate documents.
//!
//! Documents sharing a normalized base name and folder form a group; each
//! group contributes exactly one authoritative primary to the index, plus
//! optionally one English translation when the primary is Norwegian.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;

use crate::classifier::classify;
use crate::models::{Classification, Language, SourceDocument};

const LANGUAGE_TOKENS: [&str; 8] = [
    "eng", "en", "no", "nor", "norsk", "engelsk", "english", "norwegian",
];

fn version_token_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\bv\d{1,3}(?:\.\d{1,3})?\b").unwrap())
}

fn parenthetical_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\([^)]*\)").unwrap())
}

/// Strip version tokens, language tokens, the file extension, and
/// parenthetical annotations, then collapse whitespace.
pub fn normalize_base_name(name: &str) -> String {
    let stem = name
        .rsplit_once('.')
        .map(|(stem, _ext)| stem)
        .unwrap_or(name);

    let without_version = version_token_regex().replace_all(stem, " ");
    let without_parens = parenthetical_regex().replace_all(&without_version, " ");

    without_parens
        .split_whitespace()
        .map(str::to_lowercase)
        .filter(|token| !LANGUAGE_TOKENS.contains(&token.as_str()))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Select the authoritative subset of `documents` to index. The output is
/// always a subset of the input; relative order inside a group follows the
/// authority comparator.
pub fn prioritize(documents: Vec<SourceDocument>) -> Vec<SourceDocument> {
    let mut groups: HashMap<(String, String), Vec<SourceDocument>> = HashMap::new();
    let mut group_order: Vec<(String, String)> = Vec::new();

    for document in documents {
        let key = (
            normalize_base_name(&document.name),
            document.folder_path.clone(),
        );
        if !groups.contains_key(&key) {
            group_order.push(key.clone());
        }
        groups.entry(key).or_default().push(document);
    }

    let mut survivors = Vec::new();
    for key in group_order {
        let members = groups.remove(&key).unwrap_or_default();
        survivors.extend(resolve_group(members));
    }
    survivors
}

fn resolve_group(members: Vec<SourceDocument>) -> Vec<SourceDocument> {
    if members.len() < 2 {
        return members;
    }

    let mut classified: Vec<(SourceDocument, Classification)> = members
        .into_iter()
        .map(|document| {
            let classification = classify(&document.name, &document.folder_path, None);
            (document, classification)
        })
        .collect();

    classified.sort_by(compare_authority);

    let primary_language = classified[0].1.language;
    let mut survivors = vec![classified[0].0.clone()];

    // Sole two-survivor exception: a Norwegian primary may carry its best
    // English translation alongside.
    if primary_language == Language::Norwegian {
        if let Some((translation, _)) = classified[1..].iter().find(|(_, classification)| {
            classification.language == Language::English
                && classification.authority.is_translation
        }) {
            survivors.push(translation.clone());
        }
    }

    survivors
}

/// Highest version first, Norwegian before English on ties, then raw
/// priority as the final tiebreak.
fn compare_authority(
    left: &(SourceDocument, Classification),
    right: &(SourceDocument, Classification),
) -> std::cmp::Ordering {
    right
        .1
        .version
        .cmp(&left.1.version)
        .then_with(|| {
            right
                .1
                .language
                .authority_rank()
                .cmp(&left.1.language.authority_rank())
        })
        .then_with(|| right.1.authority.priority.cmp(&left.1.authority.priority))
}
