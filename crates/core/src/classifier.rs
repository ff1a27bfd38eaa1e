//! Document classification: language, version ordinal, authority flags, and
//! path category. Classification never fails; anything unrecognizable
//! degrades to `Unknown` with the lowest priority.

use std::sync::OnceLock;

use regex::Regex;

use crate::models::{
    Authority, Classification, Language, PathCategory, PathInfo, VersionInfo,
};

/// Cap on how much extracted text participates in language detection.
const CONTENT_SAMPLE_CHARS: usize = 5_000;

// Stems match any inflection of the word ("vedtekt" covers "vedtekter"
// and "vedtektene"); function words must match exactly so "og" never
// fires inside "også".
const NORWEGIAN_STEMS: [&str; 9] = [
    "vedtekt",
    "lokale lov",
    "retningslinj",
    "instruks",
    "norsk",
    "styre",
    "generalforsamling",
    "paragraf",
    "kapittel",
];

const NORWEGIAN_WORDS: [&str; 3] = ["og", "ikke", "skal"];

const ENGLISH_STEMS: [&str; 7] = [
    "english",
    "bylaw",
    "local law",
    "guideline",
    "statute",
    "board",
    "section",
];

const ENGLISH_WORDS: [&str; 3] = ["general assembly", "shall", "the"];

fn version_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\bv(\d{1,3})(?:\.(\d{1,3}))?\b").unwrap())
}

/// Classify one repository document from its name, folder path, and an
/// optional extracted-text sample.
pub fn classify(name: &str, folder_path: &str, content_sample: Option<&str>) -> Classification {
    let language = detect_language(name, folder_path, content_sample);
    let version = parse_version(name);
    let path = classify_path(folder_path);

    let is_translation = language == Language::English
        && (has_translation_token(name) || path.language_folder == Some(Language::English));
    let is_authoritative = language == Language::Norwegian && !is_translation;
    // Latest is provisional here; the prioritizer is the arbiter within a
    // document group, and dropped members never reach the index.
    let is_latest = true;

    let priority = authority_priority(&version, language, is_authoritative, is_latest);

    Classification {
        language,
        version,
        authority: Authority {
            is_authoritative,
            is_latest,
            is_translation,
            priority,
        },
        path,
    }
}

/// Combined authority score. The version ordinal dominates: any higher
/// version outranks any lower one regardless of language, and language
/// bonuses only break version ties.
pub fn authority_priority(
    version: &VersionInfo,
    language: Language,
    is_authoritative: bool,
    is_latest: bool,
) -> i64 {
    let language_bonus = match language {
        Language::Norwegian => 50,
        Language::English => 30,
        Language::Mixed => 10,
        Language::Unknown => 0,
    };
    let flag_bonus = i64::from(is_authoritative) * 5 + i64::from(is_latest) * 3;

    version.ordinal() as i64 * 100 + language_bonus + flag_bonus
}

/// Language detection over name, path, and a bounded content sample.
pub fn detect_language(
    name: &str,
    folder_path: &str,
    content_sample: Option<&str>,
) -> Language {
    if let Some(folder_language) = language_folder(folder_path) {
        return folder_language;
    }

    let lowered_name = name.to_lowercase();
    if has_translation_token(name) || lowered_name.contains("english") {
        return Language::English;
    }

    let sample: String = content_sample
        .unwrap_or_default()
        .chars()
        .take(CONTENT_SAMPLE_CHARS)
        .collect();
    let haystack = format!("{lowered_name} {} {}", folder_path.to_lowercase(), sample.to_lowercase());

    let norwegian_hits = marker_hits(&haystack, &NORWEGIAN_STEMS, &NORWEGIAN_WORDS)
        + if haystack.contains(['æ', 'ø', 'å']) { 2 } else { 0 };
    let english_hits = marker_hits(&haystack, &ENGLISH_STEMS, &ENGLISH_WORDS);

    match (norwegian_hits, english_hits) {
        (0, 0) => Language::Unknown,
        (n, e) if n >= 2 && e >= 2 => Language::Mixed,
        (n, e) if n > e => Language::Norwegian,
        (n, e) if e > n => Language::English,
        _ => Language::Mixed,
    }
}

/// Lighter heuristic for user queries: no path or sample involved.
pub fn detect_query_language(query: &str) -> Language {
    let lowered = query.to_lowercase();
    if lowered.contains(['æ', 'ø', 'å']) {
        return Language::Norwegian;
    }

    let norwegian = marker_hits(&lowered, &NORWEGIAN_STEMS, &NORWEGIAN_WORDS);
    let english = marker_hits(&lowered, &ENGLISH_STEMS, &ENGLISH_WORDS);

    if norwegian > english {
        Language::Norwegian
    } else if english > norwegian {
        Language::English
    } else if norwegian > 0 {
        Language::Mixed
    } else {
        Language::Unknown
    }
}

fn marker_hits(haystack: &str, stems: &[&str], words: &[&str]) -> usize {
    stems
        .iter()
        .filter(|stem| contains_stem(haystack, stem))
        .count()
        + words
            .iter()
            .filter(|word| contains_word(haystack, word))
            .count()
}

/// Word-initial prefix match: "vedtekt" hits "vedtektene" but not
/// "hovedvedtak".
fn contains_stem(haystack: &str, stem: &str) -> bool {
    haystack.match_indices(stem).any(|(position, _)| {
        let before = haystack[..position].chars().next_back();
        !before.is_some_and(|c| c.is_alphanumeric())
    })
}

fn contains_word(haystack: &str, needle: &str) -> bool {
    haystack.match_indices(needle).any(|(position, _)| {
        let before = haystack[..position].chars().next_back();
        let after = haystack[position + needle.len()..].chars().next();
        !before.is_some_and(|c| c.is_alphanumeric()) && !after.is_some_and(|c| c.is_alphanumeric())
    })
}

fn has_translation_token(name: &str) -> bool {
    let lowered = name.to_lowercase();
    lowered
        .split(|c: char| !c.is_alphanumeric())
        .any(|token| token == "eng" || token == "en")
        || lowered.contains("(english)")
        || lowered.contains("translation")
}

/// Extract a dotted version from the file name; absent a match the version
/// is the lowest ordinal.
pub fn parse_version(name: &str) -> VersionInfo {
    let Some(capture) = version_regex().captures(name) else {
        return VersionInfo::lowest();
    };

    let major = capture
        .get(1)
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(1);
    let minor = capture
        .get(2)
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(0);

    VersionInfo {
        raw: capture.get(0).map(|m| m.as_str().to_string()),
        major,
        minor,
    }
}

/// Map a folder path to a semantic category and per-language subfolder.
pub fn classify_path(folder_path: &str) -> PathInfo {
    let lowered = folder_path.to_lowercase();

    let category = if lowered.contains("vedtekt") || lowered.contains("statute") {
        PathCategory::Statutes
    } else if lowered.contains("lokale lover") || lowered.contains("local law") {
        PathCategory::LocalLaws
    } else if lowered.contains("referat")
        || lowered.contains("møte")
        || lowered.contains("minutes")
        || lowered.contains("meeting")
    {
        PathCategory::Meeting
    } else {
        PathCategory::General
    };

    let language_folder = language_folder(folder_path);

    PathInfo {
        category,
        is_in_language_folder: language_folder.is_some(),
        language_folder,
    }
}

fn language_folder(folder_path: &str) -> Option<Language> {
    for segment in folder_path.split('/') {
        match segment.trim().to_lowercase().as_str() {
            "norsk" | "norwegian" | "no" => return Some(Language::Norwegian),
            "english" | "engelsk" | "eng" => return Some(Language::English),
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn norwegian_statutes_are_detected_from_name() {
        let classification = classify("Vedtekter BISO v7.1.pdf", "/Styringsdokumenter", None);
        assert_eq!(classification.language, Language::Norwegian);
        assert!(classification.authority.is_authoritative);
        assert!(!classification.authority.is_translation);
    }

    #[test]
    fn eng_token_marks_english_translation() {
        let classification = classify(
            "Local laws BISO Oslo v7.1 ENG.pdf",
            "/Styringsdokumenter/Lokale lover",
            None,
        );
        assert_eq!(classification.language, Language::English);
        assert!(classification.authority.is_translation);
        assert!(!classification.authority.is_authoritative);
    }

    #[test]
    fn version_is_parsed_numerically() {
        assert_eq!(parse_version("doc v7.1.pdf").ordinal(), 7_001);
        assert_eq!(parse_version("doc V12.pdf").ordinal(), 12_000);
        assert_eq!(parse_version("doc.pdf"), VersionInfo::lowest());
    }

    #[test]
    fn higher_version_outranks_any_language_bonus() {
        let norwegian_old = authority_priority(
            &parse_version("x v6.3.pdf"),
            Language::Norwegian,
            true,
            true,
        );
        let english_new =
            authority_priority(&parse_version("x v7.1.pdf"), Language::English, false, true);

        assert!(english_new > norwegian_old);
    }

    #[test]
    fn norwegian_outranks_same_version_english() {
        let version = parse_version("x v7.1.pdf");
        let norwegian = authority_priority(&version, Language::Norwegian, true, true);
        let english = authority_priority(&version, Language::English, false, true);

        assert!(norwegian > english);
    }

    #[test]
    fn path_category_and_language_folder() {
        let path = classify_path("/Styringsdokumenter/Lokale lover/English");
        assert_eq!(path.category, PathCategory::LocalLaws);
        assert!(path.is_in_language_folder);
        assert_eq!(path.language_folder, Some(Language::English));
    }

    #[test]
    fn unknown_inputs_degrade_instead_of_failing() {
        let classification = classify("x1-298.bin", "/misc", None);
        assert_eq!(classification.language, Language::Unknown);
        assert_eq!(classification.version, VersionInfo::lowest());
        assert_eq!(classification.path.category, PathCategory::General);
    }

    #[test]
    fn inflected_norwegian_forms_are_detected() {
        assert_eq!(
            detect_query_language("§ 6.3 vedtektene om styrets sammensetning"),
            Language::Norwegian
        );
        assert_eq!(
            detect_query_language("hva sier de lokale lovene for Bergen"),
            Language::Norwegian
        );
    }

    #[test]
    fn query_language_detection() {
        assert_eq!(
            detect_query_language("hva sier vedtektene om styret?"),
            Language::Norwegian
        );
        assert_eq!(
            detect_query_language("what does the section about the board say"),
            Language::English
        );
        assert_eq!(detect_query_language("6.3"), Language::Unknown);
    }

    #[test]
    fn content_sample_biases_language() {
        let sample = "Styret skal innkalle til generalforsamling når vedtektene krever det.";
        let classification = classify("document.pdf", "/docs", Some(sample));
        assert_eq!(classification.language, Language::Norwegian);
    }
}
