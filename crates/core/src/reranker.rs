//! Multi-factor reranking over merged search results. The additive factors
//! keep a fixed ordering of effect sizes: keyword seeding > structure >
//! authority > recency; the exact magnitudes are tunable.

use chrono::{Duration, Utc};

use crate::classifier::detect_query_language;
use crate::models::{Language, RankedResult};

const STRUCTURED_BONUS: f64 = 0.15;
const LANGUAGE_MATCH_NORWEGIAN_QUERY: f64 = 0.12;
const LANGUAGE_NORWEGIAN_BASE: f64 = 0.08;
const LANGUAGE_ENGLISH_MATCH: f64 = 0.08;
const LANGUAGE_MIXED: f64 = 0.03;
const AUTHORITATIVE_BONUS: f64 = 0.06;
const LATEST_BONUS: f64 = 0.03;
const TRANSLATION_PENALTY: f64 = 0.03;
const PRIORITY_SLICE: f64 = 0.03;
const PRIORITY_NORMALIZER: f64 = 1_000_000.0;
const SECTION_TITLE_BONUS: f64 = 0.1;
const LENGTH_SWEET_SPOT_BONUS: f64 = 0.05;
const LENGTH_PENALTY: f64 = 0.05;
const RECENT_YEAR_BONUS: f64 = 0.05;
const RECENT_THREE_YEARS_BONUS: f64 = 0.02;

/// Rescore `results` in place against `query`, then sort descending. The
/// final score replaces the prior similarity score.
pub fn rerank(results: &mut [RankedResult], query: &str) {
    let query_language = detect_query_language(query);
    let lowered_query = query.to_lowercase();
    let now = Utc::now();

    for result in results.iter_mut() {
        let mut score = result.score;

        if result.unit.chunk.kind.is_structured() {
            score += STRUCTURED_BONUS;
        }

        score += language_bonus(result.unit.language, query_language);
        score += authority_bonus(result);

        if let Some(title) = &result.unit.chunk.section_title {
            let title = title.trim().to_lowercase();
            if !title.is_empty() && lowered_query.contains(&title) {
                score += SECTION_TITLE_BONUS;
            }
        }

        score += length_bonus(result.unit.chunk.content.len());

        let age = now.signed_duration_since(result.unit.modified_at);
        if age < Duration::days(365) {
            score += RECENT_YEAR_BONUS;
        } else if age < Duration::days(3 * 365) {
            score += RECENT_THREE_YEARS_BONUS;
        }

        result.score = score;
    }

    results.sort_by(|left, right| {
        right
            .score
            .total_cmp(&left.score)
            .then_with(|| left.unit.id.cmp(&right.unit.id))
    });
}

/// Norwegian content always gets a bonus; it is largest when the query is
/// Norwegian too. English content only scores for English queries.
fn language_bonus(unit_language: Language, query_language: Language) -> f64 {
    match unit_language {
        Language::Norwegian if query_language == Language::Norwegian => {
            LANGUAGE_MATCH_NORWEGIAN_QUERY
        }
        Language::Norwegian => LANGUAGE_NORWEGIAN_BASE,
        Language::English if query_language == Language::English => LANGUAGE_ENGLISH_MATCH,
        Language::Mixed => LANGUAGE_MIXED,
        _ => 0.0,
    }
}

fn authority_bonus(result: &RankedResult) -> f64 {
    let mut bonus = 0.0;
    if result.unit.is_authoritative {
        bonus += AUTHORITATIVE_BONUS;
    }
    if result.unit.is_latest {
        bonus += LATEST_BONUS;
    }
    if result.unit.is_translation {
        bonus -= TRANSLATION_PENALTY;
    }
    bonus + (result.unit.priority.max(0) as f64 / PRIORITY_NORMALIZER).min(1.0) * PRIORITY_SLICE
}

/// Reward the 500–1500 character sweet spot; penalize fragments and walls
/// of text.
fn length_bonus(length: usize) -> f64 {
    if length < 100 || length > 3_000 {
        -LENGTH_PENALTY
    } else if (500..=1_500).contains(&length) {
        LENGTH_SWEET_SPOT_BONUS
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use crate::models::{ChunkKind, SearchType};
    use crate::testutil::sample_unit;

    fn result(document_id: &str, content: &str, score: f64) -> RankedResult {
        RankedResult {
            unit: sample_unit(document_id, 0, content),
            score,
            search_type: SearchType::Semantic,
        }
    }

    #[test]
    fn structured_chunks_outrank_equal_semantic_chunks() {
        let body = "a".repeat(800);
        let mut structured = result("doc-a", &body, 0.5);
        structured.unit.chunk.kind = ChunkKind::Structured;
        let unstructured = result("doc-b", &body, 0.5);

        let mut results = vec![unstructured, structured];
        rerank(&mut results, "hvordan velges styret");

        assert_eq!(results[0].unit.document_id, "doc-a");
    }

    #[test]
    fn norwegian_language_bonus_shrinks_for_english_queries() {
        let norwegian_query = language_bonus(Language::Norwegian, Language::Norwegian);
        let english_query = language_bonus(Language::Norwegian, Language::English);

        assert!(english_query > 0.0, "authority language always scores");
        assert!(norwegian_query > english_query);
    }

    #[test]
    fn english_content_scores_only_for_english_queries() {
        assert!(language_bonus(Language::English, Language::English) > 0.0);
        assert_eq!(language_bonus(Language::English, Language::Norwegian), 0.0);
    }

    #[test]
    fn norwegian_authority_still_wins_on_english_query() {
        // Authority overrides language match: the Norwegian statutory
        // document stays on top even when the query is English.
        let body = "The board is elected. ".repeat(40);
        let mut norwegian = result("doc-no", &body, 0.5);
        norwegian.unit.chunk.kind = ChunkKind::Structured;

        let mut english = result("doc-en", &body, 0.5);
        english.unit.language = Language::English;
        english.unit.is_authoritative = false;
        english.unit.is_translation = true;

        let mut results = vec![english, norwegian];
        rerank(&mut results, "what does the section about the board say");

        assert_eq!(results[0].unit.document_id, "doc-no");
    }

    #[test]
    fn section_title_substring_in_query_is_rewarded() {
        let body = "Styret består av leder og nestleder. ".repeat(20);
        let mut titled = result("doc-a", &body, 0.5);
        titled.unit.chunk.section_title = Some("Styrets sammensetning".into());
        let plain = result("doc-b", &body, 0.5);

        let mut results = vec![plain, titled];
        rerank(&mut results, "hva sier styrets sammensetning i vedtektene");

        assert_eq!(results[0].unit.document_id, "doc-a");
    }

    #[test]
    fn length_sweet_spot_beats_fragments_and_walls() {
        assert!(length_bonus(800) > length_bonus(250));
        assert!(length_bonus(250) > length_bonus(50));
        assert!(length_bonus(250) > length_bonus(5_000));
    }

    #[test]
    fn recent_documents_get_a_recency_bonus() {
        let body = "a".repeat(800);
        let mut fresh = result("doc-a", &body, 0.5);
        fresh.unit.modified_at = Utc::now() - Duration::days(30);
        let mut stale = result("doc-b", &body, 0.5);
        stale.unit.modified_at = Utc::now() - Duration::days(5 * 365);

        let mut results = vec![stale, fresh];
        rerank(&mut results, "hvordan velges styret");

        assert_eq!(results[0].unit.document_id, "doc-a");
    }

    #[test]
    fn rerank_keeps_the_same_elements() {
        let mut results = vec![
            result("doc-a", &"a".repeat(800), 0.9),
            result("doc-b", &"b".repeat(800), 0.1),
        ];
        rerank(&mut results, "styret");
        assert_eq!(results.len(), 2);
    }
}
