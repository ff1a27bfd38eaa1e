//! Hybrid retrieval: a locator-driven keyword pass over a broad candidate
//! pool, fused with semantic vector search over the same filtered scope.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use regex::Regex;
use tracing::debug;

use crate::classifier::detect_query_language;
use crate::error::SearchError;
use crate::models::{
    Language, PathCategory, RankedResult, ScoredUnit, SearchFilters, SearchType,
};
use crate::traits::{SearchOptions, VectorStore};

/// Candidate pool size for the keyword pass.
const KEYWORD_POOL: usize = 50;
/// Semantic contribution when a keyword hit is boosted into hybrid.
const SEMANTIC_BOOST: f64 = 0.3;
const STRUCTURED_BONUS: f64 = 0.2;
const EXACT_LOCATOR_BONUS: f64 = 0.3;

/// Organization term appended to every augmented query to disambiguate
/// short references.
const ORGANIZATION_TERM: &str = "BISO";

const REGIONS: [&str; 7] = [
    "oslo",
    "bergen",
    "trondheim",
    "stavanger",
    "kristiansand",
    "drammen",
    "campus",
];

fn locator_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)(?:§|paragraf(?:en)?|seksjon|section|artikkel|article)\s*(\d+(?:[.\-]\d+)*)",
        )
        .unwrap()
    })
}

/// Query-side context derived before any store round-trip.
#[derive(Debug, Clone)]
pub struct QueryContext {
    pub language: Language,
    pub category: Option<PathCategory>,
    pub region: Option<String>,
    pub locator: Option<String>,
    pub augmented: String,
}

/// Analyze the raw query: language, category, region, structural locator,
/// and the augmented query string sent to the vector store.
pub fn analyze_query(query: &str) -> QueryContext {
    let lowered = query.to_lowercase();
    let language = detect_query_language(query);

    let category = if lowered.contains("vedtekt") || lowered.contains("statute") || lowered.contains("bylaw")
    {
        Some(PathCategory::Statutes)
    } else if lowered.contains("lokale lover") || lowered.contains("local law") {
        Some(PathCategory::LocalLaws)
    } else {
        None
    };

    let region = REGIONS
        .iter()
        .find(|region| contains_word(&lowered, region))
        .map(|region| region.to_string());

    let locator = locator_regex()
        .captures(query)
        .and_then(|capture| capture.get(1))
        .map(|m| m.as_str().replace('-', "."));

    let mut augmented = query.to_string();
    augmented.push(' ');
    augmented.push_str(ORGANIZATION_TERM);
    if let Some(category) = category {
        augmented.push(' ');
        augmented.push_str(match category {
            PathCategory::Statutes => "vedtekter statutes",
            PathCategory::LocalLaws => "lokale lover local laws",
            PathCategory::Meeting => "referat minutes",
            PathCategory::General => "",
        });
    }
    if let Some(region) = &region {
        augmented.push(' ');
        augmented.push_str(region);
    }

    QueryContext {
        language,
        category,
        region,
        locator,
        augmented,
    }
}

fn contains_word(haystack: &str, needle: &str) -> bool {
    haystack.match_indices(needle).any(|(position, _)| {
        let before = haystack[..position].chars().next_back();
        let after = haystack[position + needle.len()..].chars().next();
        !before.is_some_and(|c| c.is_alphanumeric()) && !after.is_some_and(|c| c.is_alphanumeric())
    })
}

/// Surface forms under which a locator like `6.3` may appear in content.
fn locator_surface_forms(locator: &str) -> Vec<String> {
    let mut forms = vec![format!("§ {locator}"), format!("§{locator}")];
    for word in [
        "paragraf", "seksjon", "section", "artikkel", "article", "punkt",
    ] {
        forms.push(format!("{word} {locator}"));
    }
    forms
}

/// True when the unit's content or structured metadata carries the locator.
pub fn matches_locator(unit_content: &str, section_number: Option<&str>, locator: &str) -> bool {
    if section_number == Some(locator) {
        return true;
    }

    let lowered = unit_content.to_lowercase();
    if locator_surface_forms(locator)
        .iter()
        .any(|form| lowered.contains(&form.to_lowercase()))
    {
        return true;
    }

    // Bare number with boundary punctuation: "6.3" but not "16.3" or "6.31".
    lowered.match_indices(locator).any(|(position, _)| {
        let before = lowered[..position].chars().next_back();
        let after = lowered[position + locator.len()..].chars().next();
        !before.is_some_and(|c| c.is_ascii_digit() || c == '.')
            && !after.is_some_and(|c| c.is_ascii_digit() || c == '.')
    })
}

pub struct HybridRetriever {
    store: Arc<dyn VectorStore>,
}

impl HybridRetriever {
    pub fn new(store: Arc<dyn VectorStore>) -> Self {
        Self { store }
    }

    /// Execute the hybrid search. Only authoritative, latest units are in
    /// scope by default; a detected category narrows further unless the
    /// caller already pinned one.
    pub async fn search(
        &self,
        query: &str,
        k: usize,
        filters: Option<SearchFilters>,
    ) -> Result<Vec<RankedResult>, SearchError> {
        let context = analyze_query(query);

        let mut scope = filters.unwrap_or_default();
        scope.authoritative_only = true;
        scope.latest_only = true;
        if scope.category.is_none() {
            scope.category = context.category;
        }

        let keyword_hits = match &context.locator {
            Some(locator) => {
                self.keyword_search(&context.augmented, locator, &scope)
                    .await?
            }
            None => Vec::new(),
        };

        let semantic_hits = self
            .store
            .search(&SearchOptions {
                query: Some(context.augmented.clone()),
                k,
                filters: scope,
            })
            .await?;

        debug!(
            query,
            locator = context.locator.as_deref().unwrap_or(""),
            keyword = keyword_hits.len(),
            semantic = semantic_hits.len(),
            "hybrid search"
        );

        Ok(merge_results(keyword_hits, semantic_hits, k))
    }

    /// Locator-driven keyword pass: broaden the vector query, pull a large
    /// candidate pool, keep only candidates that textually carry the
    /// locator, rank by structure, exactness, then similarity.
    async fn keyword_search(
        &self,
        augmented: &str,
        locator: &str,
        scope: &SearchFilters,
    ) -> Result<Vec<RankedResult>, SearchError> {
        let pool = self.store.search_broad(augmented, KEYWORD_POOL).await?;

        let mut hits: Vec<RankedResult> = pool
            .into_iter()
            .filter(|hit| scope.matches(&hit.unit))
            .filter(|hit| {
                matches_locator(
                    &hit.unit.chunk.content,
                    hit.unit.chunk.section_number.as_deref(),
                    locator,
                )
            })
            .map(|hit| {
                let structured = hit.unit.chunk.kind.is_structured();
                let exact = hit.unit.chunk.section_number.as_deref() == Some(locator);

                let mut score = hit.score.max(0.0);
                if structured {
                    score += STRUCTURED_BONUS;
                }
                if exact {
                    score += EXACT_LOCATOR_BONUS;
                }

                RankedResult {
                    unit: hit.unit,
                    score: score.min(1.0),
                    search_type: SearchType::Keyword,
                }
            })
            .collect();

        hits.sort_by(|left, right| {
            right
                .score
                .total_cmp(&left.score)
                .then_with(|| left.unit.id.cmp(&right.unit.id))
        });
        Ok(hits)
    }
}

/// Fuse keyword and semantic hits. Keyword hits seed the result set;
/// semantic hits sharing an id are boosted into hybrid, the rest join as
/// plain semantic results. The outcome is independent of discovery order.
pub fn merge_results(
    keyword: Vec<RankedResult>,
    semantic: Vec<ScoredUnit>,
    k: usize,
) -> Vec<RankedResult> {
    let mut by_id: HashMap<String, RankedResult> = HashMap::new();

    for hit in keyword {
        by_id.insert(hit.unit.id.to_string(), hit);
    }

    for hit in semantic {
        let id = hit.unit.id.to_string();
        match by_id.get_mut(&id) {
            Some(seeded) => {
                seeded.score = (seeded.score + SEMANTIC_BOOST * hit.score).min(1.0);
                seeded.search_type = SearchType::Hybrid;
            }
            None => {
                by_id.insert(
                    id,
                    RankedResult {
                        unit: hit.unit,
                        score: hit.score,
                        search_type: SearchType::Semantic,
                    },
                );
            }
        }
    }

    let mut merged: Vec<RankedResult> = by_id.into_values().collect();
    merged.sort_by(|left, right| {
        right
            .score
            .total_cmp(&left.score)
            .then_with(|| left.unit.id.cmp(&right.unit.id))
    });
    merged.truncate(k);
    merged
}
