//! Categorizer (§4.2): a pure, multi-signal classifier with no I/O. The
//! keyword/URL/source tables are treated as configuration data per the
//! spec's open question — `CategoryTables` is built once (via `default()`)
//! and handed to the categorizer rather than inlined as match arms, so it
//! can be recalibrated without touching this module's logic.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const CATEGORIES: &[&str] = &[
    "politics",
    "technology",
    "business",
    "sports",
    "world",
    "science",
    "health",
    "entertainment",
    "environment",
    "general",
];

const GENERAL_FALLBACK_THRESHOLD: f64 = 0.30;
const WEIGHT_URL: f64 = 0.4;
const WEIGHT_KEYWORDS: f64 = 0.4;
const WEIGHT_SOURCE: f64 = 0.2;

/// Tiered keyword weight, scaled per §4.2 (high=3, medium=2, low=1).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum KeywordTier {
    High,
    Medium,
    Low,
}

impl KeywordTier {
    fn weight(self) -> f64 {
        match self {
            Self::High => 3.0,
            Self::Medium => 2.0,
            Self::Low => 1.0,
        }
    }
}

/// Configuration data for the categorizer: URL substring patterns, keyword
/// tiers per category, and a per-source category distribution. Loaded once
/// at startup; `default()` ships a conservative seed table.
#[derive(Debug, Clone, Default)]
pub struct CategoryTables {
    /// category -> list of URL substrings that imply that category.
    pub url_patterns: HashMap<&'static str, Vec<&'static str>>,
    /// category -> (keyword, tier).
    pub keywords: HashMap<&'static str, Vec<(&'static str, KeywordTier)>>,
    /// source id -> category -> weight (0..=1), need not sum to 1.
    pub source_distribution: HashMap<&'static str, HashMap<&'static str, f64>>,
}

impl CategoryTables {
    pub fn seed() -> Self {
        let mut url_patterns: HashMap<&'static str, Vec<&'static str>> = HashMap::new();
        url_patterns.insert("politics", vec!["/politics/", "/election/", "/congress/"]);
        url_patterns.insert("technology", vec!["/tech/", "techcrunch", "/gadgets/"]);
        url_patterns.insert("business", vec!["/business/", "/markets/", "/economy/"]);
        url_patterns.insert("sports", vec!["/sports/", "espn", "/sport/"]);
        url_patterns.insert("world", vec!["/world/", "/international/"]);
        url_patterns.insert("science", vec!["/science/", "/space/"]);
        url_patterns.insert("health", vec!["/health/", "/wellness/"]);
        url_patterns.insert("entertainment", vec!["/entertainment/", "/culture/", "/movies/"]);
        url_patterns.insert("environment", vec!["/environment/", "/climate/"]);

        let mut keywords: HashMap<&'static str, Vec<(&'static str, KeywordTier)>> = HashMap::new();
        keywords.insert(
            "politics",
            vec![
                ("election", KeywordTier::High),
                ("senate", KeywordTier::High),
                ("president", KeywordTier::Medium),
                ("policy", KeywordTier::Low),
            ],
        );
        keywords.insert(
            "technology",
            vec![
                ("software", KeywordTier::High),
                ("startup", KeywordTier::Medium),
                ("chip", KeywordTier::Medium),
                ("app", KeywordTier::Low),
            ],
        );
        keywords.insert(
            "business",
            vec![
                ("earnings", KeywordTier::High),
                ("merger", KeywordTier::High),
                ("stock", KeywordTier::Medium),
                ("market", KeywordTier::Low),
            ],
        );
        keywords.insert(
            "sports",
            vec![
                ("championship", KeywordTier::High),
                ("tournament", KeywordTier::Medium),
                ("match", KeywordTier::Low),
            ],
        );
        keywords.insert(
            "world",
            vec![
                ("conflict", KeywordTier::High),
                ("summit", KeywordTier::Medium),
                ("border", KeywordTier::Low),
            ],
        );
        keywords.insert(
            "science",
            vec![
                ("discovery", KeywordTier::High),
                ("research", KeywordTier::Medium),
                ("telescope", KeywordTier::Medium),
            ],
        );
        keywords.insert(
            "health",
            vec![
                ("outbreak", KeywordTier::High),
                ("vaccine", KeywordTier::High),
                ("hospital", KeywordTier::Medium),
            ],
        );
        keywords.insert(
            "entertainment",
            vec![
                ("premiere", KeywordTier::High),
                ("celebrity", KeywordTier::Medium),
                ("album", KeywordTier::Low),
            ],
        );
        keywords.insert(
            "environment",
            vec![
                ("wildfire", KeywordTier::High),
                ("emissions", KeywordTier::Medium),
                ("drought", KeywordTier::Medium),
            ],
        );

        let mut source_distribution: HashMap<&'static str, HashMap<&'static str, f64>> = HashMap::new();
        source_distribution.insert("techcrunch", [("technology", 1.0)].into_iter().collect());
        source_distribution.insert(
            "bloomberg",
            [("business", 0.8), ("technology", 0.2)].into_iter().collect(),
        );
        source_distribution.insert("espn", [("sports", 1.0)].into_iter().collect());
        source_distribution.insert(
            "bbc",
            [("world", 0.5), ("politics", 0.3), ("business", 0.2)].into_iter().collect(),
        );
        source_distribution.insert("reuters", [("world", 0.6), ("business", 0.4)].into_iter().collect());

        Self { url_patterns, keywords, source_distribution }
    }
}

#[derive(Debug, Clone)]
pub struct CategorizationResult {
    pub category: String,
    pub confidence: f64,
    pub all_scores: HashMap<String, f64>,
}

fn url_score(tables: &CategoryTables, url: &str, category: &str) -> f64 {
    let url_lower = url.to_lowercase();
    match tables.url_patterns.get(category) {
        Some(patterns) if patterns.iter().any(|p| url_lower.contains(p)) => 1.0,
        _ => 0.0,
    }
}

fn keyword_score(tables: &CategoryTables, text: &str, category: &str) -> f64 {
    let text_lower = text.to_lowercase();
    let raw: f64 = tables
        .keywords
        .get(category)
        .map(|entries| {
            entries
                .iter()
                .filter(|(kw, _)| text_lower.contains(kw))
                .map(|(_, tier)| tier.weight())
                .sum()
        })
        .unwrap_or(0.0);
    (raw / 10.0).min(1.0)
}

fn source_score(tables: &CategoryTables, source: &str, category: &str) -> f64 {
    tables
        .source_distribution
        .get(source)
        .and_then(|dist| dist.get(category))
        .copied()
        .unwrap_or(0.0)
}

/// Categorize an article by a weighted blend of URL, keyword, and source
/// signals. Pure function of its inputs and the supplied table.
pub fn categorize(
    tables: &CategoryTables,
    title: &str,
    description: &str,
    url: &str,
    source: &str,
) -> CategorizationResult {
    let combined_text = format!("{title} {description}");
    let mut all_scores = HashMap::new();

    for &category in CATEGORIES.iter().filter(|c| **c != "general") {
        let u = url_score(tables, url, category);
        let k = keyword_score(tables, &combined_text, category);
        let s = source_score(tables, source, category);
        let blended = WEIGHT_URL * u + WEIGHT_KEYWORDS * k + WEIGHT_SOURCE * s;
        all_scores.insert(category.to_string(), blended);
    }

    let best = all_scores
        .iter()
        .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(cat, score)| (cat.clone(), *score));

    match best {
        Some((category, score)) if score >= GENERAL_FALLBACK_THRESHOLD => {
            CategorizationResult { category, confidence: score, all_scores }
        }
        _ => CategorizationResult {
            category: "general".to_string(),
            confidence: 0.0,
            all_scores,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("Fed raises rates", "", "https://example.com/business/fed", "bloomberg", "business")]
    #[case("New chip launch", "a software startup unveils a new app", "https://techcrunch.com/startup", "techcrunch", "technology")]
    #[case("Championship finals tonight", "", "https://espn.com/sports/final", "espn", "sports")]
    fn categorizes_by_url_and_source(
        #[case] title: &str,
        #[case] description: &str,
        #[case] url: &str,
        #[case] source: &str,
        #[case] expected: &str,
    ) {
        let tables = CategoryTables::seed();
        let result = categorize(&tables, title, description, url, source);
        assert_eq!(result.category, expected);
    }

    #[test]
    fn falls_back_to_general_below_threshold() {
        let tables = CategoryTables::seed();
        let result = categorize(&tables, "hello there", "just words", "https://example.com/", "unknown_source");
        assert_eq!(result.category, "general");
        assert_eq!(result.confidence, 0.0);
    }
}
