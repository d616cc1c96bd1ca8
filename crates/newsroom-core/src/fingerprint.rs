//! Fingerprint & Similarity (§4.1).
//!
//! Both functions are pure and deterministic, in the same spirit as
//! `calculate_name_similarity`/`normalize_name` in the teacher's entity
//! resolution service: no service handle, no I/O, callable directly from a
//! property test.

use std::collections::HashSet;

/// Stop words and action-verb stems excluded before fingerprinting. Kept as
/// a flat list rather than a generated table — the spec calls out ~40
/// words, this is the fixed contract, not tunable configuration.
const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by",
    "from", "as", "is", "are", "was", "were", "be", "been", "being", "this", "that", "these",
    "those", "it", "its", "his", "her", "their", "our", "your", "my", "announces", "reveals",
    "unveils", "says", "reports", "confirms", "denies", "plans",
];

fn stop_words() -> &'static HashSet<&'static str> {
    use std::sync::OnceLock;
    static SET: OnceLock<HashSet<&'static str>> = OnceLock::new();
    SET.get_or_init(|| STOP_WORDS.iter().copied().collect())
}

/// Lowercase, strip punctuation, tokenize on whitespace, drop stop words and
/// anything of length <= 3. This is `T(x)` from §4.1, used by both
/// `fingerprint` and `similarity`.
pub fn tokenize(title: &str) -> Vec<String> {
    let lowered = title.to_lowercase();
    let stripped: String = lowered
        .chars()
        .map(|c| if c.is_alphanumeric() || c.is_whitespace() { c } else { ' ' })
        .collect();
    let stops = stop_words();
    stripped
        .split_whitespace()
        .filter(|tok| tok.len() > 3 && !stops.contains(tok))
        .map(|tok| tok.to_string())
        .collect()
}

/// `fingerprint(title) -> 8-hex-char string`. Word-order independent
/// because the first five surviving tokens are sorted before hashing.
pub fn fingerprint(title: &str) -> String {
    let mut tokens = tokenize(title);
    tokens.sort();
    tokens.truncate(5);
    let joined = tokens.join(" ");
    let digest = md5::compute(joined.as_bytes());
    format!("{:x}", digest)[..8].to_string()
}

/// `similarity(a, b) -> [0, 1]`, the weighted blend of Jaccard overlap,
/// keyword overlap, and substring overlap described in §4.1.
pub fn similarity(a: &str, b: &str) -> f64 {
    let ta: HashSet<String> = tokenize(a).into_iter().collect();
    let tb: HashSet<String> = tokenize(b).into_iter().collect();

    if ta.is_empty() && tb.is_empty() {
        return 1.0;
    }

    let intersection = ta.intersection(&tb).count();
    let union = ta.union(&tb).count();
    let jaccard = if union == 0 { 0.0 } else { intersection as f64 / union as f64 };

    // Keyword overlap: of the combined keyword set (already filtered to
    // length > 3 by tokenize), the fraction present in both sets.
    let combined: HashSet<&String> = ta.union(&tb).collect();
    let keyword_overlap = if combined.is_empty() {
        0.0
    } else {
        let both = combined.iter().filter(|tok| ta.contains(tok.as_str()) && tb.contains(tok.as_str())).count();
        both as f64 / combined.len() as f64
    };

    // Substring overlap: fraction of tokens in the smaller set that appear
    // as a substring of any token in the larger set.
    let (smaller, larger) = if ta.len() <= tb.len() { (&ta, &tb) } else { (&tb, &ta) };
    let substring_overlap = if smaller.is_empty() {
        0.0
    } else {
        let matches = smaller
            .iter()
            .filter(|tok| larger.iter().any(|other| other.contains(tok.as_str())))
            .count();
        matches as f64 / smaller.len() as f64
    };

    0.4 * jaccard + 0.4 * keyword_overlap + 0.2 * substring_overlap
}
