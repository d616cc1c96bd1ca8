//! Stable id derivation for articles and stories (§3, §4.4).

use chrono::{DateTime, Utc};
use rand::Rng;

/// `hash(source + canonical_url)`: articles re-fetched from the same feed
/// collide on this id, which is what makes ingest idempotent.
pub fn article_id(source: &str, canonical_url: &str) -> String {
    let digest = md5::compute(format!("{source}:{canonical_url}").as_bytes());
    format!("{:x}", digest)
}

/// `story_<YYYYMMDDhhmmss>_<6-hex>`.
pub fn new_story_id(now: DateTime<Utc>) -> String {
    let timestamp = now.format("%Y%m%d%H%M%S");
    let suffix: String = {
        let mut rng = rand::thread_rng();
        (0..6).map(|_| std::char::from_digit(rng.gen_range(0..16), 16).unwrap()).collect()
    };
    format!("story_{timestamp}_{suffix}")
}

/// Strips tracking query parameters and a trailing slash so re-fetches of
/// the same article under a slightly different URL still collide.
pub fn canonicalize_url(raw: &str) -> String {
    let without_fragment = raw.split('#').next().unwrap_or(raw);
    let (base, query) = match without_fragment.split_once('?') {
        Some((b, q)) => (b, Some(q)),
        None => (without_fragment, None),
    };
    let trimmed_base = base.trim_end_matches('/');

    let Some(query) = query else {
        return trimmed_base.to_string();
    };

    let kept: Vec<&str> = query
        .split('&')
        .filter(|param| {
            let key = param.split('=').next().unwrap_or("");
            !key.starts_with("utm_") && key != "ref" && key != "fbclid"
        })
        .collect();

    if kept.is_empty() {
        trimmed_base.to_string()
    } else {
        format!("{trimmed_base}?{}", kept.join("&"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn article_id_is_stable_for_same_inputs() {
        let a = article_id("bbc", "https://bbc.com/a");
        let b = article_id("bbc", "https://bbc.com/a");
        assert_eq!(a, b);
    }

    #[test]
    fn canonicalize_strips_tracking_params() {
        let canonical = canonicalize_url("https://example.com/a?utm_source=x&id=5&fbclid=y");
        assert_eq!(canonical, "https://example.com/a?id=5");
    }

    #[test]
    fn canonicalize_drops_fragment_and_trailing_slash() {
        assert_eq!(canonicalize_url("https://example.com/a/#section"), "https://example.com/a");
    }
}
