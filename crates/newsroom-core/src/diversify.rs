//! Source diversification for Feed API results (§4.7, §8 "Diversification
//! determinism"): a pure, order-preserving reshuffle so three consecutive
//! entries from the same source never appear on one page, with a
//! tie-weighting rule on top: among sources safe to emit next, prefer
//! whichever has the fewest entries already in the output, weighted by
//! verification level (a source that already backs a well-corroborated
//! story is more likely to be picked next than one that's barely ahead on
//! raw count alone).

use std::collections::{HashMap, VecDeque};

/// Greedily reorders `items` so that no source appears three times in a
/// row, preferring the earliest-available item from the source with the
/// lowest `emitted_count / weight` among those safe to emit next —
/// `weight_of` returns the per-item verification-level weight (1, 2, or 3
/// per §4.7's tiers; higher weight means more likely to be picked next).
/// Falls back to emitting a repeat when every remaining item shares the
/// blocked source (better than truncating the page).
pub fn diversify_by_source<T: Clone>(
    items: &[T],
    limit: usize,
    source_of: impl Fn(&T) -> &str,
    weight_of: impl Fn(&T) -> u8,
) -> Vec<T> {
    let mut source_order: Vec<String> = Vec::new();
    let mut buckets: HashMap<String, VecDeque<usize>> = HashMap::new();

    for (index, item) in items.iter().enumerate() {
        let source = source_of(item).to_string();
        buckets.entry(source.clone()).or_insert_with(|| {
            source_order.push(source.clone());
            VecDeque::new()
        });
        buckets.get_mut(&source).expect("just inserted").push_back(index);
    }

    let mut emitted: HashMap<String, usize> = HashMap::new();
    let mut result = Vec::with_capacity(limit.min(items.len()));
    let mut last_two: Vec<String> = Vec::new();

    while result.len() < limit {
        let has_items =
            |source: &str| buckets.get(source).map(|q| !q.is_empty()).unwrap_or(false);

        let pick = source_order
            .iter()
            .filter(|source| has_items(source) && !blocked(&last_two, source))
            .min_by(|a, b| priority(a, &buckets, &emitted, items, &weight_of)
                .partial_cmp(&priority(b, &buckets, &emitted, items, &weight_of))
                .unwrap_or(std::cmp::Ordering::Equal))
            .cloned()
            .or_else(|| source_order.iter().find(|source| has_items(source)).cloned());

        let Some(source) = pick else { break };
        let index = buckets.get_mut(&source).expect("source present").pop_front().expect("non-empty");
        result.push(items[index].clone());
        *emitted.entry(source.clone()).or_insert(0) += 1;

        last_two.push(source);
        if last_two.len() > 2 {
            last_two.remove(0);
        }
    }

    result
}

/// Lower is more eligible: entries already emitted for this source,
/// divided by the verification-level weight of the next item it would
/// contribute.
fn priority<T>(
    source: &str,
    buckets: &HashMap<String, VecDeque<usize>>,
    emitted: &HashMap<String, usize>,
    items: &[T],
    weight_of: &impl Fn(&T) -> u8,
) -> f64 {
    let count = *emitted.get(source).unwrap_or(&0) as f64;
    let front = buckets.get(source).and_then(|q| q.front()).copied();
    let weight = front.map(|index| weight_of(&items[index]).max(1)).unwrap_or(1) as f64;
    count / weight
}

/// Verification-level weight for §4.7's tie-weighting: 1 source = 1,
/// 2-3 sources = 2, 4+ sources = 3.
pub fn verification_weight(source_count: usize) -> u8 {
    match source_count {
        0 | 1 => 1,
        2 | 3 => 2,
        _ => 3,
    }
}

fn blocked(last_two: &[String], candidate: &str) -> bool {
    last_two.len() == 2 && last_two[0] == candidate && last_two[1] == candidate
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_three_consecutive(sources: &[&str]) -> bool {
        sources.windows(3).all(|w| !(w[0] == w[1] && w[1] == w[2]))
    }

    #[test]
    fn breaks_up_three_consecutive_same_source() {
        let items = vec!["bbc", "bbc", "bbc", "reuters", "ap"];
        let out = diversify_by_source(&items, 5, |s| s, |_| 1);
        assert_eq!(out.len(), 5);
        assert!(no_three_consecutive(&out));
    }

    #[test]
    fn is_deterministic_for_a_fixed_input() {
        let items = vec!["bbc", "bbc", "bbc", "reuters", "ap"];
        let first = diversify_by_source(&items, 5, |s| s, |_| 1);
        let second = diversify_by_source(&items, 5, |s| s, |_| 1);
        assert_eq!(first, second);
    }

    #[test]
    fn single_source_cannot_be_fixed_but_does_not_panic() {
        let items = vec!["bbc", "bbc", "bbc", "bbc"];
        let out = diversify_by_source(&items, 4, |s| s, |_| 1);
        assert_eq!(out.len(), 4);
    }

    #[test]
    fn higher_weighted_source_is_preferred_on_equal_count() {
        // bbc and reuters both start at 0 emitted entries; reuters carries
        // a higher verification weight and should be picked first.
        let items = vec![("bbc", 1u8), ("reuters", 3u8), ("bbc", 1u8), ("reuters", 3u8)];
        let out = diversify_by_source(&items, 4, |(source, _)| source, |(_, weight)| *weight);
        assert_eq!(out[0].0, "reuters");
    }

    #[test]
    fn verification_weight_buckets_match_source_count_tiers() {
        assert_eq!(verification_weight(1), 1);
        assert_eq!(verification_weight(2), 2);
        assert_eq!(verification_weight(3), 2);
        assert_eq!(verification_weight(4), 3);
        assert_eq!(verification_weight(10), 3);
    }
}
