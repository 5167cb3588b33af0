use std::cmp::Ordering;
use std::collections::HashSet;
use std::hash::Hash;

use crate::models::Episode;
use crate::season::ReportingWindow;

/// Keeps episodes whose air date falls inside the window, inclusive on both
/// ends. Idempotent: refiltering with the same window is a no-op.
pub fn filter_episodes(episodes: Vec<Episode>, window: &ReportingWindow) -> Vec<Episode> {
    episodes
        .into_iter()
        .filter(|ep| window.contains(ep.airdate))
        .collect()
}

/// Top `cap` episodes by score, descending. Unscored episodes (score <= 0)
/// are excluded first; score gates inclusion independently of the date
/// filter. The sort is stable, so ties keep scrape order.
pub fn top_episodes(mut episodes: Vec<Episode>, cap: usize) -> Vec<Episode> {
    episodes.retain(|ep| ep.score > 0.0);
    episodes.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    episodes.truncate(cap);
    episodes
}

/// Removes later duplicates by key, keeping the first occurrence. Used with
/// the canonical anime URL when merging season lists.
pub fn dedupe_by<T, K, F>(items: Vec<T>, key: F) -> Vec<T>
where
    K: Eq + Hash,
    F: Fn(&T) -> K,
{
    let mut seen = HashSet::new();
    items.into_iter().filter(|it| seen.insert(key(it))).collect()
}

/// The English alternative title when present and non-empty, else the
/// canonical title.
pub fn preferred_title(title: &str, english: Option<&str>) -> String {
    match english {
        Some(en) if !en.trim().is_empty() => en.to_string(),
        _ => title.to_string(),
    }
}

/// Comma-grouped display form of a member count, e.g. 1234567 -> "1,234,567".
pub fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
