use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One aired episode, scraped from an anime's episode listing page.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Episode {
    pub anime_title: String,
    pub episode_number: String,
    pub episode_title: String,
    pub score: f64,
    pub airdate: NaiveDate,
    pub image: Option<String>,
    pub url: String,
}

/// A seasonal anime entry, from either the season listing page or the API.
/// The canonical URL is the natural key for deduplication.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AnimeSummary {
    pub title: String,
    pub url: String,
    pub image: Option<String>,
    pub members: u64,
}

/// A normalized entry of the "most anticipated" ranking, shaped for the
/// front-end contract.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AnticipatedAnime {
    pub ranking: u32,
    pub title: String,
    pub url: String,
    pub image: Option<String>,
    pub members_count: u64,
    pub members_display: String,
}
