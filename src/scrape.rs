use reqwest::header::USER_AGENT;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};

use crate::error::FetchError;
use crate::models::AnimeSummary;

const BROWSER_UA: &str = "Mozilla/5.0";

/// One row of an episode listing table, air date still unparsed.
#[derive(Debug, Clone)]
pub struct EpisodeRow {
    pub episode_number: String,
    pub episode_title: String,
    pub score: f64,
    pub aired: String,
}

#[derive(Debug, Clone)]
pub struct EpisodePage {
    pub anime_title: String,
    pub rows: Vec<EpisodeRow>,
}

/// Fetches a season listing page and returns the entries at or above the
/// member floor. Items without a title link are skipped.
pub async fn fetch_season_listing(
    http: &Client,
    url: &str,
    min_members: u64,
) -> Result<Vec<AnimeSummary>, FetchError> {
    let body = get_page(http, url).await?;
    Ok(parse_season_listing(&body, min_members))
}

/// Fetches an anime's episode listing page and extracts its rows.
pub async fn fetch_episode_page(http: &Client, url: &str) -> Result<EpisodePage, FetchError> {
    let body = get_page(http, url).await?;
    parse_episode_page(&body)
}

/// The episode listing URL for an anime page URL.
pub fn episode_list_url(anime_url: &str) -> String {
    let base = anime_url.trim_end_matches('/');
    if base.ends_with("/episode") {
        base.to_string()
    } else {
        format!("{base}/episode")
    }
}

pub fn parse_season_listing(html: &str, min_members: u64) -> Vec<AnimeSummary> {
    let document = Html::parse_document(html);
    let item_sel = Selector::parse("div.seasonal-anime").unwrap();
    let title_sel = Selector::parse("a.link-title").unwrap();
    let img_sel = Selector::parse("img").unwrap();
    let member_sel = Selector::parse("div.scormem-item.member").unwrap();

    let mut out = Vec::new();
    for item in document.select(&item_sel) {
        let Some(link) = item.select(&title_sel).next() else {
            continue;
        };
        let Some(href) = link.value().attr("href") else {
            continue;
        };
        let title = cell_text(link);
        let image = item
            .select(&img_sel)
            .next()
            .and_then(|img| img.value().attr("data-src").or_else(|| img.value().attr("src")))
            .map(str::to_string);
        let members = item
            .select(&member_sel)
            .next()
            .map(|el| parse_members_count(&el.text().collect::<String>()))
            .unwrap_or(0);

        if members >= min_members {
            out.push(AnimeSummary {
                title,
                url: href.to_string(),
                image,
                members,
            });
        }
    }
    out
}

pub fn parse_episode_page(html: &str) -> Result<EpisodePage, FetchError> {
    let document = Html::parse_document(html);
    let title_sel = Selector::parse("h1.title-name").unwrap();
    let table_sel = Selector::parse("table.episode_list").unwrap();
    let row_sel = Selector::parse("tr.episode-list-data").unwrap();
    let aired_sel = Selector::parse("td.episode-aired").unwrap();
    let number_sel = Selector::parse("td.episode-number").unwrap();
    let title_cell_sel = Selector::parse("td.episode-title").unwrap();
    let title_link_sel = Selector::parse("td.episode-title a").unwrap();
    let poll_sel = Selector::parse("td.episode-poll").unwrap();

    let anime_title = document
        .select(&title_sel)
        .next()
        .map(|el| cell_text(el).trim_end_matches(" Episodes").to_string())
        .unwrap_or_else(|| "Unknown".to_string());

    let table = document
        .select(&table_sel)
        .next()
        .ok_or(FetchError::MissingElement("table.episode_list"))?;

    let mut rows = Vec::new();
    for row in table.select(&row_sel) {
        // Rows without an aired cell carry no usable air date.
        let Some(aired_cell) = row.select(&aired_sel).next() else {
            continue;
        };
        let aired = cell_text(aired_cell);

        let episode_number = row
            .select(&number_sel)
            .next()
            .map(cell_text)
            .unwrap_or_else(|| "Unknown".to_string());
        let episode_title = row
            .select(&title_link_sel)
            .next()
            .or_else(|| row.select(&title_cell_sel).next())
            .map(cell_text)
            .unwrap_or_else(|| "Unknown".to_string());

        // The score sits in the poll cell's data-raw attribute, but only
        // cells also tagged "scored" carry a real community score.
        let score = row
            .select(&poll_sel)
            .next()
            .filter(|el| el.value().classes().any(|c| c == "scored"))
            .and_then(|el| el.value().attr("data-raw"))
            .and_then(|raw| raw.parse::<f64>().ok())
            .unwrap_or(0.0);

        rows.push(EpisodeRow {
            episode_number,
            episode_title,
            score,
            aired,
        });
    }

    Ok(EpisodePage { anime_title, rows })
}

/// Member counts appear as "1,234", "12.3K" or "1.2M".
pub fn parse_members_count(text: &str) -> u64 {
    let cleaned = text.trim().replace(',', "");
    if cleaned.is_empty() {
        return 0;
    }
    let upper = cleaned.to_ascii_uppercase();
    let (digits, multiplier) = if let Some(rest) = upper.strip_suffix('M') {
        (rest, 1_000_000.0)
    } else if let Some(rest) = upper.strip_suffix('K') {
        (rest, 1_000.0)
    } else {
        (upper.as_str(), 1.0)
    };
    digits
        .trim()
        .parse::<f64>()
        .map(|value| (value * multiplier) as u64)
        .unwrap_or(0)
}

fn cell_text(el: ElementRef) -> String {
    el.text().collect::<String>().trim().to_string()
}

async fn get_page(http: &Client, url: &str) -> Result<String, FetchError> {
    let response = http
        .get(url)
        .header(USER_AGENT, BROWSER_UA)
        .send()
        .await
        .map_err(|source| FetchError::Transport {
            url: url.to_string(),
            source,
        })?;
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|source| FetchError::Transport {
            url: url.to_string(),
            source,
        })?;
    if !status.is_success() {
        return Err(FetchError::Status {
            url: url.to_string(),
            status,
            body,
        });
    }
    Ok(body)
}
