use std::fs;
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use reqwest::Client;
use tracing::{error, info, warn};

use crate::artifacts;
use crate::auth;
use crate::config::{Config, Settings};
use crate::html;
use crate::mal::{self, MalApi, MalClient};
use crate::models::{AnimeSummary, AnticipatedAnime, Episode};
use crate::rank;
use crate::scrape::{self, EpisodePage};
use crate::season::{self, ReportingWindow, SeasonPolicy};

const SCRAPE_DELAY: Duration = Duration::from_secs(1);
const API_DELAY: Duration = Duration::from_millis(500);
const RANKING_CAP: usize = 50;

const EPISODES_JSON: &str = "episodes_data.json";
const ANTICIPATED_JSON: &str = "anticipated_animes_data.json";
const RANKING_HTML: &str = "top_anime_episodes.html";

pub async fn run(config_path: &str) -> Result<()> {
    let config = Config::load(config_path)?;
    let settings = config.settings();
    let config = Arc::new(Mutex::new(config));

    let http = Client::builder()
        .user_agent("Mozilla/5.0")
        .build()
        .context("failed to build HTTP client")?;
    let mal = MalClient::new(http.clone(), Arc::clone(&config));

    loop {
        println!();
        println!("1) Weekly episode ranking");
        println!("2) Anticipated ranking");
        println!("3) Both");
        println!("4) Authenticate with MyAnimeList");
        println!("5) Exit");
        let choice = read_line("> ")?;

        // Entry points report failures and return to the menu; nothing here
        // terminates the process.
        match choice.trim() {
            "1" => {
                if let Err(e) = run_weekly(&http, &mal, settings).await {
                    error!("weekly ranking failed: {e:#}");
                    println!("Weekly ranking failed: {e}");
                }
            }
            "2" => {
                if let Err(e) = run_anticipated(&mal, settings.season_policy).await {
                    error!("anticipated ranking failed: {e:#}");
                    println!("Anticipated ranking failed: {e}");
                }
            }
            "3" => {
                if let Err(e) = run_weekly(&http, &mal, settings).await {
                    error!("weekly ranking failed: {e:#}");
                    println!("Weekly ranking failed: {e}");
                }
                if let Err(e) = run_anticipated(&mal, settings.season_policy).await {
                    error!("anticipated ranking failed: {e:#}");
                    println!("Anticipated ranking failed: {e}");
                }
            }
            "4" => {
                if let Err(e) = auth::run_interactive(&http, &config).await {
                    error!("authentication failed: {e:#}");
                    println!("Authentication failed: {e}");
                }
            }
            "5" => break,
            other => println!("Unrecognized option '{}'", other),
        }
    }
    Ok(())
}

async fn run_weekly(http: &Client, mal: &dyn MalApi, settings: Settings) -> Result<()> {
    let today = Local::now().date_naive();
    let window = prompt_window(today)?;
    info!(
        "ranking episodes aired between {} and {}",
        window.start, window.end
    );

    let animes = if settings.use_api_season_list {
        collect_season_animes_api(mal, settings.season_policy, today, settings.min_members).await?
    } else {
        collect_season_animes_scraped(http, settings.season_policy, today, settings.min_members)
            .await?
    };
    if animes.is_empty() {
        anyhow::bail!("no seasonal anime passed the member floor; nothing to rank");
    }
    info!("{} seasonal anime to inspect", animes.len());

    let episodes = scrape_week_episodes(http, &animes, &window, today).await;
    let top = rank::top_episodes(episodes, RANKING_CAP);

    artifacts::write_episodes(Path::new(EPISODES_JSON), &top, &window)?;
    let page = html::render_page(&top, &window)?;
    fs::write(RANKING_HTML, page).with_context(|| format!("failed to write {RANKING_HTML}"))?;

    println!(
        "Ranked {} episodes; wrote {EPISODES_JSON} and {RANKING_HTML}",
        top.len()
    );
    Ok(())
}

async fn run_anticipated(mal: &dyn MalApi, policy: SeasonPolicy) -> Result<()> {
    let today = Local::now().date_naive();
    let animes = collect_anticipated(mal, RANKING_CAP as u32).await?;
    let season_label = policy.resolve(today).label();

    artifacts::write_anticipated(Path::new(ANTICIPATED_JSON), &animes, &season_label)?;
    println!(
        "Wrote {} anticipated entries to {ANTICIPATED_JSON}",
        animes.len()
    );
    Ok(())
}

/// Upcoming ranking, normalized for the front-end. Per-item picture
/// failures fall back to the listing picture; auth failures abort the run.
pub async fn collect_anticipated(
    mal: &dyn MalApi,
    limit: u32,
) -> Result<Vec<AnticipatedAnime>> {
    let entries = mal.upcoming_ranking(limit).await?;
    info!("{} entries in the upcoming ranking", entries.len());

    let mut out = Vec::new();
    for entry in entries {
        let image = best_or_fallback_picture(mal, entry.node.id, entry.node.fallback_picture())
            .await?;
        tokio::time::sleep(API_DELAY).await;

        out.push(AnticipatedAnime {
            ranking: entry.rank,
            title: rank::preferred_title(&entry.node.title, entry.node.english_title()),
            url: mal::anime_url(entry.node.id),
            image,
            members_count: entry.node.num_list_users,
            members_display: rank::group_thousands(entry.node.num_list_users),
        });
    }
    Ok(rank::dedupe_by(out, |a| a.url.clone()))
}

/// Season anime via the API: current season plus the adjacent one, merged
/// and deduplicated by URL, member floor applied.
pub async fn collect_season_animes_api(
    mal: &dyn MalApi,
    policy: SeasonPolicy,
    today: NaiveDate,
    min_members: u64,
) -> Result<Vec<AnimeSummary>> {
    let current = policy.resolve(today);
    let upcoming = policy.next(current);

    let mut nodes = Vec::new();
    for key in [current, upcoming] {
        match mal.seasonal_anime(key).await {
            Ok(list) => {
                info!("{} anime listed for {}", list.len(), key.label());
                nodes.extend(list);
            }
            Err(e) if e.is_fatal() => return Err(e.into()),
            Err(e) => warn!("season listing failed for {}: {e}", key.label()),
        }
    }

    let mut out = Vec::new();
    for node in nodes {
        if node.num_list_users < min_members {
            continue;
        }
        let image = best_or_fallback_picture(mal, node.id, node.fallback_picture()).await?;
        tokio::time::sleep(API_DELAY).await;

        out.push(AnimeSummary {
            title: rank::preferred_title(&node.title, node.english_title()),
            url: mal::anime_url(node.id),
            image,
            members: node.num_list_users,
        });
    }
    Ok(rank::dedupe_by(out, |a| a.url.clone()))
}

/// Season anime scraped from the listing pages: the default seasonal page
/// plus the upcoming season's page, merged and deduplicated by URL.
async fn collect_season_animes_scraped(
    http: &Client,
    policy: SeasonPolicy,
    today: NaiveDate,
    min_members: u64,
) -> Result<Vec<AnimeSummary>> {
    let upcoming = policy.next(policy.resolve(today));
    let urls = [
        format!("{}/anime/season", mal::SITE_BASE),
        format!(
            "{}/anime/season/{}/{}",
            mal::SITE_BASE,
            upcoming.year,
            upcoming.season.slug()
        ),
    ];

    let mut all = Vec::new();
    for url in &urls {
        match scrape::fetch_season_listing(http, url, min_members).await {
            Ok(list) => {
                info!("{} anime over the member floor at {url}", list.len());
                all.extend(list);
            }
            Err(e) => warn!("season listing fetch failed for {url}: {e}"),
        }
        tokio::time::sleep(SCRAPE_DELAY).await;
    }
    Ok(rank::dedupe_by(all, |a| a.url.clone()))
}

async fn scrape_week_episodes(
    http: &Client,
    animes: &[AnimeSummary],
    window: &ReportingWindow,
    today: NaiveDate,
) -> Vec<Episode> {
    let mut episodes = Vec::new();
    for (i, anime) in animes.iter().enumerate() {
        info!("inspecting {}/{}: {}", i + 1, animes.len(), anime.title);
        let url = scrape::episode_list_url(&anime.url);
        match scrape::fetch_episode_page(http, &url).await {
            Ok(page) => {
                let found = episodes_from_page(page, anime, window, today);
                if found.is_empty() {
                    info!("no episodes aired in the window for {}", anime.title);
                }
                episodes.extend(found);
            }
            // A missing table or a failed page fetch only skips this anime.
            Err(e) => warn!("skipping {}: {e}", anime.title),
        }
        tokio::time::sleep(SCRAPE_DELAY).await;
    }
    episodes
}

/// Turns scraped rows into episodes inside the window. Rows whose air date
/// does not parse are dropped with a diagnostic; that is the only place
/// per-record parse failures surface.
pub fn episodes_from_page(
    page: EpisodePage,
    anime: &AnimeSummary,
    window: &ReportingWindow,
    today: NaiveDate,
) -> Vec<Episode> {
    let EpisodePage { anime_title, rows } = page;
    let mut out = Vec::new();
    for row in rows {
        let Some(airdate) = season::parse_air_date(&row.aired, today) else {
            warn!("unparseable air date '{}' for {}", row.aired, anime_title);
            continue;
        };
        out.push(Episode {
            anime_title: anime_title.clone(),
            episode_number: row.episode_number,
            episode_title: row.episode_title,
            score: row.score,
            airdate,
            image: anime.image.clone(),
            url: anime.url.clone(),
        });
    }
    rank::filter_episodes(out, window)
}

async fn best_or_fallback_picture(
    mal: &dyn MalApi,
    anime_id: u64,
    fallback: Option<String>,
) -> Result<Option<String>> {
    match mal.best_picture(anime_id).await {
        Ok(image) => Ok(image.or(fallback)),
        Err(e) if e.is_fatal() => Err(e.into()),
        Err(e) => {
            warn!("picture fetch failed for anime {anime_id}: {e}");
            Ok(fallback)
        }
    }
}

fn prompt_window(today: NaiveDate) -> Result<ReportingWindow> {
    loop {
        let start_raw = read_line("Window start (DD/MM/YYYY, empty for the last full week): ")?;
        if start_raw.trim().is_empty() {
            return Ok(ReportingWindow::last_full_week(today));
        }
        let Ok(start) = NaiveDate::parse_from_str(start_raw.trim(), "%d/%m/%Y") else {
            println!("Unrecognized date '{}'", start_raw.trim());
            continue;
        };

        let end_raw = read_line("Window end (DD/MM/YYYY): ")?;
        let Ok(end) = NaiveDate::parse_from_str(end_raw.trim(), "%d/%m/%Y") else {
            println!("Unrecognized date '{}'", end_raw.trim());
            continue;
        };
        if end < start {
            println!("End date precedes start date");
            continue;
        }
        return Ok(ReportingWindow { start, end });
    }
}

pub(crate) fn read_line(prompt: &str) -> Result<String> {
    print!("{prompt}");
    io::stdout().flush().context("failed to flush stdout")?;
    let mut line = String::new();
    io::stdin()
        .read_line(&mut line)
        .context("failed to read stdin")?;
    Ok(line)
}
