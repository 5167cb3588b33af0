use std::collections::HashMap;
use std::env;
use std::fs;
use std::sync::Mutex;

use anitop::app;
use anitop::artifacts;
use anitop::error::FetchError;
use anitop::mal::{AlternativeTitles, AnimeNode, MalApi, Picture, RankedAnime};
use anitop::models::AnimeSummary;
use anitop::rank;
use anitop::scrape;
use anitop::season::{ReportingWindow, SeasonKey, SeasonPolicy};
use chrono::NaiveDate;
use serde_json::Value;

struct FakeMal {
    upcoming: Vec<RankedAnime>,
    seasonal: HashMap<(i32, &'static str), Vec<AnimeNode>>,
    pictures: HashMap<u64, String>,
    fail_ranking_with_auth: bool,
    picture_calls: Mutex<Vec<u64>>,
}

impl FakeMal {
    fn new() -> Self {
        FakeMal {
            upcoming: Vec::new(),
            seasonal: HashMap::new(),
            pictures: HashMap::new(),
            fail_ranking_with_auth: false,
            picture_calls: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait::async_trait]
impl MalApi for FakeMal {
    async fn upcoming_ranking(&self, limit: u32) -> Result<Vec<RankedAnime>, FetchError> {
        if self.fail_ranking_with_auth {
            return Err(FetchError::Auth("token rejected after refresh".into()));
        }
        Ok(self.upcoming.iter().take(limit as usize).cloned().collect())
    }

    async fn seasonal_anime(&self, key: SeasonKey) -> Result<Vec<AnimeNode>, FetchError> {
        self.seasonal
            .get(&(key.year, key.season.slug()))
            .cloned()
            .ok_or(FetchError::Status {
                url: format!("season/{}/{}", key.year, key.season.slug()),
                status: reqwest::StatusCode::NOT_FOUND,
                body: "no such season".into(),
            })
    }

    async fn best_picture(&self, anime_id: u64) -> Result<Option<String>, FetchError> {
        self.picture_calls.lock().unwrap().push(anime_id);
        Ok(self.pictures.get(&anime_id).cloned())
    }
}

fn node(id: u64, title: &str, english: Option<&str>, members: u64) -> AnimeNode {
    AnimeNode {
        id,
        title: title.to_string(),
        main_picture: Some(Picture {
            large: Some(format!("https://cdn.example/{id}-main.jpg")),
            medium: None,
        }),
        num_list_users: members,
        alternative_titles: english.map(|en| AlternativeTitles {
            en: Some(en.to_string()),
        }),
    }
}

fn ranked(rank: u32, node: AnimeNode) -> RankedAnime {
    RankedAnime { rank, node }
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[tokio::test]
async fn anticipated_pipeline_normalizes_and_dedupes() {
    let mut mal = FakeMal::new();
    mal.upcoming = vec![
        ranked(1, node(10, "Kimetsu no Yaiba", Some("Demon Slayer"), 1_234_567)),
        ranked(2, node(20, "Mushoku Tensei", Some(""), 54_321)),
        // Same id as rank 1: merged lists keep the first occurrence.
        ranked(3, node(10, "Kimetsu no Yaiba (dup)", None, 1)),
    ];
    mal.pictures
        .insert(10, "https://cdn.example/10-detail.jpg".to_string());

    let animes = app::collect_anticipated(&mal, 50).await.unwrap();

    assert_eq!(animes.len(), 2);
    assert_eq!(animes[0].ranking, 1);
    assert_eq!(animes[0].title, "Demon Slayer");
    assert_eq!(animes[0].url, "https://myanimelist.net/anime/10");
    assert_eq!(
        animes[0].image.as_deref(),
        Some("https://cdn.example/10-detail.jpg")
    );
    assert_eq!(animes[0].members_count, 1_234_567);
    assert_eq!(animes[0].members_display, "1,234,567");

    // Empty English alternative falls back to the canonical title, and the
    // picture endpoint miss falls back to the listing picture.
    assert_eq!(animes[1].title, "Mushoku Tensei");
    assert_eq!(
        animes[1].image.as_deref(),
        Some("https://cdn.example/20-main.jpg")
    );
}

#[tokio::test]
async fn seasonal_api_listing_merges_and_applies_member_floor() {
    let mut mal = FakeMal::new();
    // Calendar policy on 2024-10-01 resolves to fall 2024; its successor
    // under the same policy is winter 2024.
    mal.seasonal.insert(
        (2024, "fall"),
        vec![
            node(1, "Big Fall Show", None, 500_000),
            node(2, "Tiny Fall Show", None, 100),
        ],
    );
    mal.seasonal.insert(
        (2024, "winter"),
        vec![
            node(3, "Upcoming Winter Show", Some("Winter EN"), 30_000),
            node(1, "Big Fall Show (again)", None, 500_000),
        ],
    );

    let animes = app::collect_season_animes_api(
        &mal,
        SeasonPolicy::Calendar,
        date(2024, 10, 1),
        20_000,
    )
    .await
    .unwrap();

    let urls: Vec<&str> = animes.iter().map(|a| a.url.as_str()).collect();
    assert_eq!(
        urls,
        vec![
            "https://myanimelist.net/anime/1",
            "https://myanimelist.net/anime/3"
        ]
    );
    assert_eq!(animes[1].title, "Winter EN");

    // The member floor is applied before the per-item picture fetch.
    let calls = mal.picture_calls.lock().unwrap();
    assert!(!calls.contains(&2));
}

#[tokio::test]
async fn auth_failure_aborts_the_run() {
    let mut mal = FakeMal::new();
    mal.fail_ranking_with_auth = true;

    let err = app::collect_anticipated(&mal, 50).await.unwrap_err();
    let fetch = err.downcast_ref::<FetchError>().expect("typed fetch error");
    assert!(fetch.is_fatal());
}

#[tokio::test]
async fn weekly_pipeline_from_scraped_page_to_artifact() {
    const EPISODE_PAGE: &str = r##"
        <html><body>
          <h1 class="title-name">Big Show Episodes</h1>
          <table class="episode_list">
            <tr class="episode-list-data">
              <td class="episode-number">1</td>
              <td class="episode-title"><a href="#">In Window</a></td>
              <td class="episode-aired">Jan 10, 2024</td>
              <td class="episode-poll scored" data-raw="4.62">4.6</td>
            </tr>
            <tr class="episode-list-data">
              <td class="episode-number">2</td>
              <td class="episode-title"><a href="#">Out of Window</a></td>
              <td class="episode-aired">Jan 1, 2024</td>
              <td class="episode-poll scored" data-raw="4.9">4.9</td>
            </tr>
            <tr class="episode-list-data">
              <td class="episode-number">3</td>
              <td class="episode-title"><a href="#">Bad Date</a></td>
              <td class="episode-aired">sometime soon</td>
              <td class="episode-poll scored" data-raw="4.8">4.8</td>
            </tr>
            <tr class="episode-list-data">
              <td class="episode-number">4</td>
              <td class="episode-title"><a href="#">Unscored</a></td>
              <td class="episode-aired">Jan 11, 2024</td>
              <td class="episode-poll" data-raw="0">N/A</td>
            </tr>
          </table>
        </body></html>"##;

    let anime = AnimeSummary {
        title: "Big Show".to_string(),
        url: "https://myanimelist.net/anime/1/Big_Show".to_string(),
        image: Some("https://cdn.example/big.jpg".to_string()),
        members: 500_000,
    };
    let window = ReportingWindow {
        start: date(2024, 1, 8),
        end: date(2024, 1, 14),
    };
    let today = date(2024, 1, 17);

    let page = scrape::parse_episode_page(EPISODE_PAGE).unwrap();
    let episodes = app::episodes_from_page(page, &anime, &window, today);

    // Out-of-window and unparseable rows are gone; the unscored row stays
    // until the ranking pass.
    assert_eq!(episodes.len(), 2);

    let top = rank::top_episodes(episodes, 50);
    assert_eq!(top.len(), 1);
    assert_eq!(top[0].episode_title, "In Window");
    assert_eq!(top[0].anime_title, "Big Show");
    assert_eq!(top[0].score, 4.62);
    assert_eq!(top[0].airdate, date(2024, 1, 10));

    let path = env::temp_dir().join(format!("anitop-episodes-{}.json", std::process::id()));
    artifacts::write_episodes(&path, &top, &window).unwrap();
    let raw = fs::read_to_string(&path).unwrap();
    fs::remove_file(&path).ok();

    let json: Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(json["start_date"], "2024-01-08");
    assert_eq!(json["end_date"], "2024-01-14");
    assert!(json["generated_at"].as_str().is_some());
    assert_eq!(json["episodes"].as_array().unwrap().len(), 1);
    assert_eq!(json["episodes"][0]["anime_title"], "Big Show");
    assert_eq!(json["episodes"][0]["airdate"], "2024-01-10");
}

#[tokio::test]
async fn anticipated_artifact_contract() {
    let mut mal = FakeMal::new();
    mal.upcoming = vec![ranked(1, node(10, "Show", Some("Show EN"), 42_000))];

    let animes = app::collect_anticipated(&mal, 50).await.unwrap();
    let path = env::temp_dir().join(format!("anitop-anticipated-{}.json", std::process::id()));
    artifacts::write_anticipated(&path, &animes, "Fall 2024").unwrap();
    let raw = fs::read_to_string(&path).unwrap();
    fs::remove_file(&path).ok();

    let json: Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(json["season"], "Fall 2024");
    assert_eq!(json["total_animes"], 1);
    assert_eq!(json["animes"][0]["ranking"], 1);
    assert_eq!(json["animes"][0]["title"], "Show EN");
    assert_eq!(json["animes"][0]["members_count"], 42_000);
    assert_eq!(json["animes"][0]["members_display"], "42,000");
}
