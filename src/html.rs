use std::fs;

use anyhow::{Context, Result};

use crate::models::Episode;
use crate::season::ReportingWindow;

const STYLES_PATH: &str = "assets/styles.css";
const SCRIPT_PATH: &str = "assets/script.js";

// Rank colors: 1 green, 2-3 pink, the rest yellow.
const FIRST_BG: &str = "#88FE70";
const TOP3_BG: &str = "#FE70A9";
const OTHER_BG: &str = "#FECB70";
const RANK_TEXT: &str = "#212121";

/// Renders the weekly ranking page, inlining the stylesheet and script so
/// the output is a single self-contained file.
pub fn render_page(episodes: &[Episode], window: &ReportingWindow) -> Result<String> {
    let css = fs::read_to_string(STYLES_PATH)
        .with_context(|| format!("failed to read {STYLES_PATH}"))?;
    let js = fs::read_to_string(SCRIPT_PATH)
        .with_context(|| format!("failed to read {SCRIPT_PATH}"))?;
    Ok(generate_html_page(episodes, window, &css, &js))
}

pub fn generate_html_page(
    episodes: &[Episode],
    window: &ReportingWindow,
    css: &str,
    js: &str,
) -> String {
    let period = format!(
        "{} - {}",
        window.start.format("%d/%m/%Y"),
        window.end.format("%d/%m/%Y")
    );

    let mut page = format!(
        r#"<!doctype html>
<html lang="en">
  <head>
    <meta charset="utf-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1" />
    <meta name="description" content="Top 50 Anime Episodes of the Week">
    <title>Top 50 Anime Episodes of the Week</title>
    <style>{css}</style>
  </head>
  <body>
    <div class="header">
      <div class="header-content">
        <h1 class="header-title">TOP 50 ANIME EPISODES <span class="header-subtitle">OF THE WEEK</span></h1>
        <p class="header-date">{period}</p>
      </div>
    </div>

    <div class="main">"#
    );

    for (i, episode) in episodes.iter().enumerate() {
        let rank = i + 1;
        let (rank_bg, card_class) = match rank {
            1 => (FIRST_BG, "first"),
            2 | 3 => (TOP3_BG, "other"),
            _ => (OTHER_BG, "other"),
        };

        let episode_url = crate::scrape::episode_list_url(&episode.url);
        let info = episode_info(episode);

        page.push_str(&format!(
            r#"
      <a href="{url}" target="_blank" style="text-decoration: none; color: inherit;">
        <div class="episode-card {card_class}">
          <div class="rank-section" style="background-color: {rank_bg}; color: {RANK_TEXT};">
            {rank}
          </div>
          <div class="episode-content">
            <div class="episode-info-container">
              <h2 class="episode-title" style="color: {rank_bg};">{title}</h2>
              <p class="episode-info">{info}</p>
            </div>
            <div class="episode-image" style="background-image: url('{image}');"></div>
            <div class="episode-gradient"></div>
          </div>
          <div class="score-section">
            <p class="score-label">Score</p>
            <p class="score-value" style="color: {rank_bg};">{score:.2}</p>
          </div>
        </div>
      </a>"#,
            url = escape_html(&episode_url),
            title = escape_html(&episode.anime_title),
            info = escape_html(&info),
            image = escape_html(episode.image.as_deref().unwrap_or("")),
            score = episode.score,
        ));
    }

    page.push_str(&format!(
        r##"
    </div>

    <div class="footer">
      <p class="footer-text">Average score from 0 to 5 obtained from MyAnimeList</p>
    </div>

    <div class="fixed-buttons">
      <a href="#" id="scrollToTop" class="scroll-to-top">&uarr;</a>
    </div>

    <script>{js}</script>
  </body>
</html>"##
    ));

    page
}

fn episode_info(episode: &Episode) -> String {
    let mut info = format!("S01 E{}", episode.episode_number);
    if !episode.episode_title.is_empty() && episode.episode_title != "Unknown" {
        info.push_str(" - ");
        info.push_str(&episode.episode_title);
    }
    info
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}
