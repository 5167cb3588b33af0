use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::Local;
use serde::Serialize;

use crate::models::{AnticipatedAnime, Episode};
use crate::season::ReportingWindow;

#[derive(Serialize)]
struct EpisodesArtifact<'a> {
    generated_at: String,
    start_date: String,
    end_date: String,
    episodes: &'a [Episode],
}

#[derive(Serialize)]
struct AnticipatedArtifact<'a> {
    generated_date: String,
    season: String,
    total_animes: usize,
    animes: &'a [AnticipatedAnime],
}

/// Writes the weekly ranking JSON consumed by the front-end.
pub fn write_episodes(path: &Path, episodes: &[Episode], window: &ReportingWindow) -> Result<()> {
    let artifact = EpisodesArtifact {
        generated_at: Local::now().to_rfc3339(),
        start_date: window.start.to_string(),
        end_date: window.end.to_string(),
        episodes,
    };
    write_json(path, &artifact)
}

/// Writes the anticipated ranking JSON consumed by the front-end.
pub fn write_anticipated(
    path: &Path,
    animes: &[AnticipatedAnime],
    season_label: &str,
) -> Result<()> {
    let artifact = AnticipatedArtifact {
        generated_date: Local::now().to_rfc3339(),
        season: season_label.to_string(),
        total_animes: animes.len(),
        animes,
    };
    write_json(path, &artifact)
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("failed to serialize artifact")?;
    fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))
}
