use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Duration, Local};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::info;

use crate::auth::TokenResponse;
use crate::config::Config;
use crate::error::FetchError;
use crate::season::SeasonKey;

pub const API_BASE: &str = "https://api.myanimelist.net/v2";
pub const TOKEN_URL: &str = "https://myanimelist.net/v1/oauth2/token";
pub const SITE_BASE: &str = "https://myanimelist.net";

const NODE_FIELDS: &str = "id,title,main_picture,num_list_users,alternative_titles";

/// Canonical site URL for an anime id, the dedupe key across sources.
pub fn anime_url(id: u64) -> String {
    format!("{SITE_BASE}/anime/{id}")
}

#[async_trait]
pub trait MalApi: Send + Sync {
    /// The site's "upcoming" ranking, in rank order.
    async fn upcoming_ranking(&self, limit: u32) -> Result<Vec<RankedAnime>, FetchError>;
    /// All anime of one season, following pagination until exhausted.
    async fn seasonal_anime(&self, key: SeasonKey) -> Result<Vec<AnimeNode>, FetchError>;
    /// Highest-resolution picture for an anime, if it has any.
    async fn best_picture(&self, anime_id: u64) -> Result<Option<String>, FetchError>;
}

#[derive(Debug, Clone)]
pub struct RankedAnime {
    pub rank: u32,
    pub node: AnimeNode,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnimeNode {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub main_picture: Option<Picture>,
    #[serde(default)]
    pub num_list_users: u64,
    #[serde(default)]
    pub alternative_titles: Option<AlternativeTitles>,
}

impl AnimeNode {
    pub fn english_title(&self) -> Option<&str> {
        self.alternative_titles.as_ref().and_then(|t| t.en.as_deref())
    }

    pub fn fallback_picture(&self) -> Option<String> {
        self.main_picture
            .as_ref()
            .and_then(|p| p.large.clone().or_else(|| p.medium.clone()))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Picture {
    pub large: Option<String>,
    pub medium: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AlternativeTitles {
    pub en: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RankingResponse {
    data: Vec<RankingEntry>,
}

#[derive(Debug, Deserialize)]
struct RankingEntry {
    node: AnimeNode,
    ranking: RankingInfo,
}

#[derive(Debug, Deserialize)]
struct RankingInfo {
    rank: u32,
}

#[derive(Debug, Deserialize)]
struct SeasonResponse {
    data: Vec<SeasonEntry>,
    #[serde(default)]
    paging: Option<Paging>,
}

#[derive(Debug, Deserialize)]
struct SeasonEntry {
    node: AnimeNode,
}

#[derive(Debug, Deserialize)]
struct Paging {
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PictureDetail {
    #[serde(default)]
    pictures: Option<Vec<Picture>>,
    #[serde(default)]
    main_picture: Option<Picture>,
}

/// Bearer-token MAL v2 API client. Holds the shared config handle so a
/// token refresh can persist the rotated tokens through one explicit save.
pub struct MalClient {
    http: Client,
    config: Arc<Mutex<Config>>,
}

impl MalClient {
    pub fn new(http: Client, config: Arc<Mutex<Config>>) -> Self {
        MalClient { http, config }
    }

    fn access_token(&self) -> Result<String, FetchError> {
        self.config
            .lock()
            .unwrap()
            .mal_api
            .access_token
            .clone()
            .ok_or_else(|| {
                FetchError::Auth("no access token in config; run the authentication flow".into())
            })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        params: &[(&str, &str)],
    ) -> Result<T, FetchError> {
        let token = self.access_token()?;
        let response = self
            .send_get(url, params, &token)
            .await?;

        // Exactly one refresh-and-retry on an expired token.
        if response.status() == StatusCode::UNAUTHORIZED {
            let token = self.refresh_access_token().await?;
            let response = self.send_get(url, params, &token).await?;
            if response.status() == StatusCode::UNAUTHORIZED {
                return Err(FetchError::Auth(
                    "access token rejected again after refresh".into(),
                ));
            }
            return decode(url, response).await;
        }

        decode(url, response).await
    }

    async fn send_get(
        &self,
        url: &str,
        params: &[(&str, &str)],
        token: &str,
    ) -> Result<reqwest::Response, FetchError> {
        let mut request = self.http.get(url).bearer_auth(token);
        for (key, value) in params {
            request = request.query(&[(*key, *value)]);
        }
        request.send().await.map_err(|source| FetchError::Transport {
            url: url.to_string(),
            source,
        })
    }

    async fn refresh_access_token(&self) -> Result<String, FetchError> {
        let (client_id, client_secret, refresh_token) = {
            let config = self.config.lock().unwrap();
            let creds = &config.mal_api;
            let refresh = creds.refresh_token.clone().ok_or_else(|| {
                FetchError::Auth("access token expired and no refresh token is stored".into())
            })?;
            if creds.client_id.is_empty() || creds.client_secret.is_empty() {
                return Err(FetchError::Auth(
                    "client_id/client_secret missing from config".into(),
                ));
            }
            (creds.client_id.clone(), creds.client_secret.clone(), refresh)
        };

        info!("access token rejected; refreshing");
        let response = self
            .http
            .post(TOKEN_URL)
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token.as_str()),
                ("client_id", client_id.as_str()),
                ("client_secret", client_secret.as_str()),
            ])
            .send()
            .await
            .map_err(|source| FetchError::Transport {
                url: TOKEN_URL.to_string(),
                source,
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|source| FetchError::Transport {
                url: TOKEN_URL.to_string(),
                source,
            })?;
        if !status.is_success() {
            return Err(FetchError::Auth(format!(
                "token refresh returned {status}: {body}"
            )));
        }
        let token: TokenResponse =
            serde_json::from_str(&body).map_err(|source| FetchError::Decode {
                url: TOKEN_URL.to_string(),
                source,
            })?;

        let access_token = token.access_token.clone();
        {
            let mut config = self.config.lock().unwrap();
            config.mal_api.access_token = Some(token.access_token);
            config.mal_api.refresh_token = Some(token.refresh_token);
            config.mal_api.token_expiry =
                Some((Local::now() + Duration::seconds(token.expires_in)).to_rfc3339());
            config
                .save()
                .map_err(|e| FetchError::TokenStore(e.to_string()))?;
        }
        info!("access token refreshed and saved");
        Ok(access_token)
    }
}

#[async_trait]
impl MalApi for MalClient {
    async fn upcoming_ranking(&self, limit: u32) -> Result<Vec<RankedAnime>, FetchError> {
        let limit = limit.to_string();
        let url = format!("{API_BASE}/anime/ranking");
        let response: RankingResponse = self
            .get_json(
                &url,
                &[
                    ("ranking_type", "upcoming"),
                    ("limit", limit.as_str()),
                    ("fields", NODE_FIELDS),
                ],
            )
            .await?;
        Ok(response
            .data
            .into_iter()
            .map(|entry| RankedAnime {
                rank: entry.ranking.rank,
                node: entry.node,
            })
            .collect())
    }

    async fn seasonal_anime(&self, key: SeasonKey) -> Result<Vec<AnimeNode>, FetchError> {
        let mut url = format!("{API_BASE}/anime/season/{}/{}", key.year, key.season.slug());
        let mut first = true;
        let mut out = Vec::new();
        loop {
            // Paging URLs already carry the query parameters.
            let page: SeasonResponse = if first {
                self.get_json(
                    &url,
                    &[
                        ("limit", "100"),
                        ("fields", NODE_FIELDS),
                        ("sort", "anime_num_list_users"),
                    ],
                )
                .await?
            } else {
                self.get_json(&url, &[]).await?
            };
            out.extend(page.data.into_iter().map(|entry| entry.node));
            match page.paging.and_then(|p| p.next) {
                Some(next) => {
                    url = next;
                    first = false;
                }
                None => break,
            }
        }
        Ok(out)
    }

    async fn best_picture(&self, anime_id: u64) -> Result<Option<String>, FetchError> {
        let url = format!("{API_BASE}/anime/{anime_id}");
        let detail: PictureDetail = self.get_json(&url, &[("fields", "pictures")]).await?;
        let from_gallery = detail
            .pictures
            .and_then(|pictures| pictures.into_iter().next())
            .and_then(|p| p.large);
        Ok(from_gallery.or_else(|| {
            detail
                .main_picture
                .and_then(|p| p.large.or(p.medium))
        }))
    }
}

async fn decode<T: DeserializeOwned>(
    url: &str,
    response: reqwest::Response,
) -> Result<T, FetchError> {
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
    serde_json::from_str(&body).map_err(|source| FetchError::Decode {
        url: url.to_string(),
        source,
    })
}
