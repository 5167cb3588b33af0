use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::season::SeasonPolicy;

pub const DEFAULT_PATH: &str = "config.json";

/// Process configuration, loaded once at startup. All mutation is persisted
/// through `save()`; nothing rewrites the file implicitly.
#[derive(Debug, Serialize, Deserialize)]
pub struct Config {
    #[serde(skip)]
    path: PathBuf,
    #[serde(default)]
    pub mal_api: MalCredentials,
    #[serde(default = "default_min_members")]
    pub min_members: u64,
    #[serde(default)]
    pub season_policy: SeasonPolicy,
    #[serde(default)]
    pub use_api_season_list: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MalCredentials {
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    #[serde(default = "default_redirect_uri")]
    pub redirect_uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_expiry: Option<String>,
}

impl Default for MalCredentials {
    fn default() -> Self {
        MalCredentials {
            client_id: String::new(),
            client_secret: String::new(),
            redirect_uri: default_redirect_uri(),
            access_token: None,
            refresh_token: None,
            token_expiry: None,
        }
    }
}

/// The non-credential settings, copied out once so ranking runs don't need
/// the shared config handle.
#[derive(Debug, Clone, Copy)]
pub struct Settings {
    pub min_members: u64,
    pub season_policy: SeasonPolicy,
    pub use_api_season_list: bool,
}

impl Config {
    /// Reads the config file, or starts from defaults when it does not
    /// exist yet (the authentication flow creates it on first save).
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            warn!(
                "{} not found; starting with defaults (scraping works, API calls need authentication)",
                path.display()
            );
            return Ok(Config {
                path: path.to_path_buf(),
                mal_api: MalCredentials::default(),
                min_members: default_min_members(),
                season_policy: SeasonPolicy::default(),
                use_api_season_list: false,
            });
        }

        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let mut config: Config = serde_json::from_str(&raw)
            .with_context(|| format!("{} is not valid JSON", path.display()))?;
        config.path = path.to_path_buf();
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("failed to serialize config")?;
        fs::write(&self.path, json)
            .with_context(|| format!("failed to write {}", self.path.display()))
    }

    pub fn settings(&self) -> Settings {
        Settings {
            min_members: self.min_members,
            season_policy: self.season_policy,
            use_api_season_list: self.use_api_season_list,
        }
    }
}

fn default_min_members() -> u64 {
    20_000
}

fn default_redirect_uri() -> String {
    "http://localhost:8080".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    fn temp_path(name: &str) -> PathBuf {
        env::temp_dir().join(format!("anitop-config-{}-{}", std::process::id(), name))
    }

    #[test]
    fn missing_file_yields_defaults() {
        let config = Config::load(temp_path("missing.json")).unwrap();
        assert_eq!(config.min_members, 20_000);
        assert_eq!(config.season_policy, SeasonPolicy::Calendar);
        assert!(!config.use_api_season_list);
        assert!(config.mal_api.access_token.is_none());
    }

    #[test]
    fn save_and_reload_round_trip() {
        let path = temp_path("roundtrip.json");
        let mut config = Config::load(&path).unwrap();
        config.mal_api.client_id = "abc".to_string();
        config.mal_api.access_token = Some("tok".to_string());
        config.min_members = 5_000;
        config.save().unwrap();

        let reloaded = Config::load(&path).unwrap();
        assert_eq!(reloaded.mal_api.client_id, "abc");
        assert_eq!(reloaded.mal_api.access_token.as_deref(), Some("tok"));
        assert_eq!(reloaded.min_members, 5_000);

        fs::remove_file(&path).ok();
    }

    #[test]
    fn partial_file_fills_defaults() {
        let path = temp_path("partial.json");
        fs::write(&path, r#"{"mal_api": {"client_id": "only-this"}}"#).unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.mal_api.client_id, "only-this");
        assert_eq!(config.mal_api.redirect_uri, "http://localhost:8080");
        assert_eq!(config.min_members, 20_000);

        fs::remove_file(&path).ok();
    }
}
