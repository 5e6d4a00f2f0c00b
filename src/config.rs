use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const APP_DIR: &str = "mangashelf";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub reader: ReaderConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// MangaDex REST endpoint
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Host serving cover art
    #[serde(default = "default_uploads_url")]
    pub uploads_url: String,

    /// Language chapters must be available in (`availableTranslatedLanguage[]`)
    #[serde(default = "default_translated_language")]
    pub translated_language: String,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout")]
    pub request_timeout_secs: u64,

    /// Retries after the first attempt for transport errors and 429/5xx
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,

    #[serde(default = "default_initial_retry_delay")]
    pub initial_retry_delay_ms: u64,

    #[serde(default = "default_max_retry_delay")]
    pub max_retry_delay_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CatalogConfig {
    /// Cards per home shelf
    #[serde(default = "default_shelf_limit")]
    pub shelf_limit: u32,

    #[serde(default = "default_list_limit")]
    pub search_limit: u32,

    #[serde(default = "default_list_limit")]
    pub popular_limit: u32,

    #[serde(default = "default_chapter_limit")]
    pub chapter_limit: u32,

    /// Lifetime of cached catalog responses in seconds
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReaderConfig {
    #[serde(default = "default_auto_play_interval")]
    pub auto_play_interval_ms: u64,

    /// Minimum horizontal drag distance recognised as a swipe
    #[serde(default = "default_swipe_threshold")]
    pub swipe_threshold: f32,
}

fn default_base_url() -> String { "https://api.mangadex.org".to_string() }
fn default_uploads_url() -> String { "https://uploads.mangadex.org".to_string() }
fn default_translated_language() -> String { "id".to_string() }
fn default_user_agent() -> String { format!("Mangashelf/{}", env!("CARGO_PKG_VERSION")) }
fn default_timeout() -> u64 { 20 }
fn default_max_retries() -> usize { 2 }
fn default_initial_retry_delay() -> u64 { 500 }
fn default_max_retry_delay() -> u64 { 4000 }
fn default_shelf_limit() -> u32 { 10 }
fn default_list_limit() -> u32 { 20 }
fn default_chapter_limit() -> u32 { 100 }
fn default_cache_ttl() -> u64 { 3600 }
fn default_auto_play_interval() -> u64 { 3000 }
fn default_swipe_threshold() -> f32 { 50.0 }

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            uploads_url: default_uploads_url(),
            translated_language: default_translated_language(),
            user_agent: default_user_agent(),
            request_timeout_secs: default_timeout(),
            max_retries: default_max_retries(),
            initial_retry_delay_ms: default_initial_retry_delay(),
            max_retry_delay_ms: default_max_retry_delay(),
        }
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            shelf_limit: default_shelf_limit(),
            search_limit: default_list_limit(),
            popular_limit: default_list_limit(),
            chapter_limit: default_chapter_limit(),
            cache_ttl_secs: default_cache_ttl(),
        }
    }
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            auto_play_interval_ms: default_auto_play_interval(),
            swipe_threshold: default_swipe_threshold(),
        }
    }
}

impl ApiConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl CatalogConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

impl ReaderConfig {
    pub fn auto_play_interval(&self) -> Duration {
        Duration::from_millis(self.auto_play_interval_ms)
    }
}

pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
        .join("config.json")
}

pub fn data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

pub fn log_path() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
        .join("mangashelf.log")
}

impl Config {
    /// Loads the config file, falling back to defaults when it is missing or unreadable.
    pub fn load() -> Self {
        Self::load_from(&config_path())
    }

    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Config::default();
        }

        match fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(config) => config,
                Err(e) => {
                    log::warn!("Ignoring malformed config {}: {}", path.display(), e);
                    Config::default()
                }
            },
            Err(e) => {
                log::warn!("Failed to read config {}: {}", path.display(), e);
                Config::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("config.json"));
        assert_eq!(config.api.base_url, "https://api.mangadex.org");
        assert_eq!(config.reader.auto_play_interval_ms, 3000);
        assert_eq!(config.catalog.cache_ttl_secs, 3600);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"api": {"translated_language": "en"}, "reader": {"swipe_threshold": 80.0}}"#)
            .unwrap();

        let config = Config::load_from(&path);
        assert_eq!(config.api.translated_language, "en");
        assert_eq!(config.api.max_retries, 2);
        assert_eq!(config.reader.swipe_threshold, 80.0);
        assert_eq!(config.catalog.shelf_limit, 10);
    }

    #[test]
    fn malformed_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();

        let config = Config::load_from(&path);
        assert_eq!(config.api.request_timeout_secs, 20);
    }
}
