use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;

use super::bookmarks::BookmarkSet;
use super::cache::{DEFAULT_TTL, TtlCache};
use super::error::StorageError;
use super::history::{HistoryEntry, ReadingHistory};
use super::mangadex::{ChapterSummary, ComicRecord};
use super::settings::{Settings, SettingsPatch};
use super::storage::KeyValueStorage;

pub const SETTINGS_KEY: &str = "mangaSettings";

/// Application state shared by the reader and the catalog screens.
///
/// Mutations update memory first and then write through to storage. A failed
/// write is logged and the in-memory value stays authoritative.
pub struct AppStore {
    storage: Box<dyn KeyValueStorage>,
    cache: TtlCache<Value>,
    bookmarks: BookmarkSet,
    history: ReadingHistory,
    settings: Settings,
    current_manga: Option<ComicRecord>,
    current_chapter: Option<ChapterSummary>,
}

fn load_settings(storage: &dyn KeyValueStorage) -> Settings {
    let Some(content) = storage.get(SETTINGS_KEY) else {
        return Settings::default();
    };
    match serde_json::from_str::<Value>(&content) {
        Ok(value) => Settings::from_stored(&value),
        Err(e) => {
            log::warn!("Discarding malformed settings: {}", e);
            Settings::default()
        }
    }
}

impl AppStore {
    pub fn new(storage: Box<dyn KeyValueStorage>) -> Self {
        let bookmarks = BookmarkSet::load(storage.as_ref());
        let history = ReadingHistory::load(storage.as_ref());
        let settings = load_settings(storage.as_ref());
        log::info!(
            "Loaded {} bookmarks and {} history entries",
            bookmarks.ids().len(),
            history.entries().len()
        );

        Self {
            storage,
            cache: TtlCache::new(),
            bookmarks,
            history,
            settings,
            current_manga: None,
            current_chapter: None,
        }
    }

    fn persisted(&self, what: &str, result: Result<(), StorageError>) {
        if let Err(e) = result {
            log::warn!("Failed to persist {}: {}", what, e);
        }
    }

    // Cache

    pub fn set_cache<T: Serialize>(&mut self, key: &str, value: &T) {
        self.set_cache_with_ttl(key, value, DEFAULT_TTL);
    }

    pub fn set_cache_with_ttl<T: Serialize>(&mut self, key: &str, value: &T, ttl: Duration) {
        match serde_json::to_value(value) {
            Ok(value) => self.cache.insert(key, value, ttl),
            Err(e) => log::warn!("Not caching {}: {}", key, e),
        }
    }

    pub fn get_cache<T: DeserializeOwned>(&mut self, key: &str) -> Option<T> {
        let value = self.cache.get(key)?;
        serde_json::from_value(value)
            .map_err(|e| log::warn!("Cached {} has an unexpected shape: {}", key, e))
            .ok()
    }

    // Bookmarks

    /// Returns the new membership state.
    pub fn toggle_bookmark(&mut self, manga_id: &str) -> bool {
        let added = self.bookmarks.toggle(manga_id);
        let result = self.bookmarks.save(self.storage.as_mut());
        self.persisted("bookmarks", result);
        added
    }

    pub fn is_bookmarked(&self, manga_id: &str) -> bool {
        self.bookmarks.is_bookmarked(manga_id)
    }

    pub fn bookmarks(&self) -> &[String] {
        self.bookmarks.ids()
    }

    // History

    pub fn add_to_history(&mut self, manga_id: &str, chapter_id: &str) {
        let number = self
            .current_chapter
            .as_ref()
            .filter(|c| c.id == chapter_id)
            .map(|c| c.chapter.as_str());
        self.history.record(manga_id, chapter_id, number);
        let result = self.history.save(self.storage.as_mut());
        self.persisted("reading history", result);
    }

    pub fn history(&self) -> &[HistoryEntry] {
        self.history.entries()
    }

    pub fn last_read(&self, manga_id: &str) -> Option<&HistoryEntry> {
        self.history.last_read(manga_id)
    }

    // Settings

    pub fn update_settings(&mut self, patch: SettingsPatch) {
        self.settings.merge(patch);
        let result = match serde_json::to_string(&self.settings) {
            Ok(content) => self.storage.set(SETTINGS_KEY, &content),
            Err(source) => Err(StorageError::Serialize {
                key: SETTINGS_KEY.to_string(),
                source,
            }),
        };
        self.persisted("settings", result);
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    // Now viewing

    pub fn set_current_manga(&mut self, manga: Option<ComicRecord>) {
        self.current_manga = manga;
    }

    pub fn current_manga(&self) -> Option<&ComicRecord> {
        self.current_manga.as_ref()
    }

    pub fn set_current_chapter(&mut self, chapter: Option<ChapterSummary>) {
        self.current_chapter = chapter;
    }

    pub fn current_chapter(&self) -> Option<&ChapterSummary> {
        self.current_chapter.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::bookmarks::BOOKMARKS_KEY;
    use crate::backend::history::HISTORY_KEY;
    use crate::backend::settings::{ImageQuality, ReaderMode, Theme};
    use crate::backend::storage::{FileStorage, MemoryStorage};

    fn store() -> AppStore {
        AppStore::new(Box::new(MemoryStorage::new()))
    }

    #[test]
    fn cache_returns_value_until_ttl() {
        let mut store = store();
        store.set_cache("popular", &vec!["a".to_string(), "b".to_string()]);
        assert_eq!(
            store.get_cache::<Vec<String>>("popular"),
            Some(vec!["a".to_string(), "b".to_string()])
        );

        store.set_cache_with_ttl("short", &1u32, Duration::ZERO);
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(store.get_cache::<u32>("short"), None);
        assert_eq!(store.get_cache::<u32>("missing"), None);
    }

    #[test]
    fn cache_type_mismatch_is_a_miss() {
        let mut store = store();
        store.set_cache("k", &"text");
        assert_eq!(store.get_cache::<u32>("k"), None);
    }

    #[test]
    fn bookmark_toggle_reports_membership() {
        let mut store = store();
        assert!(store.toggle_bookmark("m-1"));
        assert!(store.is_bookmarked("m-1"));
        assert!(!store.toggle_bookmark("m-1"));
        assert!(!store.is_bookmarked("m-1"));
    }

    #[test]
    fn history_promotes_repeats() {
        let mut store = store();
        store.add_to_history("m1", "c1");
        store.add_to_history("m2", "c2");
        store.add_to_history("m1", "c1");

        let pairs: Vec<_> = store
            .history()
            .iter()
            .map(|e| (e.manga_id.as_str(), e.chapter_id.as_str()))
            .collect();
        assert_eq!(pairs, vec![("m1", "c1"), ("m2", "c2")]);
    }

    #[test]
    fn history_keeps_number_of_current_chapter() {
        let mut store = store();
        store.set_current_chapter(Some(ChapterSummary {
            id: "c-9".to_string(),
            chapter: "12".to_string(),
            title: "Arrival".to_string(),
            volume: None,
            pages: 18,
            publish_at: None,
        }));
        store.add_to_history("m-1", "c-9");
        store.add_to_history("m-1", "c-10");

        assert_eq!(store.history()[0].chapter_number, None);
        assert_eq!(store.history()[1].chapter_number.as_deref(), Some("12"));
    }

    #[test]
    fn settings_merge_preserves_other_fields() {
        let storage = MemoryStorage::new().with_entry(
            SETTINGS_KEY,
            r#"{"theme":"dark","readerMode":"horizontal","imageQuality":"data-saver","autoPlay":false,"showPageNumbers":false}"#,
        );
        let mut store = AppStore::new(Box::new(storage));
        store.update_settings(SettingsPatch::auto_play(true));

        let settings = store.settings();
        assert!(settings.auto_play);
        assert_eq!(settings.theme, Theme::Dark);
        assert_eq!(settings.reader_mode, ReaderMode::Horizontal);
        assert_eq!(settings.image_quality, ImageQuality::DataSaver);
        assert!(!settings.show_page_numbers);
    }

    #[test]
    fn malformed_blobs_fall_back_to_defaults() {
        let storage = MemoryStorage::new()
            .with_entry(BOOKMARKS_KEY, "not json")
            .with_entry(HISTORY_KEY, "{}")
            .with_entry(SETTINGS_KEY, "[1, 2]");
        let store = AppStore::new(Box::new(storage));

        assert!(store.bookmarks().is_empty());
        assert!(store.history().is_empty());
        assert_eq!(store.settings(), &Settings::default());
    }

    #[test]
    fn bad_setting_value_keeps_the_rest() {
        let storage = MemoryStorage::new().with_entry(
            SETTINGS_KEY,
            r#"{"theme":"sepia","readerMode":"horizontal","autoPlay":true}"#,
        );
        let store = AppStore::new(Box::new(storage));

        let settings = store.settings();
        assert_eq!(settings.theme, Theme::Light);
        assert_eq!(settings.reader_mode, ReaderMode::Horizontal);
        assert!(settings.auto_play);
        assert!(settings.show_page_numbers);
    }

    #[test]
    fn failed_writes_keep_memory_state() {
        let mut store = AppStore::new(Box::new(MemoryStorage::new().failing()));
        assert!(store.toggle_bookmark("m-1"));
        store.add_to_history("m-1", "c-1");
        store.update_settings(SettingsPatch::reader_mode(ReaderMode::Horizontal));

        assert!(store.is_bookmarked("m-1"));
        assert_eq!(store.history().len(), 1);
        assert_eq!(store.settings().reader_mode, ReaderMode::Horizontal);
    }

    #[test]
    fn state_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut store = AppStore::new(Box::new(FileStorage::new(dir.path().to_path_buf())));
            store.toggle_bookmark("m-1");
            store.add_to_history("m-1", "c-9");
            store.update_settings(SettingsPatch::auto_play(true));
            store.set_cache("transient", &1u8);
        }

        let mut store = AppStore::new(Box::new(FileStorage::new(dir.path().to_path_buf())));
        assert!(store.is_bookmarked("m-1"));
        assert_eq!(store.last_read("m-1").map(|e| e.chapter_id.as_str()), Some("c-9"));
        assert!(store.settings().auto_play);
        assert_eq!(store.get_cache::<u8>("transient"), None);
    }
}
