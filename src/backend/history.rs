use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

use super::error::StorageError;
use super::storage::KeyValueStorage;

pub const HISTORY_KEY: &str = "readingHistory";
pub const MAX_HISTORY: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub manga_id: String,
    pub chapter_id: String,
    /// Milliseconds since the Unix epoch
    pub timestamp: u64,
    /// Display number of the chapter, when it was known at read time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chapter_number: Option<String>,
}

/// Recently read chapters, newest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReadingHistory {
    entries: Vec<HistoryEntry>,
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

impl ReadingHistory {
    pub fn load(storage: &dyn KeyValueStorage) -> Self {
        let Some(content) = storage.get(HISTORY_KEY) else {
            return ReadingHistory::default();
        };

        match serde_json::from_str::<Vec<HistoryEntry>>(&content) {
            Ok(mut entries) => {
                entries.truncate(MAX_HISTORY);
                ReadingHistory { entries }
            }
            Err(e) => {
                log::warn!("Discarding malformed reading history: {}", e);
                ReadingHistory::default()
            }
        }
    }

    pub fn save(&self, storage: &mut dyn KeyValueStorage) -> Result<(), StorageError> {
        let content = serde_json::to_string(self).map_err(|source| StorageError::Serialize {
            key: HISTORY_KEY.to_string(),
            source,
        })?;
        storage.set(HISTORY_KEY, &content)
    }

    pub fn record(&mut self, manga_id: &str, chapter_id: &str, chapter_number: Option<&str>) {
        self.record_at(manga_id, chapter_id, chapter_number, now_millis());
    }

    pub fn record_at(
        &mut self,
        manga_id: &str,
        chapter_id: &str,
        chapter_number: Option<&str>,
        timestamp: u64,
    ) {
        self.entries
            .retain(|e| !(e.manga_id == manga_id && e.chapter_id == chapter_id));
        self.entries.insert(
            0,
            HistoryEntry {
                manga_id: manga_id.to_string(),
                chapter_id: chapter_id.to_string(),
                timestamp,
                chapter_number: chapter_number.map(str::to_string),
            },
        );
        self.entries.truncate(MAX_HISTORY);
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    /// Most recently read chapter of a manga, if any.
    pub fn last_read(&self, manga_id: &str) -> Option<&HistoryEntry> {
        self.entries.iter().find(|e| e.manga_id == manga_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::storage::MemoryStorage;

    fn pairs(history: &ReadingHistory) -> Vec<(&str, &str)> {
        history
            .entries()
            .iter()
            .map(|e| (e.manga_id.as_str(), e.chapter_id.as_str()))
            .collect()
    }

    #[test]
    fn repeated_entry_moves_to_front() {
        let mut history = ReadingHistory::default();
        history.record_at("m1", "c1", None, 1);
        history.record_at("m2", "c2", None, 2);
        history.record_at("m1", "c1", None, 3);

        assert_eq!(pairs(&history), vec![("m1", "c1"), ("m2", "c2")]);
        assert_eq!(history.entries()[0].timestamp, 3);
    }

    #[test]
    fn same_manga_different_chapter_is_kept() {
        let mut history = ReadingHistory::default();
        history.record_at("m1", "c1", None, 1);
        history.record_at("m1", "c2", None, 2);

        assert_eq!(history.entries().len(), 2);
        assert_eq!(history.last_read("m1").map(|e| e.chapter_id.as_str()), Some("c2"));
    }

    #[test]
    fn capped_at_fifty() {
        let mut history = ReadingHistory::default();
        for i in 0..120 {
            history.record_at(&format!("m{}", i), "c", None, i);
        }

        assert_eq!(history.entries().len(), MAX_HISTORY);
        assert_eq!(history.entries()[0].manga_id, "m119");
        assert_eq!(history.entries()[MAX_HISTORY - 1].manga_id, "m70");
    }

    #[test]
    fn persists_camel_case_entries() {
        let mut storage = MemoryStorage::new();
        let mut history = ReadingHistory::default();
        history.record_at("m1", "c1", None, 7);
        history.save(&mut storage).unwrap();

        assert_eq!(
            storage.get(HISTORY_KEY).as_deref(),
            Some(r#"[{"mangaId":"m1","chapterId":"c1","timestamp":7}]"#)
        );
        assert_eq!(ReadingHistory::load(&storage), history);
    }

    #[test]
    fn chapter_number_is_optional_in_stored_blob() {
        let storage = MemoryStorage::new().with_entry(
            HISTORY_KEY,
            r#"[{"mangaId":"m1","chapterId":"c1","timestamp":7,"chapterNumber":"12"},{"mangaId":"m2","chapterId":"c2","timestamp":5}]"#,
        );
        let history = ReadingHistory::load(&storage);

        assert_eq!(history.entries()[0].chapter_number.as_deref(), Some("12"));
        assert_eq!(history.entries()[1].chapter_number, None);
    }

    #[test]
    fn malformed_blob_gives_empty_history() {
        let storage = MemoryStorage::new().with_entry(HISTORY_KEY, "[{\"mangaId\": 1}]");
        assert!(ReadingHistory::load(&storage).entries().is_empty());
    }
}
