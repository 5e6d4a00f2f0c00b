use serde::{Deserialize, Serialize};

use super::error::StorageError;
use super::storage::KeyValueStorage;

pub const BOOKMARKS_KEY: &str = "bookmarks";

/// Bookmarked comic ids, stored as a JSON array of strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BookmarkSet {
    manga_ids: Vec<String>,
}

impl BookmarkSet {
    pub fn load(storage: &dyn KeyValueStorage) -> Self {
        let Some(content) = storage.get(BOOKMARKS_KEY) else {
            return BookmarkSet::default();
        };

        match serde_json::from_str::<Vec<String>>(&content) {
            Ok(ids) => {
                let mut bookmarks = BookmarkSet::default();
                for id in ids {
                    bookmarks.add(&id);
                }
                bookmarks
            }
            Err(e) => {
                log::warn!("Discarding malformed bookmarks: {}", e);
                BookmarkSet::default()
            }
        }
    }

    pub fn save(&self, storage: &mut dyn KeyValueStorage) -> Result<(), StorageError> {
        let content = serde_json::to_string(self).map_err(|source| StorageError::Serialize {
            key: BOOKMARKS_KEY.to_string(),
            source,
        })?;
        storage.set(BOOKMARKS_KEY, &content)
    }

    fn add(&mut self, manga_id: &str) {
        if !self.is_bookmarked(manga_id) {
            self.manga_ids.push(manga_id.to_string());
        }
    }

    fn remove(&mut self, manga_id: &str) {
        self.manga_ids.retain(|id| id != manga_id);
    }

    pub fn is_bookmarked(&self, manga_id: &str) -> bool {
        self.manga_ids.iter().any(|id| id == manga_id)
    }

    /// Flips membership and returns `true` when the id was just added.
    pub fn toggle(&mut self, manga_id: &str) -> bool {
        if self.is_bookmarked(manga_id) {
            self.remove(manga_id);
            false
        } else {
            self.add(manga_id);
            true
        }
    }

    pub fn ids(&self) -> &[String] {
        &self.manga_ids
    }
}
