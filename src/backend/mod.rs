pub mod bookmarks;
pub mod cache;
pub mod error;
pub mod history;
pub mod mangadex;
pub mod settings;
pub mod state;
pub mod storage;
