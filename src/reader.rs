//! Page-by-page chapter reader.
//!
//! `ReaderSession` is a plain state machine: anything that needs the network
//! or a timer is returned as a [`ReaderCommand`] for the event loop to run,
//! and the outcome is fed back through the `on_*` methods.

use crossterm::event::KeyCode;
use image::DynamicImage;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::backend::mangadex::ChapterPageSet;
use crate::backend::settings::{ImageQuality, ReaderMode, Settings, SettingsPatch};
use crate::backend::state::AppStore;
use crate::config::ReaderConfig;

pub const CHAPTER_LOAD_ERROR: &str = "Failed to load chapter. Please try again.";
pub const PAGE_LOAD_ERROR: &str = "Failed to load page. Please try again.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReaderState {
    Idle,
    Loading,
    Ready,
    /// The message is shown through `ReaderContent::Error`.
    Error,
}

/// Work the event loop performs on behalf of the session.
#[derive(Debug, Clone)]
pub enum ReaderCommand {
    FetchChapterPages {
        chapter_id: String,
    },
    FetchPage {
        chapter_id: String,
        page: usize,
        url: String,
    },
    /// Tick `on_auto_play_tick` every `interval` until `token` is cancelled.
    StartAutoPlay {
        chapter_id: String,
        interval: Duration,
        token: CancellationToken,
    },
}

/// What the `readerContent` region shows.
#[derive(Debug, Clone, Default)]
pub enum ReaderContent {
    #[default]
    Empty,
    Spinner,
    Error(String),
    Page { page: usize, image: DynamicImage },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageOption {
    pub number: usize,
    pub selected: bool,
}

/// Navigation state of the `readerFooter` region.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReaderFooter {
    pub counter: String,
    pub prev_enabled: bool,
    pub next_enabled: bool,
    pub page_options: Vec<PageOption>,
}

/// Visibility of the `readerModal` overlay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReaderModal {
    pub visible: bool,
    /// Background screens ignore scrolling while the reader is open.
    pub scroll_locked: bool,
}

pub struct ReaderSession {
    manga_id: String,
    chapter_id: String,
    pages: Option<ChapterPageSet>,
    current_page: usize,
    total_pages: usize,
    is_loading: bool,
    loading_page: Option<usize>,
    state: ReaderState,
    reader_mode: ReaderMode,
    image_quality: ImageQuality,
    auto_play: bool,
    auto_play_token: Option<CancellationToken>,
    auto_play_interval: Duration,
    swipe_threshold: f32,
    touch_start_x: Option<f32>,
    /// Digits typed towards a page jump
    page_input: String,
    content: ReaderContent,
    footer: ReaderFooter,
    modal: ReaderModal,
}

impl ReaderSession {
    pub fn new(settings: &Settings, config: &ReaderConfig) -> Self {
        Self {
            manga_id: String::new(),
            chapter_id: String::new(),
            pages: None,
            current_page: 1,
            total_pages: 0,
            is_loading: false,
            loading_page: None,
            state: ReaderState::Idle,
            reader_mode: settings.reader_mode,
            image_quality: settings.image_quality,
            auto_play: settings.auto_play,
            auto_play_token: None,
            auto_play_interval: config.auto_play_interval(),
            swipe_threshold: config.swipe_threshold,
            touch_start_x: None,
            page_input: String::new(),
            content: ReaderContent::Empty,
            footer: ReaderFooter::default(),
            modal: ReaderModal::default(),
        }
    }

    pub fn state(&self) -> &ReaderState {
        &self.state
    }

    #[cfg(test)]
    fn current_page(&self) -> usize {
        self.current_page
    }

    pub fn total_pages(&self) -> usize {
        self.total_pages
    }

    #[cfg(test)]
    fn is_loading(&self) -> bool {
        self.is_loading
    }

    pub fn reader_mode(&self) -> ReaderMode {
        self.reader_mode
    }

    pub fn page_input(&self) -> &str {
        &self.page_input
    }

    pub fn is_auto_playing(&self) -> bool {
        self.auto_play_token.is_some()
    }

    pub fn content(&self) -> &ReaderContent {
        &self.content
    }

    pub fn footer(&self) -> &ReaderFooter {
        &self.footer
    }

    pub fn modal(&self) -> ReaderModal {
        self.modal
    }

    pub fn set_image_quality(&mut self, quality: ImageQuality) {
        self.image_quality = quality;
    }

    /// Opens a chapter: shows the spinner and asks for its page list.
    pub fn init(&mut self, manga_id: &str, chapter_id: &str) -> Vec<ReaderCommand> {
        self.stop_auto_play();
        self.manga_id = manga_id.to_string();
        self.chapter_id = chapter_id.to_string();
        self.pages = None;
        self.current_page = 1;
        self.total_pages = 0;
        self.is_loading = false;
        self.loading_page = None;
        self.page_input.clear();
        self.state = ReaderState::Loading;
        self.content = ReaderContent::Spinner;
        self.footer = ReaderFooter::default();
        self.modal = ReaderModal {
            visible: true,
            scroll_locked: true,
        };

        log::info!("Opening chapter {} of {}", chapter_id, manga_id);
        vec![ReaderCommand::FetchChapterPages {
            chapter_id: chapter_id.to_string(),
        }]
    }

    pub fn on_chapter_pages(
        &mut self,
        store: &mut AppStore,
        chapter_id: &str,
        result: Option<ChapterPageSet>,
    ) -> Vec<ReaderCommand> {
        if chapter_id != self.chapter_id || self.state != ReaderState::Loading {
            log::debug!("Ignoring stale page list for chapter {}", chapter_id);
            return Vec::new();
        }

        let pages = match result {
            Some(pages) if !pages.is_empty() => pages,
            _ => {
                self.fail(CHAPTER_LOAD_ERROR);
                return Vec::new();
            }
        };

        self.total_pages = pages.len();
        self.current_page = 1;
        self.pages = Some(pages);
        self.state = ReaderState::Ready;
        self.refresh_footer();

        let mut commands = self.load_current_page();
        store.add_to_history(&self.manga_id, &self.chapter_id);
        if self.auto_play {
            commands.extend(self.start_auto_play());
        }
        commands
    }

    /// Requests the current page unless a page load is already in flight.
    pub fn load_current_page(&mut self) -> Vec<ReaderCommand> {
        if self.is_loading {
            log::debug!("Page load already in flight, dropping request");
            return Vec::new();
        }
        let Some(pages) = &self.pages else {
            return Vec::new();
        };
        let Some(url) = pages.page_url(self.current_page, self.image_quality) else {
            log::error!("Page {} not found in chapter {}", self.current_page, self.chapter_id);
            self.fail(PAGE_LOAD_ERROR);
            return Vec::new();
        };

        self.is_loading = true;
        self.loading_page = Some(self.current_page);
        self.content = ReaderContent::Spinner;
        vec![ReaderCommand::FetchPage {
            chapter_id: self.chapter_id.clone(),
            page: self.current_page,
            url,
        }]
    }

    pub fn on_page_loaded(
        &mut self,
        chapter_id: &str,
        page: usize,
        image: DynamicImage,
    ) -> Vec<ReaderCommand> {
        if !self.is_pending(chapter_id, page) {
            return Vec::new();
        }
        self.is_loading = false;
        self.loading_page = None;
        self.state = ReaderState::Ready;
        self.content = ReaderContent::Page { page, image };

        // The user moved on while this page was downloading.
        if page != self.current_page {
            return self.load_current_page();
        }
        self.refresh_footer();
        Vec::new()
    }

    pub fn on_page_failed(&mut self, chapter_id: &str, page: usize) {
        if !self.is_pending(chapter_id, page) {
            return;
        }
        self.is_loading = false;
        self.loading_page = None;
        self.fail(PAGE_LOAD_ERROR);
    }

    fn is_pending(&self, chapter_id: &str, page: usize) -> bool {
        chapter_id == self.chapter_id && self.loading_page == Some(page)
    }

    fn fail(&mut self, message: &str) {
        log::error!("Reader error in chapter {}: {}", self.chapter_id, message);
        self.state = ReaderState::Error;
        self.content = ReaderContent::Error(message.to_string());
    }

    fn refresh_footer(&mut self) {
        let current = self.current_page;
        let total = self.total_pages;
        self.footer = ReaderFooter {
            counter: format!("{}/{}", current, total),
            prev_enabled: current > 1,
            next_enabled: current < total,
            page_options: (1..=total)
                .map(|number| PageOption {
                    number,
                    selected: number == current,
                })
                .collect(),
        };
    }

    pub fn next_page(&mut self) -> Vec<ReaderCommand> {
        if self.pages.is_none() || self.current_page >= self.total_pages {
            return Vec::new();
        }
        self.current_page += 1;
        self.load_current_page()
    }

    pub fn previous_page(&mut self) -> Vec<ReaderCommand> {
        if self.pages.is_none() || self.current_page <= 1 {
            return Vec::new();
        }
        self.current_page -= 1;
        self.load_current_page()
    }

    pub fn go_to_page(&mut self, page: usize) -> Vec<ReaderCommand> {
        if self.pages.is_none() || page < 1 || page > self.total_pages {
            return Vec::new();
        }
        self.current_page = page;
        self.load_current_page()
    }

    pub fn toggle_reader_mode(&mut self, store: &mut AppStore) -> Vec<ReaderCommand> {
        self.reader_mode = self.reader_mode.toggled();
        store.update_settings(SettingsPatch::reader_mode(self.reader_mode));
        self.load_current_page()
    }

    pub fn toggle_auto_play(&mut self, store: &mut AppStore) -> Vec<ReaderCommand> {
        self.auto_play = !self.auto_play;
        store.update_settings(SettingsPatch::auto_play(self.auto_play));

        if self.auto_play {
            self.start_auto_play()
        } else {
            self.stop_auto_play();
            Vec::new()
        }
    }

    /// Replaces any running auto-play timer with a fresh one.
    pub fn start_auto_play(&mut self) -> Vec<ReaderCommand> {
        self.stop_auto_play();
        let token = CancellationToken::new();
        self.auto_play_token = Some(token.clone());
        vec![ReaderCommand::StartAutoPlay {
            chapter_id: self.chapter_id.clone(),
            interval: self.auto_play_interval,
            token,
        }]
    }

    pub fn stop_auto_play(&mut self) {
        if let Some(token) = self.auto_play_token.take() {
            token.cancel();
        }
    }

    pub fn on_auto_play_tick(&mut self, chapter_id: &str) -> Vec<ReaderCommand> {
        if chapter_id != self.chapter_id || !self.is_auto_playing() {
            return Vec::new();
        }
        if self.current_page < self.total_pages {
            self.next_page()
        } else {
            self.stop_auto_play();
            Vec::new()
        }
    }

    /// Arrow keys turn pages, digits then Enter jump to a page, Esc clears a
    /// pending jump or closes the reader.
    pub fn handle_key(&mut self, key: KeyCode) -> Vec<ReaderCommand> {
        match key {
            KeyCode::Left => self.previous_page(),
            KeyCode::Right => self.next_page(),
            KeyCode::Char(c) if c.is_ascii_digit() => {
                if self.page_input.len() < self.total_pages.to_string().len() {
                    self.page_input.push(c);
                }
                Vec::new()
            }
            KeyCode::Backspace => {
                self.page_input.pop();
                Vec::new()
            }
            KeyCode::Enter => {
                let target = std::mem::take(&mut self.page_input).parse().unwrap_or(0);
                self.go_to_page(target)
            }
            KeyCode::Esc if !self.page_input.is_empty() => {
                self.page_input.clear();
                Vec::new()
            }
            KeyCode::Esc => {
                self.close_reader();
                Vec::new()
            }
            _ => Vec::new(),
        }
    }

    pub fn handle_touch_start(&mut self, x: f32) {
        self.touch_start_x = Some(x);
    }

    /// A leftward swipe goes forward, a rightward swipe goes back.
    pub fn handle_touch_end(&mut self, x: f32) -> Vec<ReaderCommand> {
        let Some(start) = self.touch_start_x.take() else {
            return Vec::new();
        };
        let diff = start - x;
        if diff.abs() <= self.swipe_threshold {
            return Vec::new();
        }
        if diff > 0.0 {
            self.next_page()
        } else {
            self.previous_page()
        }
    }

    pub fn close_reader(&mut self) {
        self.stop_auto_play();
        self.modal = ReaderModal {
            visible: false,
            scroll_locked: false,
        };
    }
}

impl Drop for ReaderSession {
    fn drop(&mut self) {
        self.stop_auto_play();
    }
}
