use image::DynamicImage;
use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListState, Paragraph, Tabs, Wrap},
};
use ratatui_image::{Resize, StatefulImage, picker::Picker, protocol::StatefulProtocol};
use std::collections::HashMap;
use std::time::Instant;

use super::components::{
    self, SpinnerSize, Toast, ToastKind, chapter_list_item, draw_error, draw_manga_card,
    draw_spinner, draw_toast, pagination_line,
};
use crate::backend::history::HistoryEntry;
use crate::backend::mangadex::{ChapterSummary, ComicRecord, Shelves};
use crate::backend::settings::{ReaderMode, Theme};
use crate::backend::state::AppStore;
use crate::config::Config;
use crate::reader::{ReaderContent, ReaderFooter, ReaderSession, ReaderState};

pub const CHAPTERS_PER_PAGE: usize = 20;
/// Publication demographics the Popular tab can be narrowed to.
pub const DEMOGRAPHICS: [&str; 4] = ["shounen", "shoujo", "seinen", "josei"];
const CARD_WIDTH: u16 = 30;

#[derive(Clone, Copy, PartialEq, Eq, Default, Debug)]
pub enum Tab {
    #[default]
    Home,
    Popular,
    Bookmarks,
    History,
    Search,
}

impl Tab {
    pub const ALL: [Tab; 5] = [Tab::Home, Tab::Popular, Tab::Bookmarks, Tab::History, Tab::Search];

    fn title(self) -> &'static str {
        match self {
            Tab::Home => "Home",
            Tab::Popular => "Popular",
            Tab::Bookmarks => "Bookmarks",
            Tab::History => "History",
            Tab::Search => "Search",
        }
    }

    fn index(self) -> usize {
        Tab::ALL.iter().position(|t| *t == self).unwrap_or(0)
    }

    pub fn next(self) -> Tab {
        Tab::ALL[(self.index() + 1) % Tab::ALL.len()]
    }

    pub fn prev(self) -> Tab {
        Tab::ALL[(self.index() + Tab::ALL.len() - 1) % Tab::ALL.len()]
    }
}

/// Home screen shelves, one per origin language.
#[derive(Clone, Copy, PartialEq, Eq, Default, Debug)]
pub enum Shelf {
    #[default]
    Manga,
    Manhwa,
    Manhua,
}

impl Shelf {
    pub const ALL: [Shelf; 3] = [Shelf::Manga, Shelf::Manhwa, Shelf::Manhua];

    fn title(self) -> &'static str {
        match self {
            Shelf::Manga => "Manga (Japanese)",
            Shelf::Manhwa => "Manhwa (Korean)",
            Shelf::Manhua => "Manhua (Chinese)",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Default, Debug)]
pub enum Focus {
    #[default]
    Header,
    Shelf(Shelf),
    List,
}

#[derive(Clone, Copy, PartialEq, Eq, Default, Debug)]
pub enum AppState {
    #[default]
    Loading,
    Ready,
}

#[derive(Clone, Copy, PartialEq, Eq, Default, Debug)]
pub enum View {
    #[default]
    Home,
    MangaDetail,
    Reader,
}

pub struct App {
    pub state: AppState,
    pub loading_message: String,
    pub view: View,
    pub tab: Tab,
    pub focus: Focus,
    pub config: Config,
    pub store: AppStore,
    pub shelves: Shelves,
    pub shelf_offsets: [usize; 3],
    pub popular: Vec<ComicRecord>,
    pub bookmarked: Vec<ComicRecord>,
    pub history_items: Vec<(ComicRecord, HistoryEntry)>,
    pub demographic: Option<&'static str>,
    pub demographic_results: Vec<ComicRecord>,
    pub demographic_loading: bool,
    pub list_offset: usize,
    pub search_query: String,
    pub last_search_query: String,
    pub search_results: Vec<ComicRecord>,
    pub searching: bool,
    pub search_debounce: Option<Instant>,
    pub detail: Option<ComicRecord>,
    pub chapters: Vec<ChapterSummary>,
    pub chapters_loading: bool,
    pub chapter_list_state: ListState,
    pub reader: Option<ReaderSession>,
    pub page_state: Option<StatefulProtocol>,
    pub page_shown: Option<usize>,
    pub picker: Option<Picker>,
    pub cover_images: HashMap<String, StatefulProtocol>,
    pub toast: Option<Toast>,
}

impl App {
    pub fn new(config: Config, store: AppStore) -> Self {
        let picker = Picker::from_query_stdio().ok();

        Self {
            state: AppState::Loading,
            loading_message: "Initializing...".to_string(),
            view: View::Home,
            tab: Tab::Home,
            focus: Focus::Header,
            config,
            store,
            shelves: Shelves::default(),
            shelf_offsets: [0; 3],
            popular: Vec::new(),
            bookmarked: Vec::new(),
            history_items: Vec::new(),
            demographic: None,
            demographic_results: Vec::new(),
            demographic_loading: false,
            list_offset: 0,
            search_query: String::new(),
            last_search_query: String::new(),
            search_results: Vec::new(),
            searching: false,
            search_debounce: None,
            detail: None,
            chapters: Vec::new(),
            chapters_loading: false,
            chapter_list_state: ListState::default(),
            reader: None,
            page_state: None,
            page_shown: None,
            picker,
            cover_images: HashMap::new(),
            toast: None,
        }
    }

    pub fn set_loading(&mut self, message: &str) {
        self.state = AppState::Loading;
        self.loading_message = message.to_string();
    }

    pub fn set_ready(&mut self) {
        self.state = AppState::Ready;
    }

    pub fn show_toast(&mut self, message: impl Into<String>, kind: ToastKind) {
        self.toast = Some(Toast::new(message, kind));
    }

    pub fn add_cover_image(&mut self, manga_id: &str, image: DynamicImage) {
        if let Some(ref picker) = self.picker {
            let protocol = picker.new_resize_protocol(image);
            self.cover_images.insert(manga_id.to_string(), protocol);
        }
    }

    pub fn shelf(&self, shelf: Shelf) -> &[ComicRecord] {
        match shelf {
            Shelf::Manga => &self.shelves.manga,
            Shelf::Manhwa => &self.shelves.manhwa,
            Shelf::Manhua => &self.shelves.manhua,
        }
    }

    /// Cards of the single-row list shown by the current non-home tab.
    pub fn tab_list(&self) -> &[ComicRecord] {
        match self.tab {
            Tab::Home => &[],
            Tab::Popular if self.demographic.is_some() => &self.demographic_results,
            Tab::Popular => &self.popular,
            Tab::Bookmarks => &self.bookmarked,
            Tab::Search => &self.search_results,
            Tab::History => &[],
        }
    }

    /// The record under the cursor, if any.
    pub fn focused_manga(&self) -> Option<ComicRecord> {
        match (self.tab, self.focus) {
            (Tab::Home, Focus::Shelf(shelf)) => {
                self.shelf(shelf).get(self.shelf_offsets[shelf.index()]).cloned()
            }
            (Tab::History, Focus::List) => {
                self.history_items.get(self.list_offset).map(|(m, _)| m.clone())
            }
            (_, Focus::List) => self.tab_list().get(self.list_offset).cloned(),
            _ => None,
        }
    }

    pub fn list_len(&self) -> usize {
        match self.tab {
            Tab::History => self.history_items.len(),
            _ => self.tab_list().len(),
        }
    }

    /// Steps the Popular tab through no filter and each demographic.
    pub fn cycle_demographic(&mut self) -> Option<&'static str> {
        self.demographic = next_demographic(self.demographic);
        self.demographic_results.clear();
        self.demographic_loading = false;
        self.list_offset = 0;
        self.demographic
    }

    pub fn open_manga(&mut self, manga: ComicRecord) {
        self.store.set_current_manga(Some(manga.clone()));
        self.detail = Some(manga);
        self.chapters.clear();
        self.chapters_loading = true;
        self.chapter_list_state = ListState::default();
        self.view = View::MangaDetail;
    }

    pub fn set_chapters(&mut self, chapters: Vec<ChapterSummary>) {
        self.chapters_loading = false;
        // start on the last chapter read, if it is in the list
        let resume = self
            .detail
            .as_ref()
            .and_then(|m| self.store.last_read(&m.id))
            .and_then(|entry| chapters.iter().position(|c| c.id == entry.chapter_id));
        self.chapters = chapters;
        if !self.chapters.is_empty() {
            self.chapter_list_state.select(Some(resume.unwrap_or(0)));
        }
    }

    pub fn selected_chapter(&self) -> Option<usize> {
        self.chapter_list_state.selected()
    }

    pub fn close_reader(&mut self) {
        if let Some(reader) = self.reader.as_mut() {
            reader.close_reader();
        }
        self.reader = None;
        self.page_state = None;
        self.page_shown = None;
        self.store.set_current_chapter(None);
        self.view = View::MangaDetail;
    }

    pub fn go_back(&mut self) {
        match self.view {
            View::Reader => self.close_reader(),
            View::MangaDetail => {
                self.store.set_current_manga(None);
                self.view = View::Home;
            }
            View::Home => {}
        }
    }

    pub fn toggle_bookmark(&mut self) {
        let Some(manga) = self.detail.clone() else {
            return;
        };
        if self.store.toggle_bookmark(&manga.id) {
            self.bookmarked.push(manga.clone());
            self.show_toast(format!("Bookmarked {}", manga.title), ToastKind::Success);
        } else {
            self.bookmarked.retain(|m| m.id != manga.id);
            self.show_toast(format!("Removed {}", manga.title), ToastKind::Info);
        }
    }

    /// Rebuilds the page protocol when the reader shows a different page.
    pub fn sync_page_image(&mut self) {
        let Some(reader) = self.reader.as_ref() else {
            return;
        };
        match reader.content() {
            ReaderContent::Page { page, image } if self.page_shown != Some(*page) => {
                self.page_state = self
                    .picker
                    .as_ref()
                    .map(|picker| picker.new_resize_protocol(image.clone()));
                self.page_shown = Some(*page);
            }
            ReaderContent::Page { .. } => {}
            _ => {
                self.page_state = None;
                self.page_shown = None;
            }
        }
    }

    fn accent(&self) -> Color {
        match self.store.settings().theme {
            Theme::Light => Color::Cyan,
            Theme::Dark => Color::Magenta,
        }
    }
}

pub fn ui(f: &mut Frame, app: &mut App) {
    match app.state {
        AppState::Loading => draw_loading_screen(f, app),
        AppState::Ready => match app.view {
            View::Home => draw_main_ui(f, app),
            View::MangaDetail => draw_detail(f, app),
            View::Reader => draw_reader(f, app),
        },
    }

    if let Some(toast) = &app.toast {
        draw_toast(f, toast);
    }
}

fn draw_loading_screen(f: &mut Frame, app: &App) {
    let area = f.area();

    let block = Block::default()
        .borders(Borders::ALL)
        .title("Mangashelf")
        .border_style(Style::default().fg(app.accent()));

    let inner = block.inner(area);
    f.render_widget(block, area);

    let center_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage(40),
            Constraint::Length(3),
            Constraint::Length(2),
            Constraint::Percentage(40),
        ])
        .split(inner);

    f.render_widget(
        Paragraph::new(components::spinner_line(SpinnerSize::Large, "Loading..."))
            .alignment(Alignment::Center),
        center_layout[1],
    );

    let message = Paragraph::new(&*app.loading_message)
        .style(Style::default().fg(Color::DarkGray))
        .alignment(Alignment::Center);
    f.render_widget(message, center_layout[2]);
}

fn draw_main_ui(f: &mut Frame, app: &mut App) {
    let area = f.area();

    let root = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // header/tabs
            Constraint::Min(10),   // content
            Constraint::Length(3), // footer
        ])
        .split(area);

    draw_header(f, root[0], app);

    match app.tab {
        Tab::Home => {
            let rows = Layout::default()
                .direction(Direction::Vertical)
                .constraints([
                    Constraint::Ratio(1, 3),
                    Constraint::Ratio(1, 3),
                    Constraint::Ratio(1, 3),
                ])
                .split(root[1]);
            for shelf in Shelf::ALL {
                let records = app.shelf(shelf).to_vec();
                let offset = app.shelf_offsets[shelf.index()];
                let focused = app.focus == Focus::Shelf(shelf);
                draw_manga_section(f, rows[shelf.index()], shelf.title(), &records, offset, focused, app);
            }
        }
        Tab::Popular | Tab::Bookmarks => {
            let records = app.tab_list().to_vec();
            let title = match (app.tab, app.demographic) {
                (Tab::Bookmarks, _) => "Bookmarks".to_string(),
                (_, Some(demographic)) => format!("Latest {}", demographic),
                (_, None) => "Popular Now".to_string(),
            };
            let focused = app.focus == Focus::List;
            let offset = app.list_offset;
            if app.tab == Tab::Popular && app.demographic_loading {
                draw_spinner(f, root[1], SpinnerSize::Large, "Loading titles...");
            } else if records.is_empty() && app.tab == Tab::Bookmarks {
                draw_empty(f, root[1], "No bookmarks yet. Press b on a title to add one.");
            } else {
                draw_manga_section(f, root[1], &title, &records, offset, focused, app);
            }
        }
        Tab::History => draw_history(f, root[1], app),
        Tab::Search => draw_search(f, root[1], app),
    }

    draw_footer(f, root[2], app.accent(), HOME_KEYS);
}

fn draw_header(f: &mut Frame, area: Rect, app: &App) {
    let titles: Vec<Line> = Tab::ALL.iter().map(|t| Line::from(t.title())).collect();
    let highlight = if app.focus == Focus::Header {
        Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(app.accent())
    };

    let tabs = Tabs::new(titles)
        .select(app.tab.index())
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("Mangashelf")
                .border_style(Style::default().fg(app.accent())),
        )
        .highlight_style(highlight);
    f.render_widget(tabs, area);
}

fn draw_empty(f: &mut Frame, area: Rect, message: &str) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray));
    let inner = block.inner(area);
    f.render_widget(block, area);
    f.render_widget(
        Paragraph::new(message.to_string())
            .style(Style::default().fg(Color::DarkGray))
            .alignment(Alignment::Center),
        inner,
    );
}

fn draw_manga_section(
    f: &mut Frame,
    area: Rect,
    title: &str,
    records: &[ComicRecord],
    offset: usize,
    focused: bool,
    app: &mut App,
) {
    let border_color = if focused { Color::Yellow } else { Color::DarkGray };
    let block = Block::default()
        .borders(Borders::ALL)
        .title(Span::styled(
            format!(" {} ", title),
            Style::default().fg(app.accent()).add_modifier(Modifier::BOLD),
        ))
        .border_style(Style::default().fg(border_color));
    let inner = block.inner(area);
    f.render_widget(block, area);

    if records.is_empty() {
        f.render_widget(
            Paragraph::new("Nothing to show")
                .style(Style::default().fg(Color::DarkGray))
                .alignment(Alignment::Center),
            inner,
        );
        return;
    }

    let visible = (inner.width / CARD_WIDTH).max(1) as usize;
    // keep the selected card in view
    let first = offset.saturating_sub(visible.saturating_sub(1));
    let constraints: Vec<Constraint> = (0..visible).map(|_| Constraint::Length(CARD_WIDTH)).collect();
    let slots = Layout::default()
        .direction(Direction::Horizontal)
        .constraints(constraints)
        .split(inner);

    for (slot, (index, manga)) in slots.iter().zip(records.iter().enumerate().skip(first)) {
        let bookmarked = app.store.is_bookmarked(&manga.id);
        let image_state = app.cover_images.get_mut(&manga.id);
        draw_manga_card(
            f,
            *slot,
            manga,
            image_state,
            bookmarked,
            focused && index == offset,
        );
    }
}

fn draw_history(f: &mut Frame, area: Rect, app: &mut App) {
    if app.history_items.is_empty() {
        draw_empty(f, area, "Nothing read yet.");
        return;
    }

    let items: Vec<ratatui::widgets::ListItem> = app
        .history_items
        .iter()
        .map(|(manga, entry)| {
            ratatui::widgets::ListItem::new(Line::from(vec![
                Span::styled(manga.title.clone(), Style::default().fg(Color::White).add_modifier(Modifier::BOLD)),
                Span::raw("  "),
                Span::styled(history_label(entry), Style::default().fg(Color::DarkGray)),
            ]))
        })
        .collect();

    let mut state = ListState::default();
    if app.focus == Focus::List {
        state.select(Some(app.list_offset));
    }
    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title(" Reading History "))
        .highlight_style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))
        .highlight_symbol("› ");
    f.render_stateful_widget(list, area, &mut state);
}

fn next_demographic(current: Option<&'static str>) -> Option<&'static str> {
    match current {
        None => Some(DEMOGRAPHICS[0]),
        Some(current) => DEMOGRAPHICS
            .iter()
            .position(|d| *d == current)
            .and_then(|i| DEMOGRAPHICS.get(i + 1))
            .copied(),
    }
}

fn history_label(entry: &HistoryEntry) -> String {
    match &entry.chapter_number {
        Some(number) => format!("Chapter {}", number),
        None => "Chapter unknown".to_string(),
    }
}

fn draw_search(f: &mut Frame, area: Rect, app: &mut App) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(5)])
        .split(area);

    let input_style = if app.focus == Focus::Header {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default().fg(Color::DarkGray)
    };
    let status = if app.searching { " searching… " } else { " Search " };
    f.render_widget(
        Paragraph::new(format!("{}▏", app.search_query)).block(
            Block::default()
                .borders(Borders::ALL)
                .title(status)
                .border_style(input_style),
        ),
        rows[0],
    );

    if app.searching {
        draw_spinner(f, rows[1], SpinnerSize::Small, "Searching...");
        return;
    }
    let records = app.search_results.clone();
    let focused = app.focus == Focus::List;
    let offset = app.list_offset;
    draw_manga_section(f, rows[1], "Results", &records, offset, focused, app);
}

fn draw_detail(f: &mut Frame, app: &mut App) {
    let area = f.area();
    let Some(manga) = app.detail.clone() else {
        return;
    };

    let root = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(10), Constraint::Length(3)])
        .split(area);
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(CARD_WIDTH + 10), Constraint::Min(30)])
        .split(root[0]);

    let info = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(50), Constraint::Min(6)])
        .split(columns[0]);

    let bookmarked = app.store.is_bookmarked(&manga.id);
    let image_state = app.cover_images.get_mut(&manga.id);
    draw_manga_card(f, info[0], &manga, image_state, bookmarked, false);

    let meta = vec![
        Line::from(vec![Span::styled("Author: ", Style::default().fg(Color::Yellow)), Span::raw(manga.author.clone())]),
        Line::from(vec![Span::styled("Artist: ", Style::default().fg(Color::Yellow)), Span::raw(manga.artist.clone())]),
        Line::from(vec![Span::styled("Status: ", Style::default().fg(Color::Yellow)), Span::raw(manga.status.clone())]),
        Line::from(vec![
            Span::styled("Year: ", Style::default().fg(Color::Yellow)),
            Span::raw(manga.year.map(|y| y.to_string()).unwrap_or_else(|| "?".to_string())),
        ]),
        Line::from(vec![Span::styled("Tags: ", Style::default().fg(Color::Yellow)), Span::raw(manga.tags.join(", "))]),
        Line::from(""),
        Line::from(Span::styled(manga.description.clone(), Style::default().fg(Color::Gray))),
    ];
    f.render_widget(
        Paragraph::new(meta)
            .wrap(Wrap { trim: true })
            .block(Block::default().borders(Borders::ALL).title(format!(" {} ", manga.title))),
        info[1],
    );

    let chapter_area = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(1)])
        .split(columns[1]);

    if app.chapters_loading {
        draw_spinner(f, chapter_area[0], SpinnerSize::Large, "Loading chapters...");
    } else if app.chapters.is_empty() {
        draw_empty(f, chapter_area[0], "No chapters available in this language.");
    } else {
        let selected = app.selected_chapter().unwrap_or(0);
        let page = selected / CHAPTERS_PER_PAGE;
        let total_pages = app.chapters.len().div_ceil(CHAPTERS_PER_PAGE);
        let last_read = app.store.last_read(&manga.id).map(|e| e.chapter_id.clone());

        let items: Vec<_> = app
            .chapters
            .iter()
            .skip(page * CHAPTERS_PER_PAGE)
            .take(CHAPTERS_PER_PAGE)
            .map(|c| chapter_list_item(c, last_read.as_deref() == Some(c.id.as_str())))
            .collect();
        let mut state = ListState::default();
        state.select(Some(selected % CHAPTERS_PER_PAGE));

        let list = List::new(items)
            .block(Block::default().borders(Borders::ALL).title(format!(" Chapters ({}) ", app.chapters.len())))
            .highlight_style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))
            .highlight_symbol("› ");
        f.render_stateful_widget(list, chapter_area[0], &mut state);
        f.render_widget(
            Paragraph::new(pagination_line(page + 1, total_pages)).alignment(Alignment::Center),
            chapter_area[1],
        );
    }

    draw_footer(f, root[1], app.accent(), DETAIL_KEYS);
}

fn draw_reader(f: &mut Frame, app: &mut App) {
    app.sync_page_image();
    let area = f.area();
    let show_numbers = app.store.settings().show_page_numbers;
    let accent = app.accent();
    let Some(reader) = app.reader.as_ref() else {
        return;
    };
    if !reader.modal().visible {
        return;
    }

    let root = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(5), Constraint::Length(4)])
        .split(area);

    let mode = match reader.reader_mode() {
        ReaderMode::Vertical => "vertical",
        ReaderMode::Horizontal => "horizontal",
    };
    let manga_title = app.store.current_manga().map(|m| m.title.clone()).unwrap_or_default();
    let title = app
        .store
        .current_chapter()
        .map(|c| format!(" {} · Chapter {} · {} ", manga_title, c.chapter, mode))
        .unwrap_or_else(|| format!(" {} · {} ", manga_title, mode));

    // readerContent
    let content_block = Block::default()
        .borders(Borders::ALL)
        .title(title)
        .border_style(Style::default().fg(accent));
    let inner = content_block.inner(root[0]);
    f.render_widget(content_block, root[0]);

    let page_area = match reader.reader_mode() {
        ReaderMode::Vertical => inner,
        ReaderMode::Horizontal => {
            let cols = Layout::default()
                .direction(Direction::Horizontal)
                .constraints([Constraint::Percentage(15), Constraint::Percentage(70), Constraint::Percentage(15)])
                .split(inner);
            cols[1]
        }
    };

    let footer = reader.footer().clone();
    let page_input = reader.page_input().to_string();
    let auto_playing = reader.is_auto_playing();
    let spinner_label = match reader.state() {
        ReaderState::Loading => "Loading chapter...",
        _ => "Loading page...",
    };

    // readerContent
    match reader.content() {
        ReaderContent::Error(message) => draw_error(f, page_area, message),
        ReaderContent::Spinner => draw_spinner(f, page_area, SpinnerSize::Large, spinner_label),
        ReaderContent::Page { .. } => match app.page_state.as_mut() {
            Some(state) => {
                let image_widget = StatefulImage::new().resize(Resize::Fit(None));
                f.render_stateful_widget(image_widget, page_area, state);
            }
            None => draw_empty(f, page_area, "This terminal cannot display images."),
        },
        ReaderContent::Empty => {}
    }

    // readerFooter
    let nav = |enabled: bool| {
        if enabled {
            Style::default().fg(accent)
        } else {
            Style::default().fg(Color::DarkGray)
        }
    };
    let mut spans = vec![Span::styled("◀ prev ", nav(footer.prev_enabled))];
    if show_numbers {
        spans.push(Span::styled(
            format!(" {} ", footer.counter),
            Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
        ));
    }
    spans.push(Span::styled(" next ▶", nav(footer.next_enabled)));
    spans.push(Span::raw("   "));
    spans.push(Span::styled(
        if auto_playing { "auto ⏵" } else { "auto ⏸" },
        Style::default().fg(if auto_playing { Color::Green } else { Color::DarkGray }),
    ));

    f.render_widget(
        Paragraph::new(vec![Line::from(spans), page_select_line(&footer, &page_input)])
            .alignment(Alignment::Center)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(" ←/→ page  0-9 Enter jump  Home/End  a auto  m mode  n/p chapter  Esc close ")
                    .border_style(Style::default().fg(accent)),
            ),
        root[1],
    );
}

/// Page-select bar built from the footer's page options, plus any typed jump.
fn page_select_line(footer: &ReaderFooter, page_input: &str) -> Line<'static> {
    let current = footer
        .page_options
        .iter()
        .find(|option| option.selected)
        .map(|option| option.number)
        .unwrap_or(0);
    let mut line = pagination_line(current, footer.page_options.len());
    if !page_input.is_empty() {
        line.spans.push(Span::styled(
            format!("  go to {}▏", page_input),
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        ));
    }
    line
}

const HOME_KEYS: &[(&str, &str)] = &[
    ("Tab/↓", "focus"),
    ("←/→", "scroll"),
    ("Enter", "open"),
    ("r", "refresh"),
    ("g", "demographic"),
    ("t", "theme"),
    ("i", "quality"),
    ("q", "quit"),
];

const DETAIL_KEYS: &[(&str, &str)] = &[
    ("↑/↓", "chapter"),
    ("PgUp/PgDn", "page"),
    ("Enter", "read"),
    ("b", "bookmark"),
    ("Esc", "back"),
];

fn draw_footer(f: &mut Frame, area: Rect, accent: Color, keys: &[(&str, &str)]) {
    let mut spans = Vec::new();
    for (key, action) in keys {
        spans.push(Span::styled(*key, Style::default().fg(Color::Yellow)));
        spans.push(Span::raw(format!(": {}  ", action)));
    }

    let p = Paragraph::new(Line::from(spans))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(accent)),
        )
        .alignment(Alignment::Center);
    f.render_widget(p, area);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tabs_wrap_around() {
        assert_eq!(Tab::Home.prev(), Tab::Search);
        assert_eq!(Tab::Search.next(), Tab::Home);
        assert_eq!(Tab::Popular.next(), Tab::Bookmarks);
    }

    #[test]
    fn demographic_filter_cycles_back_to_none() {
        let mut current = None;
        let mut seen = Vec::new();
        for _ in 0..DEMOGRAPHICS.len() + 1 {
            current = next_demographic(current);
            seen.push(current);
        }
        assert_eq!(
            seen,
            vec![Some("shounen"), Some("shoujo"), Some("seinen"), Some("josei"), None]
        );
    }

    #[test]
    fn history_shows_chapter_number() {
        let mut entry = HistoryEntry {
            manga_id: "m-1".to_string(),
            chapter_id: "5f1c2e9a-0000-4000-8000-000000000000".to_string(),
            timestamp: 0,
            chapter_number: Some("42".to_string()),
        };
        assert_eq!(history_label(&entry), "Chapter 42");
        entry.chapter_number = None;
        assert!(!history_label(&entry).contains(&entry.chapter_id));
    }

    #[test]
    fn page_select_marks_current_and_typed_target() {
        let footer = ReaderFooter {
            counter: "3/8".to_string(),
            prev_enabled: true,
            next_enabled: true,
            page_options: (1..=8)
                .map(|number| crate::reader::PageOption { number, selected: number == 3 })
                .collect(),
        };
        let text = |line: Line| line.spans.iter().map(|s| s.content.to_string()).collect::<String>();

        let plain = text(page_select_line(&footer, ""));
        assert!(plain.contains(" 3 "));
        assert!(plain.contains(" 8 "));
        assert!(!plain.contains("go to"));

        assert!(text(page_select_line(&footer, "6")).ends_with("go to 6▏"));
    }
}
