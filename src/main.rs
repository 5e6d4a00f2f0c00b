mod backend;
mod config;
mod reader;
mod ui;

use backend::mangadex::{ChapterPageSet, ChapterSummary, ComicRecord, MangaDexClient, Shelves};
use backend::settings::{ImageQuality, SettingsPatch, Theme};
use backend::state::AppStore;
use backend::storage::FileStorage;
use config::Config;
use image::DynamicImage;
use reader::{ReaderCommand, ReaderSession};
use ui::components::ToastKind;
use ui::ui::{App, CHAPTERS_PER_PAGE, Focus, Shelf, Tab, View, ui};

use crossterm::{
    event::{
        DisableMouseCapture, EnableMouseCapture, Event, EventStream, KeyCode, KeyEvent,
        KeyModifiers, MouseButton, MouseEventKind,
    },
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use futures::StreamExt;
use ratatui::{Terminal, backend::CrosstermBackend};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use std::{error::Error, fs, io};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

const SHELVES_KEY: &str = "catalog:shelves";
const POPULAR_KEY: &str = "catalog:popular";
const COVER_BATCH: usize = 6;
const DEBOUNCE_MS: u128 = 300;
/// Rough width of a terminal cell, so mouse drags can be measured like swipes.
const CELL_WIDTH_PX: f32 = 8.0;

enum BackgroundTask {
    ShelvesLoaded { shelves: Shelves },
    PopularLoaded { results: Vec<ComicRecord> },
    CoverLoaded { manga_id: String, image: DynamicImage },
    DetailsLoaded { manga_id: String, record: Option<ComicRecord> },
    ChaptersLoaded { manga_id: String, chapters: Vec<ChapterSummary> },
    ChapterPagesLoaded { chapter_id: String, pages: Option<ChapterPageSet> },
    PageImageLoaded { chapter_id: String, page: usize, image: DynamicImage },
    PageImageFailed { chapter_id: String, page: usize },
    AutoPlayTick { chapter_id: String },
    SearchResults { query: String, results: Option<Vec<ComicRecord>> },
    DemographicLoaded { demographic: &'static str, results: Option<Vec<ComicRecord>> },
}

type TaskSender = mpsc::UnboundedSender<BackgroundTask>;

/// Background state owned by the event loop.
struct Runtime {
    client: Arc<MangaDexClient>,
    tx: TaskSender,
    pending_covers: HashSet<String>,
    pending_details: HashSet<String>,
    drag_start: Option<u16>,
}

fn init_logging() {
    let path = config::log_path();
    if let Some(dir) = path.parent() {
        let _ = fs::create_dir_all(dir);
    }

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    match fs::OpenOptions::new().create(true).append(true).open(&path) {
        Ok(file) => {
            builder.target(env_logger::Target::Pipe(Box::new(file)));
        }
        // stderr would draw over the terminal UI
        Err(_) => {
            builder.filter_level(log::LevelFilter::Off);
        }
    }
    let _ = builder.try_init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    init_logging();
    let config = Config::load();
    let store = AppStore::new(Box::new(FileStorage::new(config::data_dir())));
    let client = Arc::new(MangaDexClient::new(config.api.clone())?);
    log::info!("Starting Mangashelf against {}", config.api.base_url);

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(config, store);

    let (task_tx, mut task_rx) = mpsc::unbounded_channel::<BackgroundTask>();
    let mut rt = Runtime {
        client,
        tx: task_tx,
        pending_covers: HashSet::new(),
        pending_details: HashSet::new(),
        drag_start: None,
    };

    app.set_loading("Connecting to MangaDex...");
    terminal.draw(|f| ui(f, &mut app))?;

    app.set_loading("Fetching manga, manhwa and manhua...");
    terminal.draw(|f| ui(f, &mut app))?;
    load_shelves(&mut app, &rt).await;

    app.set_loading("Fetching popular titles...");
    terminal.draw(|f| ui(f, &mut app))?;
    load_popular(&mut app, &rt).await;

    for shelf in Shelf::ALL {
        let records = app.shelf(shelf).to_vec();
        preload_covers(&app, &mut rt, &records, 0);
    }
    rebuild_bookmarks(&mut app, &mut rt);
    rebuild_history(&mut app, &mut rt);

    app.set_ready();

    let res = run_app(&mut terminal, &mut app, &mut task_rx, &mut rt).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        log::error!("Event loop failed: {}", err);
        eprintln!("{err}");
    }
    Ok(())
}

fn remember_records(app: &mut App, records: &[ComicRecord]) {
    let ttl = app.config.catalog.cache_ttl();
    for record in records {
        app.store
            .set_cache_with_ttl(&details_key(&record.id), record, ttl);
    }
}

fn details_key(manga_id: &str) -> String {
    format!("details:{}", manga_id)
}

async fn load_shelves(app: &mut App, rt: &Runtime) {
    if let Some(shelves) = app.store.get_cache::<Shelves>(SHELVES_KEY) {
        app.shelves = shelves;
        return;
    }
    let shelves = rt.client.fetch_all_comics(app.config.catalog.shelf_limit).await;
    apply_shelves(app, shelves);
}

fn apply_shelves(app: &mut App, shelves: Shelves) {
    let empty = shelves.manga.is_empty() && shelves.manhwa.is_empty() && shelves.manhua.is_empty();
    if empty {
        app.show_toast("Could not reach MangaDex", ToastKind::Error);
    } else {
        let ttl = app.config.catalog.cache_ttl();
        app.store.set_cache_with_ttl(SHELVES_KEY, &shelves, ttl);
        for records in [&shelves.manga, &shelves.manhwa, &shelves.manhua] {
            remember_records(app, records);
        }
    }
    app.shelves = shelves;
    app.shelf_offsets = [0; 3];
}

async fn load_popular(app: &mut App, rt: &Runtime) {
    if let Some(popular) = app.store.get_cache::<Vec<ComicRecord>>(POPULAR_KEY) {
        app.popular = popular;
        return;
    }
    let popular = rt.client.fetch_popular(app.config.catalog.popular_limit).await;
    apply_popular(app, popular);
}

fn apply_popular(app: &mut App, popular: Vec<ComicRecord>) {
    if !popular.is_empty() {
        let ttl = app.config.catalog.cache_ttl();
        app.store.set_cache_with_ttl(POPULAR_KEY, &popular, ttl);
        remember_records(app, &popular);
    }
    app.popular = popular;
}

fn spawn_refresh(app: &App, rt: &Runtime) {
    let client = rt.client.clone();
    let tx = rt.tx.clone();
    let shelf_limit = app.config.catalog.shelf_limit;
    let popular_limit = app.config.catalog.popular_limit;

    tokio::spawn(async move {
        let shelves = client.fetch_all_comics(shelf_limit).await;
        let _ = tx.send(BackgroundTask::ShelvesLoaded { shelves });
        let results = client.fetch_popular(popular_limit).await;
        let _ = tx.send(BackgroundTask::PopularLoaded { results });
    });
}

fn preload_covers(app: &App, rt: &mut Runtime, records: &[ComicRecord], offset: usize) {
    for manga in records.iter().skip(offset).take(COVER_BATCH + 2) {
        let Some(cover_url) = manga.cover_url.clone() else {
            continue;
        };
        if app.cover_images.contains_key(&manga.id) || rt.pending_covers.contains(&manga.id) {
            continue;
        }
        rt.pending_covers.insert(manga.id.clone());

        let manga_id = manga.id.clone();
        let client = rt.client.clone();
        let tx = rt.tx.clone();
        tokio::spawn(async move {
            if let Some(image) = client.fetch_cover(&cover_url).await {
                let _ = tx.send(BackgroundTask::CoverLoaded { manga_id, image });
            }
        });
    }
}

/// Returns the cached record or starts fetching it.
fn lookup_details(app: &mut App, rt: &mut Runtime, manga_id: &str) -> Option<ComicRecord> {
    if let Some(record) = app.store.get_cache::<ComicRecord>(&details_key(manga_id)) {
        return Some(record);
    }
    if rt.pending_details.insert(manga_id.to_string()) {
        let client = rt.client.clone();
        let tx = rt.tx.clone();
        let manga_id = manga_id.to_string();
        tokio::spawn(async move {
            let record = client.fetch_details(&manga_id).await;
            let _ = tx.send(BackgroundTask::DetailsLoaded { manga_id, record });
        });
    }
    None
}

fn rebuild_bookmarks(app: &mut App, rt: &mut Runtime) {
    let ids = app.store.bookmarks().to_vec();
    let records: Vec<ComicRecord> = ids
        .iter()
        .filter_map(|id| lookup_details(app, rt, id))
        .collect();
    preload_covers(app, rt, &records, 0);
    app.bookmarked = records;
}

fn rebuild_history(app: &mut App, rt: &mut Runtime) {
    let entries = app.store.history().to_vec();
    let mut items = Vec::new();
    for entry in entries {
        if let Some(record) = lookup_details(app, rt, &entry.manga_id) {
            items.push((record, entry));
        }
    }
    app.history_items = items;
    app.list_offset = app.list_offset.min(app.history_items.len().saturating_sub(1));
}

fn spawn_chapters_loader(app: &App, rt: &Runtime, manga_id: String) {
    let client = rt.client.clone();
    let tx = rt.tx.clone();
    let limit = app.config.catalog.chapter_limit;
    tokio::spawn(async move {
        let chapters = client.fetch_chapters(&manga_id, limit).await;
        let _ = tx.send(BackgroundTask::ChaptersLoaded { manga_id, chapters });
    });
}

fn spawn_search(app: &mut App, rt: &Runtime) {
    let query = app.search_query.trim().to_string();
    if query.is_empty() || app.searching {
        return;
    }
    app.last_search_query = app.search_query.clone();
    app.search_debounce = None;

    if let Some(results) = app.store.get_cache::<Vec<ComicRecord>>(&format!("search:{}", query)) {
        app.search_results = results;
        app.list_offset = 0;
        return;
    }

    app.searching = true;
    let client = rt.client.clone();
    let tx = rt.tx.clone();
    let limit = app.config.catalog.search_limit;
    tokio::spawn(async move {
        let results = client.search(&query, limit).await;
        let _ = tx.send(BackgroundTask::SearchResults { query, results });
    });
}

fn load_demographic(app: &mut App, rt: &mut Runtime, demographic: &'static str) {
    if let Some(results) = app
        .store
        .get_cache::<Vec<ComicRecord>>(&format!("demographic:{}", demographic))
    {
        preload_covers(app, rt, &results, 0);
        app.demographic_results = results;
        return;
    }

    app.demographic_loading = true;
    let client = rt.client.clone();
    let tx = rt.tx.clone();
    let limit = app.config.catalog.popular_limit;
    tokio::spawn(async move {
        let results = client.fetch_by_demographic(demographic, limit).await;
        let _ = tx.send(BackgroundTask::DemographicLoaded { demographic, results });
    });
}

fn auto_play_ticker(interval: Duration) -> tokio::time::Interval {
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
    // a stalled event loop must not flip several pages at once
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

/// Sends an `AutoPlayTick` every `interval` until `token` is cancelled.
fn spawn_auto_play(
    chapter_id: String,
    interval: Duration,
    token: CancellationToken,
    tx: TaskSender,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = auto_play_ticker(interval);
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = ticker.tick() => {
                    let tick = BackgroundTask::AutoPlayTick { chapter_id: chapter_id.clone() };
                    if tx.send(tick).is_err() {
                        break;
                    }
                }
            }
        }
        log::debug!("Auto-play stopped for chapter {}", chapter_id);
    })
}

/// Runs the session's requested work on background tasks.
fn run_reader_commands(commands: Vec<ReaderCommand>, rt: &Runtime) {
    for command in commands {
        let client = rt.client.clone();
        let tx = rt.tx.clone();
        match command {
            ReaderCommand::FetchChapterPages { chapter_id } => {
                tokio::spawn(async move {
                    let pages = client.fetch_chapter_pages(&chapter_id).await;
                    let _ = tx.send(BackgroundTask::ChapterPagesLoaded { chapter_id, pages });
                });
            }
            ReaderCommand::FetchPage { chapter_id, page, url } => {
                tokio::spawn(async move {
                    let task = match client.fetch_image(&url).await {
                        Some(image) => BackgroundTask::PageImageLoaded { chapter_id, page, image },
                        None => BackgroundTask::PageImageFailed { chapter_id, page },
                    };
                    let _ = tx.send(task);
                });
            }
            ReaderCommand::StartAutoPlay { chapter_id, interval, token } => {
                spawn_auto_play(chapter_id, interval, token, tx);
            }
        }
    }
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    task_rx: &mut mpsc::UnboundedReceiver<BackgroundTask>,
    rt: &mut Runtime,
) -> io::Result<()> {
    let mut event_stream = EventStream::new();

    loop {
        if app.toast.as_ref().is_some_and(|t| t.expired()) {
            app.toast = None;
        }
        terminal.draw(|f| ui(f, app))?;

        if let Some(debounce_time) = app.search_debounce {
            if debounce_time.elapsed().as_millis() >= DEBOUNCE_MS
                && app.search_query != app.last_search_query
            {
                spawn_search(app, rt);
            }
        }

        tokio::select! {
            _ = tokio::time::sleep(tokio::time::Duration::from_millis(50)) => {}

            Some(Ok(event)) = event_stream.next() => {
                match event {
                    Event::Key(key) => {
                        if should_quit(app, &key) {
                            return Ok(());
                        }
                        match app.view {
                            View::Home => handle_home_input(app, key.code, rt),
                            View::MangaDetail => handle_detail_input(app, key.code, rt),
                            View::Reader => handle_reader_input(app, key.code, rt),
                        }
                    }
                    Event::Mouse(mouse) if app.view == View::Reader => {
                        handle_reader_mouse(app, mouse.kind, mouse.column, rt);
                    }
                    _ => {}
                }
            }

            Some(task) = task_rx.recv() => handle_task(app, task, rt),
        }
    }
}

fn should_quit(app: &App, key: &KeyEvent) -> bool {
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return true;
    }
    let typing = app.view == View::Home && app.tab == Tab::Search && app.focus == Focus::Header;
    key.code == KeyCode::Char('q') && !typing
}

fn handle_task(app: &mut App, task: BackgroundTask, rt: &mut Runtime) {
    match task {
        BackgroundTask::ShelvesLoaded { shelves } => {
            apply_shelves(app, shelves);
            for shelf in Shelf::ALL {
                let records = app.shelf(shelf).to_vec();
                preload_covers(app, rt, &records, 0);
            }
        }
        BackgroundTask::PopularLoaded { results } => {
            apply_popular(app, results);
            if app.tab == Tab::Popular {
                let records = app.popular.clone();
                preload_covers(app, rt, &records, app.list_offset);
            }
        }
        BackgroundTask::CoverLoaded { manga_id, image } => {
            app.add_cover_image(&manga_id, image);
            rt.pending_covers.remove(&manga_id);
        }
        BackgroundTask::DetailsLoaded { manga_id, record } => {
            rt.pending_details.remove(&manga_id);
            match record {
                Some(record) => {
                    remember_records(app, std::slice::from_ref(&record));
                    rebuild_bookmarks(app, rt);
                    rebuild_history(app, rt);
                }
                None => log::warn!("Details for {} unavailable", manga_id),
            }
        }
        BackgroundTask::ChaptersLoaded { manga_id, chapters } => {
            if app.detail.as_ref().is_some_and(|m| m.id == manga_id) {
                app.set_chapters(chapters);
            }
        }
        BackgroundTask::ChapterPagesLoaded { chapter_id, pages } => {
            if let Some(reader) = app.reader.as_mut() {
                let commands = reader.on_chapter_pages(&mut app.store, &chapter_id, pages);
                run_reader_commands(commands, rt);
            }
        }
        BackgroundTask::PageImageLoaded { chapter_id, page, image } => {
            if let Some(reader) = app.reader.as_mut() {
                let commands = reader.on_page_loaded(&chapter_id, page, image);
                run_reader_commands(commands, rt);
            }
        }
        BackgroundTask::PageImageFailed { chapter_id, page } => {
            if let Some(reader) = app.reader.as_mut() {
                reader.on_page_failed(&chapter_id, page);
            }
        }
        BackgroundTask::AutoPlayTick { chapter_id } => {
            if let Some(reader) = app.reader.as_mut() {
                let commands = reader.on_auto_play_tick(&chapter_id);
                run_reader_commands(commands, rt);
            }
        }
        BackgroundTask::DemographicLoaded { demographic, results } => {
            if app.demographic != Some(demographic) {
                return;
            }
            app.demographic_loading = false;
            match results {
                Some(results) => {
                    let ttl = app.config.catalog.cache_ttl();
                    app.store.set_cache_with_ttl(
                        &format!("demographic:{}", demographic),
                        &results,
                        ttl,
                    );
                    remember_records(app, &results);
                    preload_covers(app, rt, &results, 0);
                    app.demographic_results = results;
                }
                None => app.show_toast(format!("Could not load {} titles", demographic), ToastKind::Error),
            }
        }
        BackgroundTask::SearchResults { query, results } => {
            app.searching = false;
            app.list_offset = 0;
            match results {
                Some(results) => {
                    let ttl = app.config.catalog.cache_ttl();
                    app.store
                        .set_cache_with_ttl(&format!("search:{}", query), &results, ttl);
                    remember_records(app, &results);
                    preload_covers(app, rt, &results, 0);
                    app.search_results = results;
                }
                None => {
                    app.search_results.clear();
                    app.show_toast("Search failed", ToastKind::Error);
                }
            }
        }
    }
}

fn switch_tab(app: &mut App, tab: Tab, rt: &mut Runtime) {
    app.tab = tab;
    app.list_offset = 0;
    match tab {
        Tab::Bookmarks => rebuild_bookmarks(app, rt),
        Tab::History => rebuild_history(app, rt),
        Tab::Popular => {
            let records = app.tab_list().to_vec();
            preload_covers(app, rt, &records, 0);
        }
        Tab::Home | Tab::Search => {}
    }
}

fn handle_settings_key(app: &mut App, key: KeyCode, rt: &mut Runtime) -> bool {
    match key {
        KeyCode::Char('r') => {
            app.show_toast("Refreshing catalog...", ToastKind::Info);
            spawn_refresh(app, rt);
        }
        KeyCode::Char('t') => {
            let theme = match app.store.settings().theme {
                Theme::Light => Theme::Dark,
                Theme::Dark => Theme::Light,
            };
            app.store.update_settings(SettingsPatch { theme: Some(theme), ..SettingsPatch::default() });
        }
        KeyCode::Char('i') => {
            let quality = match app.store.settings().image_quality {
                ImageQuality::High => ImageQuality::DataSaver,
                ImageQuality::DataSaver => ImageQuality::High,
            };
            app.store.update_settings(SettingsPatch {
                image_quality: Some(quality),
                ..SettingsPatch::default()
            });
            app.show_toast(format!("Image quality: {:?}", quality), ToastKind::Info);
        }
        KeyCode::Char('#') => {
            let show = !app.store.settings().show_page_numbers;
            app.store.update_settings(SettingsPatch {
                show_page_numbers: Some(show),
                ..SettingsPatch::default()
            });
        }
        _ => return false,
    }
    true
}

fn handle_home_input(app: &mut App, key: KeyCode, rt: &mut Runtime) {
    if app.tab == Tab::Search && app.focus == Focus::Header {
        if handle_search_input(app, key, rt) {
            return;
        }
    } else if handle_settings_key(app, key, rt) {
        return;
    }

    if app.tab == Tab::Popular && key == KeyCode::Char('g') {
        if let Some(demographic) = app.cycle_demographic() {
            load_demographic(app, rt, demographic);
        }
        return;
    }

    match app.focus {
        Focus::Header => match key {
            KeyCode::Left => switch_tab(app, app.tab.prev(), rt),
            KeyCode::Right => switch_tab(app, app.tab.next(), rt),
            KeyCode::Down | KeyCode::Tab => {
                app.focus = if app.tab == Tab::Home { Focus::Shelf(Shelf::Manga) } else { Focus::List };
            }
            _ => {}
        },
        Focus::Shelf(shelf) => match key {
            KeyCode::Down | KeyCode::Tab => {
                app.focus = match shelf {
                    Shelf::Manga => Focus::Shelf(Shelf::Manhwa),
                    Shelf::Manhwa => Focus::Shelf(Shelf::Manhua),
                    Shelf::Manhua => Focus::Header,
                }
            }
            KeyCode::Up => {
                app.focus = match shelf {
                    Shelf::Manga => Focus::Header,
                    Shelf::Manhwa => Focus::Shelf(Shelf::Manga),
                    Shelf::Manhua => Focus::Shelf(Shelf::Manhwa),
                }
            }
            KeyCode::Left => {
                let offset = &mut app.shelf_offsets[shelf as usize];
                *offset = offset.saturating_sub(1);
            }
            KeyCode::Right => {
                let len = app.shelf(shelf).len();
                let index = shelf as usize;
                if app.shelf_offsets[index] + 1 < len {
                    app.shelf_offsets[index] += 1;
                    let records = app.shelf(shelf).to_vec();
                    preload_covers(app, rt, &records, app.shelf_offsets[index]);
                }
            }
            KeyCode::Enter => open_focused(app, rt),
            _ => {}
        },
        Focus::List => match key {
            KeyCode::Up | KeyCode::Esc => app.focus = Focus::Header,
            KeyCode::Left => app.list_offset = app.list_offset.saturating_sub(1),
            KeyCode::Down if app.tab == Tab::History => {
                if app.list_offset + 1 < app.list_len() {
                    app.list_offset += 1;
                }
            }
            KeyCode::Right => {
                if app.list_offset + 1 < app.list_len() {
                    app.list_offset += 1;
                    let records = app.tab_list().to_vec();
                    preload_covers(app, rt, &records, app.list_offset);
                }
            }
            KeyCode::Enter => open_focused(app, rt),
            _ => {}
        },
    }
}

/// Text entry on the search tab. Returns `true` when the key was consumed.
fn handle_search_input(app: &mut App, key: KeyCode, rt: &mut Runtime) -> bool {
    match key {
        KeyCode::Char(c) => {
            app.search_query.push(c);
            app.search_debounce = Some(std::time::Instant::now());
        }
        KeyCode::Backspace => {
            app.search_query.pop();
            if app.search_query.is_empty() {
                app.search_results.clear();
                app.last_search_query.clear();
                app.search_debounce = None;
            } else {
                app.search_debounce = Some(std::time::Instant::now());
            }
        }
        KeyCode::Enter => spawn_search(app, rt),
        KeyCode::Esc => {
            app.search_query.clear();
            app.search_results.clear();
            app.last_search_query.clear();
        }
        _ => return false,
    }
    true
}

fn open_focused(app: &mut App, rt: &mut Runtime) {
    let Some(manga) = app.focused_manga() else {
        return;
    };
    let manga_id = manga.id.clone();
    preload_covers(app, rt, std::slice::from_ref(&manga), 0);
    app.open_manga(manga);
    spawn_chapters_loader(app, rt, manga_id);
}

fn handle_detail_input(app: &mut App, key: KeyCode, rt: &mut Runtime) {
    let len = app.chapters.len();
    let selected = app.selected_chapter().unwrap_or(0);
    match key {
        KeyCode::Esc => app.go_back(),
        KeyCode::Up if selected > 0 => app.chapter_list_state.select(Some(selected - 1)),
        KeyCode::Down if selected + 1 < len => app.chapter_list_state.select(Some(selected + 1)),
        KeyCode::PageUp => {
            app.chapter_list_state
                .select(Some(selected.saturating_sub(CHAPTERS_PER_PAGE)));
        }
        KeyCode::PageDown if len > 0 => {
            app.chapter_list_state
                .select(Some((selected + CHAPTERS_PER_PAGE).min(len - 1)));
        }
        KeyCode::Enter if len > 0 => open_chapter(app, selected, rt),
        KeyCode::Char('b') => app.toggle_bookmark(),
        _ => {}
    }
}

fn open_chapter(app: &mut App, index: usize, rt: &mut Runtime) {
    let Some(manga) = app.detail.clone() else {
        return;
    };
    let Some(chapter) = app.chapters.get(index).cloned() else {
        return;
    };
    app.chapter_list_state.select(Some(index));

    let mut session = ReaderSession::new(app.store.settings(), &app.config.reader);
    let commands = session.init(&manga.id, &chapter.id);
    app.store.set_current_chapter(Some(chapter));
    app.reader = Some(session);
    app.page_state = None;
    app.page_shown = None;
    app.view = View::Reader;
    run_reader_commands(commands, rt);
}

fn handle_reader_input(app: &mut App, key: KeyCode, rt: &mut Runtime) {
    // Chapters are listed newest first.
    match key {
        KeyCode::Char('n') => {
            if let Some(index) = app.selected_chapter().and_then(|i| i.checked_sub(1)) {
                open_chapter(app, index, rt);
            }
            return;
        }
        KeyCode::Char('p') => {
            if let Some(index) = app.selected_chapter().map(|i| i + 1) {
                if index < app.chapters.len() {
                    open_chapter(app, index, rt);
                }
            }
            return;
        }
        KeyCode::Char('i') => {
            handle_settings_key(app, key, rt);
            let quality = app.store.settings().image_quality;
            if let Some(reader) = app.reader.as_mut() {
                reader.set_image_quality(quality);
            }
            return;
        }
        KeyCode::Char('#') => {
            handle_settings_key(app, key, rt);
            return;
        }
        _ => {}
    }

    let Some(reader) = app.reader.as_mut() else {
        return;
    };
    let commands = match key {
        KeyCode::Char('a') => reader.toggle_auto_play(&mut app.store),
        KeyCode::Char('m') => reader.toggle_reader_mode(&mut app.store),
        KeyCode::Home => reader.go_to_page(1),
        KeyCode::End => {
            let last = reader.total_pages();
            reader.go_to_page(last)
        }
        KeyCode::Char('r') => reader.load_current_page(),
        other => reader.handle_key(other),
    };
    let closed = !reader.modal().visible;
    run_reader_commands(commands, rt);
    if closed {
        app.close_reader();
    }
}

fn handle_reader_mouse(app: &mut App, kind: MouseEventKind, column: u16, rt: &mut Runtime) {
    let Some(reader) = app.reader.as_mut() else {
        return;
    };
    match kind {
        MouseEventKind::Down(MouseButton::Left) => {
            rt.drag_start = Some(column);
            reader.handle_touch_start(column as f32 * CELL_WIDTH_PX);
        }
        MouseEventKind::Up(MouseButton::Left) if rt.drag_start.take().is_some() => {
            let commands = reader.handle_touch_end(column as f32 * CELL_WIDTH_PX);
            run_reader_commands(commands, rt);
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{Instant, timeout};

    #[tokio::test]
    async fn auto_play_waits_a_full_interval_before_the_first_tick() {
        let mut ticker = auto_play_ticker(Duration::from_secs(10));
        assert_eq!(ticker.missed_tick_behavior(), MissedTickBehavior::Delay);
        assert!(timeout(Duration::from_millis(20), ticker.tick()).await.is_err());
    }

    #[tokio::test]
    async fn stalled_auto_play_does_not_burst() {
        let period = Duration::from_millis(50);
        let mut ticker = auto_play_ticker(period);
        tokio::time::sleep(period * 4).await;

        // one overdue tick fires at once, the next waits a full period again
        let start = Instant::now();
        ticker.tick().await;
        assert!(start.elapsed() < period);
        assert!(timeout(Duration::from_millis(10), ticker.tick()).await.is_err());
    }

    #[tokio::test]
    async fn auto_play_task_ticks_until_cancelled() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let token = CancellationToken::new();
        let handle = spawn_auto_play("c-1".into(), Duration::from_millis(5), token.clone(), tx);

        let tick = timeout(Duration::from_secs(1), rx.recv()).await.unwrap();
        let Some(BackgroundTask::AutoPlayTick { chapter_id }) = tick else {
            panic!("expected an auto-play tick");
        };
        assert_eq!(chapter_id, "c-1");

        token.cancel();
        timeout(Duration::from_secs(1), handle).await.unwrap().unwrap();
    }
}
