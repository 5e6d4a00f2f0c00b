use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, ListItem, Paragraph, Wrap},
};
use ratatui_image::{Resize, StatefulImage, protocol::StatefulProtocol};
use std::time::{Duration, Instant};

use crate::backend::mangadex::{ChapterSummary, ComicRecord};

const SPINNER_FRAMES: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];
const MAX_VISIBLE_PAGES: usize = 5;
pub const TOAST_DURATION: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageItem {
    Page(usize),
    Ellipsis,
}

/// Page buttons for a pagination bar; long ranges are elided around the current page.
pub fn create_pagination(current: usize, total: usize) -> Vec<PageItem> {
    use PageItem::{Ellipsis, Page};

    if total <= MAX_VISIBLE_PAGES {
        return (1..=total).map(Page).collect();
    }
    if current <= 3 {
        vec![Page(1), Page(2), Page(3), Page(4), Ellipsis, Page(total)]
    } else if current + 2 >= total {
        vec![
            Page(1),
            Ellipsis,
            Page(total - 3),
            Page(total - 2),
            Page(total - 1),
            Page(total),
        ]
    } else {
        vec![
            Page(1),
            Ellipsis,
            Page(current - 1),
            Page(current),
            Page(current + 1),
            Ellipsis,
            Page(total),
        ]
    }
}

pub fn pagination_line(current: usize, total: usize) -> Line<'static> {
    let enabled = Style::default().fg(Color::Cyan);
    let disabled = Style::default().fg(Color::DarkGray);

    let mut spans = vec![Span::styled(
        " ‹ ",
        if current > 1 { enabled } else { disabled },
    )];
    for item in create_pagination(current, total) {
        match item {
            PageItem::Page(n) if n == current => spans.push(Span::styled(
                format!(" {} ", n),
                Style::default()
                    .fg(Color::Black)
                    .bg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            )),
            PageItem::Page(n) => {
                spans.push(Span::styled(format!(" {} ", n), Style::default().fg(Color::White)))
            }
            PageItem::Ellipsis => spans.push(Span::styled(" … ", disabled)),
        }
    }
    spans.push(Span::styled(
        " › ",
        if current < total { enabled } else { disabled },
    ));
    Line::from(spans)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpinnerSize {
    Small,
    Large,
}

pub fn spinner_line(size: SpinnerSize, label: &str) -> Line<'static> {
    let frame_idx = (std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default()
        / 100) as usize
        % SPINNER_FRAMES.len();

    let style = match size {
        SpinnerSize::Small => Style::default().fg(Color::Cyan),
        SpinnerSize::Large => Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
    };
    Line::from(vec![
        Span::styled(format!(" {} ", SPINNER_FRAMES[frame_idx]), style),
        Span::styled(label.to_string(), Style::default().fg(Color::White)),
    ])
}

pub fn draw_spinner(f: &mut Frame, area: Rect, size: SpinnerSize, label: &str) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage(45),
            Constraint::Length(1),
            Constraint::Percentage(45),
        ])
        .split(area);
    f.render_widget(
        Paragraph::new(spinner_line(size, label)).alignment(Alignment::Center),
        rows[1],
    );
}

pub fn draw_error(f: &mut Frame, area: Rect, message: &str) {
    let text = Line::from(vec![
        Span::styled("Error! ", Style::default().fg(Color::Red).add_modifier(Modifier::BOLD)),
        Span::styled(message.to_string(), Style::default().fg(Color::LightRed)),
    ]);
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Red));
    let height = 3.min(area.height);
    let box_area = Rect {
        y: area.y + area.height.saturating_sub(height) / 2,
        height,
        ..area
    };
    f.render_widget(
        Paragraph::new(text).block(block).alignment(Alignment::Center),
        box_area,
    );
}

pub fn draw_manga_card(
    f: &mut Frame,
    area: Rect,
    manga: &ComicRecord,
    image_state: Option<&mut StatefulProtocol>,
    bookmarked: bool,
    selected: bool,
) {
    let border_style = if selected {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default().fg(Color::DarkGray)
    };
    let block = Block::default().borders(Borders::ALL).border_style(border_style);
    let inner = block.inner(area);
    f.render_widget(block, area);

    if inner.height < 4 || inner.width < 5 {
        return;
    }

    let card_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(4),    // cover
            Constraint::Length(1), // title
            Constraint::Length(1), // tags
            Constraint::Length(1), // rating + chapter
        ])
        .split(inner);

    if let Some(state) = image_state {
        let image_widget = StatefulImage::new().resize(Resize::Scale(None));
        f.render_stateful_widget(image_widget, card_layout[0], state);
    } else {
        let placeholder = vec![
            Line::from(""),
            Line::from(Span::styled("📚", Style::default().fg(Color::Magenta))),
            Line::from(Span::styled(
                if manga.cover_url.is_some() { "Loading..." } else { "No cover" },
                Style::default().fg(Color::DarkGray),
            )),
        ];
        f.render_widget(
            Paragraph::new(placeholder).alignment(Alignment::Center),
            card_layout[0],
        );
    }

    let width = inner.width.saturating_sub(2) as usize;
    let marker = if bookmarked { "🔖 " } else { "" };
    f.render_widget(
        Paragraph::new(format!("{}{}", marker, truncate_text(&manga.title, width)))
            .style(Style::default().fg(Color::White).add_modifier(Modifier::BOLD)),
        card_layout[1],
    );

    let tags = manga.tags.iter().take(2).cloned().collect::<Vec<_>>().join(", ");
    f.render_widget(
        Paragraph::new(truncate_text(&tags, width)).style(Style::default().fg(Color::DarkGray)),
        card_layout[2],
    );

    let rating_line = Line::from(vec![
        Span::styled("★ ", Style::default().fg(Color::Yellow)),
        Span::styled(manga.rating.clone(), Style::default().fg(Color::Cyan)),
        Span::raw("  "),
        Span::styled(
            format!("Ch. {}", manga.chapter_count.as_deref().unwrap_or("N/A")),
            Style::default().fg(Color::Gray),
        ),
    ]);
    f.render_widget(Paragraph::new(rating_line), card_layout[3]);
}

pub fn chapter_list_item(chapter: &ChapterSummary, last_read: bool) -> ListItem<'static> {
    let date = chapter
        .publish_at
        .as_deref()
        .and_then(|d| d.get(..10))
        .unwrap_or("")
        .to_string();
    let marker = if last_read { "▶ " } else { "  " };
    ListItem::new(Line::from(vec![
        Span::styled(marker, Style::default().fg(Color::Green)),
        Span::styled(
            format!("Chapter {}", chapter.chapter),
            Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
        ),
        Span::raw("  "),
        Span::styled(chapter.title.clone(), Style::default().fg(Color::Gray)),
        Span::raw("  "),
        Span::styled(date, Style::default().fg(Color::DarkGray)),
        Span::raw("  "),
        Span::styled(
            format!("{} pages", chapter.pages),
            Style::default().fg(Color::DarkGray),
        ),
    ]))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastKind {
    Success,
    Error,
    Info,
}

#[derive(Debug, Clone)]
pub struct Toast {
    pub message: String,
    pub kind: ToastKind,
    pub shown_at: Instant,
}

impl Toast {
    pub fn new(message: impl Into<String>, kind: ToastKind) -> Self {
        Self {
            message: message.into(),
            kind,
            shown_at: Instant::now(),
        }
    }

    pub fn expired(&self) -> bool {
        self.shown_at.elapsed() >= TOAST_DURATION
    }
}

pub fn draw_toast(f: &mut Frame, toast: &Toast) {
    let area = f.area();
    let width = (toast.message.chars().count() as u16 + 4).min(area.width);
    let rect = Rect {
        x: area.width.saturating_sub(width + 1),
        y: area.height.saturating_sub(4),
        width,
        height: 3.min(area.height),
    };
    let color = match toast.kind {
        ToastKind::Success => Color::Green,
        ToastKind::Error => Color::Red,
        ToastKind::Info => Color::Blue,
    };
    f.render_widget(Clear, rect);
    f.render_widget(
        Paragraph::new(toast.message.clone())
            .wrap(Wrap { trim: true })
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(color)),
            ),
        rect,
    );
}

pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() <= max_len {
        text.to_string()
    } else {
        format!(
            "{}...",
            text.chars()
                .take(max_len.saturating_sub(3))
                .collect::<String>()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use PageItem::{Ellipsis, Page};

    #[test]
    fn short_ranges_show_every_page() {
        assert_eq!(create_pagination(2, 5), vec![Page(1), Page(2), Page(3), Page(4), Page(5)]);
        assert_eq!(create_pagination(1, 1), vec![Page(1)]);
        assert!(create_pagination(1, 0).is_empty());
    }

    #[test]
    fn near_start() {
        assert_eq!(
            create_pagination(1, 10),
            vec![Page(1), Page(2), Page(3), Page(4), Ellipsis, Page(10)]
        );
        assert_eq!(
            create_pagination(3, 10),
            vec![Page(1), Page(2), Page(3), Page(4), Ellipsis, Page(10)]
        );
    }

    #[test]
    fn middle() {
        assert_eq!(
            create_pagination(5, 10),
            vec![Page(1), Ellipsis, Page(4), Page(5), Page(6), Ellipsis, Page(10)]
        );
    }

    #[test]
    fn near_end() {
        assert_eq!(
            create_pagination(10, 10),
            vec![Page(1), Ellipsis, Page(7), Page(8), Page(9), Page(10)]
        );
        assert_eq!(
            create_pagination(8, 10),
            vec![Page(1), Ellipsis, Page(7), Page(8), Page(9), Page(10)]
        );
    }

    #[test]
    fn truncates_long_titles() {
        assert_eq!(truncate_text("Kaguya-sama", 20), "Kaguya-sama");
        assert_eq!(truncate_text("Kaguya-sama wa Kokurasetai", 10), "Kaguya-...");
    }
}
