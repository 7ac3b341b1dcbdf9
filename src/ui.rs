use std::io::{self, Stdout};
use std::time::{Duration, Instant};

use anyhow::Result;
use chrono::Utc;
use crossbeam_channel::Receiver;
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Alignment, Constraint, Direction as Dir, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};
use ratatui::{Frame, Terminal};
use textwrap::wrap;
use unicode_width::UnicodeWidthStr;

use crate::capture::{self, Artifact, CardSnapshot};
use crate::digest::Item;
use crate::fragment;
use crate::timefmt;
use crate::view::{self, Direction, SortKey, ViewState, SORT_KEYS};

const CARD_HEIGHT: u16 = 5;

const FILTER_OPTIONS: [(&str, Option<u32>); 3] = [
    ("Top 10", Some(10)),
    ("Top 20", Some(20)),
    ("Show all", None),
];

#[derive(Clone, Copy, PartialEq, Eq)]
enum MenuKind {
    Sort,
    Filter,
}

struct Menu {
    kind: MenuKind,
    index: usize,
}

impl Menu {
    fn len(&self) -> usize {
        match self.kind {
            MenuKind::Sort => SORT_KEYS.len(),
            MenuKind::Filter => FILTER_OPTIONS.len(),
        }
    }
}

enum Modal {
    /// Card detail, where the page used tooltips and the image modal.
    Detail { rank: u32, lines: Vec<String> },
    /// Result of a completed share capture.
    Preview { title: String, lines: Vec<String> },
}

struct PendingCapture {
    rank: u32,
    rx: Receiver<capture::ResultEntry>,
    deadline: Instant,
}

struct Theme {
    accent: Color,
    muted: Color,
}

fn theme_by_name(name: &str) -> Theme {
    match name {
        "dracula" => Theme {
            accent: Color::Magenta,
            muted: Color::DarkGray,
        },
        _ => Theme {
            accent: Color::Cyan,
            muted: Color::DarkGray,
        },
    }
}

pub struct Options {
    pub status_message: String,
    pub items: Vec<Item>,
    pub initial_fragment: String,
    pub capture: Option<capture::Handle>,
    pub theme: String,
}

pub struct Model {
    items: Vec<Item>,
    view: ViewState,
    threshold: u32,
    fragment: String,
    selected: usize,
    scroll: usize,
    menu: Option<Menu>,
    modal: Option<Modal>,
    pending: Vec<PendingCapture>,
    capture: Option<capture::Handle>,
    status_message: String,
    needs_redraw: bool,
    theme: Theme,
}

impl Model {
    pub fn new(opts: Options) -> Self {
        let mut items = opts.items;
        let restored = fragment::restore(&mut items, &opts.initial_fragment);
        let mut status_message = opts.status_message;
        for warning in &restored.warnings {
            tracing::warn!(%warning, "ignoring fragment value");
            status_message = format!("Ignored part of the view link: {warning}");
        }
        let fragment = fragment::merge(&opts.initial_fragment, &restored.state);

        Self {
            items,
            view: restored.state,
            threshold: restored.threshold,
            fragment,
            selected: 0,
            scroll: 0,
            menu: None,
            modal: None,
            pending: Vec::new(),
            capture: opts.capture,
            status_message,
            needs_redraw: true,
            theme: theme_by_name(&opts.theme),
        }
    }

    pub fn run(&mut self) -> Result<()> {
        let mut stdout = io::stdout();
        enable_raw_mode()?;
        stdout.execute(EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;
        terminal.clear()?;

        let result = self.event_loop(&mut terminal);

        disable_raw_mode()?;
        terminal.backend_mut().execute(LeaveAlternateScreen)?;
        terminal.show_cursor()?;

        result
    }

    fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
        let mut last_tick = Instant::now();
        let tick_rate = Duration::from_millis(120);

        loop {
            if self.poll_captures() {
                self.mark_dirty();
            }

            if self.needs_redraw {
                terminal.draw(|frame| self.draw(frame))?;
                self.needs_redraw = false;
            }

            let timeout = tick_rate
                .checked_sub(last_tick.elapsed())
                .unwrap_or_else(|| Duration::from_millis(16));

            if event::poll(timeout)? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press {
                        match self.handle_key(key.code) {
                            Ok(true) => break,
                            Ok(false) => {}
                            Err(err) => {
                                self.status_message = format!("Error: {}", err);
                                self.mark_dirty();
                            }
                        }
                    }
                }
            }

            if last_tick.elapsed() >= tick_rate {
                last_tick = Instant::now();
            }
        }

        Ok(())
    }

    fn mark_dirty(&mut self) {
        self.needs_redraw = true;
    }

    fn visible_indices(&self) -> Vec<usize> {
        self.items
            .iter()
            .enumerate()
            .filter(|(_, item)| view::is_visible(item, self.threshold))
            .map(|(index, _)| index)
            .collect()
    }

    fn selected_item(&self) -> Option<&Item> {
        let visible = self.visible_indices();
        visible.get(self.selected).map(|index| &self.items[*index])
    }

    // --- input ---

    fn handle_key(&mut self, code: KeyCode) -> Result<bool> {
        if self.modal.is_some() {
            match code {
                KeyCode::Esc | KeyCode::Enter | KeyCode::Char('q') | KeyCode::Char('i') => {
                    self.modal = None;
                    self.mark_dirty();
                }
                _ => {}
            }
            return Ok(false);
        }

        if self.menu.is_some() {
            return self.handle_menu_key(code);
        }

        let mut dirty = true;
        match code {
            KeyCode::Char('q') | KeyCode::Esc => return Ok(true),
            KeyCode::Char('j') | KeyCode::Down => self.move_selection(1),
            KeyCode::Char('k') | KeyCode::Up => self.move_selection(-1),
            KeyCode::Char('g') | KeyCode::Home => self.scroll_to_top(),
            KeyCode::Char('G') | KeyCode::End => {
                let count = self.visible_indices().len();
                self.selected = count.saturating_sub(1);
            }
            KeyCode::Char(ch @ '1'..='4') => {
                let key = SORT_KEYS[ch as usize - '1' as usize];
                self.activate_sort(key);
            }
            KeyCode::Char('S') => self.toggle_menu(MenuKind::Sort),
            KeyCode::Char('f') => self.toggle_menu(MenuKind::Filter),
            KeyCode::Char('y') => self.copy_view_link(),
            KeyCode::Char('o') => self.open_selected(),
            KeyCode::Char('s') => self.share_selected(),
            KeyCode::Char('i') | KeyCode::Enter => self.open_detail(),
            _ => dirty = false,
        }
        if dirty {
            self.mark_dirty();
        }
        Ok(false)
    }

    fn handle_menu_key(&mut self, code: KeyCode) -> Result<bool> {
        let Some(menu) = self.menu.as_ref() else {
            return Ok(false);
        };
        let (kind, index, len) = (menu.kind, menu.index, menu.len());
        match code {
            KeyCode::Esc | KeyCode::Char('q') => self.menu = None,
            // The key that opened the menu closes it again.
            KeyCode::Char('S') if kind == MenuKind::Sort => self.menu = None,
            KeyCode::Char('f') if kind == MenuKind::Filter => self.menu = None,
            KeyCode::Char('j') | KeyCode::Down => {
                if let Some(menu) = self.menu.as_mut() {
                    menu.index = (index + 1) % len;
                }
            }
            KeyCode::Char('k') | KeyCode::Up => {
                if let Some(menu) = self.menu.as_mut() {
                    menu.index = (index + len - 1) % len;
                }
            }
            KeyCode::Enter => {
                self.menu = None;
                match kind {
                    MenuKind::Sort => self.activate_sort(SORT_KEYS[index]),
                    MenuKind::Filter => self.activate_filter(FILTER_OPTIONS[index].1),
                }
            }
            _ => return Ok(false),
        }
        self.mark_dirty();
        Ok(false)
    }

    fn move_selection(&mut self, delta: i64) {
        let count = self.visible_indices().len();
        if count == 0 {
            return;
        }
        let current = self.selected as i64;
        self.selected = (current + delta).clamp(0, count as i64 - 1) as usize;
    }

    fn scroll_to_top(&mut self) {
        self.selected = 0;
        self.scroll = 0;
        self.status_message = "Scrolled to top".to_string();
    }

    fn toggle_menu(&mut self, kind: MenuKind) {
        match &self.menu {
            Some(menu) if menu.kind == kind => self.menu = None,
            _ => self.menu = Some(Menu { kind, index: 0 }),
        }
    }

    // --- controllers ---

    fn activate_sort(&mut self, key: SortKey) {
        match self.view.toggle_sort(key) {
            Some((key, direction)) => {
                view::apply_sort(&mut self.items, key, direction);
                let arrow = match direction {
                    Direction::Asc => "ascending",
                    Direction::Desc => "descending",
                };
                self.status_message = format!("Sorted by {} ({arrow})", key.display_name());
            }
            None => {
                view::apply_sort(&mut self.items, SortKey::Rank, Direction::Asc);
                self.status_message = "Sort cleared (rank order)".to_string();
            }
        }
        self.sync_fragment();
    }

    fn activate_filter(&mut self, top_n: Option<u32>) {
        self.view.set_filter(top_n);
        self.threshold = match self.view.filter_top {
            Some(top_n) => view::score_threshold(&self.items, top_n),
            None => 0,
        };
        let visible = self.visible_indices().len();
        self.selected = self.selected.min(visible.saturating_sub(1));
        self.status_message = match self.view.filter_top {
            Some(top_n) => format!("Showing top {top_n} ({visible} cards visible)"),
            None => format!("Filter cleared ({visible} cards visible)"),
        };
        self.sync_fragment();
    }

    fn sync_fragment(&mut self) {
        self.fragment = fragment::merge(&self.fragment, &self.view);
    }

    fn copy_view_link(&mut self) {
        let link = fragment::with_hash(&self.fragment);
        if link.is_empty() {
            self.status_message = "Default view; nothing to copy".to_string();
            return;
        }
        match arboard::Clipboard::new().and_then(|mut clipboard| clipboard.set_text(link.clone())) {
            Ok(()) => self.status_message = format!("Copied view link {link}"),
            Err(err) => {
                tracing::warn!(error = %err, "clipboard unavailable");
                self.status_message = format!("Clipboard unavailable; view link is {link}");
            }
        }
    }

    fn open_selected(&mut self) {
        let Some(item) = self.selected_item() else {
            return;
        };
        if item.url.is_empty() {
            self.status_message = "Card has no link".to_string();
            return;
        }
        let url = item.url.clone();
        match webbrowser::open(&url) {
            Ok(()) => self.status_message = format!("Opened {url}"),
            Err(err) => self.status_message = format!("Could not open browser: {err}"),
        }
    }

    fn open_detail(&mut self) {
        let Some(item) = self.selected_item() else {
            return;
        };
        let mut lines = vec![
            item.title.clone(),
            String::new(),
            format!(
                "{} points | {} comments | rank {}",
                item.score, item.comment_count, item.rank
            ),
            format!("submitted {}", timefmt::absolute(item.submitted_at)),
        ];
        if !item.author.is_empty() {
            lines.push(format!("via {}", item.author));
        }
        if !item.url.is_empty() {
            lines.push(item.url.clone());
        }
        if !item.summary.is_empty() {
            lines.push(String::new());
            lines.push(item.summary.clone());
        }
        let rank = item.rank;
        let feature_image = item.feature_image.clone();
        self.modal = Some(Modal::Detail { rank, lines });

        if let (Some(url), Some(handle)) = (feature_image, self.capture.clone()) {
            if let Some(rx) = handle.enqueue(capture::Request::FeatureImage { rank, url }) {
                self.pending.push(PendingCapture {
                    rank,
                    rx,
                    deadline: Instant::now() + handle.timeout(),
                });
            }
        }
    }

    fn share_selected(&mut self) {
        let Some(item) = self.selected_item() else {
            return;
        };
        if item.permalink.is_empty() {
            // Sponsored cards have no share affordance.
            tracing::debug!(rank = item.rank, "share skipped, no permalink");
            self.status_message = "No share link on this card".to_string();
            return;
        }
        let Some(handle) = self.capture.clone() else {
            self.status_message = "Capture service unavailable".to_string();
            return;
        };

        let snapshot = CardSnapshot {
            rank: item.rank,
            title: item.title.clone(),
            permalink: item.permalink.clone(),
            lines: card_snapshot_lines(item),
        };
        let rank = snapshot.rank;
        match handle.enqueue(capture::Request::Share(snapshot)) {
            Some(rx) => {
                self.pending.push(PendingCapture {
                    rank,
                    rx,
                    deadline: Instant::now() + handle.timeout(),
                });
                self.status_message = format!("Capturing card #{rank}…");
            }
            None => {
                self.status_message = format!("Capture already running for card #{rank}");
            }
        }
    }

    // --- async results ---

    fn poll_captures(&mut self) -> bool {
        if self.pending.is_empty() {
            return false;
        }
        let mut changed = false;
        let mut remaining = Vec::new();
        for pending in std::mem::take(&mut self.pending) {
            match pending.rx.try_recv() {
                Ok(result) => {
                    self.finish_capture(result);
                    changed = true;
                }
                Err(crossbeam_channel::TryRecvError::Empty) => {
                    if Instant::now() >= pending.deadline {
                        tracing::warn!(rank = pending.rank, "capture timed out");
                        self.status_message =
                            format!("Capture timed out for card #{}", pending.rank);
                        changed = true;
                    } else {
                        remaining.push(pending);
                    }
                }
                Err(crossbeam_channel::TryRecvError::Disconnected) => {
                    self.status_message = format!("Capture failed for card #{}", pending.rank);
                    changed = true;
                }
            }
        }
        self.pending = remaining;
        changed
    }

    fn finish_capture(&mut self, result: capture::ResultEntry) {
        let rank = result.rank;
        match (result.artifact, result.error) {
            (
                Some(Artifact::Share {
                    png_path,
                    text_path,
                    data_url,
                }),
                _,
            ) => {
                let title = format!("Share card #{rank}");
                let lines = vec![
                    format!("QR code: {}", png_path.display()),
                    format!("Snapshot: {}", text_path.display()),
                    String::new(),
                    format!("data URL ({} bytes)", data_url.len()),
                ];
                self.status_message = format!("Share card #{rank} ready");
                self.modal = Some(Modal::Preview { title, lines });
            }
            (
                Some(Artifact::FeatureImage {
                    path,
                    media_type,
                    size_bytes,
                }),
                _,
            ) => {
                // Attach to the detail modal if it is still showing this card.
                if let Some(Modal::Detail {
                    rank: shown, lines, ..
                }) = self.modal.as_mut()
                {
                    if *shown == rank {
                        lines.push(String::new());
                        lines.push(format!(
                            "feature image: {} ({media_type}, {size_bytes} bytes)",
                            path.display()
                        ));
                    }
                }
                self.status_message = format!("Feature image cached for card #{rank}");
            }
            (None, Some(err)) => {
                self.status_message = format!("Capture failed for card #{rank}: {err}");
            }
            (None, None) => {
                self.status_message = format!("Capture returned nothing for card #{rank}");
            }
        }
    }

    // --- rendering ---

    fn draw(&mut self, frame: &mut Frame<'_>) {
        let full = frame.size();
        let layout = Layout::default()
            .direction(Dir::Vertical)
            .constraints([
                Constraint::Length(1),
                Constraint::Min(0),
                Constraint::Length(1),
            ])
            .split(full);

        self.draw_header(frame, layout[0]);
        self.draw_cards(frame, layout[1]);
        self.draw_status(frame, layout[2]);

        if self.menu.is_some() {
            self.draw_menu(frame, layout[1]);
        }
        if self.modal.is_some() {
            self.draw_modal(frame, full);
        }
    }

    fn draw_header(&self, frame: &mut Frame<'_>, area: Rect) {
        let sort_label = match self.view.sort {
            Some((key, Direction::Desc)) => format!("{} ↓", key.display_name()),
            Some((key, Direction::Asc)) => format!("{} ↑", key.display_name()),
            None => "rank".to_string(),
        };
        let filter_label = match self.view.filter_top {
            Some(top_n) => format!("top {top_n}"),
            None => "all".to_string(),
        };
        let mut spans = vec![
            Span::styled(
                "Newsdeck",
                Style::default()
                    .fg(self.theme.accent)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::raw(format!("  sort: {sort_label}  filter: {filter_label}")),
        ];
        let link = fragment::with_hash(&self.fragment);
        if !link.is_empty() {
            spans.push(Span::styled(
                format!("  {link}"),
                Style::default().fg(self.theme.muted),
            ));
        }
        frame.render_widget(Paragraph::new(Line::from(spans)), area);
    }

    fn draw_cards(&mut self, frame: &mut Frame<'_>, area: Rect) {
        let visible = self.visible_indices();
        if visible.is_empty() {
            let empty = Paragraph::new("No cards to show")
                .alignment(Alignment::Center)
                .style(Style::default().fg(self.theme.muted));
            frame.render_widget(empty, area);
            return;
        }

        let per_page = (area.height / CARD_HEIGHT).max(1) as usize;
        if self.selected < self.scroll {
            self.scroll = self.selected;
        } else if self.selected >= self.scroll + per_page {
            self.scroll = self.selected + 1 - per_page;
        }
        self.scroll = self.scroll.min(visible.len().saturating_sub(1));

        let now = Utc::now();
        let mut y = area.y;
        for (row, index) in visible.iter().enumerate().skip(self.scroll) {
            if y + CARD_HEIGHT > area.y + area.height {
                break;
            }
            let card_area = Rect::new(area.x, y, area.width, CARD_HEIGHT);
            self.draw_card(frame, card_area, &self.items[*index], row == self.selected, now);
            y += CARD_HEIGHT;
        }
    }

    fn draw_card(
        &self,
        frame: &mut Frame<'_>,
        area: Rect,
        item: &Item,
        selected: bool,
        now: chrono::DateTime<Utc>,
    ) {
        let border_style = if selected {
            Style::default().fg(self.theme.accent)
        } else if item.sponsored {
            Style::default().fg(self.theme.muted)
        } else {
            Style::default()
        };
        let mut title = format!(" #{} {} ", item.rank, item.title);
        if item.sponsored {
            title.push_str("[sponsored] ");
        }
        let max_title = area.width.saturating_sub(4) as usize;
        if title.width() > max_title {
            title = truncate_to_width(&title, max_title);
        }

        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(border_style)
            .title(Span::styled(
                title,
                if selected {
                    Style::default().add_modifier(Modifier::BOLD)
                } else {
                    Style::default()
                },
            ));
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let meta = if item.sponsored {
            Line::from(Span::styled(
                "sponsored listing",
                Style::default().fg(self.theme.muted),
            ))
        } else {
            Line::from(vec![
                Span::styled(
                    format!("{} points", item.score),
                    Style::default().fg(self.theme.accent),
                ),
                Span::raw(format!(
                    " | {} comments | {}",
                    item.comment_count,
                    timefmt::time_ago(now, item.submitted_at)
                )),
            ])
        };

        let width = inner.width.max(1) as usize;
        let mut lines = vec![meta];
        for wrapped in wrap(&item.summary, width).into_iter().take(2) {
            lines.push(Line::from(wrapped.into_owned()));
        }
        frame.render_widget(Paragraph::new(lines), inner);
    }

    fn draw_status(&self, frame: &mut Frame<'_>, area: Rect) {
        let hints = "j/k move  1-4 sort  f filter  s share  y link  o open  q quit";
        let status = Paragraph::new(Line::from(vec![
            Span::styled(
                self.status_message.clone(),
                Style::default().add_modifier(Modifier::BOLD),
            ),
            Span::styled(format!("   {hints}"), Style::default().fg(self.theme.muted)),
        ]));
        frame.render_widget(status, area);
    }

    fn draw_menu(&self, frame: &mut Frame<'_>, area: Rect) {
        let Some(menu) = self.menu.as_ref() else {
            return;
        };
        let (title, labels): (&str, Vec<String>) = match menu.kind {
            MenuKind::Sort => (
                "Sort by",
                SORT_KEYS
                    .iter()
                    .map(|key| key.display_name().to_string())
                    .collect(),
            ),
            MenuKind::Filter => (
                "Filter",
                FILTER_OPTIONS
                    .iter()
                    .map(|(label, _)| label.to_string())
                    .collect(),
            ),
        };

        let height = labels.len() as u16 + 2;
        let width = 24u16;
        let popup = Rect::new(
            area.x + area.width.saturating_sub(width) / 2,
            area.y + area.height.saturating_sub(height) / 2,
            width.min(area.width),
            height.min(area.height),
        );
        frame.render_widget(Clear, popup);

        let lines: Vec<Line> = labels
            .iter()
            .enumerate()
            .map(|(index, label)| {
                if index == menu.index {
                    Line::from(Span::styled(
                        format!("> {label}"),
                        Style::default()
                            .fg(self.theme.accent)
                            .add_modifier(Modifier::BOLD),
                    ))
                } else {
                    Line::from(format!("  {label}"))
                }
            })
            .collect();
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(self.theme.accent))
            .title(title);
        frame.render_widget(Paragraph::new(lines).block(block), popup);
    }

    fn draw_modal(&self, frame: &mut Frame<'_>, area: Rect) {
        let Some(modal) = self.modal.as_ref() else {
            return;
        };
        let (title, lines) = match modal {
            Modal::Detail { lines, .. } => ("Card detail", lines),
            Modal::Preview { title, lines } => (title.as_str(), lines),
        };

        let popup = centered_rect(70, 60, area);
        frame.render_widget(Clear, popup);
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(self.theme.accent))
            .title(format!(" {title} "));
        let text: Vec<Line> = lines.iter().map(|line| Line::from(line.clone())).collect();
        frame.render_widget(
            Paragraph::new(text).block(block).wrap(Wrap { trim: false }),
            popup,
        );
    }
}

fn card_snapshot_lines(item: &Item) -> Vec<String> {
    let mut lines = vec![
        format!("#{} {}", item.rank, item.title),
        format!(
            "{} points | {} comments | {}",
            item.score,
            item.comment_count,
            timefmt::absolute(item.submitted_at)
        ),
    ];
    if !item.summary.is_empty() {
        lines.push(item.summary.clone());
    }
    lines
}

fn truncate_to_width(text: &str, max_width: usize) -> String {
    let mut out = String::new();
    let mut used = 0;
    for ch in text.chars() {
        let w = ch.to_string().width();
        if used + w + 1 > max_width {
            out.push('…');
            break;
        }
        used += w;
        out.push(ch);
    }
    out
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let percent_x = percent_x.min(100);
    let percent_y = percent_y.min(100);
    let horizontal = Layout::default()
        .direction(Dir::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage(100 - percent_x - (100 - percent_x) / 2),
        ])
        .split(area);
    let vertical = Layout::default()
        .direction(Dir::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage(100 - percent_y - (100 - percent_y) / 2),
        ])
        .split(horizontal[1]);
    vertical[1]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(rank: u32, score: u32) -> Item {
        Item {
            rank,
            score,
            comment_count: 0,
            submitted_at: None,
            sponsored: false,
            title: format!("story {rank}"),
            url: format!("https://example.com/{rank}"),
            permalink: format!("https://example.com/p/{rank}"),
            summary: "summary".into(),
            author: String::new(),
            feature_image: None,
            favicon: None,
        }
    }

    fn model(items: Vec<Item>, fragment: &str) -> Model {
        Model::new(Options {
            status_message: String::new(),
            items,
            initial_fragment: fragment.into(),
            capture: None,
            theme: "default".into(),
        })
    }

    #[test]
    fn startup_restores_filter_then_sort_from_the_fragment() {
        let items = vec![
            item(1, 10),
            item(2, 50),
            item(3, 30),
            item(4, 50),
            item(5, 20),
        ];
        let model = model(items, "#sort=score&order=desc&filter=2");
        let visible: Vec<u32> = model
            .visible_indices()
            .into_iter()
            .map(|i| model.items[i].rank)
            .collect();
        assert_eq!(visible, vec![2, 4]);
        assert_eq!(
            model.view.sort,
            Some((SortKey::Score, Direction::Desc))
        );
    }

    #[test]
    fn sort_control_cycles_through_the_state_machine() {
        let mut model = model(vec![item(1, 10), item(2, 50), item(3, 30)], "");
        model.activate_sort(SortKey::Score);
        let order: Vec<u32> = model.items.iter().map(|i| i.rank).collect();
        assert_eq!(order, vec![2, 3, 1]);
        assert_eq!(model.fragment, "sort=score&order=desc");

        model.activate_sort(SortKey::Score);
        let order: Vec<u32> = model.items.iter().map(|i| i.rank).collect();
        assert_eq!(order, vec![1, 3, 2]);
        assert_eq!(model.fragment, "sort=score&order=asc");

        // Third press clears the sort and the fragment keys with it.
        model.activate_sort(SortKey::Score);
        let order: Vec<u32> = model.items.iter().map(|i| i.rank).collect();
        assert_eq!(order, vec![1, 2, 3]);
        assert_eq!(model.fragment, "");
    }

    #[test]
    fn filter_control_updates_visibility_and_fragment() {
        let mut model = model(vec![item(1, 100), item(2, 50), item(3, 10)], "");
        model.activate_filter(Some(2));
        assert_eq!(model.visible_indices().len(), 2);
        assert_eq!(model.fragment, "filter=2");

        model.activate_filter(None);
        assert_eq!(model.visible_indices().len(), 3);
        assert_eq!(model.fragment, "");
    }

    #[test]
    fn filter_clamps_the_selection() {
        let mut model = model(vec![item(1, 100), item(2, 50), item(3, 10)], "");
        model.selected = 2;
        model.activate_filter(Some(1));
        assert!(model.selected < model.visible_indices().len());
    }

    #[test]
    fn menu_open_is_a_toggle() {
        let mut model = model(vec![item(1, 1)], "");
        model.toggle_menu(MenuKind::Filter);
        assert!(model.menu.is_some());
        model.toggle_menu(MenuKind::Filter);
        assert!(model.menu.is_none());
        model.toggle_menu(MenuKind::Filter);
        model.toggle_menu(MenuKind::Sort);
        assert!(matches!(
            model.menu,
            Some(Menu {
                kind: MenuKind::Sort,
                ..
            })
        ));
    }

    #[test]
    fn snapshot_lines_carry_the_card_meta() {
        let lines = card_snapshot_lines(&item(2, 50));
        assert!(lines[0].contains("story 2"));
        assert!(lines[1].contains("50 points"));
    }

    #[test]
    fn truncation_respects_display_width() {
        let truncated = truncate_to_width("a very long card title indeed", 10);
        assert!(truncated.width() <= 10);
        assert!(truncated.ends_with('…'));
    }
}
