//! ratatui-based UI.

use std::io::{self, Stdout};
use std::time::Duration;

use anyhow::Context as _;
use bookshelf_application::{AddOutcome, Shelf};
use bookshelf_catalog::{Catalog, ThumbnailSource};
use bookshelf_core::{Settings, SortKey, Theme};
use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::{event, terminal};
use log::{error, info};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};
use ratatui_image::picker::Picker;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

mod cover_picker;
mod grid;
mod image_protocol;

use cover_picker::TerminalCoverPicker;
use grid::ShelfGrid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Focus {
    Search,
    Shelf,
}

/// Work that blocks the thread; queued by a key press and run after the next
/// frame so the screen shows what is happening first.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Pending {
    Add(String),
    Render,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NoticeKind {
    Info,
    Error,
}

#[derive(Debug, Clone)]
struct Notice {
    kind: NoticeKind,
    text: String,
}

pub struct Ui {
    settings: Settings,
    shelf: Shelf,
    catalog: Box<dyn Catalog>,
    thumbnails: Box<dyn ThumbnailSource>,
    image_picker: Picker,
    grid: ShelfGrid,
    focus: Focus,
    query: String,
    pending: Option<Pending>,
    notice: Option<Notice>,
}

impl Ui {
    pub fn new(
        mut settings: Settings,
        shelf: Shelf,
        catalog: Box<dyn Catalog>,
        thumbnails: Box<dyn ThumbnailSource>,
    ) -> Self {
        settings.normalize();
        let image_picker = Picker::halfblocks();
        let grid = ShelfGrid::new(&image_picker);
        Self {
            settings,
            shelf,
            catalog,
            thumbnails,
            image_picker,
            grid,
            focus: Focus::Search,
            query: String::new(),
            pending: Some(Pending::Render),
            notice: None,
        }
    }

    pub fn shelf(&self) -> &Shelf {
        &self.shelf
    }

    pub fn run(&mut self) -> anyhow::Result<()> {
        let mut terminal = setup_terminal()?;
        self.image_picker = image_protocol::detect_picker();
        info!(
            "image protocol: {}",
            image_protocol::protocol_label(&self.image_picker)
        );
        terminal.clear().ok();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            self.event_loop(&mut terminal)
        }));
        let restore_result = restore_terminal(&mut terminal);

        match (result, restore_result) {
            (Ok(Ok(())), Ok(())) => Ok(()),
            (Ok(Ok(())), Err(err)) => Err(err),
            (Ok(Err(err)), _) => Err(err),
            (Err(panic), Ok(())) => Err(anyhow::anyhow!(panic_to_string(panic))),
            (Err(panic), Err(err)) => Err(anyhow::anyhow!(
                "{}\n(additionally failed to restore terminal: {err})",
                panic_to_string(panic)
            )),
        }
    }

    fn accent_color(&self) -> Color {
        match self.settings.theme {
            Theme::Light => Color::Blue,
            Theme::Dark => Color::Yellow,
        }
    }

    fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> anyhow::Result<()> {
        let tick_rate = Duration::from_millis(250);
        let mut needs_redraw = true;

        loop {
            if needs_redraw {
                terminal.draw(|frame| {
                    let area = frame.area();
                    self.draw(area, frame);
                })?;
                needs_redraw = false;
            }

            if let Some(pending) = self.pending.take() {
                self.run_pending(terminal, pending)?;
                needs_redraw = true;
                continue;
            }

            if !event::poll(tick_rate)? {
                continue;
            }

            match event::read()? {
                Event::Resize(_, _) => {
                    needs_redraw = true;
                }
                Event::Key(key) => {
                    if key.kind == KeyEventKind::Release {
                        continue;
                    }

                    needs_redraw = true;

                    let quit = match self.focus {
                        Focus::Search => self.handle_search_key(key),
                        Focus::Shelf => self.handle_shelf_key(key),
                    };
                    if quit {
                        return Ok(());
                    }
                }
                _ => {}
            }
        }
    }

    fn run_pending(
        &mut self,
        terminal: &mut Terminal<CrosstermBackend<Stdout>>,
        pending: Pending,
    ) -> anyhow::Result<()> {
        match pending {
            Pending::Render => {
                self.grid
                    .rebuild(self.shelf.books(), self.thumbnails.as_ref(), &self.image_picker);
                terminal.clear()?;
            }
            Pending::Add(query) => {
                let mut chooser = TerminalCoverPicker {
                    terminal: &mut *terminal,
                    image_picker: &self.image_picker,
                    thumbnails: self.thumbnails.as_ref(),
                    accent: self.accent_color(),
                };
                let result = self
                    .shelf
                    .add_book(&query, self.catalog.as_ref(), &mut chooser);
                terminal.clear()?;
                self.finish_add(&query, result);
            }
        }
        Ok(())
    }

    fn finish_add(&mut self, query: &str, result: anyhow::Result<AddOutcome>) {
        match result {
            Ok(AddOutcome::EmptyQuery) => {
                self.notice = None;
            }
            Ok(AddOutcome::NoResults) => {
                self.set_info(format!("No books found for \"{query}\"."));
            }
            Ok(AddOutcome::NoSelection) => {
                self.set_info("No cover selected.".to_string());
            }
            Ok(AddOutcome::Added(book)) => {
                self.set_info(format!("Added \"{}\" by {}.", book.title, book.authors));
                self.pending = Some(Pending::Render);
            }
            Err(err) => {
                self.set_error(format!("Add failed: {err:#}"));
                // A failed save happens after the book was appended.
                if self.grid.cards.len() != self.shelf.books().len() {
                    self.pending = Some(Pending::Render);
                }
            }
        }
    }

    fn set_info(&mut self, text: String) {
        info!("{text}");
        self.notice = Some(Notice {
            kind: NoticeKind::Info,
            text,
        });
    }

    fn set_error(&mut self, text: String) {
        error!("{text}");
        self.notice = Some(Notice {
            kind: NoticeKind::Error,
            text,
        });
    }

    fn handle_search_key(&mut self, key: KeyEvent) -> bool {
        if key.modifiers.contains(KeyModifiers::CONTROL) {
            match key.code {
                KeyCode::Char('c') => return true,
                KeyCode::Char('u') => {
                    self.query.clear();
                    return false;
                }
                _ => {}
            }
        }

        match key.code {
            KeyCode::Esc => return true,
            KeyCode::Tab | KeyCode::BackTab => self.focus = Focus::Shelf,
            KeyCode::Enter => {
                if !self.query.is_empty() {
                    self.set_info(format!("Searching for \"{}\"…", self.query));
                    self.pending = Some(Pending::Add(self.query.clone()));
                }
            }
            KeyCode::Backspace => {
                self.query.pop();
            }
            KeyCode::Char(ch) => {
                if !ch.is_control() {
                    self.query.push(ch);
                }
            }
            _ => {}
        }
        false
    }

    fn handle_shelf_key(&mut self, key: KeyEvent) -> bool {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return true;
        }

        let columns = self.grid.columns(self.settings.grid_columns);
        match key.code {
            KeyCode::Esc | KeyCode::Char('q') => return true,
            KeyCode::Tab | KeyCode::BackTab | KeyCode::Char('/') => self.focus = Focus::Search,
            KeyCode::Left => self.shelf.select_prev(),
            KeyCode::Right => self.shelf.select_next(),
            KeyCode::Up => self.shelf.select_up(columns),
            KeyCode::Down => self.shelf.select_down(columns),
            KeyCode::Char('t') => self.sort(SortKey::Title),
            KeyCode::Char('a') => self.sort(SortKey::Author),
            KeyCode::Char('d') | KeyCode::Delete => self.delete_selected(),
            _ => {}
        }
        false
    }

    fn sort(&mut self, key: SortKey) {
        self.shelf.sort_by(key);
        self.set_info(format!("Sorted by {key}."));
        self.pending = Some(Pending::Render);
    }

    fn delete_selected(&mut self) {
        match self.shelf.delete_selected() {
            Ok(Some(book)) => {
                self.set_info(format!("Deleted \"{}\".", book.title));
                self.pending = Some(Pending::Render);
            }
            Ok(None) => {}
            Err(err) => {
                self.set_error(format!("Delete failed: {err:#}"));
                self.pending = Some(Pending::Render);
            }
        }
    }

    fn header_lines(&self) -> Vec<Line<'static>> {
        let count = self.shelf.books().len();
        let sort_key = self.shelf.sort_key();
        let shelf_focused = self.focus == Focus::Shelf;
        let title = Line::from(vec![
            Span::styled("Virtual Bookshelf", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(format!(" — {count} book{}   sort: ", if count == 1 { "" } else { "s" })),
            option_chip("title", sort_key == SortKey::Title, shelf_focused),
            Span::raw(" "),
            option_chip("author", sort_key == SortKey::Author, shelf_focused),
        ]);

        let search_focused = self.focus == Focus::Search;
        let label_style = if search_focused {
            Style::default()
                .fg(self.accent_color())
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().add_modifier(Modifier::BOLD)
        };
        let cursor = if search_focused { "▏" } else { "" };
        let searching = matches!(self.pending, Some(Pending::Add(_)));
        let entry = Line::from(vec![
            Span::styled("Add book: ", label_style),
            Span::raw(format!("{}{cursor}", self.query)),
            Span::styled(
                if searching { "  searching…" } else { "" },
                Style::default().fg(Color::Cyan),
            ),
        ]);

        vec![title, entry]
    }

    fn footer_lines(&self) -> Vec<Line<'static>> {
        let bold = Style::default().add_modifier(Modifier::BOLD);
        let keys = match self.focus {
            Focus::Search => Line::from(vec![
                Span::styled("Enter", bold),
                Span::raw(" search + add  "),
                Span::styled("Tab", bold),
                Span::raw(" shelf  "),
                Span::styled("Ctrl+U", bold),
                Span::raw(" clear  "),
                Span::styled("Esc", bold),
                Span::raw(" quit"),
            ]),
            Focus::Shelf => Line::from(vec![
                Span::styled("←/→/↑/↓", bold),
                Span::raw(" move  "),
                Span::styled("d", bold),
                Span::raw(" delete  "),
                Span::styled("t", bold),
                Span::raw(" sort title  "),
                Span::styled("a", bold),
                Span::raw(" sort author  "),
                Span::styled("Tab", bold),
                Span::raw(" search  "),
                Span::styled("Esc", bold),
                Span::raw(" quit"),
            ]),
        };

        let status = match &self.notice {
            Some(notice) => {
                let style = match notice.kind {
                    NoticeKind::Info => Style::default().fg(Color::Cyan),
                    NoticeKind::Error => Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
                };
                Line::styled(notice.text.clone(), style)
            }
            None => Line::raw(""),
        };

        vec![keys, status]
    }

    fn details_line(&self, width: usize) -> Line<'static> {
        let Some(book) = self.shelf.selected_book() else {
            return Line::raw("");
        };
        let text = format!(
            "{} — {} · ISBN {} · {}",
            book.title, book.authors, book.isbn, book.year
        );
        Line::styled(fit_width(&text, width), Style::default().fg(Color::Gray))
    }

    fn draw(&mut self, area: Rect, frame: &mut ratatui::Frame) {
        frame.render_widget(Clear, area);

        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Min(0),
                Constraint::Length(1),
                Constraint::Length(3),
            ])
            .split(area);

        let header = Paragraph::new(Text::from(self.header_lines()))
            .block(Block::default().borders(Borders::BOTTOM));
        frame.render_widget(header, layout[0]);

        self.draw_shelf(frame, layout[1]);

        frame.render_widget(
            Paragraph::new(self.details_line(usize::from(layout[2].width)))
                .alignment(Alignment::Center),
            layout[2],
        );

        let footer = Paragraph::new(Text::from(self.footer_lines()))
            .alignment(Alignment::Center)
            .block(Block::default().borders(Borders::TOP));
        frame.render_widget(footer, layout[3]);
    }

    fn draw_shelf(&mut self, frame: &mut ratatui::Frame, area: Rect) {
        if self.shelf.books().is_empty() {
            let lines = vec![
                Line::raw("Your shelf is empty."),
                Line::raw(""),
                Line::raw("Type a title and press Enter to add a book."),
            ];
            let paragraph = Paragraph::new(Text::from(lines))
                .alignment(Alignment::Center)
                .wrap(Wrap { trim: true });
            frame.render_widget(paragraph, area);
            return;
        }

        if matches!(self.pending, Some(Pending::Render))
            || self.grid.cards.len() != self.shelf.books().len()
        {
            let paragraph = Paragraph::new(Line::raw("Loading covers…")).alignment(Alignment::Center);
            frame.render_widget(paragraph, area);
            return;
        }

        let accent = self.accent_color();
        let selected = if self.focus == Focus::Shelf {
            self.shelf.selected()
        } else {
            None
        };
        self.grid.draw(
            frame,
            area,
            self.shelf.books(),
            selected,
            self.settings.grid_columns,
            accent,
        );
    }
}

fn setup_terminal() -> anyhow::Result<Terminal<CrosstermBackend<Stdout>>> {
    terminal::enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    crossterm::execute!(stdout, EnterAlternateScreen).context("enter alt screen")?;
    let backend = CrosstermBackend::new(stdout);
    Terminal::new(backend).context("create terminal")
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> anyhow::Result<()> {
    terminal::disable_raw_mode().context("disable raw mode")?;
    crossterm::execute!(terminal.backend_mut(), LeaveAlternateScreen)
        .context("leave alt screen")?;
    Ok(())
}

fn panic_to_string(panic: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("panic: {s}")
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("panic: {s}")
    } else {
        "panic: (unknown payload)".to_string()
    }
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

fn option_chip(label: &str, selected: bool, row_selected: bool) -> Span<'static> {
    let base = if selected && row_selected {
        Style::default().add_modifier(Modifier::REVERSED | Modifier::BOLD)
    } else if selected {
        Style::default()
            .fg(Color::Black)
            .bg(Color::Cyan)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::Gray)
    };

    Span::styled(label.to_string(), base)
}

/// Truncates `text` to `max_width` display columns, ending in `…` when cut.
fn fit_width(text: &str, max_width: usize) -> String {
    if text.width() <= max_width {
        return text.to_string();
    }
    if max_width == 0 {
        return String::new();
    }

    let mut out = String::new();
    let mut used = 0;
    for ch in text.chars() {
        let w = ch.width().unwrap_or(0);
        if used + w + 1 > max_width {
            break;
        }
        out.push(ch);
        used += w;
    }
    out.push('…');
    out
}
