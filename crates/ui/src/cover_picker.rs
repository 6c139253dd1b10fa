//! Modal cover selection.
//!
//! The picker runs its own event loop on top of the main view's terminal and
//! returns only once a cover is chosen or the picker is dismissed.

use std::io::Stdout;
use std::time::Duration;

use bookshelf_application::CoverChooser;
use bookshelf_catalog::ThumbnailSource;
use bookshelf_core::Candidate;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use log::debug;
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};
use ratatui_image::Image as ImageWidget;
use ratatui_image::picker::Picker;
use ratatui_image::protocol::Protocol as ImageProtocol;

use crate::{centered_rect, fit_width, grid, image_protocol};

const TILE_PADDING: u16 = 2;

pub(crate) struct CoverTile {
    pub(crate) cover_url: String,
    pub(crate) title: String,
    pub(crate) thumbnail: Option<ImageProtocol>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum PickerAction {
    Continue,
    Choose(String),
    Dismiss,
}

/// One tile per candidate with a cover, left to right.
pub(crate) struct CoverStrip {
    pub(crate) tiles: Vec<CoverTile>,
    selected: usize,
    offset: usize,
    thumb_area: Rect,
}

impl CoverStrip {
    pub(crate) fn build(
        candidates: &[Candidate],
        source: &dyn ThumbnailSource,
        picker: &Picker,
    ) -> Self {
        let thumb_area = image_protocol::thumbnail_area(picker);
        let tiles = candidates
            .iter()
            .filter(|c| c.has_cover())
            .map(|candidate| {
                let cover_url = candidate.cover_url().to_string();
                let title = candidate.display_title().to_string();
                let thumbnail = grid::load_thumbnail(&cover_url, &title, source, picker, thumb_area);
                CoverTile {
                    cover_url,
                    title,
                    thumbnail,
                }
            })
            .collect::<Vec<_>>();
        debug!(
            "cover picker: {} of {} candidate(s) have covers",
            tiles.len(),
            candidates.len()
        );
        Self {
            tiles,
            selected: 0,
            offset: 0,
            thumb_area,
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub(crate) fn selected(&self) -> usize {
        self.selected
    }

    pub(crate) fn handle_key(&mut self, key: KeyEvent) -> PickerAction {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return PickerAction::Dismiss;
        }
        match key.code {
            KeyCode::Esc | KeyCode::Char('q') => PickerAction::Dismiss,
            KeyCode::Left | KeyCode::Char('h') => {
                self.selected = self.selected.saturating_sub(1);
                PickerAction::Continue
            }
            KeyCode::Right | KeyCode::Char('l') => {
                if self.selected + 1 < self.tiles.len() {
                    self.selected += 1;
                }
                PickerAction::Continue
            }
            KeyCode::Home => {
                self.selected = 0;
                PickerAction::Continue
            }
            KeyCode::End => {
                self.selected = self.tiles.len().saturating_sub(1);
                PickerAction::Continue
            }
            KeyCode::Enter => match self.tiles.get(self.selected) {
                Some(tile) => PickerAction::Choose(tile.cover_url.clone()),
                None => PickerAction::Dismiss,
            },
            _ => PickerAction::Continue,
        }
    }

    fn tile_width(&self) -> u16 {
        self.thumb_area.width.max(14) + 2
    }

    /// Keeps the selected tile inside a window of `visible` tiles.
    fn scroll_to_selected(&mut self, visible: usize) -> usize {
        let visible = visible.max(1);
        if self.selected < self.offset {
            self.offset = self.selected;
        } else if self.selected >= self.offset + visible {
            self.offset = self.selected + 1 - visible;
        }
        self.offset
    }

    pub(crate) fn draw(&mut self, frame: &mut ratatui::Frame, area: Rect, accent: Color) {
        let popup = centered_rect(90, 70, area);
        frame.render_widget(Clear, popup);

        let title = format!("Choose a Cover — {}/{}", self.selected() + 1, self.tiles.len());
        let block = Block::default().borders(Borders::ALL).title(Span::styled(
            title,
            Style::default().add_modifier(Modifier::BOLD),
        ));
        let inner = block.inner(popup);
        frame.render_widget(block, popup);

        let sections = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(0), Constraint::Length(2)])
            .split(inner);
        let strip = sections[0];

        let tile_width = self.tile_width() + TILE_PADDING;
        let visible = usize::from((strip.width / tile_width).max(1));
        let offset = self.scroll_to_selected(visible);
        let tile_height = (self.thumb_area.height + 4).min(strip.height);

        for (slot, idx) in (offset..self.tiles.len()).take(visible).enumerate() {
            let x = strip.x + slot as u16 * tile_width;
            if x + self.tile_width() > strip.x + strip.width {
                break;
            }
            let tile_area = Rect::new(x, strip.y, self.tile_width(), tile_height);
            draw_tile(
                frame,
                tile_area,
                &self.tiles[idx],
                self.thumb_area,
                idx == self.selected,
                accent,
            );
        }

        let more_left = offset > 0;
        let more_right = offset + visible < self.tiles.len();
        let help = Line::from(vec![
            Span::raw(if more_left { "◀ " } else { "  " }),
            Span::styled("←/→", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(" move  "),
            Span::styled("Enter", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(" choose  "),
            Span::styled("Esc", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(" cancel"),
            Span::raw(if more_right { " ▶" } else { "  " }),
        ]);
        frame.render_widget(
            Paragraph::new(help).alignment(Alignment::Center),
            sections[1],
        );
    }
}

fn draw_tile(
    frame: &mut ratatui::Frame,
    area: Rect,
    tile: &CoverTile,
    thumb_area: Rect,
    selected: bool,
    accent: Color,
) {
    let border_style = if selected {
        Style::default().fg(accent).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::DarkGray)
    };
    let block = Block::default().borders(Borders::ALL).border_style(border_style);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(thumb_area.height), Constraint::Min(0)])
        .split(inner);

    if let Some(protocol) = tile.thumbnail.as_ref() {
        let proto_area = protocol.area();
        let width = proto_area.width.min(rows[0].width);
        let height = proto_area.height.min(rows[0].height);
        let draw_area = Rect::new(
            rows[0].x + rows[0].width.saturating_sub(width) / 2,
            rows[0].y,
            width,
            height,
        );
        frame.render_widget(ImageWidget::new(protocol), draw_area);
    } else {
        let text = Paragraph::new(Text::from(vec![
            Line::raw(""),
            Line::styled("image failed", Style::default().fg(Color::DarkGray)),
        ]))
        .alignment(Alignment::Center);
        frame.render_widget(text, rows[0]);
    }

    let caption_style = if selected {
        Style::default().fg(accent).add_modifier(Modifier::BOLD)
    } else {
        Style::default()
    };
    let caption = Paragraph::new(Line::styled(
        fit_width(&tile.title, usize::from(inner.width) * 2),
        caption_style,
    ))
    .alignment(Alignment::Center)
    .wrap(Wrap { trim: true });
    frame.render_widget(caption, rows[1]);
}

/// Runs the picker as a nested event loop on the caller's terminal.
pub(crate) struct TerminalCoverPicker<'a> {
    pub(crate) terminal: &'a mut Terminal<CrosstermBackend<Stdout>>,
    pub(crate) image_picker: &'a Picker,
    pub(crate) thumbnails: &'a dyn ThumbnailSource,
    pub(crate) accent: Color,
}

impl CoverChooser for TerminalCoverPicker<'_> {
    fn choose_cover(&mut self, candidates: &[Candidate]) -> anyhow::Result<Option<String>> {
        let accent = self.accent;
        self.terminal.draw(|frame| {
            let area = centered_rect(50, 20, frame.area());
            frame.render_widget(Clear, area);
            let loading = Paragraph::new(Line::raw(format!(
                "Loading {} cover(s)…",
                candidates.iter().filter(|c| c.has_cover()).count()
            )))
            .alignment(Alignment::Center)
            .block(Block::default().borders(Borders::ALL).title("Choose a Cover"));
            frame.render_widget(loading, area);
        })?;

        let mut strip = CoverStrip::build(candidates, self.thumbnails, self.image_picker);
        if strip.is_empty() {
            return Ok(None);
        }

        self.terminal.clear()?;
        let tick_rate = Duration::from_millis(250);
        let mut needs_redraw = true;
        loop {
            if needs_redraw {
                self.terminal.draw(|frame| {
                    let area = frame.area();
                    strip.draw(frame, area, accent);
                })?;
                needs_redraw = false;
            }

            if !event::poll(tick_rate)? {
                continue;
            }

            match event::read()? {
                Event::Resize(_, _) => needs_redraw = true,
                Event::Key(key) => {
                    if key.kind == KeyEventKind::Release {
                        continue;
                    }
                    needs_redraw = true;
                    match strip.handle_key(key) {
                        PickerAction::Continue => {}
                        PickerAction::Choose(url) => return Ok(Some(url)),
                        PickerAction::Dismiss => return Ok(None),
                    }
                }
                _ => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bookshelf_test::make_candidate;
    use image::DynamicImage;

    struct FailingFor(&'static str);

    impl ThumbnailSource for FailingFor {
        fn fetch_thumbnail(&self, url: &str) -> anyhow::Result<DynamicImage> {
            if url == self.0 {
                anyhow::bail!("decode failed");
            }
            Ok(DynamicImage::new_rgb8(80, 120))
        }
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn strip() -> CoverStrip {
        let candidates = vec![
            make_candidate("No Cover", &["a"], None),
            make_candidate("First", &["a"], Some("http://c/1")),
            make_candidate("Broken", &["b"], Some("http://c/2")),
            make_candidate("Third", &["c"], Some("http://c/3")),
        ];
        CoverStrip::build(&candidates, &FailingFor("http://c/2"), &Picker::halfblocks())
    }

    #[test]
    fn skips_candidates_without_cover() {
        let strip = strip();
        let titles: Vec<&str> = strip.tiles.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["First", "Broken", "Third"]);
    }

    #[test]
    fn failed_thumbnail_keeps_tile_without_image() {
        let strip = strip();
        let images: Vec<bool> = strip.tiles.iter().map(|t| t.thumbnail.is_some()).collect();
        assert_eq!(images, vec![true, false, true]);
    }

    #[test]
    fn enter_chooses_selected_cover() {
        let mut strip = strip();
        assert_eq!(strip.handle_key(key(KeyCode::Right)), PickerAction::Continue);
        assert_eq!(strip.handle_key(key(KeyCode::Right)), PickerAction::Continue);
        assert_eq!(strip.handle_key(key(KeyCode::Right)), PickerAction::Continue);
        assert_eq!(strip.selected(), 2);
        assert_eq!(
            strip.handle_key(key(KeyCode::Enter)),
            PickerAction::Choose("http://c/3".to_string())
        );
    }

    #[test]
    fn escape_dismisses() {
        let mut strip = strip();
        assert_eq!(strip.handle_key(key(KeyCode::Esc)), PickerAction::Dismiss);
        assert_eq!(
            strip.handle_key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)),
            PickerAction::Dismiss
        );
    }

    #[test]
    fn offset_tracks_selection() {
        let mut strip = strip();
        strip.selected = 2;
        assert_eq!(strip.scroll_to_selected(1), 2);
        strip.selected = 0;
        assert_eq!(strip.scroll_to_selected(2), 0);
    }
}
