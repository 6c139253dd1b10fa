//! The card grid of the main view.

use bookshelf_catalog::ThumbnailSource;
use bookshelf_core::Book;
use log::warn;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::Line;
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};
use ratatui_image::picker::Picker;
use ratatui_image::protocol::Protocol as ImageProtocol;
use ratatui_image::{Image as ImageWidget, Resize};

use crate::image_protocol;

/// Title (two lines), authors, ISBN and the delete hint.
const CARD_TEXT_ROWS: u16 = 5;
const CARD_MIN_WIDTH: u16 = 12;

pub(crate) struct Card {
    pub(crate) thumbnail: Option<ImageProtocol>,
}

/// Owns the thumbnails of the current render. A rebuild drops the whole
/// previous batch before fetching the next one.
pub(crate) struct ShelfGrid {
    pub(crate) cards: Vec<Card>,
    thumb_area: Rect,
    top_row: usize,
    /// Columns used by the last draw; `None` until the first frame.
    drawn_columns: Option<usize>,
}

impl ShelfGrid {
    pub(crate) fn new(picker: &Picker) -> Self {
        Self {
            cards: Vec::new(),
            thumb_area: image_protocol::thumbnail_area(picker),
            top_row: 0,
            drawn_columns: None,
        }
    }

    /// Column count that navigation should step by: the one last drawn, or
    /// `requested` before anything has been drawn.
    pub(crate) fn columns(&self, requested: usize) -> usize {
        self.drawn_columns.unwrap_or(requested.max(1))
    }

    pub(crate) fn rebuild(&mut self, books: &[Book], source: &dyn ThumbnailSource, picker: &Picker) {
        self.cards.clear();
        self.thumb_area = image_protocol::thumbnail_area(picker);
        self.cards.reserve(books.len());
        for book in books {
            let thumbnail = load_thumbnail(&book.cover_url, &book.title, source, picker, self.thumb_area);
            self.cards.push(Card { thumbnail });
        }
    }

    pub(crate) fn card_height(&self) -> u16 {
        self.thumb_area.height + CARD_TEXT_ROWS + 2
    }

    /// Adjusts the scroll so the selected card's row is on screen and returns
    /// the first visible row.
    pub(crate) fn scroll_to(&mut self, selected: usize, columns: usize, visible_rows: usize) -> usize {
        let columns = columns.max(1);
        let visible_rows = visible_rows.max(1);
        let row = selected / columns;
        if row < self.top_row {
            self.top_row = row;
        } else if row >= self.top_row + visible_rows {
            self.top_row = row + 1 - visible_rows;
        }
        self.top_row
    }

    pub(crate) fn draw(
        &mut self,
        frame: &mut ratatui::Frame,
        area: Rect,
        books: &[Book],
        selected: Option<usize>,
        columns: usize,
        accent: Color,
    ) {
        let columns = fit_columns(columns, area.width);
        self.drawn_columns = Some(columns);
        let card_height = self.card_height().min(area.height.max(1));
        let visible_rows = usize::from((area.height / card_height.max(1)).max(1));
        let top_row = self.scroll_to(selected.unwrap_or(0), columns, visible_rows);

        let card_width = (area.width / columns as u16).max(1);
        for (idx, book) in books.iter().enumerate().skip(top_row * columns) {
            let row = idx / columns - top_row;
            if row >= visible_rows {
                break;
            }
            let col = idx % columns;
            let x = area.x + col as u16 * card_width;
            let y = area.y + row as u16 * card_height;
            let card_area = Rect::new(x, y, card_width, card_height).intersection(area);
            let card = self.cards.get(idx);
            draw_card(
                frame,
                card_area,
                book,
                card.and_then(|c| c.thumbnail.as_ref()),
                self.thumb_area,
                selected == Some(idx),
                accent,
            );
        }
    }
}

/// Narrows `requested` so every column gets at least `CARD_MIN_WIDTH` cells;
/// cards past the last column wrap to the next row.
pub(crate) fn fit_columns(requested: usize, width: u16) -> usize {
    requested
        .max(1)
        .min(usize::from((width / CARD_MIN_WIDTH).max(1)))
}

/// Fetches one cover. Any failure is logged and yields no image so the rest
/// of the batch still renders.
pub(crate) fn load_thumbnail(
    url: &str,
    label: &str,
    source: &dyn ThumbnailSource,
    picker: &Picker,
    size: Rect,
) -> Option<ImageProtocol> {
    if url.is_empty() {
        return None;
    }
    let result = source.fetch_thumbnail(url).and_then(|image| {
        picker
            .new_protocol(image, size, Resize::Fit(None))
            .map_err(|err| anyhow::anyhow!("build image protocol: {err}"))
    });
    match result {
        Ok(protocol) => Some(protocol),
        Err(err) => {
            warn!("error loading image for {label:?}: {err:#}");
            None
        }
    }
}

fn draw_card(
    frame: &mut ratatui::Frame,
    area: Rect,
    book: &Book,
    thumbnail: Option<&ImageProtocol>,
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
        .constraints([
            Constraint::Length(thumb_area.height),
            Constraint::Length(2),
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .split(inner);

    match thumbnail {
        Some(protocol) => {
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
        }
        None => {
            let placeholder = Paragraph::new(Line::styled(
                "no cover",
                Style::default().fg(Color::DarkGray),
            ))
            .alignment(Alignment::Center);
            let mid = Rect::new(rows[0].x, rows[0].y + rows[0].height / 2, rows[0].width, 1);
            frame.render_widget(placeholder, mid.intersection(rows[0]));
        }
    }

    let title = Paragraph::new(Line::styled(
        book.title.clone(),
        Style::default().add_modifier(Modifier::BOLD),
    ))
    .alignment(Alignment::Center)
    .wrap(Wrap { trim: true });
    frame.render_widget(title, rows[1]);

    let width = usize::from(inner.width);
    let authors = Paragraph::new(Line::raw(crate::fit_width(&book.authors, width)))
        .alignment(Alignment::Center);
    frame.render_widget(authors, rows[2]);

    let isbn = Paragraph::new(Line::styled(
        crate::fit_width(&format!("ISBN: {}", book.isbn), width),
        Style::default().fg(Color::Gray),
    ))
    .alignment(Alignment::Center);
    frame.render_widget(isbn, rows[3]);

    let hint_style = if selected {
        Style::default().fg(Color::Red).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::DarkGray)
    };
    let hint = Paragraph::new(Line::styled("[d] delete", hint_style)).alignment(Alignment::Center);
    frame.render_widget(hint, rows[4]);
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use bookshelf_test::make_book;
    use image::DynamicImage;
    use ratatui::Terminal;
    use ratatui::backend::TestBackend;

    struct FlakySource {
        failing: HashSet<String>,
    }

    impl ThumbnailSource for FlakySource {
        fn fetch_thumbnail(&self, url: &str) -> anyhow::Result<DynamicImage> {
            if self.failing.contains(url) {
                anyhow::bail!("connection reset fetching {url}");
            }
            Ok(DynamicImage::new_rgba8(80, 120))
        }
    }

    const TITLES: [&str; 10] = [
        "Anathem", "Beloved", "Carrie", "Dune", "Emma", "Fahrenheit", "Gilead", "Hamlet",
        "Ivanhoe", "Jazz",
    ];

    fn books(count: usize) -> Vec<Book> {
        TITLES[..count]
            .iter()
            .map(|title| make_book(title, "x"))
            .collect()
    }

    fn five_books() -> Vec<Book> {
        books(5)
    }

    /// Draws `books` into a `width` x `rows` card-rows buffer and returns its
    /// text, one string per terminal line.
    fn draw_lines(
        grid: &mut ShelfGrid,
        books: &[Book],
        width: u16,
        rows: u16,
        columns: usize,
        selected: Option<usize>,
    ) -> anyhow::Result<Vec<String>> {
        let height = grid.card_height() * rows;
        let mut terminal = Terminal::new(TestBackend::new(width, height))?;
        terminal.draw(|frame| {
            let area = frame.area();
            grid.draw(frame, area, books, selected, columns, Color::Yellow);
        })?;
        let buffer = terminal.backend().buffer();
        Ok(buffer
            .content
            .chunks(usize::from(buffer.area.width))
            .map(|row| row.iter().map(|cell| cell.symbol()).collect())
            .collect())
    }

    fn line_of(lines: &[String], title: &str) -> Option<usize> {
        lines.iter().position(|line| line.contains(title))
    }

    fn drawn_grid(count: usize) -> (ShelfGrid, Vec<Book>) {
        let books = books(count);
        let source = FlakySource {
            failing: HashSet::new(),
        };
        let picker = Picker::halfblocks();
        let mut grid = ShelfGrid::new(&picker);
        grid.rebuild(&books, &source, &picker);
        (grid, books)
    }

    #[test]
    fn one_failing_cover_leaves_the_rest() {
        let books = five_books();
        let source = FlakySource {
            failing: HashSet::from([books[2].cover_url.clone()]),
        };
        let picker = Picker::halfblocks();
        let mut grid = ShelfGrid::new(&picker);

        grid.rebuild(&books, &source, &picker);

        assert_eq!(grid.cards.len(), 5);
        let with_images: Vec<bool> = grid.cards.iter().map(|c| c.thumbnail.is_some()).collect();
        assert_eq!(with_images, vec![true, true, false, true, true]);
    }

    #[test]
    fn empty_cover_url_is_not_fetched() {
        let mut book = make_book("Dune", "x");
        book.cover_url.clear();
        let source = FlakySource {
            failing: HashSet::from([String::new()]),
        };
        let picker = Picker::halfblocks();
        let mut grid = ShelfGrid::new(&picker);
        grid.rebuild(&[book], &source, &picker);
        assert!(grid.cards[0].thumbnail.is_none());
    }

    #[test]
    fn rebuild_replaces_previous_batch() {
        let source = FlakySource {
            failing: HashSet::new(),
        };
        let picker = Picker::halfblocks();
        let mut grid = ShelfGrid::new(&picker);
        grid.rebuild(&five_books(), &source, &picker);
        grid.rebuild(&five_books()[..2], &source, &picker);
        assert_eq!(grid.cards.len(), 2);
    }

    #[test]
    fn scroll_follows_selection() {
        let picker = Picker::halfblocks();
        let mut grid = ShelfGrid::new(&picker);
        assert_eq!(grid.scroll_to(0, 5, 2), 0);
        assert_eq!(grid.scroll_to(12, 5, 2), 1);
        assert_eq!(grid.scroll_to(7, 5, 2), 1);
        assert_eq!(grid.scroll_to(3, 5, 2), 0);
    }

    #[test]
    fn seven_books_wrap_after_five() -> anyhow::Result<()> {
        let (mut grid, books) = drawn_grid(7);
        let card_height = usize::from(grid.card_height());
        let lines = draw_lines(&mut grid, &books, 100, 2, 5, Some(0))?;

        for title in &TITLES[..5] {
            let line = line_of(&lines, title).expect("first row drawn");
            assert!(line < card_height, "{title} should be on the first row");
        }
        for title in &TITLES[5..7] {
            let line = line_of(&lines, title).expect("second row drawn");
            assert!(line >= card_height, "{title} should be on the second row");
        }
        assert_eq!(grid.columns(5), 5);
        Ok(())
    }

    #[test]
    fn narrow_area_wraps_instead_of_dropping_cards() -> anyhow::Result<()> {
        let (mut grid, books) = drawn_grid(5);
        let card_height = usize::from(grid.card_height());
        let lines = draw_lines(&mut grid, &books, 50, 2, 5, Some(4))?;

        for title in &TITLES[..5] {
            assert!(line_of(&lines, title).is_some(), "{title} missing at width 50");
        }
        let emma = line_of(&lines, "Emma").expect("selected card drawn");
        assert!(emma >= card_height);
        assert_eq!(grid.columns(5), 4);
        Ok(())
    }

    #[test]
    fn scrolled_window_shows_only_the_selected_row() -> anyhow::Result<()> {
        let (mut grid, books) = drawn_grid(10);
        let lines = draw_lines(&mut grid, &books, 100, 1, 5, Some(7))?;

        for title in &TITLES[..5] {
            assert!(line_of(&lines, title).is_none(), "{title} scrolled out");
        }
        for title in &TITLES[5..] {
            assert!(line_of(&lines, title).is_some(), "{title} should be visible");
        }
        Ok(())
    }

    #[test]
    fn fit_columns_keeps_minimum_card_width() {
        assert_eq!(fit_columns(5, 100), 5);
        assert_eq!(fit_columns(5, 50), 4);
        assert_eq!(fit_columns(12, 143), 11);
        assert_eq!(fit_columns(5, 3), 1);
        assert_eq!(fit_columns(0, 100), 1);
    }
}
