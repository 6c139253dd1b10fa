//! Flat-file persistence for the shelf.
//!
//! The record file is plain comma-delimited text with a fixed header. Fields
//! are written unescaped, so a comma inside a field shifts the columns on the
//! next load and the line is dropped.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context as _;
use bookshelf_core::Book;
use log::debug;

pub const HEADER: &str = "Title,Authors,ISBN,Year,CoverURL";
const FIELD_COUNT: usize = 5;

#[derive(Debug, Clone)]
pub struct RecordStore {
    path: PathBuf,
}

impl RecordStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Creates the file with only the header line when it is missing.
    /// Returns whether the file was created.
    pub fn ensure_exists(&self) -> anyhow::Result<bool> {
        if self.path.exists() {
            return Ok(false);
        }
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .with_context(|| format!("create dir {}", parent.display()))?;
        }
        fs::write(&self.path, format!("{HEADER}\n"))
            .with_context(|| format!("create record file {}", self.path.display()))?;
        Ok(true)
    }

    pub fn load(&self) -> anyhow::Result<Vec<Book>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("read record file {}", self.path.display()))?;

        let mut books = Vec::new();
        for (line_no, line) in contents.lines().enumerate().skip(1) {
            match parse_line(line) {
                Some(book) => books.push(book),
                None => debug!("skipping malformed record on line {}: {line:?}", line_no + 1),
            }
        }
        Ok(books)
    }

    pub fn save(&self, books: &[Book]) -> anyhow::Result<()> {
        let mut out = String::with_capacity(HEADER.len() + 1 + books.len() * 64);
        out.push_str(HEADER);
        out.push('\n');
        for book in books {
            out.push_str(&format_line(book));
            out.push('\n');
        }
        fs::write(&self.path, out)
            .with_context(|| format!("write record file {}", self.path.display()))
    }
}

fn parse_line(line: &str) -> Option<Book> {
    let parts: Vec<&str> = line.trim().split(',').collect();
    // A comma inside a field yields extra parts; those lines are dropped too.
    if parts.len() != FIELD_COUNT {
        return None;
    }
    let [title, authors, isbn, year, cover_url] = parts.as_slice() else {
        return None;
    };
    Some(Book {
        title: title.to_string(),
        authors: authors.to_string(),
        isbn: isbn.to_string(),
        year: year.to_string(),
        cover_url: cover_url.to_string(),
    })
}

fn format_line(book: &Book) -> String {
    book.fields().join(",")
}
