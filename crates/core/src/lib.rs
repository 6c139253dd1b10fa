//! Core domain types for Bookshelf.

use serde::Deserialize;

pub const UNKNOWN_TITLE: &str = "Unknown Title";
pub const UNKNOWN_AUTHOR: &str = "Unknown Author";
pub const VARIOUS_AUTHORS: &str = "Various";
pub const MISSING_ISBN: &str = "N/A";
pub const UNKNOWN_YEAR: &str = "Unknown";

pub const DEFAULT_DB_PATH: &str = "book_db.txt";
pub const DEFAULT_CATALOG_URL: &str = "https://www.googleapis.com/books/v1/volumes";
pub const DEFAULT_GRID_COLUMNS: usize = 5;

/// A saved book as it appears on the shelf and in the record file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Book {
    pub title: String,
    pub authors: String,
    pub isbn: String,
    pub year: String,
    pub cover_url: String,
}

impl Book {
    pub fn fields(&self) -> [&str; 5] {
        [
            &self.title,
            &self.authors,
            &self.isbn,
            &self.year,
            &self.cover_url,
        ]
    }

    /// True when any field would split into extra columns in the record file.
    pub fn has_separator(&self) -> bool {
        self.fields().iter().any(|field| field.contains(','))
    }
}

/// One search result from the catalog, mirroring the `items[]` entries of the
/// volumes endpoint. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Candidate {
    #[serde(rename = "volumeInfo")]
    pub volume_info: VolumeInfo,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct VolumeInfo {
    pub title: Option<String>,
    pub authors: Vec<String>,
    #[serde(rename = "industryIdentifiers")]
    pub industry_identifiers: Vec<IndustryIdentifier>,
    #[serde(rename = "publishedDate")]
    pub published_date: Option<String>,
    #[serde(rename = "imageLinks")]
    pub image_links: Option<ImageLinks>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct IndustryIdentifier {
    #[serde(rename = "type")]
    pub kind: String,
    pub identifier: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ImageLinks {
    pub thumbnail: Option<String>,
}

impl Candidate {
    /// Thumbnail URL, or an empty string when the result carries none.
    pub fn cover_url(&self) -> &str {
        self.volume_info
            .image_links
            .as_ref()
            .and_then(|links| links.thumbnail.as_deref())
            .unwrap_or("")
    }

    pub fn has_cover(&self) -> bool {
        !self.cover_url().is_empty()
    }

    pub fn display_title(&self) -> &str {
        self.volume_info.title.as_deref().unwrap_or(UNKNOWN_TITLE)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    #[default]
    Title,
    Author,
}

impl SortKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortKey::Title => "title",
            SortKey::Author => "author",
        }
    }

    /// Case-insensitive comparison key for `book`.
    pub fn key_for(&self, book: &Book) -> String {
        match self {
            SortKey::Title => book.title.to_lowercase(),
            SortKey::Author => book.authors.to_lowercase(),
        }
    }
}

impl std::fmt::Display for SortKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    #[default]
    Dark,
}

impl Theme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }
}

impl std::fmt::Display for Theme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub db_path: String,
    pub catalog_url: String,
    pub grid_columns: usize,
    pub theme: Theme,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            db_path: DEFAULT_DB_PATH.to_string(),
            catalog_url: DEFAULT_CATALOG_URL.to_string(),
            grid_columns: DEFAULT_GRID_COLUMNS,
            theme: Theme::Dark,
        }
    }
}

impl Settings {
    pub fn normalize(&mut self) {
        self.grid_columns = self.grid_columns.clamp(1, 12);

        let db_path = self.db_path.trim();
        self.db_path = if db_path.is_empty() {
            DEFAULT_DB_PATH.to_string()
        } else {
            db_path.to_string()
        };

        let catalog_url = self.catalog_url.trim().trim_end_matches('/');
        self.catalog_url = if catalog_url.is_empty() {
            DEFAULT_CATALOG_URL.to_string()
        } else {
            catalog_url.to_string()
        };
    }
}
