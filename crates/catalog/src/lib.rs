//! Remote catalog lookups: book search and cover thumbnails.

use anyhow::Context as _;
use bookshelf_core::{
    Book, Candidate, MISSING_ISBN, UNKNOWN_AUTHOR, UNKNOWN_TITLE, UNKNOWN_YEAR, VARIOUS_AUTHORS,
};
use log::{debug, info};
use serde::Deserialize;
use serde::de::DeserializeOwned;

mod thumbnail;

pub use thumbnail::{
    HttpThumbnails, THUMBNAIL_HEIGHT, THUMBNAIL_WIDTH, ThumbnailSource, decode_thumbnail,
};

/// Minimal HTTP surface used by the catalog and thumbnail fetchers.
pub trait Client {
    fn get_json<T>(&self, url: &str) -> anyhow::Result<T>
    where
        T: DeserializeOwned;

    fn get_bytes(&self, url: &str) -> anyhow::Result<Vec<u8>>;
}

impl Client for reqwest::blocking::Client {
    fn get_json<T>(&self, url: &str) -> anyhow::Result<T>
    where
        T: DeserializeOwned,
    {
        // The body is parsed whatever the status; an error payload has no
        // `items` and reads as an empty result list.
        self.get(url)
            .send()
            .with_context(|| format!("GET {url}"))?
            .json()
            .with_context(|| format!("parse JSON from {url}"))
    }

    fn get_bytes(&self, url: &str) -> anyhow::Result<Vec<u8>> {
        let resp = self
            .get(url)
            .send()
            .with_context(|| format!("GET {url}"))?
            .error_for_status()
            .with_context(|| format!("GET {url}"))?;
        let bytes = resp
            .bytes()
            .with_context(|| format!("read body from {url}"))?;
        Ok(bytes.to_vec())
    }
}

pub fn http_client() -> anyhow::Result<reqwest::blocking::Client> {
    reqwest::blocking::Client::builder()
        .user_agent(concat!("bookshelf/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("build http client")
}

/// A source of search results for a title query.
pub trait Catalog {
    fn search(&self, title: &str) -> anyhow::Result<Vec<Candidate>>;
}

#[derive(Default, Deserialize)]
#[serde(default)]
struct SearchResponse {
    items: Vec<Candidate>,
}

#[derive(Debug, Clone)]
pub struct GoogleBooks<C: Client> {
    client: C,
    base_url: String,
}

impl<C: Client> GoogleBooks<C> {
    pub fn new(client: C, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    /// The title goes into the query verbatim.
    pub fn search_url(&self, title: &str) -> String {
        format!("{}?q=intitle:{title}", self.base_url)
    }
}

impl<C: Client> Catalog for GoogleBooks<C> {
    fn search(&self, title: &str) -> anyhow::Result<Vec<Candidate>> {
        let url = self.search_url(title);
        info!("searching catalog: {url}");
        let SearchResponse { items } = self
            .client
            .get_json(&url)
            .with_context(|| format!("search catalog for {title:?}"))?;
        debug!("catalog returned {} result(s)", items.len());
        Ok(items)
    }
}

/// Maps a search result to a shelf record, using `chosen_cover_url` as the
/// cover regardless of the result's own links.
pub fn extract(candidate: &Candidate, chosen_cover_url: &str) -> Book {
    let info = &candidate.volume_info;

    let title = info
        .title
        .clone()
        .unwrap_or_else(|| UNKNOWN_TITLE.to_string());

    let authors = match info.authors.as_slice() {
        [] => UNKNOWN_AUTHOR.to_string(),
        [only] => only.clone(),
        _ => VARIOUS_AUTHORS.to_string(),
    };

    let isbn = info
        .industry_identifiers
        .iter()
        .find(|id| id.kind.contains("ISBN"))
        .map(|id| id.identifier.clone())
        .unwrap_or_else(|| MISSING_ISBN.to_string());

    let year = info
        .published_date
        .as_deref()
        .and_then(|date| date.split('-').next())
        .filter(|year| !year.is_empty())
        .unwrap_or(UNKNOWN_YEAR)
        .to_string();

    Book {
        title,
        authors,
        isbn,
        year,
        cover_url: chosen_cover_url.to_string(),
    }
}
