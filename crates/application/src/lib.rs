//! Application orchestration layer for Bookshelf.
//!
//! [`Shelf`] owns the in-memory collection and mirrors every mutation to the
//! record file. It knows nothing about the terminal; the cover choice is
//! delegated to a [`CoverChooser`].

use bookshelf_catalog::{Catalog, extract};
use bookshelf_core::{Book, Candidate, SortKey};
use bookshelf_storage::RecordStore;
use log::{info, warn};

/// Resolves a set of search results to a single cover URL, or `None` when the
/// user dismisses the choice. Implementations block until resolved.
pub trait CoverChooser {
    fn choose_cover(&mut self, candidates: &[Candidate]) -> anyhow::Result<Option<String>>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddOutcome {
    EmptyQuery,
    NoResults,
    NoSelection,
    Added(Book),
}

#[derive(Debug, Clone)]
pub struct Shelf {
    store: RecordStore,
    books: Vec<Book>,
    selected: usize,
    sort_key: SortKey,
}

impl Shelf {
    pub fn new(store: RecordStore) -> Self {
        Self {
            store,
            books: Vec::new(),
            selected: 0,
            sort_key: SortKey::default(),
        }
    }

    /// Loads the collection from the store, in file order.
    pub fn open(store: RecordStore) -> anyhow::Result<Self> {
        let books = store.load()?;
        info!("loaded {} book(s) from {}", books.len(), store.path().display());
        Ok(Self::new(store).with_books(books))
    }

    pub fn with_books(mut self, books: Vec<Book>) -> Self {
        self.books = books;
        self.selected = self.selected.min(self.books.len().saturating_sub(1));
        self
    }

    pub fn books(&self) -> &[Book] {
        &self.books
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    pub fn sort_key(&self) -> SortKey {
        self.sort_key
    }

    pub fn selected(&self) -> Option<usize> {
        if self.books.is_empty() {
            None
        } else {
            Some(self.selected.min(self.books.len() - 1))
        }
    }

    pub fn selected_book(&self) -> Option<&Book> {
        self.selected().and_then(|idx| self.books.get(idx))
    }

    pub fn select(&mut self, index: usize) {
        self.selected = index.min(self.books.len().saturating_sub(1));
    }

    /// Search, ask for a cover, then append and persist the chosen book.
    pub fn add_book(
        &mut self,
        query: &str,
        catalog: &dyn Catalog,
        chooser: &mut dyn CoverChooser,
    ) -> anyhow::Result<AddOutcome> {
        if query.is_empty() {
            return Ok(AddOutcome::EmptyQuery);
        }

        let candidates = catalog.search(query)?;
        if candidates.is_empty() {
            info!("no books found for {query:?}");
            return Ok(AddOutcome::NoResults);
        }

        let Some(chosen) = chooser.choose_cover(&candidates)? else {
            info!("no cover selected for {query:?}");
            return Ok(AddOutcome::NoSelection);
        };
        if chosen.is_empty() {
            info!("no cover selected for {query:?}");
            return Ok(AddOutcome::NoSelection);
        }

        let Some(source) = candidate_for_cover(&candidates, &chosen) else {
            return Ok(AddOutcome::NoResults);
        };
        let book = extract(source, &chosen);
        if book.has_separator() {
            warn!(
                "{:?} contains a comma; its record will not survive a reload",
                book.title
            );
        }

        self.books.push(book.clone());
        self.selected = self.books.len() - 1;
        self.store.save(&self.books)?;
        info!("added {:?} by {}", book.title, book.authors);
        Ok(AddOutcome::Added(book))
    }

    /// Reorders the collection in place; the selection follows its book.
    pub fn sort_by(&mut self, key: SortKey) {
        let current = self.selected_book().cloned();
        self.sort_key = key;
        self.books.sort_by_cached_key(|book| key.key_for(book));
        if let Some(current) = current
            && let Some(idx) = self.books.iter().position(|b| *b == current)
        {
            self.selected = idx;
        }
    }

    /// Removes the book at `index` and rewrites the store.
    pub fn delete(&mut self, index: usize) -> anyhow::Result<Option<Book>> {
        if index >= self.books.len() {
            return Ok(None);
        }
        let removed = self.books.remove(index);
        self.selected = self.selected.min(self.books.len().saturating_sub(1));
        self.store.save(&self.books)?;
        info!("deleted {:?}", removed.title);
        Ok(Some(removed))
    }

    pub fn delete_selected(&mut self) -> anyhow::Result<Option<Book>> {
        match self.selected() {
            Some(idx) => self.delete(idx),
            None => Ok(None),
        }
    }

    pub fn select_next(&mut self) {
        if self.selected + 1 < self.books.len() {
            self.selected += 1;
        }
    }

    pub fn select_prev(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    /// Moves one grid row down, landing on the last card of a short row.
    pub fn select_down(&mut self, columns: usize) {
        if self.books.is_empty() {
            return;
        }
        let columns = columns.max(1);
        let last = self.books.len() - 1;
        let row = self.selected / columns;
        if row < last / columns {
            self.selected = (self.selected + columns).min(last);
        }
    }

    pub fn select_up(&mut self, columns: usize) {
        let columns = columns.max(1);
        if self.selected >= columns {
            self.selected -= columns;
        }
    }
}

/// The result whose thumbnail matches `cover_url`, else the first result.
pub fn candidate_for_cover<'a>(
    candidates: &'a [Candidate],
    cover_url: &str,
) -> Option<&'a Candidate> {
    candidates
        .iter()
        .find(|c| c.cover_url() == cover_url)
        .or_else(|| candidates.first())
}
