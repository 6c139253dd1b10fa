//! Test helpers and fixtures.

use bookshelf_core::{Book, Candidate, ImageLinks, IndustryIdentifier, VolumeInfo};
pub use tempfile::TempDir;

pub fn make_book(title: &str, authors: &str) -> Book {
    Book {
        title: title.to_string(),
        authors: authors.to_string(),
        isbn: "9780441013593".to_string(),
        year: "1965".to_string(),
        cover_url: format!("http://covers.test/{}.jpg", title.to_ascii_lowercase()),
    }
}

/// A search result with the given authors, ISBN-13 identifier and cover.
pub fn make_candidate(title: &str, authors: &[&str], cover_url: Option<&str>) -> Candidate {
    Candidate {
        volume_info: VolumeInfo {
            title: Some(title.to_string()),
            authors: authors.iter().map(|a| a.to_string()).collect(),
            industry_identifiers: vec![IndustryIdentifier {
                kind: "ISBN_13".to_string(),
                identifier: "9780441013593".to_string(),
            }],
            published_date: Some("1965-08-01".to_string()),
            image_links: cover_url.map(|url| ImageLinks {
                thumbnail: Some(url.to_string()),
            }),
        },
    }
}

/// A fresh, empty directory under the system temp dir, removed on drop.
pub fn scratch_dir(label: &str) -> TempDir {
    tempfile::Builder::new()
        .prefix(&format!("bookshelf-{label}-"))
        .tempdir()
        .expect("create scratch dir")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_candidate_with_cover() {
        let candidate = make_candidate("Dune", &["Frank Herbert"], Some("http://c/1"));
        assert_eq!(candidate.cover_url(), "http://c/1");
    }

    #[test]
    fn scratch_dirs_are_distinct_and_cleaned_up() {
        let a = scratch_dir("fixture");
        let b = scratch_dir("fixture");
        assert_ne!(a.path(), b.path());
        assert!(a.path().is_dir() && b.path().is_dir());

        let kept = a.path().to_path_buf();
        drop(a);
        assert!(!kept.exists());
    }
}
