use std::fs;
use std::io::{self, IsTerminal};
use std::path::Path;

use anyhow::Context as _;
use bookshelf_application::Shelf;
use bookshelf_catalog::{GoogleBooks, HttpThumbnails};
use bookshelf_core::Settings;
use bookshelf_storage::RecordStore;
use bookshelf_ui::Ui;
use directories::ProjectDirs;
use log::info;

fn main() {
    if let Err(err) = run() {
        eprintln!("{err:?}");
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    // Log lines on a tty would tear through the full-screen UI; redirect
    // stderr to a file to keep them.
    stderrlog::new()
        .verbosity(2)
        .quiet(io::stderr().is_terminal())
        .init()?;

    let settings = load_settings()?;
    info!(
        "using record file {} ({} theme)",
        settings.db_path, settings.theme
    );

    let store = RecordStore::new(&settings.db_path);
    if store.ensure_exists()? {
        info!("created {}", store.path().display());
    }
    let shelf = Shelf::open(store)?;

    let http = bookshelf_catalog::http_client()?;
    let catalog = GoogleBooks::new(http.clone(), settings.catalog_url.clone());
    let thumbnails = HttpThumbnails::new(http);

    let mut ui = Ui::new(settings, shelf, Box::new(catalog), Box::new(thumbnails));
    ui.run()?;
    info!("saved {} books", ui.shelf().books().len());
    Ok(())
}

fn load_settings() -> anyhow::Result<Settings> {
    let Some(project_dirs) = ProjectDirs::from("dev", "bookshelf", "bookshelf") else {
        return Ok(Settings::default());
    };
    read_settings(&project_dirs.config_dir().join("settings.json"))
}

/// Reads `path` when it exists; a missing file means defaults.
fn read_settings(path: &Path) -> anyhow::Result<Settings> {
    let mut settings = if path.exists() {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("read settings {}", path.display()))?;
        serde_json::from_str::<Settings>(&raw)
            .with_context(|| format!("parse settings {}", path.display()))?
    } else {
        Settings::default()
    };
    settings.normalize();
    Ok(settings)
}
