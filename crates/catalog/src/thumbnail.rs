use anyhow::Context as _;
use image::DynamicImage;
use image::imageops::FilterType;
use log::debug;

use crate::Client;

pub const THUMBNAIL_WIDTH: u32 = 80;
pub const THUMBNAIL_HEIGHT: u32 = 120;

/// Something that can turn a cover URL into a thumbnail bitmap.
pub trait ThumbnailSource {
    fn fetch_thumbnail(&self, url: &str) -> anyhow::Result<DynamicImage>;
}

#[derive(Debug, Clone)]
pub struct HttpThumbnails<C: Client> {
    client: C,
}

impl<C: Client> HttpThumbnails<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }
}

impl<C: Client> ThumbnailSource for HttpThumbnails<C> {
    fn fetch_thumbnail(&self, url: &str) -> anyhow::Result<DynamicImage> {
        debug!("fetching thumbnail {url}");
        let bytes = self.client.get_bytes(url)?;
        decode_thumbnail(&bytes).with_context(|| format!("decode image from {url}"))
    }
}

/// Decodes encoded image bytes and stretches them to the fixed thumbnail
/// footprint. The source aspect ratio is not preserved.
pub fn decode_thumbnail(bytes: &[u8]) -> anyhow::Result<DynamicImage> {
    let image = image::load_from_memory(bytes)?;
    Ok(image.resize_exact(THUMBNAIL_WIDTH, THUMBNAIL_HEIGHT, FilterType::CatmullRom))
}
