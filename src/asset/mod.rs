//! Clothing assets: id extraction and the decoded image that flows from
//! fetch through overlay to persistence.

mod store;

use image::{ImageFormat, RgbaImage};

use crate::overlay::OverlayCategory;

pub use store::AssetStore;

/// Pulls the asset id out of user input.
///
/// Accepts a bare id or any URL containing one (catalog links,
/// `rbxassetid://` URIs) and returns the first run of ASCII digits.
pub fn extract_asset_id(input: &str) -> Option<String> {
    input
        .split(|c: char| !c.is_ascii_digit())
        .find(|run| !run.is_empty())
        .map(str::to_string)
}

/// Decoded RGBA image of one asset.
#[derive(Debug, Clone)]
pub struct AssetImage {
    id: String,
    pixels: RgbaImage,
    category: Option<OverlayCategory>,
    composited: bool,
}

impl AssetImage {
    /// Decodes fetched bytes (PNG and friends) into an RGBA buffer.
    pub fn decode(id: impl Into<String>, bytes: &[u8]) -> Result<Self, image::ImageError> {
        let pixels = image::load_from_memory(bytes)?.to_rgba8();
        Ok(Self::from_pixels(id, pixels))
    }

    pub fn from_pixels(id: impl Into<String>, pixels: RgbaImage) -> Self {
        Self {
            id: id.into(),
            pixels,
            category: None,
            composited: false,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    /// Overlay category applied to this image, if any.
    pub fn category(&self) -> Option<OverlayCategory> {
        self.category
    }

    pub fn is_composited(&self) -> bool {
        self.composited
    }

    /// Replaces the pixels with their composite.
    pub(crate) fn apply_composite(&mut self, pixels: RgbaImage, category: OverlayCategory) {
        self.pixels = pixels;
        self.category = Some(category);
        self.composited = true;
    }

    /// Default file name: `<id>.png`.
    pub fn file_name(&self) -> String {
        format!("{}.png", self.id)
    }

    pub fn encode_png(&self) -> Result<Vec<u8>, image::ImageError> {
        let mut cursor = std::io::Cursor::new(Vec::new());
        self.pixels.write_to(&mut cursor, ImageFormat::Png)?;
        Ok(cursor.into_inner())
    }
}
