//! Image overlay pipeline.
//!
//! A clothing image is composited with a fixed template picked by its
//! overlay category. The only thing that varies between categories is which
//! template file is used, so categories are plain data looked up in a
//! [`TemplateStore`].

mod template;

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use image::RgbaImage;
use log::debug;

use crate::asset::AssetImage;

pub use template::{DEFAULT_TEMPLATES, TemplateStore};

/// Garment type, each mapped to exactly one template image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OverlayCategory {
    Shirt,
    Pants,
}

impl OverlayCategory {
    pub const ALL: [OverlayCategory; 2] = [OverlayCategory::Shirt, OverlayCategory::Pants];

    pub fn as_str(&self) -> &'static str {
        match self {
            OverlayCategory::Shirt => "shirt",
            OverlayCategory::Pants => "pants",
        }
    }
}

impl fmt::Display for OverlayCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OverlayCategory {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "shirt" => Ok(OverlayCategory::Shirt),
            "pants" => Ok(OverlayCategory::Pants),
            _ => anyhow::bail!(
                "Unknown overlay category: {}. Expected shirt or pants.",
                s
            ),
        }
    }
}

/// Why an overlay was refused.
#[derive(Debug)]
pub enum OverlayError {
    /// No template file resolves for the category.
    TemplateMissing {
        category: OverlayCategory,
        reason: String,
    },
    /// The template file exists but could not be decoded.
    TemplateLoad { path: PathBuf, reason: String },
    /// The fetched image could not be decoded.
    Decode(String),
    /// Base image and template differ in size.
    DimensionMismatch {
        base: (u32, u32),
        template: (u32, u32),
    },
    /// The image already carries a composite.
    AlreadyComposited(String),
}

impl fmt::Display for OverlayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OverlayError::TemplateMissing { category, reason } => {
                write!(f, "No overlay template for {}: {}", category, reason)
            }
            OverlayError::TemplateLoad { path, reason } => {
                write!(
                    f,
                    "Failed to load overlay template {}: {}",
                    path.display(),
                    reason
                )
            }
            OverlayError::Decode(reason) => write!(f, "Failed to decode image: {}", reason),
            OverlayError::DimensionMismatch { base, template } => write!(
                f,
                "Image is {}x{} but the template is {}x{}",
                base.0, base.1, template.0, template.1
            ),
            OverlayError::AlreadyComposited(id) => {
                write!(f, "Asset {} already has an overlay applied", id)
            }
        }
    }
}

impl std::error::Error for OverlayError {}

/// Alpha-composites `template` over `base`. Both must have the same size.
pub fn composite(base: &RgbaImage, template: &RgbaImage) -> Result<RgbaImage, OverlayError> {
    if base.dimensions() != template.dimensions() {
        return Err(OverlayError::DimensionMismatch {
            base: base.dimensions(),
            template: template.dimensions(),
        });
    }

    let mut out = base.clone();
    image::imageops::overlay(&mut out, template, 0, 0);
    Ok(out)
}

/// Applies category templates to fetched images.
#[derive(Clone)]
pub struct OverlayPipeline {
    templates: Arc<TemplateStore>,
}

impl OverlayPipeline {
    pub fn new(templates: Arc<TemplateStore>) -> Self {
        Self { templates }
    }

    pub fn templates(&self) -> &TemplateStore {
        &self.templates
    }

    /// Composites the category template over an already decoded image.
    pub fn overlay(
        &self,
        mut image: AssetImage,
        category: OverlayCategory,
    ) -> Result<AssetImage, OverlayError> {
        if image.is_composited() {
            return Err(OverlayError::AlreadyComposited(image.id().to_string()));
        }

        let template = self.templates.get(category)?;
        let composited = composite(image.pixels(), &template)?;
        image.apply_composite(composited, category);

        debug!("Applied {} overlay to asset {}", category, image.id());
        Ok(image)
    }

    /// Decodes raw image bytes and composites the category template over them.
    ///
    /// The template is resolved first; a missing template is refused before
    /// any decoding of `bytes` happens.
    pub fn overlay_bytes(
        &self,
        id: &str,
        bytes: &[u8],
        category: OverlayCategory,
    ) -> Result<AssetImage, OverlayError> {
        let template = self.templates.get(category)?;

        let mut image =
            AssetImage::decode(id, bytes).map_err(|e| OverlayError::Decode(e.to_string()))?;
        let composited = composite(image.pixels(), &template)?;
        image.apply_composite(composited, category);

        debug!("Applied {} overlay to asset {}", category, image.id());
        Ok(image)
    }
}
