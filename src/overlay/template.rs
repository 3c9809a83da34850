//! Category → template image lookup with a load-once cache.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use image::RgbaImage;
use log::{debug, error};

use super::{OverlayCategory, OverlayError};
use crate::runtime::Runtime;

/// Template file for each category, relative to the templates directory.
pub const DEFAULT_TEMPLATES: [(OverlayCategory, &str); 2] = [
    (OverlayCategory::Shirt, "shirt_template.png"),
    (OverlayCategory::Pants, "pants_template.png"),
];

/// Resolves and caches overlay templates.
///
/// A template is decoded the first time it is requested and shared
/// read-only afterwards. Failed lookups are not cached.
pub struct TemplateStore {
    runtime: Arc<dyn Runtime>,
    dir: PathBuf,
    files: HashMap<OverlayCategory, String>,
    cache: HashMap<OverlayCategory, OnceLock<Arc<RgbaImage>>>,
}

impl TemplateStore {
    /// Store using [`DEFAULT_TEMPLATES`] under `dir`.
    pub fn new(runtime: Arc<dyn Runtime>, dir: impl Into<PathBuf>) -> Self {
        let files = DEFAULT_TEMPLATES
            .iter()
            .map(|(category, file)| (*category, file.to_string()))
            .collect();
        Self::with_mapping(runtime, dir, files)
    }

    pub fn with_mapping(
        runtime: Arc<dyn Runtime>,
        dir: impl Into<PathBuf>,
        files: HashMap<OverlayCategory, String>,
    ) -> Self {
        let cache = files.keys().map(|category| (*category, OnceLock::new())).collect();
        Self {
            runtime,
            dir: dir.into(),
            files,
            cache,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the category's template, if one is registered.
    pub fn template_path(&self, category: OverlayCategory) -> Option<PathBuf> {
        self.files.get(&category).map(|file| self.dir.join(file))
    }

    /// Returns the decoded template for `category`.
    pub fn get(&self, category: OverlayCategory) -> Result<Arc<RgbaImage>, OverlayError> {
        let (Some(path), Some(cell)) = (self.template_path(category), self.cache.get(&category))
        else {
            error!("No overlay template registered for type: {}", category);
            return Err(OverlayError::TemplateMissing {
                category,
                reason: "no template registered".to_string(),
            });
        };

        if let Some(template) = cell.get() {
            return Ok(template.clone());
        }

        let template = Arc::new(self.load(category, &path)?);
        // Two first readers may both decode; either result is identical.
        Ok(cell.get_or_init(|| template).clone())
    }

    fn load(&self, category: OverlayCategory, path: &Path) -> Result<RgbaImage, OverlayError> {
        if !self.runtime.is_file(path) {
            error!("Overlay template file not found at: {}", path.display());
            return Err(OverlayError::TemplateMissing {
                category,
                reason: format!("template file not found at {}", path.display()),
            });
        }

        debug!("Loading overlay template from: {}", path.display());
        let bytes = self
            .runtime
            .read(path)
            .map_err(|e| OverlayError::TemplateLoad {
                path: path.to_path_buf(),
                reason: format!("{:#}", e),
            })?;

        image::load_from_memory(&bytes)
            .map(|image| image.to_rgba8())
            .map_err(|e| OverlayError::TemplateLoad {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })
    }
}
