//! Persistence of finished asset images.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::info;

use super::AssetImage;
use crate::runtime::Runtime;

/// Writes asset images as PNG files into an output directory.
pub struct AssetStore<R: Runtime> {
    runtime: R,
    output_dir: PathBuf,
}

impl<R: Runtime> AssetStore<R> {
    pub fn new(runtime: R, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            runtime,
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Encodes `image` as PNG and writes it to `<output dir>/<filename>`.
    /// The image is consumed.
    #[tracing::instrument(skip(self, image), fields(asset = %image.id()))]
    pub fn save(&self, image: AssetImage, filename: &str) -> Result<PathBuf> {
        let png = image
            .encode_png()
            .with_context(|| format!("Failed to encode asset {} as PNG", image.id()))?;

        self.runtime.create_dir_all(&self.output_dir)?;
        let path = self.output_dir.join(filename);
        self.runtime.write(&path, &png)?;

        info!(
            "Successfully saved asset image for asset ID {} to {}",
            image.id(),
            path.display()
        );
        Ok(path)
    }
}
