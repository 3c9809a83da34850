//! Clothing asset download: resolve the image behind a clothing id, fetch
//! it, optionally overlay a template, and save it.

use std::fmt;
use std::path::PathBuf;

use anyhow::Result;
use log::{debug, info};
use serde_json::Value;

use crate::asset::{AssetImage, AssetStore};
use crate::commands::config::{Markers, Routes};
use crate::http::{HttpClient, Payload};
use crate::overlay::{OverlayCategory, OverlayPipeline};
use crate::runtime::Runtime;

/// Returns the non-empty text between the first `start` and the next `end`.
pub fn extract_between<'a>(source: &'a str, start: &str, end: &str) -> Option<&'a str> {
    let from = source.find(start)? + start.len();
    let len = source[from..].find(end)?;
    let found = &source[from..from + len];
    (!found.is_empty()).then_some(found)
}

/// A step of the download that produced nothing usable.
#[derive(Debug)]
pub enum DownloadError {
    AssetDocument(String),
    AssetIdNotFound(String),
    ImageLocation(String),
    ImageFetch(String),
    Decode { clothing_id: String, reason: String },
}

impl fmt::Display for DownloadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DownloadError::AssetDocument(id) => {
                write!(f, "Failed to fetch the asset document for {}", id)
            }
            DownloadError::AssetIdNotFound(id) => {
                write!(f, "Failed to extract the image asset ID for {}", id)
            }
            DownloadError::ImageLocation(id) => {
                write!(f, "Failed to resolve the image location for asset {}", id)
            }
            DownloadError::ImageFetch(url) => write!(f, "Failed to download image from {}", url),
            DownloadError::Decode {
                clothing_id,
                reason,
            } => write!(f, "Failed to decode image for {}: {}", clothing_id, reason),
        }
    }
}

impl std::error::Error for DownloadError {}

/// Where a downloaded asset ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadOutcome {
    pub clothing_id: String,
    pub path: PathBuf,
    pub overlay: Option<OverlayCategory>,
}

pub struct AssetDownloader<R: Runtime> {
    client: HttpClient,
    routes: Routes,
    markers: Markers,
    pipeline: OverlayPipeline,
    store: AssetStore<R>,
}

impl<R: Runtime> AssetDownloader<R> {
    pub fn new(
        client: HttpClient,
        routes: Routes,
        markers: Markers,
        pipeline: OverlayPipeline,
        store: AssetStore<R>,
    ) -> Self {
        Self {
            client,
            routes,
            markers,
            pipeline,
            store,
        }
    }

    pub fn client(&self) -> &HttpClient {
        &self.client
    }

    /// Downloads one clothing asset and saves it as `<clothing id>.png`.
    ///
    /// With an overlay category, the template is resolved before any request
    /// is sent and a missing template fails the download.
    #[tracing::instrument(skip(self))]
    pub async fn download(
        &self,
        clothing_id: &str,
        overlay: Option<OverlayCategory>,
    ) -> Result<DownloadOutcome> {
        info!("Downloading clothing asset {}...", clothing_id);

        if let Some(category) = overlay {
            self.pipeline.templates().get(category)?;
        }

        let image_url = self.resolve_image_url(clothing_id).await?;
        let bytes = self
            .client
            .fetch_image(&image_url)
            .await
            .ok_or_else(|| DownloadError::ImageFetch(image_url.clone()))?;

        let image = match overlay {
            Some(category) => self.pipeline.overlay_bytes(clothing_id, &bytes, category)?,
            None => AssetImage::decode(clothing_id, &bytes).map_err(|e| DownloadError::Decode {
                clothing_id: clothing_id.to_string(),
                reason: e.to_string(),
            })?,
        };

        let file_name = image.file_name();
        let path = self.store.save(image, &file_name)?;

        Ok(DownloadOutcome {
            clothing_id: clothing_id.to_string(),
            path,
            overlay,
        })
    }

    /// Follows the asset document and the image-location endpoint to the image URL.
    pub async fn resolve_image_url(&self, clothing_id: &str) -> Result<String> {
        let document_request = self.client.request(self.routes.asset_delivery(clothing_id));
        let document = self
            .client
            .fetch_text(&document_request)
            .await
            .ok_or_else(|| DownloadError::AssetDocument(clothing_id.to_string()))?;

        let asset_id = extract_between(
            &document,
            &self.markers.asset_url_start,
            &self.markers.asset_url_end,
        )
        .map(str::trim)
        .ok_or_else(|| DownloadError::AssetIdNotFound(clothing_id.to_string()))?;
        debug!("Clothing {} uses image asset {}", clothing_id, asset_id);

        let location_request = self.client.request(self.routes.image_location(asset_id));
        let location = self
            .client
            .fetch_with_retry(&location_request)
            .await
            .and_then(|payload| self.location_from(payload))
            .ok_or_else(|| DownloadError::ImageLocation(asset_id.to_string()))?;
        debug!("Image for asset {} is at {}", asset_id, location);

        Ok(location)
    }

    fn location_from(&self, payload: Payload) -> Option<String> {
        match payload {
            Payload::Json(value) => value
                .get("location")
                .and_then(Value::as_str)
                .map(str::to_string),
            other => {
                let text = other.into_text()?;
                extract_between(
                    &text,
                    &self.markers.location_start,
                    &self.markers.location_end,
                )
                .map(str::to_string)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{RetryPolicy, Session};
    use crate::overlay::{OverlayError, TemplateStore};
    use crate::runtime::RealRuntime;
    use image::{Rgba, RgbaImage};
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::{TempDir, tempdir};

    fn png(width: u32, height: u32, pixel: [u8; 4]) -> Vec<u8> {
        let image = RgbaImage::from_pixel(width, height, Rgba(pixel));
        AssetImage::from_pixels("tmp", image).encode_png().unwrap()
    }

    struct Fixture {
        downloader: AssetDownloader<RealRuntime>,
        output: TempDir,
        _templates: TempDir,
    }

    fn fixture(base_url: &str) -> Fixture {
        let output = tempdir().unwrap();
        let templates = tempdir().unwrap();
        std::fs::write(
            templates.path().join("shirt_template.png"),
            png(4, 4, [0, 0, 0, 0]),
        )
        .unwrap();

        let policy = RetryPolicy::with_attempts(2).with_unit(Duration::from_millis(1));
        let client = HttpClient::new(Arc::new(Session::default()), policy);
        let store = TemplateStore::new(Arc::new(RealRuntime), templates.path());
        let downloader = AssetDownloader::new(
            client,
            Routes::with_base(base_url),
            Markers::default(),
            OverlayPipeline::new(Arc::new(store)),
            AssetStore::new(RealRuntime, output.path()),
        );

        Fixture {
            downloader,
            output,
            _templates: templates,
        }
    }

    async fn mock_chain(server: &mut mockito::ServerGuard, image: Vec<u8>) {
        let url = server.url();
        server
            .mock("GET", "/v1/asset/?id=100")
            .with_status(200)
            .with_header("content-type", "application/xml")
            .with_body("<roblox><url>http://www.roblox.com/asset/?id=200</url></roblox>")
            .create_async()
            .await;
        server
            .mock("GET", "/v1/assetId/200")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(format!(r#"{{"location": "{}/images/200.png"}}"#, url))
            .create_async()
            .await;
        server
            .mock("GET", "/images/200.png")
            .with_status(200)
            .with_header("content-type", "image/png")
            .with_body(image)
            .create_async()
            .await;
    }

    #[test]
    fn test_extract_between() {
        assert_eq!(extract_between("a[b]c", "[", "]"), Some("b"));
        assert_eq!(extract_between("a[]c", "[", "]"), None);
        assert_eq!(extract_between("abc", "[", "]"), None);
        assert_eq!(extract_between("a[bc", "[", "]"), None);
        assert_eq!(
            extract_between(r#"{"location":"https://x/y","a":1}"#, r#""location":""#, "\""),
            Some("https://x/y")
        );
    }

    #[tokio::test]
    async fn test_download_without_overlay() {
        let mut server = mockito::Server::new_async().await;
        mock_chain(&mut server, png(4, 4, [255, 0, 0, 255])).await;
        let fixture = fixture(&server.url());

        let outcome = fixture.downloader.download("100", None).await.unwrap();

        assert_eq!(outcome.path, fixture.output.path().join("100.png"));
        assert_eq!(outcome.overlay, None);
        let saved = AssetImage::decode("100", &std::fs::read(&outcome.path).unwrap()).unwrap();
        assert_eq!(saved.pixels().get_pixel(0, 0), &Rgba([255, 0, 0, 255]));
    }

    #[tokio::test]
    async fn test_download_with_overlay() {
        let mut server = mockito::Server::new_async().await;
        mock_chain(&mut server, png(4, 4, [0, 255, 0, 255])).await;
        let fixture = fixture(&server.url());

        let outcome = fixture
            .downloader
            .download("100", Some(OverlayCategory::Shirt))
            .await
            .unwrap();

        assert_eq!(outcome.overlay, Some(OverlayCategory::Shirt));
        assert!(outcome.path.exists());
    }

    #[tokio::test]
    async fn test_download_refuses_missing_template() {
        let mut server = mockito::Server::new_async().await;
        mock_chain(&mut server, png(4, 4, [0, 255, 0, 255])).await;
        let fixture = fixture(&server.url());

        let err = fixture
            .downloader
            .download("100", Some(OverlayCategory::Pants))
            .await
            .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<OverlayError>(),
            Some(OverlayError::TemplateMissing { .. })
        ));
        assert!(!fixture.output.path().join("100.png").exists());
    }

    #[tokio::test]
    async fn test_missing_template_sends_no_requests() {
        let mut server = mockito::Server::new_async().await;
        let untouched = server
            .mock("GET", mockito::Matcher::Any)
            .expect(0)
            .create_async()
            .await;
        let fixture = fixture(&server.url());

        let err = fixture
            .downloader
            .download("100", Some(OverlayCategory::Pants))
            .await
            .unwrap_err();

        untouched.assert_async().await;
        assert!(matches!(
            err.downcast_ref::<OverlayError>(),
            Some(OverlayError::TemplateMissing { .. })
        ));
    }

    #[tokio::test]
    async fn test_location_from_text_body() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/v1/asset/?id=100")
            .with_status(200)
            .with_body("<url>http://www.roblox.com/asset/?id=300</url>")
            .create_async()
            .await;
        server
            .mock("GET", "/v1/assetId/300")
            .with_status(200)
            .with_header("content-type", "text/plain")
            .with_body(r#"{"location":"https://cdn.example/300"}"#)
            .create_async()
            .await;
        let fixture = fixture(&server.url());

        let url = fixture.downloader.resolve_image_url("100").await.unwrap();
        assert_eq!(url, "https://cdn.example/300");
    }

    #[tokio::test]
    async fn test_missing_asset_document() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/v1/asset/?id=100")
            .with_status(404)
            .expect(2)
            .create_async()
            .await;
        let fixture = fixture(&server.url());

        let err = fixture.downloader.download("100", None).await.unwrap_err();

        mock.assert_async().await;
        assert!(matches!(
            err.downcast_ref::<DownloadError>(),
            Some(DownloadError::AssetDocument(_))
        ));
    }

    #[tokio::test]
    async fn test_document_without_asset_id() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/v1/asset/?id=100")
            .with_status(200)
            .with_body("<roblox></roblox>")
            .create_async()
            .await;
        let fixture = fixture(&server.url());

        let err = fixture.downloader.download("100", None).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DownloadError>(),
            Some(DownloadError::AssetIdNotFound(_))
        ));
    }
}
