use std::path::PathBuf;
use std::time::Duration;

use crate::http::{DEFAULT_MAX_PAGES, DEFAULT_PAGE_SIZE, RetryPolicy};

pub const DEFAULT_ASSET_DELIVERY_URL: &str =
    "https://assetdelivery.roblox.com/v1/asset/?id={clothing_id}";
pub const DEFAULT_IMAGE_LOCATION_URL: &str =
    "https://assetdelivery.roblox.com/v1/assetId/{asset_id}";
pub const DEFAULT_GROUP_CATALOG_URL: &str = "https://catalog.roblox.com/v1/search/items?category=Clothing&creatorTargetId={group_id}&creatorType=Group";

/// Endpoint URL templates. `{clothing_id}`, `{asset_id}` and `{group_id}`
/// are substituted per request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Routes {
    pub asset_delivery: String,
    pub image_location: String,
    pub group_catalog: String,
}

impl Default for Routes {
    fn default() -> Self {
        Self {
            asset_delivery: DEFAULT_ASSET_DELIVERY_URL.to_string(),
            image_location: DEFAULT_IMAGE_LOCATION_URL.to_string(),
            group_catalog: DEFAULT_GROUP_CATALOG_URL.to_string(),
        }
    }
}

impl Routes {
    /// Same endpoint paths served from a single base URL (mirrors, test servers).
    pub fn with_base(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            asset_delivery: format!("{}/v1/asset/?id={{clothing_id}}", base),
            image_location: format!("{}/v1/assetId/{{asset_id}}", base),
            group_catalog: format!(
                "{}/v1/search/items?category=Clothing&creatorTargetId={{group_id}}&creatorType=Group",
                base
            ),
        }
    }

    pub fn asset_delivery(&self, clothing_id: &str) -> String {
        self.asset_delivery.replace("{clothing_id}", clothing_id)
    }

    pub fn image_location(&self, asset_id: &str) -> String {
        self.image_location.replace("{asset_id}", asset_id)
    }

    pub fn group_catalog(&self, group_id: &str) -> String {
        self.group_catalog.replace("{group_id}", group_id)
    }
}

/// Delimiters used to pull ids and URLs out of text responses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Markers {
    pub asset_url_start: String,
    pub asset_url_end: String,
    pub location_start: String,
    pub location_end: String,
}

impl Default for Markers {
    fn default() -> Self {
        Self {
            asset_url_start: "http://www.roblox.com/asset/?id=".to_string(),
            asset_url_end: "</url>".to_string(),
            location_start: r#""location":""#.to_string(),
            location_end: r#"""#.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub routes: Routes,
    pub markers: Markers,
    pub output_dir: PathBuf,
    pub templates_dir: PathBuf,
    pub retry: RetryPolicy,
    pub request_timeout: Option<Duration>,
    pub page_size: usize,
    pub max_pages: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            routes: Routes::default(),
            markers: Markers::default(),
            output_dir: PathBuf::from("."),
            templates_dir: PathBuf::from("assets"),
            retry: RetryPolicy::default(),
            request_timeout: Some(Duration::from_secs(30)),
            page_size: DEFAULT_PAGE_SIZE,
            max_pages: Some(DEFAULT_MAX_PAGES),
        }
    }
}

impl Config {
    /// Builds a configuration from command-line values, keeping defaults for the rest.
    pub fn new(
        output_dir: PathBuf,
        templates_dir: PathBuf,
        api_url: Option<&str>,
        attempts: u32,
        timeout_secs: u64,
    ) -> Self {
        Self {
            routes: api_url.map(Routes::with_base).unwrap_or_default(),
            output_dir,
            templates_dir,
            retry: RetryPolicy::with_attempts(attempts),
            request_timeout: (timeout_secs > 0).then(|| Duration::from_secs(timeout_secs)),
            ..Self::default()
        }
    }
}
