use std::time::Duration;

use anyhow::{Context, Result, bail};
use futures_util::{StreamExt, stream};
use log::{error, info, warn};

use crate::{
    asset::extract_asset_id,
    download::{AssetDownloader, DownloadOutcome},
    group::GroupCatalog,
    overlay::OverlayCategory,
    runtime::Runtime,
};

pub mod config;
pub mod services;

use config::Config;
use services::{build_downloader, build_http_client, build_session};

/// Default number of assets downloaded at once by `group`.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Options of the `group` command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupOptions {
    pub overlay: Option<OverlayCategory>,
    pub concurrency: usize,
    pub asset_timeout: Option<Duration>,
    pub list_only: bool,
}

impl Default for GroupOptions {
    fn default() -> Self {
        Self {
            overlay: None,
            concurrency: DEFAULT_CONCURRENCY,
            asset_timeout: None,
            list_only: false,
        }
    }
}

/// Download a single clothing asset given its id or a URL containing it
#[tracing::instrument(skip(runtime, config))]
pub async fn asset<R: Runtime + Clone + 'static>(
    runtime: R,
    config: Config,
    input: &str,
    overlay: Option<OverlayCategory>,
) -> Result<()> {
    let clothing_id = extract_asset_id(input)
        .with_context(|| format!("Invalid asset ID or URL: {}", input))?;

    let session = build_session(&config);
    let client = build_http_client(session.clone(), &config);
    let downloader = build_downloader(runtime, client, &config);

    let result = downloader.download(&clothing_id, overlay).await;
    session.close();

    let outcome = result.with_context(|| format!("Failed to download asset {}", clothing_id))?;
    println!("{}", outcome.path.display());
    Ok(())
}

/// Download every clothing asset of a group, or list their ids
#[tracing::instrument(skip(runtime, config))]
pub async fn group<R: Runtime + Clone + 'static>(
    runtime: R,
    config: Config,
    group_id: &str,
    options: GroupOptions,
) -> Result<()> {
    let session = build_session(&config);
    let client = build_http_client(session.clone(), &config);

    let ids = GroupCatalog::new(&client, &config.routes)
        .with_page_size(config.page_size)
        .with_max_pages(config.max_pages)
        .fetch_all_clothing_ids(group_id)
        .await;
    let Some(ids) = ids else {
        session.close();
        bail!("No clothing found for group {}", group_id);
    };

    if options.list_only {
        session.close();
        for id in &ids {
            println!("{}", id);
        }
        return Ok(());
    }

    let downloader = build_downloader(runtime, client, &config);
    let failures = download_all(&downloader, &ids, &options).await;
    session.close();

    if failures > 0 {
        bail!(
            "{} of {} assets from group {} failed to download",
            failures,
            ids.len(),
            group_id
        );
    }
    info!("Downloaded {} assets from group {}", ids.len(), group_id);
    Ok(())
}

/// Runs the downloads with bounded concurrency and returns how many failed.
async fn download_all<R: Runtime>(
    downloader: &AssetDownloader<R>,
    ids: &[String],
    options: &GroupOptions,
) -> usize {
    let concurrency = options.concurrency.max(1);
    info!(
        "Downloading {} assets with concurrency {}",
        ids.len(),
        concurrency
    );

    let results: Vec<(String, Result<DownloadOutcome>)> = stream::iter(ids)
        .map(|id| async move {
            (
                id.clone(),
                download_one(downloader, id, options.overlay, options.asset_timeout).await,
            )
        })
        .buffer_unordered(concurrency)
        .collect()
        .await;

    let mut failures = 0;
    for (id, result) in results {
        match result {
            Ok(outcome) => println!("{}", outcome.path.display()),
            Err(e) => {
                error!("Asset {} failed: {:#}", id, e);
                failures += 1;
            }
        }
    }
    failures
}

async fn download_one<R: Runtime>(
    downloader: &AssetDownloader<R>,
    clothing_id: &str,
    overlay: Option<OverlayCategory>,
    asset_timeout: Option<Duration>,
) -> Result<DownloadOutcome> {
    let Some(limit) = asset_timeout else {
        return downloader.download(clothing_id, overlay).await;
    };

    match tokio::time::timeout(limit, downloader.download(clothing_id, overlay)).await {
        Ok(result) => result,
        Err(_) => {
            warn!("Asset {} timed out after {:?}", clothing_id, limit);
            bail!("Timed out after {:?}", limit)
        }
    }
}
