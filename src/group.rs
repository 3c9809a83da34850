//! Clothing listed in a group's catalog.

use log::{error, info};
use serde::Deserialize;
use serde_json::Value;

use crate::commands::config::Routes;
use crate::http::{DEFAULT_MAX_PAGES, DEFAULT_PAGE_SIZE, HttpClient, Paginator};

pub struct GroupCatalog<'a> {
    client: &'a HttpClient,
    routes: &'a Routes,
    page_size: usize,
    max_pages: Option<usize>,
}

impl<'a> GroupCatalog<'a> {
    pub fn new(client: &'a HttpClient, routes: &'a Routes) -> Self {
        Self {
            client,
            routes,
            page_size: DEFAULT_PAGE_SIZE,
            max_pages: Some(DEFAULT_MAX_PAGES),
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_max_pages(mut self, max_pages: Option<usize>) -> Self {
        self.max_pages = max_pages;
        self
    }

    /// Every clothing id the group sells, in catalog order.
    ///
    /// Returns `None` when the catalog yields no ids at all.
    #[tracing::instrument(skip(self))]
    pub async fn fetch_all_clothing_ids(&self, group_id: &str) -> Option<Vec<String>> {
        let url = self.routes.group_catalog(group_id);
        let report = Paginator::new(self.client)
            .with_max_pages(self.max_pages)
            .fetch_all_report(&url, &[("sortOrder", "Asc")], self.page_size)
            .await;

        let ids: Vec<String> = report.items.iter().filter_map(item_id).collect();
        if ids.is_empty() {
            error!("No clothing items found for group {}", group_id);
            return None;
        }

        info!(
            "Found {} clothing items for group {} across {} pages{}",
            ids.len(),
            group_id,
            report.pages,
            if report.truncated { " (incomplete)" } else { "" }
        );
        Some(ids)
    }
}

/// Catalog ids come back as numbers, occasionally as strings.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ItemId {
    Number(u64),
    Text(String),
}

#[derive(Debug, Deserialize)]
struct CatalogItem {
    id: ItemId,
}

fn item_id(item: &Value) -> Option<String> {
    match CatalogItem::deserialize(item).ok()?.id {
        ItemId::Number(id) => Some(id.to_string()),
        ItemId::Text(id) if !id.is_empty() => Some(id),
        ItemId::Text(_) => None,
    }
}
