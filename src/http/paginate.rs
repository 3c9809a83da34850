//! Cursor-driven pagination over `{ "data": [...], "nextPageCursor": ... }` pages.

use std::collections::HashSet;

use log::{debug, warn};
use serde_json::Value;

use super::client::HttpClient;

/// Default `limit` sent with every page request.
pub const DEFAULT_PAGE_SIZE: usize = 10;

/// Default cap on the number of pages fetched by one pagination chain.
pub const DEFAULT_MAX_PAGES: usize = 100;

/// One page of results.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub items: Vec<Value>,
    pub next_cursor: Option<String>,
}

impl Page {
    /// Extracts a page from a JSON object holding a `data` array.
    ///
    /// A missing, `null` or empty `nextPageCursor` means there is no next page.
    pub fn from_json(value: Value) -> Option<Page> {
        let Value::Object(mut object) = value else {
            return None;
        };
        let Some(Value::Array(items)) = object.remove("data") else {
            return None;
        };
        let next_cursor = match object.remove("nextPageCursor") {
            Some(Value::String(cursor)) if !cursor.is_empty() => Some(cursor),
            _ => None,
        };
        Some(Page { items, next_cursor })
    }
}

/// Accumulated items plus how the chain ended.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageReport {
    pub items: Vec<Value>,
    pub pages: usize,
    /// True when the chain stopped before the upstream ran out of cursors.
    pub truncated: bool,
}

/// Follows cursors until the upstream stops returning them.
pub struct Paginator<'a> {
    client: &'a HttpClient,
    max_pages: Option<usize>,
}

impl<'a> Paginator<'a> {
    pub fn new(client: &'a HttpClient) -> Self {
        Self {
            client,
            max_pages: Some(DEFAULT_MAX_PAGES),
        }
    }

    /// Caps the number of pages; `None` removes the cap.
    pub fn with_max_pages(mut self, max_pages: Option<usize>) -> Self {
        self.max_pages = max_pages;
        self
    }

    /// Fetches every page and returns the items in upstream order.
    ///
    /// Fetch failures truncate: whatever was accumulated so far is returned.
    pub async fn fetch_all(
        &self,
        url: &str,
        base_params: &[(&str, &str)],
        page_size: usize,
    ) -> Vec<Value> {
        self.fetch_all_report(url, base_params, page_size)
            .await
            .items
    }

    /// Like [`fetch_all`](Self::fetch_all), also reporting whether the chain was cut short.
    #[tracing::instrument(skip(self, base_params))]
    pub async fn fetch_all_report(
        &self,
        url: &str,
        base_params: &[(&str, &str)],
        page_size: usize,
    ) -> PageReport {
        let first = self
            .client
            .request(url)
            .with_params(base_params)
            .with_query("limit", page_size.to_string());

        let mut report = PageReport::default();
        let mut cursor: Option<String> = None;
        let mut followed: HashSet<String> = HashSet::new();

        loop {
            if let Some(max_pages) = self.max_pages {
                if report.pages >= max_pages {
                    warn!(
                        "Stopping pagination of {} after {} pages (page limit reached)",
                        url, max_pages
                    );
                    report.truncated = true;
                    break;
                }
            }

            let request = match &cursor {
                Some(cursor) => first.with_cursor(cursor),
                None => first.clone(),
            };

            let Some(page) = self
                .client
                .fetch_json(&request)
                .await
                .and_then(Page::from_json)
            else {
                warn!(
                    "Pagination of {} ended early after {} pages",
                    url, report.pages
                );
                report.truncated = true;
                break;
            };

            report.pages += 1;
            report.items.extend(page.items);

            match page.next_cursor {
                None => break,
                Some(next) if followed.contains(&next) => {
                    warn!("Upstream repeated cursor {} for {}; stopping", next, url);
                    report.truncated = true;
                    break;
                }
                Some(next) => {
                    followed.insert(next.clone());
                    cursor = Some(next);
                }
            }
        }

        debug!(
            "Fetched a total of {} items from {} in {} pages",
            report.items.len(),
            url,
            report.pages
        );
        report
    }
}
