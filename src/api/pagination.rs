//! Page-walking over list endpoints
//!
//! List endpoints take `page` (1-based) and `perpage` parameters. Walking
//! stops on an empty or short page, or at the page limit.

use log::{debug, info, warn};
use serde_json::Value;

use super::client::RequestExecutor;
use super::constants::paging;
use super::error::ApiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageOptions {
    pub per_page: u32,
    pub max_pages: u32,
}

impl Default for PageOptions {
    fn default() -> Self {
        Self {
            per_page: paging::DEFAULT_PER_PAGE,
            max_pages: paging::MAX_PAGES,
        }
    }
}

/// Items collected across pages
#[derive(Debug, Clone, PartialEq)]
pub struct PagedItems {
    pub items: Vec<Value>,
    pub pages_fetched: u32,
    /// Set when a page after the first failed and walking stopped early
    pub partial_error: Option<ApiError>,
}

/// Fetch every page of `path`.
///
/// A failure on the first page is returned as is; a failure on a later page
/// keeps what was already collected.
pub async fn fetch_all_pages(
    executor: &RequestExecutor,
    path: &str,
    query: &[(String, String)],
    options: PageOptions,
) -> Result<PagedItems, ApiError> {
    if options.per_page == 0 {
        return Err(ApiError::unexpected("per_page must be greater than zero"));
    }

    let resource = resource_name(path);
    let mut items = Vec::new();
    let mut pages_fetched = 0;
    let mut partial_error = None;

    for page in 1..=options.max_pages {
        let mut params = query.to_vec();
        params.push((paging::PAGE.to_string(), page.to_string()));
        params.push((paging::PER_PAGE.to_string(), options.per_page.to_string()));

        let response = match executor.get(path, &params).await {
            Ok(response) => response,
            Err(error) if page == 1 => return Err(error),
            Err(error) => {
                warn!("{} page {} failed, stopping pagination: {}", path, page, error);
                partial_error = Some(error);
                break;
            }
        };

        pages_fetched = page;
        let page_items = extract_items(response.data, resource);
        let count = page_items.len();
        items.extend(page_items);
        debug!("{} page {}: {} items, {} total", path, page, count, items.len());

        if count < options.per_page as usize {
            break;
        }
        if page == options.max_pages {
            warn!("{} reached the {} page limit", path, options.max_pages);
        }
    }

    info!("Fetched {} items from {} in {} pages", items.len(), path, pages_fetched);
    Ok(PagedItems {
        items,
        pages_fetched,
        partial_error,
    })
}

/// Last non-empty path segment, used to find the item array in wrapped pages
fn resource_name(path: &str) -> &str {
    path.split('?')
        .next()
        .unwrap_or(path)
        .rsplit('/')
        .find(|segment| !segment.is_empty())
        .unwrap_or("")
}

/// Pull the items out of one page.
///
/// Pages are either a bare array or an object wrapping the array under the
/// resource name, `items` or `data`. Any other object is one item.
pub fn extract_items(page: Value, resource: &str) -> Vec<Value> {
    match page {
        Value::Null => Vec::new(),
        Value::Array(items) => items,
        Value::Object(mut object) => {
            let key = [resource, "items", "data"]
                .into_iter()
                .find(|key| !key.is_empty() && object.get(*key).is_some_and(Value::is_array));
            match key.and_then(|key| object.remove(key)) {
                Some(Value::Array(items)) => items,
                _ => vec![Value::Object(object)],
            }
        }
        other => vec![other],
    }
}
