use axum::http::{HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};

/// Default page size when a caller does not ask for one
pub const DEFAULT_LIMIT: u64 = 10;
/// Hard ceiling on page size, applied at execution time
pub const MAX_LIMIT: u64 = 100;

/// Clamp a requested page size into `[1, max]`.
#[must_use]
pub fn clamp_limit(limit: u64, max: u64) -> u64 {
    limit.clamp(1, max.clamp(1, MAX_LIMIT))
}

/// Pagination metadata derived from one executed page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageMeta {
    pub total_count: u64,
    pub has_more: bool,
    pub current_page: u64,
    pub total_pages: u64,
}

impl PageMeta {
    /// `limit` must already be clamped (non-zero).
    #[must_use]
    pub fn new(limit: u64, offset: u64, total_count: u64) -> Self {
        let limit = limit.max(1);
        Self {
            total_count,
            has_more: offset.saturating_add(limit) < total_count,
            current_page: offset / limit + 1,
            total_pages: total_count.div_ceil(limit),
        }
    }
}

/// Uniform list response: `{ data, totalCount, hasMore, currentPage, totalPages }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Paginated<T> {
    pub data: Vec<T>,
    pub total_count: u64,
    pub has_more: bool,
    pub current_page: u64,
    pub total_pages: u64,
}

impl<T> Paginated<T> {
    #[must_use]
    pub fn new(data: Vec<T>, limit: u64, offset: u64, total_count: u64) -> Self {
        let meta = PageMeta::new(limit, offset, total_count);
        Self {
            data,
            total_count: meta.total_count,
            has_more: meta.has_more,
            current_page: meta.current_page,
            total_pages: meta.total_pages,
        }
    }

    #[must_use]
    pub fn meta(&self) -> PageMeta {
        PageMeta {
            total_count: self.total_count,
            has_more: self.has_more,
            current_page: self.current_page,
            total_pages: self.total_pages,
        }
    }

    /// Transform rows while keeping the pagination metadata.
    ///
    /// # Errors
    ///
    /// Returns the first error produced by `f`.
    pub fn try_map<U, E>(self, f: impl FnMut(T) -> Result<U, E>) -> Result<Paginated<U>, E> {
        let data = self.data.into_iter().map(f).collect::<Result<Vec<_>, E>>()?;
        Ok(Paginated {
            data,
            total_count: self.total_count,
            has_more: self.has_more,
            current_page: self.current_page,
            total_pages: self.total_pages,
        })
    }
}

/// Sanitize resource name by removing control characters for HTTP headers
fn sanitize_resource_name(name: &str) -> String {
    name.chars().filter(|c| c.is_ascii() && !c.is_ascii_control()).collect()
}

/// Build the `Content-Range` header for a page, e.g. `stores 20-24/25`.
///
/// An empty page renders as `stores */25`.
#[must_use]
pub fn calculate_content_range(
    offset: u64,
    returned: u64,
    total_count: u64,
    resource_name: &str,
) -> HeaderMap {
    let safe_name = sanitize_resource_name(resource_name);
    let content_range = if returned == 0 {
        format!("{safe_name} */{total_count}")
    } else {
        format!("{safe_name} {offset}-{}/{total_count}", offset + returned - 1)
    };

    let mut headers = HeaderMap::new();
    let value = HeaderValue::from_str(&content_range)
        .unwrap_or_else(|_| HeaderValue::from_static("items */0"));
    headers.insert("Content-Range", value);
    headers
}
