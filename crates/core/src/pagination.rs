//! Offset pagination for list endpoints.
//!
//! List endpoints return `{ data, totalCount, pagination }`. `hasMore` is
//! derived from the page that was actually returned: it is true exactly when
//! the page came back full.

use serde::{Deserialize, Serialize};

/// Default page size when the client does not ask for one.
pub const DEFAULT_LIMIT: i64 = 20;

/// Largest page size a client may request.
pub const MAX_LIMIT: i64 = 100;

/// Page parameters from a query string (`?page=2&limit=50`).
///
/// Missing values fall back to page 1 and [`DEFAULT_LIMIT`]; out-of-range
/// values are clamped rather than rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct PageRequest {
    #[serde(default = "default_page")]
    page: i64,
    #[serde(default = "default_limit")]
    limit: i64,
}

const fn default_page() -> i64 {
    1
}

const fn default_limit() -> i64 {
    DEFAULT_LIMIT
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(default_page(), default_limit())
    }
}

impl PageRequest {
    /// Build a page request, clamping to valid bounds.
    #[must_use]
    pub const fn new(page: i64, limit: i64) -> Self {
        let page = if page < 1 { 1 } else { page };
        let limit = if limit < 1 {
            1
        } else if limit > MAX_LIMIT {
            MAX_LIMIT
        } else {
            limit
        };
        Self { page, limit }
    }

    /// Re-apply clamping (needed after deserializing raw values).
    #[must_use]
    pub const fn normalized(self) -> Self {
        Self::new(self.page, self.limit)
    }

    /// One-based page number.
    #[must_use]
    pub const fn page(&self) -> i64 {
        self.normalized().page
    }

    /// Page size (`LIMIT`).
    #[must_use]
    pub const fn limit(&self) -> i64 {
        self.normalized().limit
    }

    /// Rows to skip (`OFFSET`).
    #[must_use]
    pub const fn offset(&self) -> i64 {
        (self.page() - 1).saturating_mul(self.limit())
    }
}

/// Pagination metadata returned alongside a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    /// One-based page number.
    pub page: i64,
    /// Requested page size.
    pub limit: i64,
    /// Number of pages given `total_count`.
    pub total_pages: i64,
    /// True exactly when the returned page is full.
    pub has_more: bool,
}

impl Pagination {
    /// Build metadata for a page holding `returned` rows out of `total_count`.
    #[must_use]
    pub fn new(request: PageRequest, returned: usize, total_count: i64) -> Self {
        let limit = request.limit();
        let returned = i64::try_from(returned).unwrap_or(i64::MAX);
        let total_pages = if total_count <= 0 {
            0
        } else {
            (total_count + limit - 1) / limit
        };

        Self {
            page: request.page(),
            limit,
            total_pages,
            has_more: returned == limit,
        }
    }
}

/// A page of results.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Paginated<T> {
    /// Rows on this page.
    pub data: Vec<T>,
    /// Rows matching the query across all pages.
    pub total_count: i64,
    /// Page metadata.
    pub pagination: Pagination,
}

impl<T> Paginated<T> {
    /// Wrap a page of rows.
    #[must_use]
    pub fn new(data: Vec<T>, total_count: i64, request: PageRequest) -> Self {
        let pagination = Pagination::new(request, data.len(), total_count);
        Self {
            data,
            total_count,
            pagination,
        }
    }

    /// Convert each row, keeping the metadata.
    #[must_use]
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Paginated<U> {
        Paginated {
            data: self.data.into_iter().map(f).collect(),
            total_count: self.total_count,
            pagination: self.pagination,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let req: PageRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(req.page(), 1);
        assert_eq!(req.limit(), DEFAULT_LIMIT);
        assert_eq!(req.offset(), 0);
    }

    #[test]
    fn test_clamping() {
        let req = PageRequest::new(0, 1_000);
        assert_eq!(req.page(), 1);
        assert_eq!(req.limit(), MAX_LIMIT);

        let raw: PageRequest = serde_json::from_str(r#"{"page": -3, "limit": 0}"#).unwrap();
        assert_eq!(raw.page(), 1);
        assert_eq!(raw.limit(), 1);
    }

    #[test]
    fn test_offset() {
        assert_eq!(PageRequest::new(3, 25).offset(), 50);
    }

    #[test]
    fn test_has_more_exactly_when_page_full() {
        let req = PageRequest::new(1, 10);
        for returned in 0..=10 {
            let p = Pagination::new(req, returned, 100);
            assert_eq!(p.has_more, returned == 10, "returned {returned}");
        }
    }

    #[test]
    fn test_has_more_on_full_final_page() {
        // The last page being exactly full still reports has_more.
        let p = Pagination::new(PageRequest::new(2, 10), 10, 20);
        assert!(p.has_more);
        assert_eq!(p.total_pages, 2);
    }

    #[test]
    fn test_total_pages() {
        let req = PageRequest::new(1, 20);
        assert_eq!(Pagination::new(req, 0, 0).total_pages, 0);
        assert_eq!(Pagination::new(req, 20, 41).total_pages, 3);
    }

    #[test]
    fn test_serialized_shape() {
        let page = Paginated::new(vec![1, 2], 2, PageRequest::new(1, 2));
        let json = serde_json::to_value(&page).unwrap();
        assert_eq!(json["totalCount"], 2);
        assert_eq!(json["pagination"]["hasMore"], true);
        assert_eq!(json["pagination"]["totalPages"], 1);
        assert_eq!(json["data"], serde_json::json!([1, 2]));
    }
}
