//! Pagination utilities for submission listings

use boxhawk_common::{Error, Result};

/// Hard upper bound on a requested page size
pub const MAX_PAGE_SIZE: i64 = 100;

/// Pagination metadata calculated from total results
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    /// Current page number (1-indexed)
    pub page: i64,
    /// Rows per page
    pub page_size: i64,
    /// Total number of pages
    pub total_pages: i64,
    /// Offset for SQL LIMIT/OFFSET query
    pub offset: i64,
}

/// Clamp a requested page size to `[1, MAX_PAGE_SIZE]`
pub fn clamp_page_size(requested: i64) -> i64 {
    requested.clamp(1, MAX_PAGE_SIZE)
}

/// Offset of the first row on a page; pages below 1 read as page 1
pub fn page_offset(page: i64, page_size: i64) -> Result<i64> {
    (page.max(1) - 1)
        .checked_mul(page_size)
        .ok_or_else(|| Error::Validation("page out of range".to_string()))
}

/// Calculate pagination metadata from total results and requested page
///
/// The page is not clamped to the last page: a page past the end is reported
/// as-is with an empty result set, so clients can tell it apart from page 1.
///
/// # Examples
/// ```
/// use boxhawk_rv::pagination::calculate_pagination;
///
/// // 30 results at 12 per page = 3 pages (12 + 12 + 6)
/// let p = calculate_pagination(30, 2, 12).unwrap();
/// assert_eq!(p.total_pages, 3);
/// assert_eq!(p.offset, 12);
/// ```
pub fn calculate_pagination(total_results: i64, requested_page: i64, page_size: i64) -> Result<Pagination> {
    let page_size = clamp_page_size(page_size);
    let total_pages = (total_results + page_size - 1) / page_size;
    let page = requested_page.max(1);

    Ok(Pagination {
        page,
        page_size,
        total_pages,
        offset: page_offset(page, page_size)?,
    })
}
