//! Pagination arithmetic

use serde::Serialize;

use crate::error::{CatalogError, Result};

/// One page of results
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    /// Items on this page
    pub items: Vec<T>,
    /// 1-based page number
    pub page: usize,
    /// Requested page size
    pub per_page: usize,
    /// Size of the whole collection (or of all matches, for filters)
    pub total: usize,
}

impl<T> Page<T> {
    /// Number of pages needed for `total` items
    pub fn page_count(&self) -> usize {
        self.total.div_ceil(self.per_page.max(1))
    }
}

/// Translate `(page, per_page)` into `(offset, limit)` over `total` items
///
/// A page past the end yields a zero limit rather than an error.
pub fn paginate(
    page: usize,
    per_page: usize,
    max_per_page: usize,
    total: usize,
) -> Result<(usize, usize)> {
    if page < 1 {
        return Err(CatalogError::BadRequest(
            "page must be at least 1".to_string(),
        ));
    }
    if per_page < 1 {
        return Err(CatalogError::BadRequest(
            "per_page must be at least 1".to_string(),
        ));
    }
    if per_page > max_per_page {
        return Err(CatalogError::BadRequest(format!(
            "per_page must not exceed {}",
            max_per_page
        )));
    }

    let offset = (page - 1).saturating_mul(per_page);
    if offset >= total {
        return Ok((offset, 0));
    }
    Ok((offset, per_page.min(total - offset)))
}

/// Paginate an already materialized, ordered collection
pub(crate) fn paginate_vec<T>(
    items: Vec<T>,
    page: usize,
    per_page: usize,
    max_per_page: usize,
) -> Result<Page<T>> {
    let total = items.len();
    let (offset, limit) = paginate(page, per_page, max_per_page, total)?;
    let items = items.into_iter().skip(offset).take(limit).collect();
    Ok(Page {
        items,
        page,
        per_page,
        total,
    })
}
