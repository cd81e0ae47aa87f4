//! Fixed-size pagination over search results.

use std::sync::Arc;

use crate::config::DEFAULT_PAGE_SIZE;
use crate::record::FileRecord;

/// Slices an ordered sequence into fixed-size pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Paginator {
    page_size: usize,
}

impl Paginator {
    /// Create a paginator. A page size of zero is treated as one.
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size: page_size.max(1),
        }
    }

    /// Records per page.
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Return page `page_index` (zero-based) of `items`.
    ///
    /// Yields `items[index * size .. (index + 1) * size]` clipped to the
    /// available range; an exhausted index yields an empty slice.
    pub fn page<'a, T>(&self, items: &'a [T], page_index: usize) -> &'a [T] {
        let Some(start) = page_index.checked_mul(self.page_size) else {
            return &[];
        };
        if start >= items.len() {
            return &[];
        }
        let end = start.saturating_add(self.page_size).min(items.len());
        &items[start..end]
    }

    /// Number of non-empty pages for `len` items.
    pub fn page_count(&self, len: usize) -> usize {
        len.div_ceil(self.page_size)
    }
}

impl Default for Paginator {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

/// A search result snapshot with a page cursor.
///
/// The snapshot is immutable and cheap to clone; a rebuild that happens
/// while the caller is browsing does not change what the pager returns.
#[derive(Debug, Clone)]
pub struct ResultPager {
    results: Arc<[FileRecord]>,
    paginator: Paginator,
    next_page: usize,
}

impl ResultPager {
    /// Wrap a result set.
    pub fn new(results: Vec<FileRecord>, page_size: usize) -> Self {
        Self {
            results: results.into(),
            paginator: Paginator::new(page_size),
            next_page: 0,
        }
    }

    /// Total number of results.
    pub fn total(&self) -> usize {
        self.results.len()
    }

    /// Whether the search produced no results.
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Records per page.
    pub fn page_size(&self) -> usize {
        self.paginator.page_size()
    }

    /// Number of non-empty pages.
    pub fn page_count(&self) -> usize {
        self.paginator.page_count(self.results.len())
    }

    /// Index of the page `next_page` will return.
    pub fn cursor(&self) -> usize {
        self.next_page
    }

    /// Whether `next_page` would return a non-empty page.
    pub fn has_more(&self) -> bool {
        !self.paginator.page(&self.results, self.next_page).is_empty()
    }

    /// Random access to a page without moving the cursor.
    pub fn page(&self, page_index: usize) -> &[FileRecord] {
        self.paginator.page(&self.results, page_index)
    }

    /// Return the page under the cursor and advance.
    ///
    /// Once exhausted this keeps returning an empty slice and the cursor
    /// stops moving.
    pub fn next_page(&mut self) -> &[FileRecord] {
        let page = self.paginator.page(&self.results, self.next_page);
        if !page.is_empty() {
            self.next_page += 1;
        }
        page
    }

    /// Move the cursor back to the first page.
    pub fn reset(&mut self) {
        self.next_page = 0;
    }

    /// The full result snapshot.
    pub fn results(&self) -> &[FileRecord] {
        &self.results
    }

    /// Shared handle to the snapshot.
    pub fn snapshot(&self) -> Arc<[FileRecord]> {
        Arc::clone(&self.results)
    }
}
