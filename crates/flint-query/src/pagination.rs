use serde::{Deserialize, Serialize};

/// Page size used when none (or a non-positive one) is given.
pub const DEFAULT_PAGE_SIZE: i64 = 20;

/// Page/size request values as supplied by a caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Limit {
    pub page: i64,
    pub size: i64,
}

impl Default for Limit {
    fn default() -> Self {
        Self {
            page: 1,
            size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl Limit {
    pub fn new(page: i64, size: i64) -> Self {
        Self { page, size }
    }
}

/// Result-set paging state.
///
/// Built from the request, then completed once with [`Pagination::with_total`]
/// after the store reports how many documents matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub total_count: i64,
    pub total_pages: i64,
    pub current_page: i64,
    pub size: i64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self::new(1, DEFAULT_PAGE_SIZE)
    }
}

impl Pagination {
    /// Pages below 1 are clamped to 1. `size` is stored as given; a
    /// non-positive size falls back to [`DEFAULT_PAGE_SIZE`] when used.
    pub fn new(page: i64, size: i64) -> Self {
        Self {
            total_count: 0,
            total_pages: 0,
            current_page: page.max(1),
            size,
        }
    }

    /// The size actually used for limit and page arithmetic.
    pub fn effective_size(&self) -> i64 {
        if self.size > 0 {
            self.size
        } else {
            DEFAULT_PAGE_SIZE
        }
    }

    /// Returns `(limit, offset)` for the current page.
    pub fn calculate_offset(&self) -> (i64, i64) {
        let limit = self.effective_size();
        let page = self.current_page.max(1);
        (limit, (page - 1).saturating_mul(limit))
    }

    /// Record the matched document count and derive the page count.
    pub fn with_total(&mut self, count: i64) -> &mut Self {
        self.total_count = count;
        self.total_pages = self.compute_total_pages();
        self
    }

    fn compute_total_pages(&self) -> i64 {
        let size = self.effective_size();
        if self.total_count < 0 {
            return 1;
        }
        self.total_count / size + i64::from(self.total_count % size != 0)
    }
}
