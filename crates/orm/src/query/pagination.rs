//! Query Builder pagination operations

use super::builder::QueryBuilder;

impl QueryBuilder {
    /// Add LIMIT clause
    pub fn limit(mut self, count: u64) -> Self {
        self.limit = Some(count);
        self
    }

    /// Add OFFSET clause
    pub fn offset(mut self, count: u64) -> Self {
        self.offset = Some(count);
        self
    }

    /// `limit(size).offset((page - 1) * size)`; pages are 1-based and a page
    /// of 0 is treated as 1
    pub fn page(self, page: u64, size: u64) -> Self {
        let page = page.max(1);
        self.limit(size).offset((page - 1).saturating_mul(size))
    }
}
