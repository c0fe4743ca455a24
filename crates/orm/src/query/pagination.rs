//! Query Builder pagination operations
//!
//! Page arithmetic lives in [`Paginator`]; the terminal `paginate` runs a
//! cloned counting query first (stripping ordering and limits off the
//! clone, never the original) and then fetches the requested page.

use crate::backends::Connection;
use crate::error::{ModelError, ModelResult};
use crate::model::Record;

use super::builder::QueryBuilder;

/// One page of results plus the arithmetic around it.
#[derive(Debug, Clone, PartialEq)]
pub struct Paginator {
    pub records: Vec<Record>,
    pub total: i64,
    pub per_page: i64,
    pub current_page: i64,
    pub last_page: i64,
}

impl Paginator {
    /// Last page number: `ceil(total / per_page)`, floored at 1 so an empty
    /// result set still has one (empty) page.
    pub fn last_page_for(total: i64, per_page: i64) -> i64 {
        ((total + per_page - 1) / per_page).max(1)
    }

    pub fn has_more_pages(&self) -> bool {
        self.current_page < self.last_page
    }
}

impl QueryBuilder {
    /// Add LIMIT clause. Zero is a legal "return nothing"; a negative limit
    /// means "no limit" and suppresses the clause entirely.
    pub fn limit(mut self, count: i64) -> Self {
        self.limit_count = Some(count);
        self
    }

    /// Add OFFSET clause
    pub fn offset(mut self, count: i64) -> Self {
        self.offset_value = Some(count);
        self
    }

    /// Constrain the query to one page (LIMIT + OFFSET).
    pub fn for_page(mut self, page: i64, per_page: i64) -> Self {
        self.limit_count = Some(per_page);
        self.offset_value = Some((page.max(1) - 1) * per_page);
        self
    }

    /// Run the query paginated: one COUNT query over a stripped clone, one
    /// page fetch, and the page arithmetic bundled up.
    pub async fn paginate(
        self,
        conn: &dyn Connection,
        page: i64,
        per_page: i64,
    ) -> ModelResult<Paginator> {
        if per_page <= 0 {
            return Err(ModelError::Validation(
                "paginate requires a positive per-page size".to_string(),
            ));
        }
        let page = page.max(1);

        let total = self.clone().count(conn).await?;
        let last_page = Paginator::last_page_for(total, per_page);

        let records = self.for_page(page, per_page).get(conn).await?;

        Ok(Paginator {
            records,
            total,
            per_page,
            current_page: page,
            last_page,
        })
    }
}
