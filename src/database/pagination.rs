use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};

/// `?page=&limit=` query, pages are numbered from 1.
#[derive(Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl PageQuery {
    pub fn new(page: i64, limit: i64) -> Self {
        Self {
            page: Some(page),
            limit: Some(limit),
        }
    }

    pub fn page(&self) -> i64 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn limit(&self) -> i64 {
        self.limit
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE)
    }

    pub fn offset(&self) -> i64 {
        (self.page() - 1) * self.limit()
    }
}

#[derive(Serialize, Deserialize, Debug)]
pub struct PageContext<T> {
    pub count: i64,
    pub next: Option<i64>,
    pub previous: Option<i64>,
    pub results: Vec<T>,
}

impl<T> PageContext<T> {
    pub fn from_rows(rows: Vec<T>, total_rows: i64, query: &PageQuery) -> Self {
        if rows.is_empty() {
            return Self::no_rows(total_rows);
        }
        let page = query.page();
        let page_count = (total_rows + query.limit() - 1) / query.limit();

        Self {
            count: total_rows,
            next: (page < page_count).then(|| page + 1),
            previous: (page > 1).then(|| (page - 1).min(page_count)),
            results: rows,
        }
    }

    pub fn no_rows(total_rows: i64) -> Self {
        Self {
            count: total_rows,
            next: None,
            previous: None,
            results: vec![],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_first_page() {
        let query = PageQuery::default();
        assert_eq!(query.page(), 1);
        assert_eq!(query.limit(), DEFAULT_PAGE_SIZE);
        assert_eq!(query.offset(), 0);
    }

    #[test]
    fn clamps_out_of_range_values() {
        let query = PageQuery::new(-3, 10_000);
        assert_eq!(query.page(), 1);
        assert_eq!(query.limit(), MAX_PAGE_SIZE);

        let query = PageQuery::new(3, 0);
        assert_eq!(query.limit(), 1);
        assert_eq!(query.offset(), 2);
    }

    #[test]
    fn links_neighbouring_pages() {
        let query = PageQuery::new(2, 2);
        let page = PageContext::from_rows(vec![3, 4], 5, &query);
        assert_eq!(page.count, 5);
        assert_eq!(page.next, Some(3));
        assert_eq!(page.previous, Some(1));

        let query = PageQuery::new(3, 2);
        let page = PageContext::from_rows(vec![5], 5, &query);
        assert_eq!(page.next, None);
        assert_eq!(page.previous, Some(2));
    }

    #[test]
    fn empty_page_keeps_total() {
        let page: PageContext<i32> = PageContext::from_rows(vec![], 4, &PageQuery::new(9, 2));
        assert_eq!(page.count, 4);
        assert!(page.results.is_empty());
        assert_eq!(page.next, None);
    }
}
